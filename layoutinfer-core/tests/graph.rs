use layoutinfer_core::{
    layout_inference, layout_inference_with, Context, DataType, Element, Error, Graph,
    LayoutInferenceOptions, OpKind, PermuteVector, TensorId, TensorRole, TensorSpec,
};

fn tensor(graph: &mut Graph, shape: &[usize], role: TensorRole) -> TensorId {
    graph
        .create_tensor(TensorSpec::new(DataType::Float32, shape.to_vec(), role))
        .unwrap()
}

#[test]
fn constant_without_data_is_rejected() {
    let mut graph = Graph::empty();
    let err = graph
        .create_tensor(TensorSpec::new(DataType::Float32, [2, 2], TensorRole::Constant))
        .unwrap_err();
    assert!(matches!(err.root(), Error::InvalidGraph(_)));
}

#[test]
fn constant_data_must_match_spec() {
    let mut graph = Graph::empty();
    let spec = TensorSpec::new(DataType::Int32, [3], TensorRole::Constant);
    assert!(graph.create_constant(spec.clone(), vec![0u8; 8]).is_err());
    let id = graph.create_constant(spec, vec![0u8; 12]).unwrap();
    assert!(graph.tensor(id).is_constant());

    let transient = TensorSpec::new(DataType::Int32, [3], TensorRole::Transient);
    assert!(graph.create_constant(transient, vec![0u8; 12]).is_err());
}

#[test]
fn typed_constants_round_trip() {
    let mut graph = Graph::empty();
    let values = [1i64, -2, 3];
    let id = graph.create_constant_from([3], &values).unwrap();
    let tensor = graph.tensor(id);
    assert_eq!(tensor.spec().dtype, DataType::Int64);
    assert_eq!(i64::from_bytes(tensor.data().unwrap()), values.to_vec());
}

#[test]
fn add_op_validates_outputs() {
    let mut graph = Graph::empty();
    let input = tensor(&mut graph, &[4], TensorRole::Input);
    let hidden = tensor(&mut graph, &[4], TensorRole::Transient);
    let output = tensor(&mut graph, &[4], TensorRole::Output);

    assert!(graph.add_op(OpKind::Relu, &[hidden], &[input]).is_err());
    graph.add_op(OpKind::Relu, &[input], &[hidden]).unwrap();
    assert!(graph.add_op(OpKind::Tanh, &[input], &[hidden]).is_err());

    let mut other = Graph::empty();
    for _ in 0..4 {
        tensor(&mut other, &[4], TensorRole::Transient);
    }
    let foreign = tensor(&mut other, &[4], TensorRole::Transient);
    assert!(graph.add_op(OpKind::Relu, &[input], &[output, foreign]).is_err());
    assert!(graph.producer(output).is_none());
}

#[test]
fn tracks_boundaries_producers_and_consumers() {
    let mut graph = Graph::empty();
    let input = tensor(&mut graph, &[4], TensorRole::Input);
    let hidden = tensor(&mut graph, &[4], TensorRole::Transient);
    let output = tensor(&mut graph, &[4], TensorRole::Output);
    let relu = graph.add_op(OpKind::Relu, &[input], &[hidden]).unwrap();
    let add = graph.add_op(OpKind::Add, &[hidden, input], &[output]).unwrap();

    assert_eq!(graph.inputs(), &[input]);
    assert_eq!(graph.outputs(), &[output]);
    assert_eq!(graph.consumers(input), &[relu, add]);
    assert_eq!(graph.producer(hidden), Some(relu));
    assert_eq!(graph.producer(input), None);
    assert_eq!(graph.count_ops(|k| matches!(k, OpKind::Add)), 1);
}

#[test]
fn dot_lists_operations_and_boundaries() {
    let mut graph = Graph::empty();
    let input = tensor(&mut graph, &[4], TensorRole::Input);
    let output = tensor(&mut graph, &[4], TensorRole::Output);
    graph.add_op(OpKind::Sigmoid, &[input], &[output]).unwrap();

    let dot = graph.to_dot();
    assert!(dot.starts_with("digraph"));
    assert!(dot.contains("Sigmoid (op0)"));
    assert!(dot.contains("Input t0 [4]"));
    assert!(dot.contains("Output t1 [4]"));
    assert_eq!(graph.to_petgraph().edge_count(), 2);
}

#[test]
fn unreachable_operations_fail_the_pass() {
    let mut graph = Graph::empty();
    let input = tensor(&mut graph, &[4], TensorRole::Input);
    let dangling = tensor(&mut graph, &[4], TensorRole::Transient);
    let output = tensor(&mut graph, &[4], TensorRole::Output);
    let add = graph.add_op(OpKind::Add, &[input, dangling], &[output]).unwrap();

    let err = layout_inference(&graph).unwrap_err();
    match err.root() {
        Error::IncompleteInference { unvisited } => assert_eq!(unvisited, &vec![add]),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn boundary_layouts_are_validated() {
    let mut graph = Graph::empty();
    let input = tensor(&mut graph, &[2, 3, 4, 5], TensorRole::Input);
    let hidden = tensor(&mut graph, &[2, 3, 4, 5], TensorRole::Transient);
    let output = tensor(&mut graph, &[2, 3, 4, 5], TensorRole::Output);
    graph.add_op(OpKind::Relu, &[input], &[hidden]).unwrap();
    graph.add_op(OpKind::Relu, &[hidden], &[output]).unwrap();

    let wrong_rank = LayoutInferenceOptions::new()
        .with_boundary_layout(input, PermuteVector::from_slice(&[1, 0]).unwrap());
    let err = layout_inference_with(&graph, &wrong_rank).unwrap_err();
    assert!(matches!(err.root(), Error::InvalidBoundaryLayout { tensor, .. } if *tensor == input));

    let not_boundary = LayoutInferenceOptions::new()
        .with_boundary_layout(hidden, PermuteVector::identity(4));
    let err = layout_inference_with(&graph, &not_boundary).unwrap_err();
    assert!(matches!(err.root(), Error::InvalidBoundaryLayout { tensor, .. } if *tensor == hidden));
}

#[test]
fn source_graph_is_untouched() {
    let mut graph = Graph::empty();
    let input = tensor(&mut graph, &[3, 8, 8, 1], TensorRole::Input);
    let output = tensor(&mut graph, &[3, 8, 8, 1], TensorRole::Output);
    graph.add_op(OpKind::Relu, &[input], &[output]).unwrap();
    let before = graph.to_dot();

    let inferred = layout_inference(&graph).unwrap();
    assert_eq!(graph.to_dot(), before);
    assert_eq!(inferred.report.visited_ops, 1);

    let (new_graph, io_map) = inferred.into_parts();
    assert_eq!(io_map.len(), 2);
    assert_eq!(new_graph.op_count(), 1);
}

#[test]
fn io_failures_carry_context() {
    let missing = std::env::temp_dir().join("layoutinfer-missing-dir/weights.bin");
    let err = std::fs::read(&missing).context("reading weights").unwrap_err();
    match err {
        Error::WrappedContext { wrapped, context } => {
            assert_eq!(context, "reading weights");
            assert!(wrapped.downcast_ref::<std::io::Error>().is_some());
        }
        other => panic!("unexpected error {other:?}"),
    }

    let lazy = std::fs::read(&missing)
        .with_context(|| format!("reading {}", missing.display()))
        .unwrap_err();
    assert!(lazy.to_string().contains("layoutinfer-missing-dir"));
}

#[test]
fn missing_values_become_messages() {
    assert_eq!(Some(3).context("unused").unwrap(), 3);
    let err = None::<u8>.context("no data buffer").unwrap_err();
    assert!(matches!(err.root(), Error::Msg(m) if m == "no data buffer"));
}

#[test]
fn visualize_into_missing_directory_fails() {
    let mut graph = Graph::empty();
    let input = tensor(&mut graph, &[4], TensorRole::Input);
    let output = tensor(&mut graph, &[4], TensorRole::Output);
    graph.add_op(OpKind::Sigmoid, &[input], &[output]).unwrap();

    let target = std::env::temp_dir().join("layoutinfer-missing-dir/graph.png");
    // Either graphviz is absent or it cannot write the target.
    match graph.visualize(&target).unwrap_err().root() {
        Error::WrappedContext { context, .. } => assert_eq!(context, "running graphviz `dot`"),
        Error::Msg(m) => assert!(m.starts_with("graphviz exited")),
        other => panic!("unexpected error {other:?}"),
    }
}
