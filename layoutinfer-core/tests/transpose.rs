use layoutinfer_core::{
    layout_inference, layout_inference_with, shape, transpose::permute_bytes, DataType, Element,
    Graph, LayoutInferenceOptions, OpKind, PermuteVector, TensorId, TensorRole, TensorSpec,
};
use proptest::prelude::*;

fn tensor(graph: &mut Graph, shape: &[usize], role: TensorRole) -> TensorId {
    graph
        .create_tensor(TensorSpec::new(DataType::Float32, shape.to_vec(), role))
        .unwrap()
}

fn kinds(graph: &Graph) -> Vec<OpKind> {
    graph.ops().map(|(_, op)| op.kind.clone()).collect()
}

#[test]
fn transpose_matching_the_carried_layout_disappears() {
    let mut graph = Graph::empty();
    let input = tensor(&mut graph, &[3, 8, 8, 1], TensorRole::Input);
    let hidden = tensor(&mut graph, &[3, 8, 8, 1], TensorRole::Transient);
    let output = tensor(&mut graph, &[8, 8, 3, 1], TensorRole::Output);
    graph.add_op(OpKind::Relu, &[input], &[hidden]).unwrap();
    graph
        .add_op(OpKind::Transpose { perm: vec![1, 2, 0, 3] }, &[hidden], &[output])
        .unwrap();

    let cwhn = PermuteVector::from_slice(&[1, 2, 0, 3]).unwrap();
    let options = LayoutInferenceOptions::new().with_boundary_layout(input, cwhn);
    let inferred = layout_inference_with(&graph, &options).unwrap();

    // The relu already produces the requested order; only a same-shape
    // reshape into the output placeholder is left.
    assert_eq!(
        kinds(&inferred.graph),
        vec![OpKind::Relu, OpKind::Reshape { shape: vec![8, 8, 3, 1] }]
    );
    assert_eq!(inferred.report.inserted_transposes, 0);
}

#[test]
fn unrelated_transpose_is_kept() {
    let mut graph = Graph::empty();
    let input = tensor(&mut graph, &[2, 3], TensorRole::Input);
    let output = tensor(&mut graph, &[3, 2], TensorRole::Output);
    graph
        .add_op(OpKind::Transpose { perm: vec![1, 0] }, &[input], &[output])
        .unwrap();

    let inferred = layout_inference(&graph).unwrap();
    assert_eq!(kinds(&inferred.graph), vec![OpKind::Transpose { perm: vec![1, 0] }]);
    let (_, op) = inferred.graph.ops().next().unwrap();
    assert_eq!(op.outputs[0], inferred.io_map[&output]);
    // Transposes the source graph asked for are not counted as inserted.
    assert_eq!(inferred.report.inserted_transposes, 0);
}

#[test]
fn transpose_is_composed_with_the_carried_layout() {
    let mut graph = Graph::empty();
    let input = tensor(&mut graph, &[3, 8, 8, 1], TensorRole::Input);
    let output = tensor(&mut graph, &[8, 3, 8, 1], TensorRole::Output);
    graph
        .add_op(OpKind::Transpose { perm: vec![1, 0, 2, 3] }, &[input], &[output])
        .unwrap();

    let cwhn = PermuteVector::from_slice(&[1, 2, 0, 3]).unwrap();
    let options = LayoutInferenceOptions::new().with_boundary_layout(input, cwhn);
    let inferred = layout_inference_with(&graph, &options).unwrap();

    assert_eq!(
        kinds(&inferred.graph),
        vec![OpKind::Transpose { perm: vec![0, 2, 1, 3] }]
    );
    assert_eq!(
        inferred.graph.tensor(inferred.io_map[&output]).shape(),
        &[8, 3, 8, 1]
    );
}

#[test]
fn constant_transpose_is_folded() {
    let mut graph = Graph::empty();
    let values: Vec<f32> = (0..6).map(|i| i as f32).collect();
    let constant = graph.create_constant_from([2, 3], &values).unwrap();
    let output = tensor(&mut graph, &[3, 2], TensorRole::Output);
    graph
        .add_op(OpKind::Transpose { perm: vec![1, 0] }, &[constant], &[output])
        .unwrap();

    let inferred = layout_inference(&graph).unwrap();
    assert_eq!(
        kinds(&inferred.graph),
        vec![OpKind::Reshape { shape: vec![3, 2] }]
    );
    assert_eq!(inferred.report.folded_constants, 1);

    let (_, reshape) = inferred.graph.ops().next().unwrap();
    let folded = inferred.graph.tensor(reshape.inputs[0]);
    assert_eq!(folded.shape(), &[3, 2]);
    assert_eq!(
        f32::from_bytes(folded.data().unwrap()),
        vec![0., 2., 4., 1., 3., 5.]
    );
}

macro_rules! permute_bytes_test {
    ($t:ty, $name:ident) => {
        #[test]
        fn $name() {
            let values: Vec<$t> = (0..24).map(|i| i as $t).collect();
            let pv = PermuteVector::from_slice(&[2, 0, 1]).unwrap();
            let bytes = <$t as Element>::to_bytes(&values);
            let out = permute_bytes(&bytes, &[2, 3, 4], std::mem::size_of::<$t>(), &pv).unwrap();
            let out = <$t as Element>::from_bytes(&out);

            // Output shape is [4, 2, 3].
            for a in 0..2 {
                for b in 0..3 {
                    for c in 0..4 {
                        let src = a + 2 * (b + 3 * c);
                        let dst = c + 4 * (a + 2 * b);
                        assert_eq!(out[dst], values[src]);
                    }
                }
            }
        }
    };
}

permute_bytes_test!(u8, permute_bytes_u8);
permute_bytes_test!(i16, permute_bytes_i16);
permute_bytes_test!(i32, permute_bytes_i32);
permute_bytes_test!(f32, permute_bytes_f32);
permute_bytes_test!(f64, permute_bytes_f64);

#[test]
fn permute_bytes_checks_the_buffer() {
    let pv = PermuteVector::from_slice(&[1, 0]).unwrap();
    assert!(permute_bytes(&[0u8; 5], &[2, 3], 1, &pv).is_err());
    assert_eq!(permute_bytes(&[], &[0, 3], 4, &pv).unwrap(), Vec::<u8>::new());
}

fn shaped_permutation() -> impl Strategy<Value = (Vec<usize>, Vec<usize>)> {
    (1usize..=5).prop_flat_map(|rank| {
        (
            prop::collection::vec(1usize..=4, rank),
            Just((0..rank).collect::<Vec<_>>()).prop_shuffle(),
        )
    })
}

proptest! {
    #[test]
    fn prop_permute_then_reverse_restores((dims, axes) in shaped_permutation()) {
        let pv = PermuteVector::from_slice(&axes).unwrap();
        let count = shape::element_count(&dims);
        let values: Vec<u32> = (0..count as u32).collect();
        let bytes = u32::to_bytes(&values);

        let permuted = permute_bytes(&bytes, &dims, 4, &pv).unwrap();
        let permuted_shape = shape::permute_shape(&dims, &pv).unwrap();
        let restored = permute_bytes(&permuted, &permuted_shape, 4, &pv.reverse()).unwrap();
        prop_assert_eq!(u32::from_bytes(&restored), values);
    }
}
