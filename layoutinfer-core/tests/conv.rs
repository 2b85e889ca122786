use layoutinfer_core::{
    layout_inference, layout_inference_with, Conv1dParams, Conv2dParams, Conv3dParams,
    DataLayout, DataType, DeConv2dParams, Element, Graph, KernelLayout, LayoutInferenceOptions,
    OpKind, PadType, Quantization, TensorId, TensorRole, TensorSpec,
};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn tensor(graph: &mut Graph, shape: &[usize], role: TensorRole) -> TensorId {
    graph
        .create_tensor(TensorSpec::new(DataType::Float32, shape.to_vec(), role))
        .unwrap()
}

fn ramp(len: usize) -> Vec<f32> {
    (0..len).map(|i| i as f32).collect()
}

fn conv2d(layout: DataLayout, kernel_layout: Option<KernelLayout>) -> OpKind {
    OpKind::Conv2d(Conv2dParams {
        weights: 4,
        ksize: [3, 2],
        padding: PadType::Valid,
        layout,
        kernel_layout,
        ..Default::default()
    })
}

fn kinds(graph: &Graph) -> Vec<&'static str> {
    graph.ops().map(|(_, op)| op.name()).collect()
}

fn transpose_perms(graph: &Graph) -> Vec<Vec<usize>> {
    graph
        .ops()
        .filter_map(|(_, op)| match &op.kind {
            OpKind::Transpose { perm } => Some(perm.clone()),
            _ => None,
        })
        .collect()
}

/// Input [C=3, W=5, H=4, N=1], weight [Ic=3, W=3, H=2, Oc=4], bias [4].
fn channel_first_conv(graph: &mut Graph) -> (TensorId, TensorId, TensorId) {
    let input = tensor(graph, &[3, 5, 4, 1], TensorRole::Input);
    let weight = graph.create_constant_from([3, 3, 2, 4], &ramp(72)).unwrap();
    let bias = graph.create_constant_from([4], &[0.1f32, 0.2, 0.3, 0.4]).unwrap();
    let output = tensor(graph, &[4, 3, 3, 1], TensorRole::Output);
    graph
        .add_op(conv2d(DataLayout::Cwhn, None), &[input, weight, bias], &[output])
        .unwrap();
    (input, weight, output)
}

#[test]
fn channel_first_conv_is_wrapped_in_transposes() {
    init_tracing();
    let mut graph = Graph::empty();
    let (input, _, output) = channel_first_conv(&mut graph);

    let inferred = layout_inference(&graph).unwrap();
    let new = &inferred.graph;

    assert_eq!(kinds(new), vec!["Transpose", "Conv2d", "Transpose"]);
    assert_eq!(
        transpose_perms(new),
        vec![vec![1, 2, 0, 3], vec![2, 0, 1, 3]]
    );
    assert_eq!(inferred.report.inserted_transposes, 2);
    assert_eq!(inferred.report.folded_constants, 1);
    assert!(inferred.report.double_assignments.is_empty());

    assert_eq!(new.tensor(inferred.io_map[&input]).shape(), &[3, 5, 4, 1]);
    assert_eq!(new.tensor(inferred.io_map[&output]).shape(), &[4, 3, 3, 1]);

    let (_, conv) = new.ops().nth(1).unwrap();
    match &conv.kind {
        OpKind::Conv2d(p) => {
            assert_eq!(p.layout, DataLayout::Whcn);
            assert_eq!(p.kernel_layout, Some(KernelLayout::WhIcOc));
        }
        other => panic!("unexpected kind {other:?}"),
    }
    assert_eq!(new.tensor(conv.inputs[0]).shape(), &[5, 4, 3, 1]);
    assert_eq!(new.tensor(conv.outputs[0]).shape(), &[3, 3, 4, 1]);
    // The seeded copy of the weight is no longer read.
    assert_eq!(new.constants().len(), 2);
}

#[test]
fn weights_are_permuted_offline() {
    let mut graph = Graph::empty();
    channel_first_conv(&mut graph);

    let inferred = layout_inference(&graph).unwrap();
    let (_, conv) = inferred.graph.ops().nth(1).unwrap();
    let weight = inferred.graph.tensor(conv.inputs[1]);
    assert!(weight.is_constant());
    assert_eq!(weight.shape(), &[3, 2, 3, 4]);

    let values = f32::from_bytes(weight.data().unwrap());
    let (ic_n, w_n, h_n, oc_n) = (3, 3, 2, 4);
    for oc in 0..oc_n {
        for h in 0..h_n {
            for w in 0..w_n {
                for ic in 0..ic_n {
                    let src = ic + ic_n * (w + w_n * (h + h_n * oc));
                    let dst = w + w_n * (h + h_n * (ic + ic_n * oc));
                    assert_eq!(values[dst], src as f32);
                }
            }
        }
    }

    // The bias needs no reordering and keeps its bytes.
    let bias = inferred.graph.tensor(conv.inputs[2]);
    assert_eq!(f32::from_bytes(bias.data().unwrap()), vec![0.1, 0.2, 0.3, 0.4]);
}

#[test]
fn unused_constants_can_be_kept() {
    let mut graph = Graph::empty();
    let (_, weight, _) = channel_first_conv(&mut graph);

    let options = LayoutInferenceOptions::new().keep_unused_constants(true);
    let inferred = layout_inference_with(&graph, &options).unwrap();
    let constants = inferred.graph.constants();
    assert_eq!(constants.len(), 3);
    let kept = inferred.graph.tensor(constants[0]);
    assert_eq!(kept.shape(), graph.tensor(weight).shape());
    assert_eq!(kept.data(), graph.tensor(weight).data());
}

#[test]
fn canonical_conv_is_left_alone() {
    let mut graph = Graph::empty();
    let input = tensor(&mut graph, &[5, 4, 3, 1], TensorRole::Input);
    let weight = graph.create_constant_from([3, 2, 3, 4], &ramp(72)).unwrap();
    let output = tensor(&mut graph, &[3, 3, 4, 1], TensorRole::Output);
    graph
        .add_op(conv2d(DataLayout::Whcn, None), &[input, weight], &[output])
        .unwrap();

    let inferred = layout_inference(&graph).unwrap();
    assert_eq!(kinds(&inferred.graph), vec!["Conv2d"]);
    assert_eq!(inferred.report.inserted_transposes, 0);
    assert_eq!(inferred.report.folded_constants, 0);
}

#[test]
fn second_run_is_a_fixed_point() {
    let mut graph = Graph::empty();
    channel_first_conv(&mut graph);

    let first = layout_inference(&graph).unwrap();
    let second = layout_inference(&first.graph).unwrap();

    assert_eq!(second.report.inserted_transposes, 0);
    assert_eq!(second.report.folded_constants, 0);
    assert_eq!(kinds(&second.graph), kinds(&first.graph));
    assert_eq!(transpose_perms(&second.graph), transpose_perms(&first.graph));
}

#[test]
fn weight_fed_as_input_gets_a_transpose() {
    let mut graph = Graph::empty();
    let input = tensor(&mut graph, &[3, 5, 4, 1], TensorRole::Input);
    let weight = tensor(&mut graph, &[3, 3, 2, 4], TensorRole::Input);
    let output = tensor(&mut graph, &[4, 3, 3, 1], TensorRole::Output);
    graph
        .add_op(conv2d(DataLayout::Cwhn, None), &[input, weight], &[output])
        .unwrap();

    let inferred = layout_inference(&graph).unwrap();
    assert_eq!(inferred.report.inserted_transposes, 3);
    assert_eq!(inferred.report.folded_constants, 0);
    assert_eq!(
        kinds(&inferred.graph),
        vec!["Transpose", "Transpose", "Conv2d", "Transpose"]
    );
    // Both graph inputs keep their declared shapes.
    assert_eq!(
        inferred.graph.tensor(inferred.io_map[&weight]).shape(),
        &[3, 3, 2, 4]
    );
}

#[test]
fn layouts_propagate_through_chains() {
    let mut graph = Graph::empty();
    let input = tensor(&mut graph, &[3, 5, 4, 1], TensorRole::Input);
    let w1 = graph.create_constant_from([3, 3, 2, 4], &ramp(72)).unwrap();
    let hidden = tensor(&mut graph, &[4, 3, 3, 1], TensorRole::Transient);
    let activated = tensor(&mut graph, &[4, 3, 3, 1], TensorRole::Transient);
    let w2 = graph.create_constant_from([4, 3, 2, 4], &ramp(96)).unwrap();
    let output = tensor(&mut graph, &[4, 1, 2, 1], TensorRole::Output);
    graph
        .add_op(conv2d(DataLayout::Cwhn, None), &[input, w1], &[hidden])
        .unwrap();
    graph.add_op(OpKind::Relu, &[hidden], &[activated]).unwrap();
    graph
        .add_op(conv2d(DataLayout::Cwhn, None), &[activated, w2], &[output])
        .unwrap();

    let inferred = layout_inference(&graph).unwrap();
    assert_eq!(
        kinds(&inferred.graph),
        vec!["Transpose", "Conv2d", "Relu", "Conv2d", "Transpose"]
    );
    assert_eq!(inferred.report.inserted_transposes, 2);
    assert_eq!(inferred.report.folded_constants, 2);
}

#[test]
fn shared_weight_is_folded_once() {
    let mut graph = Graph::empty();
    let a = tensor(&mut graph, &[3, 5, 4, 1], TensorRole::Input);
    let b = tensor(&mut graph, &[3, 5, 4, 1], TensorRole::Input);
    let weight = graph.create_constant_from([3, 3, 2, 4], &ramp(72)).unwrap();
    let ya = tensor(&mut graph, &[4, 3, 3, 1], TensorRole::Transient);
    let yb = tensor(&mut graph, &[4, 3, 3, 1], TensorRole::Transient);
    let output = tensor(&mut graph, &[4, 3, 3, 1], TensorRole::Output);
    graph
        .add_op(conv2d(DataLayout::Cwhn, None), &[a, weight], &[ya])
        .unwrap();
    graph
        .add_op(conv2d(DataLayout::Cwhn, None), &[b, weight], &[yb])
        .unwrap();
    graph.add_op(OpKind::Add, &[ya, yb], &[output]).unwrap();

    let inferred = layout_inference(&graph).unwrap();
    assert_eq!(inferred.report.folded_constants, 1);
    assert_eq!(inferred.report.inserted_transposes, 3);

    let weights: Vec<TensorId> = inferred
        .graph
        .ops()
        .filter(|(_, op)| op.name() == "Conv2d")
        .map(|(_, op)| op.inputs[1])
        .collect();
    assert_eq!(weights.len(), 2);
    assert_eq!(weights[0], weights[1]);
}

#[test]
fn output_channel_first_kernels_are_reordered() {
    let mut graph = Graph::empty();
    let input = tensor(&mut graph, &[5, 4, 3, 1], TensorRole::Input);
    let weight = graph.create_constant_from([4, 3, 3, 2], &ramp(72)).unwrap();
    let output = tensor(&mut graph, &[3, 3, 4, 1], TensorRole::Output);
    graph
        .add_op(
            conv2d(DataLayout::Whcn, Some(KernelLayout::OcIcWh)),
            &[input, weight],
            &[output],
        )
        .unwrap();

    let inferred = layout_inference(&graph).unwrap();
    assert_eq!(inferred.report.inserted_transposes, 0);
    assert_eq!(inferred.report.folded_constants, 1);
    let (_, conv) = inferred.graph.ops().next().unwrap();
    assert_eq!(inferred.graph.tensor(conv.inputs[1]).shape(), &[3, 2, 3, 4]);
    match &conv.kind {
        OpKind::Conv2d(p) => assert_eq!(p.kernel_layout, Some(KernelLayout::WhIcOc)),
        other => panic!("unexpected kind {other:?}"),
    }
}

#[test]
fn channel_first_conv1d() {
    let mut graph = Graph::empty();
    let input = tensor(&mut graph, &[3, 8, 1], TensorRole::Input);
    let weight = graph.create_constant_from([3, 3, 4], &ramp(36)).unwrap();
    let output = tensor(&mut graph, &[4, 6, 1], TensorRole::Output);
    let conv = Conv1dParams {
        weights: 4,
        padding: PadType::Valid,
        ksize: 3,
        stride: 1,
        dilation: 1,
        pad: [0, 0],
        multiplier: 0,
        layout: DataLayout::Cwn,
        kernel_layout: None,
    };
    graph
        .add_op(OpKind::Conv1d(conv), &[input, weight], &[output])
        .unwrap();

    let inferred = layout_inference(&graph).unwrap();
    assert_eq!(transpose_perms(&inferred.graph), vec![vec![1, 0, 2], vec![1, 0, 2]]);
    let (_, conv) = inferred.graph.ops().nth(1).unwrap();
    assert_eq!(inferred.graph.tensor(conv.inputs[0]).shape(), &[8, 3, 1]);
    match &conv.kind {
        OpKind::Conv1d(p) => {
            assert_eq!(p.layout, DataLayout::Wcn);
            assert_eq!(p.kernel_layout, Some(KernelLayout::WIcOc));
        }
        other => panic!("unexpected kind {other:?}"),
    }
}

#[test]
fn channel_first_conv3d() {
    let mut graph = Graph::empty();
    // [C=2, W=4, H=3, D=3, N=1] and weight [Ic=2, W=2, H=2, D=2, Oc=3].
    let input = tensor(&mut graph, &[2, 4, 3, 3, 1], TensorRole::Input);
    let weight = graph.create_constant_from([2, 2, 2, 2, 3], &ramp(48)).unwrap();
    let output = tensor(&mut graph, &[3, 3, 2, 2, 1], TensorRole::Output);
    let conv = Conv3dParams {
        weights: 3,
        padding: PadType::Valid,
        ksize: [2, 2, 2],
        stride: [1, 1, 1],
        dilation: [1, 1, 1],
        pad: [0; 6],
        multiplier: 0,
        layout: DataLayout::Cwhdn,
        kernel_layout: None,
    };
    graph
        .add_op(OpKind::Conv3d(conv), &[input, weight], &[output])
        .unwrap();

    let inferred = layout_inference(&graph).unwrap();
    let new = &inferred.graph;
    assert_eq!(kinds(new), vec!["Transpose", "Conv3d", "Transpose"]);
    assert_eq!(
        transpose_perms(new),
        vec![vec![1, 2, 3, 0, 4], vec![3, 0, 1, 2, 4]]
    );
    assert_eq!(inferred.report.inserted_transposes, 2);
    assert_eq!(inferred.report.folded_constants, 1);

    let (_, conv) = new.ops().nth(1).unwrap();
    match &conv.kind {
        OpKind::Conv3d(p) => {
            assert_eq!(p.layout, DataLayout::Whdcn);
            assert_eq!(p.kernel_layout, Some(KernelLayout::WhdIcOc));
        }
        other => panic!("unexpected kind {other:?}"),
    }
    assert_eq!(new.tensor(conv.inputs[0]).shape(), &[4, 3, 3, 2, 1]);
    assert_eq!(new.tensor(conv.outputs[0]).shape(), &[3, 2, 2, 3, 1]);
    assert_eq!(new.tensor(inferred.io_map[&output]).shape(), &[3, 3, 2, 2, 1]);

    let weight = new.tensor(conv.inputs[1]);
    assert_eq!(weight.shape(), &[2, 2, 2, 2, 3]);
    let values = f32::from_bytes(weight.data().unwrap());
    let (ic_n, w_n, h_n, d_n, oc_n) = (2, 2, 2, 2, 3);
    for oc in 0..oc_n {
        for d in 0..d_n {
            for h in 0..h_n {
                for w in 0..w_n {
                    for ic in 0..ic_n {
                        let src = ic + ic_n * (w + w_n * (h + h_n * (d + d_n * oc)));
                        let dst = w + w_n * (h + h_n * (d + d_n * (ic + ic_n * oc)));
                        assert_eq!(values[dst], src as f32);
                    }
                }
            }
        }
    }
}

#[test]
fn input_channel_outer_kernels_are_reordered() {
    let mut graph = Graph::empty();
    let input = tensor(&mut graph, &[5, 4, 3, 1], TensorRole::Input);
    // [Ic=3, Oc=4, W=3, H=2]
    let weight = graph.create_constant_from([3, 4, 3, 2], &ramp(72)).unwrap();
    let output = tensor(&mut graph, &[3, 3, 4, 1], TensorRole::Output);
    graph
        .add_op(
            conv2d(DataLayout::Whcn, Some(KernelLayout::IcOcWh)),
            &[input, weight],
            &[output],
        )
        .unwrap();

    let inferred = layout_inference(&graph).unwrap();
    assert_eq!(kinds(&inferred.graph), vec!["Conv2d"]);
    assert_eq!(inferred.report.inserted_transposes, 0);
    assert_eq!(inferred.report.folded_constants, 1);

    let (_, conv) = inferred.graph.ops().next().unwrap();
    let weight = inferred.graph.tensor(conv.inputs[1]);
    assert_eq!(weight.shape(), &[3, 2, 3, 4]);
    let values = f32::from_bytes(weight.data().unwrap());
    let (ic_n, oc_n, w_n, h_n) = (3, 4, 3, 2);
    for h in 0..h_n {
        for w in 0..w_n {
            for oc in 0..oc_n {
                for ic in 0..ic_n {
                    let src = ic + ic_n * (oc + oc_n * (w + w_n * h));
                    let dst = w + w_n * (h + h_n * (ic + ic_n * oc));
                    assert_eq!(values[dst], src as f32);
                }
            }
        }
    }
}

#[test]
fn channel_first_grouped_conv() {
    let mut graph = Graph::empty();
    // Four input channels in two groups of two.
    let input = tensor(&mut graph, &[4, 5, 4, 1], TensorRole::Input);
    let weight = graph.create_constant_from([2, 3, 2, 4], &ramp(48)).unwrap();
    let output = tensor(&mut graph, &[4, 3, 3, 1], TensorRole::Output);
    let conv = Conv2dParams {
        weights: 4,
        ksize: [3, 2],
        padding: PadType::Valid,
        groups: 2,
        layout: DataLayout::Cwhn,
        ..Default::default()
    };
    graph
        .add_op(OpKind::GroupedConv2d(conv), &[input, weight], &[output])
        .unwrap();

    let inferred = layout_inference(&graph).unwrap();
    let new = &inferred.graph;
    assert_eq!(kinds(new), vec!["Transpose", "GroupedConv2d", "Transpose"]);
    assert_eq!(
        transpose_perms(new),
        vec![vec![1, 2, 0, 3], vec![2, 0, 1, 3]]
    );
    let (_, conv) = new.ops().nth(1).unwrap();
    match &conv.kind {
        OpKind::GroupedConv2d(p) => {
            assert_eq!(p.groups, 2);
            assert_eq!(p.layout, DataLayout::Whcn);
            assert_eq!(p.kernel_layout, Some(KernelLayout::WhIcOc));
        }
        other => panic!("unexpected kind {other:?}"),
    }
    assert_eq!(new.tensor(conv.inputs[0]).shape(), &[5, 4, 4, 1]);
    assert_eq!(new.tensor(conv.inputs[1]).shape(), &[3, 2, 2, 4]);
}

#[test]
fn channel_first_deconv_with_output_channel_first_kernel() {
    let mut graph = Graph::empty();
    let input = tensor(&mut graph, &[3, 4, 4, 1], TensorRole::Input);
    // [Oc=2, Ic=3, W=2, H=2]
    let weight = graph.create_constant_from([2, 3, 2, 2], &ramp(24)).unwrap();
    let output = tensor(&mut graph, &[2, 5, 5, 1], TensorRole::Output);
    let deconv = DeConv2dParams {
        oc_count: 2,
        padding: PadType::Valid,
        ksize: [2, 2],
        stride: [1, 1],
        output_padding: [0, 0],
        pad: [0; 4],
        group: 1,
        layout: DataLayout::Cwhn,
        kernel_layout: Some(KernelLayout::OcIcWh),
    };
    graph
        .add_op(OpKind::DeConv2d(deconv), &[input, weight], &[output])
        .unwrap();

    let inferred = layout_inference(&graph).unwrap();
    let new = &inferred.graph;
    assert_eq!(kinds(new), vec!["Transpose", "DeConv2d", "Transpose"]);
    assert_eq!(inferred.report.folded_constants, 1);
    let (_, conv) = new.ops().nth(1).unwrap();
    match &conv.kind {
        OpKind::DeConv2d(p) => {
            assert_eq!(p.layout, DataLayout::Whcn);
            assert_eq!(p.kernel_layout, Some(KernelLayout::WhIcOc));
        }
        other => panic!("unexpected kind {other:?}"),
    }
    assert_eq!(new.tensor(conv.inputs[1]).shape(), &[2, 2, 3, 2]);
    assert_eq!(new.tensor(conv.outputs[0]).shape(), &[5, 5, 2, 1]);
}

fn per_channel(channel_dim: usize, channels: usize) -> Quantization {
    Quantization::SymmetricPerChannel {
        channel_dim,
        scales: (1..=channels).map(|c| c as f32 / 16.).collect(),
        zero_points: vec![0; channels],
    }
}

fn channel_dim_of(graph: &Graph, id: TensorId) -> usize {
    match &graph.tensor(id).spec().quantization {
        Quantization::SymmetricPerChannel { channel_dim, scales, .. } => {
            assert_eq!(graph.tensor(id).shape()[*channel_dim], scales.len());
            *channel_dim
        }
        other => panic!("unexpected quantization {other:?}"),
    }
}

#[test]
fn per_channel_quantization_axes_follow_their_dimension() {
    let mut graph = Graph::empty();
    let quantized = |shape: &[usize], role, q| {
        TensorSpec::new(DataType::Int8, shape.to_vec(), role).with_quantization(q)
    };
    let input = graph
        .create_tensor(quantized(&[3, 5, 4, 1], TensorRole::Input, per_channel(0, 3)))
        .unwrap();
    // [Oc=4, Ic=3, W=3, H=2], one scale per output channel.
    let bytes: Vec<u8> = (0..72u8).collect();
    let weight = graph
        .create_constant(
            quantized(&[4, 3, 3, 2], TensorRole::Constant, per_channel(0, 4)),
            bytes,
        )
        .unwrap();
    let output = graph
        .create_tensor(quantized(&[4, 3, 3, 1], TensorRole::Output, per_channel(0, 4)))
        .unwrap();
    graph
        .add_op(
            conv2d(DataLayout::Cwhn, Some(KernelLayout::OcIcWh)),
            &[input, weight],
            &[output],
        )
        .unwrap();

    let inferred = layout_inference(&graph).unwrap();
    let new = &inferred.graph;
    let (_, conv) = new.ops().nth(1).unwrap();

    // Activations: channels move from axis 0 to axis 2 of WHCN.
    assert_eq!(channel_dim_of(new, conv.inputs[0]), 2);
    assert_eq!(channel_dim_of(new, conv.outputs[0]), 2);
    // Weight: output channels end up outermost.
    assert_eq!(new.tensor(conv.inputs[1]).shape(), &[3, 2, 3, 4]);
    assert_eq!(channel_dim_of(new, conv.inputs[1]), 3);
    // The boundary keeps its declared axis.
    assert_eq!(channel_dim_of(new, inferred.io_map[&input]), 0);
    assert_eq!(channel_dim_of(new, inferred.io_map[&output]), 0);

    let data = new.tensor(conv.inputs[1]).data().unwrap();
    let (oc_n, ic_n, w_n, h_n) = (4, 3, 3, 2);
    for h in 0..h_n {
        for w in 0..w_n {
            for ic in 0..ic_n {
                for oc in 0..oc_n {
                    let src = oc + oc_n * (ic + ic_n * (w + w_n * h));
                    let dst = w + w_n * (h + h_n * (ic + ic_n * oc));
                    assert_eq!(data[dst] as usize, src);
                }
            }
        }
    }
}
