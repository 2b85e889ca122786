use layoutinfer_core::{
    layout_inference, Conv2dParams, DataLayout, DataType, Graph, OpKind, PadType, PoolParams,
    PoolType, RoundType, TensorRole, TensorSpec,
};
use tracing_subscriber::EnvFilter;

fn main() -> layoutinfer_core::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()))
        .init();

    let f32_tensor = |shape: [usize; 4], role| TensorSpec::new(DataType::Float32, shape, role);

    // A channel-first block: conv, bias, relu, pool, flatten.
    let mut graph = Graph::empty();
    let input = graph.create_tensor(f32_tensor([3, 32, 32, 1], TensorRole::Input))?;
    let weight = graph.create_constant_from([3, 3, 3, 16], &vec![0.01f32; 432])?;
    let bias = graph.create_constant_from([16], &vec![0.1f32; 16])?;
    let conv = graph.create_tensor(f32_tensor([16, 32, 32, 1], TensorRole::Transient))?;
    let biased = graph.create_tensor(f32_tensor([16, 32, 32, 1], TensorRole::Transient))?;
    let relu = graph.create_tensor(f32_tensor([16, 32, 32, 1], TensorRole::Transient))?;
    let pooled = graph.create_tensor(f32_tensor([16, 16, 16, 1], TensorRole::Transient))?;
    let flat = graph.create_tensor(TensorSpec::new(
        DataType::Float32,
        [4096, 1],
        TensorRole::Output,
    ))?;

    graph.add_op(
        OpKind::Conv2d(Conv2dParams {
            weights: 16,
            ksize: [3, 3],
            padding: PadType::Same,
            layout: DataLayout::Cwhn,
            ..Default::default()
        }),
        &[input, weight],
        &[conv],
    )?;
    graph.add_op(OpKind::Add, &[conv, bias], &[biased])?;
    graph.add_op(OpKind::Relu, &[biased], &[relu])?;
    graph.add_op(
        OpKind::Pool2d(PoolParams {
            pool_type: PoolType::Max,
            padding: PadType::Valid,
            ksize: vec![2, 2],
            stride: vec![2, 2],
            pad: vec![0; 4],
            round_type: RoundType::Floor,
            layout: DataLayout::Cwhn,
        }),
        &[relu],
        &[pooled],
    )?;
    graph.add_op(OpKind::Reshape { shape: vec![4096, 1] }, &[pooled], &[flat])?;

    let inferred = layout_inference(&graph)?;
    println!("{:#?}", inferred.report);
    println!("{}", inferred.graph.to_dot());

    if let Some(path) = std::env::args().nth(1) {
        inferred.graph.visualize(path)?;
    }
    Ok(())
}
