//! Convolutions run with `WHCN`-family activations and `WHIcOc`-family
//! weights. Each is resolved independently from what the operator declares.

use crate::{
    bail,
    infer::{
        rule::{emit_op, require_input, uniform_pvs, OpLayoutRule},
        LayoutInferContext,
    },
    layout::{required_data_pv, required_kernel_pv},
    OpId, PermuteVector, Result, TensorId,
};

pub struct ConvRule;

impl OpLayoutRule for ConvRule {
    fn on_inputs(&self, op: OpId, ctx: &mut LayoutInferContext<'_>) -> Result<Vec<TensorId>> {
        let src = ctx.source();
        let operation = src.op(op);
        let (Some(layout), Some(kernel_layout)) =
            (operation.kind.layout(), operation.kind.kernel_layout())
        else {
            bail!("convolution rule dispatched for {}", operation.name())
        };
        let [data, weight, rest @ ..] = &operation.inputs[..] else {
            bail!(
                "{} needs data and weight inputs, got {}",
                operation.name(),
                operation.inputs.len()
            )
        };

        let data_pv = required_data_pv(layout, src.tensor(*data).rank());
        let mut inputs = Vec::with_capacity(operation.inputs.len());
        inputs.push(require_input(ctx, *data, &data_pv)?);
        inputs.push(require_input(ctx, *weight, &required_kernel_pv(kernel_layout))?);
        for &bias in rest {
            let identity = PermuteVector::identity(src.tensor(bias).rank());
            inputs.push(require_input(ctx, bias, &identity)?);
        }

        let pvs = uniform_pvs(ctx, op, &data_pv);
        emit_op(ctx, op, operation.kind.canonicalized(), &inputs, &pvs)
    }
}
