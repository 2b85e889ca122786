use crate::{
    bail,
    infer::{
        rule::{carry_input, emit_op, uniform_pvs, OpLayoutRule},
        LayoutInferContext,
    },
    OpId, Result, TensorId,
};

/// Unary operators: the output keeps the input's layout and no transpose is
/// ever inserted.
pub struct ActivationRule;

impl OpLayoutRule for ActivationRule {
    fn on_inputs(&self, op: OpId, ctx: &mut LayoutInferContext<'_>) -> Result<Vec<TensorId>> {
        let operation = ctx.source().op(op);
        let [input] = operation.inputs[..] else {
            bail!(
                "{} expects one input, got {}",
                operation.name(),
                operation.inputs.len()
            )
        };
        let (rewritten, pv) = carry_input(ctx, input)?;
        let pvs = uniform_pvs(ctx, op, &pv);
        emit_op(ctx, op, operation.kind.clone(), &[rewritten], &pvs)
    }
}
