use tracing::warn;

use crate::{
    infer::{
        rule::{emit_op, identity_pvs, reverse_inputs_permute_vector, OpLayoutRule},
        LayoutInferContext,
    },
    OpId, OpKind, Result, TensorId,
};

/// Operators whose semantics are tied to the source axis order (reshapes,
/// matrix products, recurrent cells, precompiled and custom kernels). Every
/// input is brought back to its source layout and outputs start aligned.
pub struct PassthroughRule;

impl OpLayoutRule for PassthroughRule {
    fn on_inputs(&self, op: OpId, ctx: &mut LayoutInferContext<'_>) -> Result<Vec<TensorId>> {
        let kind = ctx.source().op(op).kind.clone();
        let inputs = reverse_inputs_permute_vector(ctx, op)?;
        let pvs = identity_pvs(ctx, op);
        emit_op(ctx, op, kind, &inputs, &pvs)
    }
}

/// Operators with no dedicated rule. Handled like [`PassthroughRule`] and
/// recorded in the report.
pub struct FallbackRule;

impl OpLayoutRule for FallbackRule {
    fn on_inputs(&self, op: OpId, ctx: &mut LayoutInferContext<'_>) -> Result<Vec<TensorId>> {
        let name = match &ctx.source().op(op).kind {
            OpKind::Unsupported { name } | OpKind::Custom { name } => name.as_str(),
            other => other.name(),
        };
        warn!("no layout rule for {} ({}), reverting its inputs", name, op);
        ctx.report_mut().fallback_ops.push(op);
        PassthroughRule.on_inputs(op, ctx)
    }
}
