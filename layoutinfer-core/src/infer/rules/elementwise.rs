use crate::{
    infer::{
        rule::{align_permute_vector_for_elementwise, emit_op, uniform_pvs, OpLayoutRule},
        LayoutInferContext,
    },
    op::normalize_axis,
    OpId, OpKind, Result, TensorId,
};

/// Broadcasting binary operators.
///
/// Every input follows the first non-constant one. PRelu's channel axis is
/// remapped into the shared layout.
pub struct ElementwiseRule;

impl OpLayoutRule for ElementwiseRule {
    fn on_inputs(&self, op: OpId, ctx: &mut LayoutInferContext<'_>) -> Result<Vec<TensorId>> {
        let operation = ctx.source().op(op);
        let (pv, inputs) = align_permute_vector_for_elementwise(ctx, op)?;
        let kind = match &operation.kind {
            OpKind::PRelu { axis } => {
                let axis = normalize_axis(*axis, pv.rank())?;
                OpKind::PRelu {
                    axis: pv.map_axis(axis)? as i32,
                }
            }
            other => other.clone(),
        };
        let pvs = uniform_pvs(ctx, op, &pv);
        emit_op(ctx, op, kind, &inputs, &pvs)
    }
}
