use crate::{
    bail,
    infer::{
        rule::{align_permute_vector_for_multi_inputs, emit_op, uniform_pvs, OpLayoutRule},
        LayoutInferContext,
    },
    op::normalize_axis,
    OpId, OpKind, Result, TensorId,
};

/// Same-rank multi-input operators: AddN, Select, the logical binaries and
/// Concat. Inputs are aligned to the first non-constant one and Concat's
/// axis follows it.
pub struct MultiInputRule;

impl OpLayoutRule for MultiInputRule {
    fn on_inputs(&self, op: OpId, ctx: &mut LayoutInferContext<'_>) -> Result<Vec<TensorId>> {
        let operation = ctx.source().op(op);
        let (pv, inputs) = align_permute_vector_for_multi_inputs(ctx, op)?;
        let kind = match &operation.kind {
            OpKind::Concat { axis } => {
                let axis = normalize_axis(*axis, pv.rank())?;
                OpKind::Concat {
                    axis: pv.map_axis(axis)? as i32,
                }
            }
            other => other.clone(),
        };
        let pvs = uniform_pvs(ctx, op, &pv);
        emit_op(ctx, op, kind, &inputs, &pvs)
    }
}

/// Stack inserts its new axis at the same position of the rewritten layout,
/// so the output carries the input layout lifted around that axis.
pub struct StackRule;

impl OpLayoutRule for StackRule {
    fn on_inputs(&self, op: OpId, ctx: &mut LayoutInferContext<'_>) -> Result<Vec<TensorId>> {
        let operation = ctx.source().op(op);
        let OpKind::Stack { axis } = operation.kind else {
            bail!("stack rule dispatched for {}", operation.name())
        };
        let (pv, inputs) = align_permute_vector_for_multi_inputs(ctx, op)?;
        let axis = normalize_axis(axis, pv.rank() + 1)?;
        let out_pv = pv.insert_axis(axis, axis)?;
        let pvs = uniform_pvs(ctx, op, &out_pv);
        emit_op(
            ctx,
            op,
            OpKind::Stack { axis: axis as i32 },
            &inputs,
            &pvs,
        )
    }
}
