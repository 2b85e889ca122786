use crate::{
    bail,
    infer::{
        rule::{emit_op, require_input, uniform_pvs, OpLayoutRule},
        LayoutInferContext,
    },
    layout::required_data_pv,
    OpId, PermuteVector, Result, TensorId,
};

/// Layout-sensitive operators without weights: pooling, resize, the
/// space/depth/batch rearrangements and the normalizations.
///
/// The first input is brought to the canonical activation layout. Auxiliary
/// inputs (norm scales and offsets) stay in their source layout.
pub struct SpatialRule;

impl OpLayoutRule for SpatialRule {
    fn on_inputs(&self, op: OpId, ctx: &mut LayoutInferContext<'_>) -> Result<Vec<TensorId>> {
        let src = ctx.source();
        let operation = src.op(op);
        let Some(layout) = operation.kind.layout() else {
            bail!("spatial rule dispatched for {}", operation.name())
        };
        let [data, rest @ ..] = &operation.inputs[..] else {
            bail!("{} has no inputs", operation.name())
        };

        let required = required_data_pv(layout, src.tensor(*data).rank());
        let mut inputs = Vec::with_capacity(operation.inputs.len());
        inputs.push(require_input(ctx, *data, &required)?);
        for &aux in rest {
            let identity = PermuteVector::identity(src.tensor(aux).rank());
            inputs.push(require_input(ctx, aux, &identity)?);
        }

        let pvs = uniform_pvs(ctx, op, &required);
        emit_op(ctx, op, operation.kind.canonicalized(), &inputs, &pvs)
    }
}
