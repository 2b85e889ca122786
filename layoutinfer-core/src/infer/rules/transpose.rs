use tracing::debug;

use crate::{
    bail,
    infer::{
        rule::{carry_input, emit_op, OpLayoutRule},
        LayoutInferContext,
    },
    OpId, OpKind, PermuteVector, Result, TensorId,
};

/// Folds a Transpose into the layout its input already carries.
///
/// The residual is `pv.reverse().add(perm)`. When it is the identity the
/// transpose disappears and its output is rebound to the input's rewritten
/// tensor. Constant inputs are folded into a permuted constant. The output
/// is always in its source layout.
pub struct TransposeRule;

impl OpLayoutRule for TransposeRule {
    fn on_inputs(&self, op: OpId, ctx: &mut LayoutInferContext<'_>) -> Result<Vec<TensorId>> {
        let src = ctx.source();
        let operation = src.op(op);
        let (OpKind::Transpose { perm }, [input], [output]) = (
            &operation.kind,
            &operation.inputs[..],
            &operation.outputs[..],
        ) else {
            bail!("transpose rule dispatched for {}", operation.name())
        };
        let perm = PermuteVector::from_slice(perm)?;
        let identity = PermuteVector::identity(perm.rank());

        if src.tensor(*input).is_constant() {
            let folded = ctx.fold_constant(*input, &perm)?;
            ctx.update_tensor_map(*output, folded);
            ctx.set_permute_vector(*output, identity);
            return Ok(vec![*output]);
        }

        let (rewritten, pv) = carry_input(ctx, *input)?;
        let residual = pv.reverse().add(&perm)?;
        if residual.is_aligned() {
            debug!("{} folded away, {} reuses {}", op, output, rewritten);
            ctx.update_tensor_map(*output, rewritten);
            ctx.set_permute_vector(*output, identity);
            return Ok(vec![*output]);
        }

        let kind = OpKind::Transpose {
            perm: residual.as_slice().to_vec(),
        };
        emit_op(ctx, op, kind, &[rewritten], &[identity])
    }
}
