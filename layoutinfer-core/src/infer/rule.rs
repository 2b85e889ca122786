//! The per-operator rewrite contract and the helpers rules share.

use crate::{bail, shape, OpId, OpKind, PermuteVector, Result, TensorId};

use super::context::{through, LayoutInferContext};

/// Rewrites one operator family into the inferred graph.
pub trait OpLayoutRule: Sync {
    /// Rewrite `op`: re-lay out its inputs as the family requires, emit the
    /// rewritten operator and publish a permute vector for each output.
    ///
    /// Returns the source-graph outputs of `op` that are ready to be
    /// scheduled.
    fn on_inputs(&self, op: OpId, ctx: &mut LayoutInferContext<'_>) -> Result<Vec<TensorId>>;

    /// Bind graph outputs produced by `op` to their boundary counterparts.
    fn on_outputs(
        &self,
        op: OpId,
        ctx: &mut LayoutInferContext<'_>,
        ready: Vec<TensorId>,
    ) -> Result<Vec<TensorId>> {
        reconcile_graph_outputs(op, ctx, ready)
    }
}

/// Default output handling.
///
/// For every output of `op` that is a graph output and is not already bound
/// to its boundary placeholder, a Transpose (or a same-shape Reshape when no
/// reordering is left) writes the boundary layout into the placeholder.
/// Internal consumers keep the rewritten tensor and its permute vector.
/// Graph outputs nothing else reads are dropped from `ready`.
pub fn reconcile_graph_outputs(
    op: OpId,
    ctx: &mut LayoutInferContext<'_>,
    mut ready: Vec<TensorId>,
) -> Result<Vec<TensorId>> {
    let src = ctx.source();
    for &out in &src.op(op).outputs {
        let Some(&placeholder) = ctx.graph_output_map().get(&out) else {
            continue;
        };
        let rewritten = ctx.mapped_tensor(out)?;
        if rewritten != placeholder {
            let residual = ctx.permute_vector(out)?.reverse().add(&ctx.boundary_pv(out))?;
            if residual.is_aligned() {
                let shape = ctx.graph().tensor(placeholder).shape().to_vec();
                ctx.emit(OpKind::Reshape { shape }, &[rewritten], &[placeholder])?;
            } else {
                ctx.emit_transpose(rewritten, &residual, Some(placeholder))?;
            }
        }
        if src.consumers(out).is_empty() {
            ready.retain(|t| *t != out);
        }
    }
    Ok(ready)
}

/// Insert a Transpose by `perm` after the rewritten counterpart of `input`.
pub fn insert_permute(
    ctx: &mut LayoutInferContext<'_>,
    input: TensorId,
    perm: &PermuteVector,
) -> Result<TensorId> {
    let rewritten = ctx.mapped_tensor(input)?;
    ctx.emit_transpose(rewritten, perm, None)
}

/// Rewritten tensor for `input` laid out as `required`.
///
/// Constants are folded. Other tensors get a residual Transpose when their
/// current permute vector differs, and are rebound so later consumers reuse
/// it.
pub fn require_input(
    ctx: &mut LayoutInferContext<'_>,
    input: TensorId,
    required: &PermuteVector,
) -> Result<TensorId> {
    if ctx.source().tensor(input).is_constant() {
        return ctx.fold_constant(input, required);
    }
    let residual = ctx.permute_vector(input)?.reverse().add(required)?;
    if residual.is_aligned() {
        return ctx.mapped_tensor(input);
    }
    let permuted = insert_permute(ctx, input, &residual)?;
    ctx.rebind(input, permuted, required.clone());
    Ok(permuted)
}

/// Rewritten tensor for `input` as it currently is, with its permute vector.
/// Constants are always in their source layout.
pub fn carry_input(
    ctx: &LayoutInferContext<'_>,
    input: TensorId,
) -> Result<(TensorId, PermuteVector)> {
    let tensor = ctx.source().tensor(input);
    if tensor.is_constant() {
        return Ok((ctx.mapped_tensor(input)?, PermuteVector::identity(tensor.rank())));
    }
    Ok((ctx.mapped_tensor(input)?, ctx.permute_vector(input)?))
}

/// Bring every input of `op` back to its source layout.
pub fn reverse_inputs_permute_vector(
    ctx: &mut LayoutInferContext<'_>,
    op: OpId,
) -> Result<Vec<TensorId>> {
    let src = ctx.source();
    src.op(op)
        .inputs
        .iter()
        .map(|&input| {
            let identity = PermuteVector::identity(src.tensor(input).rank());
            require_input(ctx, input, &identity)
        })
        .collect()
}

/// Align every input of `op` to the permute vector of its first
/// non-constant input.
///
/// Without a non-constant input, or when input ranks differ, everything is
/// brought back to its source layout instead.
pub fn align_permute_vector_for_multi_inputs(
    ctx: &mut LayoutInferContext<'_>,
    op: OpId,
) -> Result<(PermuteVector, Vec<TensorId>)> {
    let src = ctx.source();
    let inputs = &src.op(op).inputs;
    let rank = inputs
        .first()
        .map(|&t| src.tensor(t).rank())
        .unwrap_or(1);
    let reference = inputs.iter().find(|&&t| !src.tensor(t).is_constant());
    let same_rank = inputs.iter().all(|&t| src.tensor(t).rank() == rank);

    let required = match reference {
        Some(&t) if same_rank => ctx.permute_vector(t)?,
        _ => return Ok((PermuteVector::identity(rank), reverse_inputs_permute_vector(ctx, op)?)),
    };
    let rewritten = inputs
        .iter()
        .map(|&input| require_input(ctx, input, &required))
        .collect::<Result<Vec<_>>>()?;
    Ok((required, rewritten))
}

/// Align the inputs of a broadcasting elementwise `op`.
///
/// The first non-constant input is the reference. Constants of lower rank
/// are expanded positionally against the reference shape before they are
/// permuted; see [`shape::expanded_shape`]. When the reference is already
/// aligned, constants are used verbatim and lower-rank tensors broadcast as
/// they are.
pub fn align_permute_vector_for_elementwise(
    ctx: &mut LayoutInferContext<'_>,
    op: OpId,
) -> Result<(PermuteVector, Vec<TensorId>)> {
    let src = ctx.source();
    let operation = src.op(op);
    let inputs = &operation.inputs;
    let Some(&reference) = inputs.iter().find(|&&t| !src.tensor(t).is_constant()) else {
        let rank = output_rank(ctx, op);
        return Ok((PermuteVector::identity(rank), reverse_inputs_permute_vector(ctx, op)?));
    };

    let required = ctx.permute_vector(reference)?;
    let ref_shape = src.tensor(reference).shape();
    if !required.is_aligned() {
        let rank = required.rank();
        let expandable = inputs.iter().all(|&t| {
            let tensor = src.tensor(t);
            tensor.rank() == rank || (tensor.is_constant() && tensor.rank() < rank)
        }) && operation
            .outputs
            .iter()
            .all(|&t| src.tensor(t).rank() == rank);
        if !expandable {
            let rank = output_rank(ctx, op);
            return Ok((PermuteVector::identity(rank), reverse_inputs_permute_vector(ctx, op)?));
        }
    }

    let mut rewritten = Vec::with_capacity(inputs.len());
    for &input in inputs {
        let tensor = src.tensor(input);
        let t = if tensor.rank() == required.rank() {
            require_input(ctx, input, &required)?
        } else if required.is_aligned() {
            require_input(ctx, input, &PermuteVector::identity(tensor.rank()))?
        } else {
            // Only lower-rank constants are left here.
            let (expanded, slots) = shape::expanded_shape(ref_shape, tensor.shape())?;
            ctx.constant_as(input, &expanded, &slots, &required)?
        };
        rewritten.push(t);
    }
    let required = if required.is_aligned() {
        PermuteVector::identity(output_rank(ctx, op))
    } else {
        required
    };
    Ok((required, rewritten))
}

/// Rewritten output tensors of `op`, one per permute vector in `pvs`.
///
/// A graph output whose permute vector already matches its boundary layout
/// is written straight into its placeholder.
pub fn create_outputs_tensor(
    ctx: &mut LayoutInferContext<'_>,
    op: OpId,
    pvs: &[PermuteVector],
) -> Result<Vec<TensorId>> {
    let src = ctx.source();
    let outputs = &src.op(op).outputs;
    if outputs.len() != pvs.len() {
        bail!(
            "{} has {} outputs but {} permute vectors were given",
            op,
            outputs.len(),
            pvs.len()
        );
    }
    let mut rewritten = Vec::with_capacity(outputs.len());
    for (&out, pv) in outputs.iter().zip(pvs) {
        let placeholder = ctx.graph_output_map().get(&out).copied();
        let t = match placeholder {
            Some(p) if *pv == ctx.boundary_pv(out) => p,
            _ => {
                let spec = through(src.tensor(out).spec(), pv)?;
                ctx.create_transient(&spec)?
            }
        };
        ctx.update_tensor_map(out, t);
        ctx.set_permute_vector(out, pv.clone());
        rewritten.push(t);
    }
    Ok(rewritten)
}

/// Emit `kind` reading `inputs` and writing one rewritten tensor per output
/// of `op`, each carrying the matching entry of `pvs`. Returns the source
/// outputs, ready for scheduling.
pub fn emit_op(
    ctx: &mut LayoutInferContext<'_>,
    op: OpId,
    kind: OpKind,
    inputs: &[TensorId],
    pvs: &[PermuteVector],
) -> Result<Vec<TensorId>> {
    let outputs = create_outputs_tensor(ctx, op, pvs)?;
    ctx.emit(kind, inputs, &outputs)?;
    Ok(ctx.source().op(op).outputs.clone())
}

/// The same permute vector for every output of `op`.
pub fn uniform_pvs(
    ctx: &LayoutInferContext<'_>,
    op: OpId,
    pv: &PermuteVector,
) -> Vec<PermuteVector> {
    vec![pv.clone(); ctx.source().op(op).outputs.len()]
}

/// Identity permute vectors sized to each output of `op`.
pub fn identity_pvs(ctx: &LayoutInferContext<'_>, op: OpId) -> Vec<PermuteVector> {
    let src = ctx.source();
    src.op(op)
        .outputs
        .iter()
        .map(|&t| PermuteVector::identity(src.tensor(t).rank()))
        .collect()
}

fn output_rank(ctx: &LayoutInferContext<'_>, op: OpId) -> usize {
    let src = ctx.source();
    src.op(op)
        .outputs
        .first()
        .map(|&t| src.tensor(t).rank())
        .unwrap_or(1)
}
