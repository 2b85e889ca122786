//! Operators carrying one parameter per axis. Per-axis arrays are reordered
//! through the input layout and bit-masks are remapped bit by bit.

use crate::{
    bail,
    infer::{
        rule::{carry_input, emit_op, uniform_pvs, OpLayoutRule},
        LayoutInferContext,
    },
    op::normalize_axes,
    OpId, OpKind, PermuteVector, Result, StridedSliceParams, TensorId,
};

/// The strided slice of a tensor laid out through `pv`, and the permute
/// vector of its output.
///
/// Axes whose bit is set in the shrink mask are removed from the output, so
/// the output permute vector is `pv` with those axes compacted out.
pub fn remap_strided_slice(
    params: &StridedSliceParams,
    pv: &PermuteVector,
) -> Result<(StridedSliceParams, PermuteVector)> {
    let remapped = StridedSliceParams {
        begin: pv.apply(&params.begin)?,
        end: pv.apply(&params.end)?,
        strides: pv.apply(&params.strides)?,
        begin_mask: pv.map_mask(params.begin_mask),
        end_mask: pv.map_mask(params.end_mask),
        shrink_axis_mask: pv.map_mask(params.shrink_axis_mask),
    };
    let shrunk: Vec<usize> = (0..pv.rank())
        .filter(|&a| params.shrink_axis_mask & (1 << a) != 0)
        .collect();
    Ok((remapped, pv.drop_axes(&shrunk)))
}

pub struct StridedSliceRule;

impl OpLayoutRule for StridedSliceRule {
    fn on_inputs(&self, op: OpId, ctx: &mut LayoutInferContext<'_>) -> Result<Vec<TensorId>> {
        let operation = ctx.source().op(op);
        let (OpKind::StridedSlice(params), [input]) = (&operation.kind, &operation.inputs[..])
        else {
            bail!("strided slice rule dispatched for {}", operation.name())
        };
        let (rewritten, pv) = carry_input(ctx, *input)?;
        let (params, out_pv) = remap_strided_slice(params, &pv)?;
        let pvs = uniform_pvs(ctx, op, &out_pv);
        emit_op(ctx, op, OpKind::StridedSlice(params), &[rewritten], &pvs)
    }
}

/// Slice, Reverse, Pad and Tile keep rank and layout.
pub struct PerAxisRule;

impl OpLayoutRule for PerAxisRule {
    fn on_inputs(&self, op: OpId, ctx: &mut LayoutInferContext<'_>) -> Result<Vec<TensorId>> {
        let src = ctx.source();
        let operation = src.op(op);
        let [input] = operation.inputs[..] else {
            bail!("{} expects one input", operation.name())
        };
        let (rewritten, pv) = carry_input(ctx, input)?;

        let kind = match &operation.kind {
            OpKind::Slice { start, length } => OpKind::Slice {
                start: pv.apply(start)?,
                length: pv.apply(length)?,
            },
            OpKind::Reverse { axes } => {
                let axes = normalize_axes(axes, src.tensor(input).rank())?;
                OpKind::Reverse {
                    axes: pv.map_axes(&axes)?.iter().map(|&a| a as i32).collect(),
                }
            }
            OpKind::Pad {
                front,
                back,
                mode,
                const_val,
            } => OpKind::Pad {
                front: pv.apply(front)?,
                back: pv.apply(back)?,
                mode: *mode,
                const_val: *const_val,
            },
            OpKind::Tile { multiples } => OpKind::Tile {
                multiples: pv.apply(multiples)?,
            },
            _ => bail!("per-axis rule dispatched for {}", operation.name()),
        };
        let pvs = uniform_pvs(ctx, op, &pv);
        emit_op(ctx, op, kind, &[rewritten], &pvs)
    }
}
