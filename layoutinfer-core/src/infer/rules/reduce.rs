//! Operators that collapse axes. Inputs are never re-laid out; axis lists
//! are remapped instead, and dropped axes are compacted out of the output
//! permute vector.

use crate::{
    bail,
    infer::{
        rule::{carry_input, emit_op, uniform_pvs, OpLayoutRule},
        LayoutInferContext,
    },
    op::{normalize_axes, normalize_axis},
    OpId, OpKind, ReduceParams, Result, TensorId,
};

pub struct ReduceRule;

impl OpLayoutRule for ReduceRule {
    fn on_inputs(&self, op: OpId, ctx: &mut LayoutInferContext<'_>) -> Result<Vec<TensorId>> {
        let src = ctx.source();
        let operation = src.op(op);
        let (OpKind::Reduce(params), [input]) = (&operation.kind, &operation.inputs[..]) else {
            bail!("reduce rule dispatched for {}", operation.name())
        };
        let (rewritten, pv) = carry_input(ctx, *input)?;
        let axes = normalize_axes(&params.axes, src.tensor(*input).rank())?;
        let mapped = pv.map_axes(&axes)?;
        let out_pv = if params.keep_dims {
            pv.clone()
        } else {
            pv.drop_axes(&axes)
        };

        let kind = OpKind::Reduce(ReduceParams {
            axes: mapped.iter().map(|&a| a as i32).collect(),
            ..params.clone()
        });
        let pvs = uniform_pvs(ctx, op, &out_pv);
        emit_op(ctx, op, kind, &[rewritten], &pvs)
    }
}

/// ArgMax and ArgMin. The reduced axis is dropped unless the output keeps
/// the input rank.
pub struct ArgRule;

impl OpLayoutRule for ArgRule {
    fn on_inputs(&self, op: OpId, ctx: &mut LayoutInferContext<'_>) -> Result<Vec<TensorId>> {
        let src = ctx.source();
        let operation = src.op(op);
        let [input] = operation.inputs[..] else {
            bail!("{} expects one input", operation.name())
        };
        let (rewritten, pv) = carry_input(ctx, input)?;
        let rank = src.tensor(input).rank();
        let remap = |axis: i32| -> Result<(usize, i32)> {
            let axis = normalize_axis(axis, rank)?;
            Ok((axis, pv.map_axis(axis)? as i32))
        };
        let (axis, kind) = match operation.kind {
            OpKind::ArgMax { axis } => {
                let (axis, mapped) = remap(axis)?;
                (axis, OpKind::ArgMax { axis: mapped })
            }
            OpKind::ArgMin { axis } => {
                let (axis, mapped) = remap(axis)?;
                (axis, OpKind::ArgMin { axis: mapped })
            }
            _ => bail!("arg rule dispatched for {}", operation.name()),
        };

        let keeps_rank = operation
            .outputs
            .iter()
            .all(|&out| src.tensor(out).rank() == rank);
        let out_pv = if keeps_rank {
            pv.clone()
        } else {
            pv.drop_axes(&[axis])
        };
        let pvs = uniform_pvs(ctx, op, &out_pv);
        emit_op(ctx, op, kind, &[rewritten], &pvs)
    }
}

/// Moments produces mean and variance over the same axes.
pub struct MomentsRule;

impl OpLayoutRule for MomentsRule {
    fn on_inputs(&self, op: OpId, ctx: &mut LayoutInferContext<'_>) -> Result<Vec<TensorId>> {
        let src = ctx.source();
        let operation = src.op(op);
        let (OpKind::Moments { axes, keep_dims }, [input]) =
            (&operation.kind, &operation.inputs[..])
        else {
            bail!("moments rule dispatched for {}", operation.name())
        };
        let (rewritten, pv) = carry_input(ctx, *input)?;
        let axes = normalize_axes(axes, src.tensor(*input).rank())?;
        let mapped = pv.map_axes(&axes)?;
        let out_pv = if *keep_dims {
            pv.clone()
        } else {
            pv.drop_axes(&axes)
        };

        let kind = OpKind::Moments {
            axes: mapped.iter().map(|&a| a as i32).collect(),
            keep_dims: *keep_dims,
        };
        let pvs = uniform_pvs(ctx, op, &out_pv);
        emit_op(ctx, op, kind, &[rewritten], &pvs)
    }
}
