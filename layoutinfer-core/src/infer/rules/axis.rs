use crate::{
    bail,
    infer::{
        rule::{
            carry_input, emit_op, identity_pvs, require_input, reverse_inputs_permute_vector,
            uniform_pvs, OpLayoutRule,
        },
        LayoutInferContext,
    },
    op::{normalize_axes, normalize_axis},
    OpId, OpKind, PermuteVector, Result, TensorId,
};

/// Operators working along one axis without changing rank: Softmax,
/// LogSoftmax, Lrn, L2Normalization, CumSum and Split. The axis is remapped
/// and every output keeps the input layout.
pub struct AxisRule;

impl OpLayoutRule for AxisRule {
    fn on_inputs(&self, op: OpId, ctx: &mut LayoutInferContext<'_>) -> Result<Vec<TensorId>> {
        let src = ctx.source();
        let operation = src.op(op);
        let [input] = operation.inputs[..] else {
            bail!("{} expects one input", operation.name())
        };
        let (rewritten, pv) = carry_input(ctx, input)?;
        let rank = src.tensor(input).rank();
        let remap = |axis: i32| -> Result<i32> {
            let axis = normalize_axis(axis, rank)?;
            Ok(pv.map_axis(axis)? as i32)
        };

        let kind = match &operation.kind {
            OpKind::Softmax { axis, beta } => OpKind::Softmax {
                axis: remap(*axis)?,
                beta: *beta,
            },
            OpKind::LogSoftmax { axis, beta } => OpKind::LogSoftmax {
                axis: remap(*axis)?,
                beta: *beta,
            },
            OpKind::Lrn {
                size,
                bias,
                alpha,
                beta,
                axis,
            } => OpKind::Lrn {
                size: *size,
                bias: *bias,
                alpha: *alpha,
                beta: *beta,
                axis: remap(*axis)?,
            },
            OpKind::L2Normalization { axis } => OpKind::L2Normalization {
                axis: remap(*axis)?,
            },
            OpKind::CumSum {
                axis,
                exclusive,
                reverse,
            } => OpKind::CumSum {
                axis: remap(*axis)?,
                exclusive: *exclusive,
                reverse: *reverse,
            },
            OpKind::Split { axis, slices } => OpKind::Split {
                axis: remap(*axis)?,
                slices: slices.clone(),
            },
            _ => bail!("axis rule dispatched for {}", operation.name()),
        };
        let pvs = uniform_pvs(ctx, op, &pv);
        emit_op(ctx, op, kind, &[rewritten], &pvs)
    }
}

/// Squeeze drops size-1 axes. An empty axis list means every size-1 axis of
/// the source shape.
pub struct SqueezeRule;

impl OpLayoutRule for SqueezeRule {
    fn on_inputs(&self, op: OpId, ctx: &mut LayoutInferContext<'_>) -> Result<Vec<TensorId>> {
        let src = ctx.source();
        let operation = src.op(op);
        let (OpKind::Squeeze { axes }, [input]) = (&operation.kind, &operation.inputs[..]) else {
            bail!("squeeze rule dispatched for {}", operation.name())
        };
        let (rewritten, pv) = carry_input(ctx, *input)?;
        let shape = src.tensor(*input).shape();
        let axes = if axes.is_empty() {
            (0..shape.len()).filter(|&a| shape[a] == 1).collect()
        } else {
            normalize_axes(axes, shape.len())?
        };
        let mapped = pv.map_axes(&axes)?;

        let kind = OpKind::Squeeze {
            axes: mapped.iter().map(|&a| a as i32).collect(),
        };
        let pvs = uniform_pvs(ctx, op, &pv.drop_axes(&axes));
        emit_op(ctx, op, kind, &[rewritten], &pvs)
    }
}

/// Gather along one axis. With rank-1 indices the output has the data
/// rank, so the axis is remapped and the data layout carried. Anything else
/// goes back to the source layout.
pub struct GatherRule;

impl OpLayoutRule for GatherRule {
    fn on_inputs(&self, op: OpId, ctx: &mut LayoutInferContext<'_>) -> Result<Vec<TensorId>> {
        let src = ctx.source();
        let operation = src.op(op);
        let (OpKind::Gather { axis, batch_dims }, [data, indices]) =
            (&operation.kind, &operation.inputs[..])
        else {
            bail!("gather rule dispatched for {}", operation.name())
        };

        if src.tensor(*indices).rank() != 1 || *batch_dims != 0 {
            let inputs = reverse_inputs_permute_vector(ctx, op)?;
            let pvs = identity_pvs(ctx, op);
            return emit_op(ctx, op, operation.kind.clone(), &inputs, &pvs);
        }

        let (data_t, pv) = carry_input(ctx, *data)?;
        let indices_t = require_input(ctx, *indices, &PermuteVector::identity(1))?;
        let axis = normalize_axis(*axis, src.tensor(*data).rank())?;
        let kind = OpKind::Gather {
            axis: pv.map_axis(axis)? as i32,
            batch_dims: 0,
        };
        let pvs = uniform_pvs(ctx, op, &pv);
        emit_op(ctx, op, kind, &[data_t, indices_t], &pvs)
    }
}
