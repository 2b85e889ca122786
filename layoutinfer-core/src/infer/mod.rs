//! Layout inference: rewrite a graph so every operator runs in its
//! canonical layout.
//!
//! The pass walks tensors breadth first. An operator is rewritten as soon as
//! every non-constant input has a permute vector, whatever order the source
//! graph declared it in.

mod context;
mod options;
pub mod rule;
pub mod rules;

use std::collections::{BTreeMap, VecDeque};

use tracing::{debug, info};

use crate::{Error, Graph, OpId, PermuteVector, Result, TensorId};

pub use context::LayoutInferContext;
pub use options::LayoutInferenceOptions;
pub use rule::OpLayoutRule;

use context::through;

/// What happened during one run, besides the rewritten graph.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InferenceReport {
    /// Tensors whose permute vector was assigned more than once.
    pub double_assignments: Vec<TensorId>,
    /// Operators handled by the generic fallback rule.
    pub fallback_ops: Vec<OpId>,
    pub inserted_transposes: usize,
    pub folded_constants: usize,
    pub visited_ops: usize,
}

/// Result of [`layout_inference`].
#[derive(Clone, Debug)]
pub struct LayoutInference {
    /// The rewritten graph.
    pub graph: Graph,
    /// Source graph input and output tensors to their counterparts in
    /// `graph`.
    pub io_map: BTreeMap<TensorId, TensorId>,
    pub report: InferenceReport,
}

impl LayoutInference {
    pub fn into_parts(self) -> (Graph, BTreeMap<TensorId, TensorId>) {
        (self.graph, self.io_map)
    }
}

/// Run layout inference on `graph` with default options.
pub fn layout_inference(graph: &Graph) -> Result<LayoutInference> {
    layout_inference_with(graph, &LayoutInferenceOptions::default())
}

/// Run layout inference on `graph`.
///
/// The source graph is never modified. Any failure aborts the whole pass.
pub fn layout_inference_with(
    graph: &Graph,
    options: &LayoutInferenceOptions,
) -> Result<LayoutInference> {
    options.validate(graph)?;
    let mut ctx = LayoutInferContext::new(graph, options);
    let mut queue = VecDeque::new();

    seed(&mut ctx, &mut queue)?;

    // Nothing enqueued would ever reach these.
    for (op, operation) in graph.ops() {
        if operation.inputs.is_empty() {
            queue.extend(dispatch(&mut ctx, op)?);
        }
    }

    while let Some(tensor) = queue.pop_front() {
        for &op in graph.consumers(tensor) {
            if !ctx.is_visited(op) && ctx.is_ready_for_infer(op) {
                queue.extend(dispatch(&mut ctx, op)?);
            }
        }
    }

    finalize(ctx)
}

fn seed(ctx: &mut LayoutInferContext<'_>, queue: &mut VecDeque<TensorId>) -> Result<()> {
    let src = ctx.source();

    for &input in src.inputs() {
        let pv = ctx.boundary_pv(input);
        let rewritten = ctx.create_tensor(through(src.tensor(input).spec(), &pv)?)?;
        ctx.update_tensor_map(input, rewritten);
        ctx.update_graph_input_map(input, rewritten);
        ctx.set_permute_vector(input, pv);
        queue.push_back(input);
    }

    for constant in src.constants() {
        let tensor = src.tensor(constant);
        let data = tensor.data().map(<[u8]>::to_vec).unwrap_or_default();
        let rewritten = ctx.create_constant(tensor.spec().clone(), data)?;
        ctx.update_tensor_map(constant, rewritten);
        ctx.set_permute_vector(constant, PermuteVector::identity(tensor.rank()));
        queue.push_back(constant);
    }

    // Producers bind these; they carry no permute vector yet.
    for &output in src.outputs() {
        let pv = ctx.boundary_pv(output);
        let placeholder = ctx.create_tensor(through(src.tensor(output).spec(), &pv)?)?;
        ctx.update_graph_output_map(output, placeholder);
    }

    debug!(
        "seeded {} inputs, {} constants, {} outputs",
        src.inputs().len(),
        queue.len() - src.inputs().len(),
        src.outputs().len()
    );
    Ok(())
}

fn dispatch(ctx: &mut LayoutInferContext<'_>, op: OpId) -> Result<Vec<TensorId>> {
    let kind = &ctx.source().op(op).kind;
    debug!("rewriting {} ({})", kind.name(), op);
    ctx.mark_visited(op);

    let rule = rules::rule_for(kind);
    let wrap = |e: Error| Error::LayoutInference {
        op,
        kind: kind.name(),
        source: Box::new(e),
    };
    let ready = rule.on_inputs(op, ctx).map_err(wrap)?;
    rule.on_outputs(op, ctx, ready).map_err(wrap)
}

fn finalize(ctx: LayoutInferContext<'_>) -> Result<LayoutInference> {
    let src = ctx.source();
    let unvisited: Vec<OpId> = src
        .ops()
        .map(|(op, _)| op)
        .filter(|&op| !ctx.is_visited(op))
        .collect();
    if !unvisited.is_empty() {
        return Err(Error::IncompleteInference { unvisited }.bt());
    }

    let keep_constants = ctx.options().keeps_unused_constants();
    let (mut graph, input_map, output_map, report) = ctx.into_parts();
    let mut io_map: BTreeMap<TensorId, TensorId> =
        input_map.into_iter().chain(output_map).collect();
    if !keep_constants {
        let remap = graph.prune_unused_constants();
        for rewritten in io_map.values_mut() {
            if let Some(new) = remap[usize::from(*rewritten)] {
                *rewritten = new;
            }
        }
    }

    info!(
        "layout inference visited {} ops, inserted {} transposes, folded {} constants",
        report.visited_ops, report.inserted_transposes, report.folded_constants
    );
    Ok(LayoutInference { graph, io_map, report })
}
