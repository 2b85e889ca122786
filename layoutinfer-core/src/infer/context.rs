use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, warn};

use crate::{
    transpose, Context, Error, Graph, LayoutInferenceOptions, OpId, OpKind, PermuteVector,
    Quantization, Result, TensorId, TensorSpec,
};

use super::InferenceReport;

/// State of one layout inference run.
///
/// Owns the graph under construction and relates every tensor of the
/// source graph to its rewritten counterpart and to the permute vector
/// describing how that counterpart's axes are ordered.
pub struct LayoutInferContext<'a> {
    src: &'a Graph,
    options: &'a LayoutInferenceOptions,
    graph: Graph,
    tensor_pv: HashMap<TensorId, PermuteVector>,
    tensor_map: HashMap<TensorId, TensorId>,
    visited: HashSet<OpId>,
    input_map: BTreeMap<TensorId, TensorId>,
    output_map: BTreeMap<TensorId, TensorId>,
    folded: HashMap<(TensorId, Vec<usize>, PermuteVector), TensorId>,
    report: InferenceReport,
}

impl<'a> LayoutInferContext<'a> {
    pub fn new(src: &'a Graph, options: &'a LayoutInferenceOptions) -> Self {
        Self {
            src,
            options,
            graph: Graph::empty(),
            tensor_pv: HashMap::new(),
            tensor_map: HashMap::new(),
            visited: HashSet::new(),
            input_map: BTreeMap::new(),
            output_map: BTreeMap::new(),
            folded: HashMap::new(),
            report: InferenceReport::default(),
        }
    }

    /// The graph being rewritten. Never mutated.
    pub fn source(&self) -> &'a Graph {
        self.src
    }

    pub fn options(&self) -> &'a LayoutInferenceOptions {
        self.options
    }

    /// The graph under construction.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn report(&self) -> &InferenceReport {
        &self.report
    }

    pub(crate) fn report_mut(&mut self) -> &mut InferenceReport {
        &mut self.report
    }

    /// Record the permute vector of `tensor`.
    ///
    /// A tensor is assigned at most once. A second assignment is logged and
    /// recorded in the report, the first value is kept, and `false` is
    /// returned.
    pub fn set_permute_vector(&mut self, tensor: TensorId, pv: PermuteVector) -> bool {
        if let Some(existing) = self.tensor_pv.get(&tensor) {
            warn!(
                "permute vector of {} already set to {}, ignoring {}",
                tensor, existing, pv
            );
            self.report.double_assignments.push(tensor);
            return false;
        }
        self.tensor_pv.insert(tensor, pv);
        true
    }

    pub fn permute_vector(&self, tensor: TensorId) -> Result<PermuteVector> {
        self.tensor_pv
            .get(&tensor)
            .cloned()
            .ok_or_else(|| Error::MissingPermuteVector(tensor).bt())
    }

    pub fn has_permute_vector(&self, tensor: TensorId) -> bool {
        self.tensor_pv.contains_key(&tensor)
    }

    /// Thread `tensor` through a new rewritten counterpart carrying `pv`.
    ///
    /// Used when a consumer re-lays out one of its inputs; later consumers
    /// see the re-laid-out tensor.
    pub fn rebind(&mut self, tensor: TensorId, rewritten: TensorId, pv: PermuteVector) {
        self.tensor_map.insert(tensor, rewritten);
        self.tensor_pv.insert(tensor, pv);
    }

    pub fn update_tensor_map(&mut self, original: TensorId, rewritten: TensorId) {
        self.tensor_map.insert(original, rewritten);
    }

    pub fn mapped_tensor(&self, original: TensorId) -> Result<TensorId> {
        self.tensor_map
            .get(&original)
            .copied()
            .ok_or_else(|| Error::UnmappedTensor(original).bt())
    }

    /// Every non-constant input of `op` has a permute vector.
    pub fn is_ready_for_infer(&self, op: OpId) -> bool {
        self.src
            .op(op)
            .inputs
            .iter()
            .all(|&t| self.src.tensor(t).is_constant() || self.tensor_pv.contains_key(&t))
    }

    /// Returns `false`, with a warning, if `op` was already visited.
    pub fn mark_visited(&mut self, op: OpId) -> bool {
        if !self.visited.insert(op) {
            warn!("{} has already been visited", op);
            return false;
        }
        self.report.visited_ops += 1;
        true
    }

    pub fn is_visited(&self, op: OpId) -> bool {
        self.visited.contains(&op)
    }

    pub fn update_graph_input_map(&mut self, original: TensorId, rewritten: TensorId) {
        self.input_map.insert(original, rewritten);
    }

    pub fn update_graph_output_map(&mut self, original: TensorId, rewritten: TensorId) {
        self.output_map.insert(original, rewritten);
    }

    pub fn graph_input_map(&self) -> &BTreeMap<TensorId, TensorId> {
        &self.input_map
    }

    pub fn graph_output_map(&self) -> &BTreeMap<TensorId, TensorId> {
        &self.output_map
    }

    /// Layout the outside world expects for boundary tensor `tensor`.
    pub fn boundary_pv(&self, tensor: TensorId) -> PermuteVector {
        self.options
            .boundary_layout(tensor)
            .cloned()
            .unwrap_or_else(|| PermuteVector::identity(self.src.tensor(tensor).rank()))
    }

    /// Allocate a transient tensor in the inferred graph.
    pub fn create_transient(&mut self, spec: &TensorSpec) -> Result<TensorId> {
        self.graph.create_tensor(spec.as_transient())
    }

    pub(crate) fn create_tensor(&mut self, spec: TensorSpec) -> Result<TensorId> {
        self.graph.create_tensor(spec)
    }

    pub(crate) fn create_constant(&mut self, spec: TensorSpec, data: Vec<u8>) -> Result<TensorId> {
        self.graph.create_constant(spec, data)
    }

    /// Append an operation to the inferred graph.
    pub fn emit(
        &mut self,
        kind: OpKind,
        inputs: &[TensorId],
        outputs: &[TensorId],
    ) -> Result<OpId> {
        let name = kind.name();
        let id = self.graph.add_op(kind, inputs, outputs)?;
        debug!("emitted {} as {} ({:?} -> {:?})", name, id, inputs, outputs);
        Ok(id)
    }

    /// Emit a Transpose of rewritten tensor `input` by `perm`, writing into
    /// `output` or into a fresh transient.
    pub fn emit_transpose(
        &mut self,
        input: TensorId,
        perm: &PermuteVector,
        output: Option<TensorId>,
    ) -> Result<TensorId> {
        let out = match output {
            Some(out) => out,
            None => {
                let spec = through(self.graph.tensor(input).spec(), perm)?;
                self.create_transient(&spec)?
            }
        };
        self.graph.add_op(
            OpKind::Transpose {
                perm: perm.as_slice().to_vec(),
            },
            &[input],
            &[out],
        )?;
        self.report.inserted_transposes += 1;
        debug!("inserted transpose {} on {} -> {}", perm, input, out);
        Ok(out)
    }

    /// The rewritten copy of constant `constant` reinterpreted with `shape`
    /// and then permuted by `pv`.
    ///
    /// `slots[d]` is the dimension of `shape` that source dimension `d` lands
    /// in; a per-channel quantization axis is moved there before permuting.
    ///
    /// The data always comes from the source graph, so a constant shared by
    /// several consumers is never permuted twice. Results are cached per
    /// `(constant, shape, pv)`.
    pub fn constant_as(
        &mut self,
        constant: TensorId,
        shape: &[usize],
        slots: &[usize],
        pv: &PermuteVector,
    ) -> Result<TensorId> {
        let source = self.src;
        let src = source.tensor(constant);
        if shape == src.shape() && pv.is_aligned() {
            return self.mapped_tensor(constant);
        }
        let key = (constant, shape.to_vec(), pv.clone());
        if let Some(&cached) = self.folded.get(&key) {
            return Ok(cached);
        }

        let data = src
            .data()
            .with_context(|| format!("{constant} is not a constant tensor"))?;
        let expansion_error = || {
            Error::ShapeExpansion {
                reference: shape.to_vec(),
                original: src.shape().to_vec(),
            }
            .bt()
        };
        let mut reshaped = TensorSpec {
            shape: shape.to_vec(),
            ..src.spec().clone()
        };
        if reshaped.element_count() != src.spec().element_count() {
            return Err(expansion_error());
        }
        if let Quantization::SymmetricPerChannel { channel_dim, .. } = &mut reshaped.quantization {
            *channel_dim = *slots.get(*channel_dim).ok_or_else(expansion_error)?;
        }
        let bytes = transpose::permute_bytes(data, shape, reshaped.dtype.size_in_bytes(), pv)?;
        let folded = self.create_constant(through(&reshaped, pv)?, bytes)?;

        self.folded.insert(key, folded);
        self.report.folded_constants += 1;
        debug!("folded {} into {} through {}", constant, folded, pv);
        Ok(folded)
    }

    /// [`LayoutInferContext::constant_as`] keeping the source shape.
    pub fn fold_constant(&mut self, constant: TensorId, pv: &PermuteVector) -> Result<TensorId> {
        let shape = self.src.tensor(constant).shape().to_vec();
        let slots: Vec<usize> = (0..shape.len()).collect();
        self.constant_as(constant, &shape, &slots, pv)
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        Graph,
        BTreeMap<TensorId, TensorId>,
        BTreeMap<TensorId, TensorId>,
        InferenceReport,
    ) {
        (self.graph, self.input_map, self.output_map, self.report)
    }
}

/// `spec` seen through `pv`. Aligned vectors leave it untouched, which also
/// covers scalars.
pub(crate) fn through(spec: &TensorSpec, pv: &PermuteVector) -> Result<TensorSpec> {
    if pv.is_aligned() {
        Ok(spec.clone())
    } else {
        spec.permuted(pv)
    }
}
