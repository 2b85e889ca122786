use std::collections::BTreeMap;

use crate::{Error, Graph, PermuteVector, Result, TensorId, TensorRole};

/// Configuration of one layout inference run.
///
/// ```
/// use layoutinfer_core::{LayoutInferenceOptions, PermuteVector};
/// # use layoutinfer_core::{DataType, Graph, TensorRole, TensorSpec};
/// # let mut graph = Graph::empty();
/// # let input = graph
/// #     .create_tensor(TensorSpec::new(DataType::Float32, [3, 8, 8, 1], TensorRole::Input))
/// #     .unwrap();
/// let options = LayoutInferenceOptions::new()
///     .with_boundary_layout(input, PermuteVector::from_slice(&[1, 2, 0, 3]).unwrap())
///     .keep_unused_constants(true);
/// assert!(options.boundary_layout(input).is_some());
/// ```
#[derive(Clone, Debug, Default)]
pub struct LayoutInferenceOptions {
    boundary_layouts: BTreeMap<TensorId, PermuteVector>,
    keep_unused_constants: bool,
}

impl LayoutInferenceOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request that graph input or output `tensor` be exposed through `pv`.
    ///
    /// The inferred graph's counterpart of `tensor` has shape
    /// `shape[pv[i]]`. An input starts the pass carrying `pv`; an output is
    /// reconciled to `pv` instead of the identity.
    #[must_use]
    pub fn with_boundary_layout(mut self, tensor: TensorId, pv: PermuteVector) -> Self {
        self.boundary_layouts.insert(tensor, pv);
        self
    }

    /// Keep seeded constants that no operation of the inferred graph reads.
    #[must_use]
    pub fn keep_unused_constants(mut self, keep: bool) -> Self {
        self.keep_unused_constants = keep;
        self
    }

    pub fn boundary_layout(&self, tensor: TensorId) -> Option<&PermuteVector> {
        self.boundary_layouts.get(&tensor)
    }

    pub fn keeps_unused_constants(&self) -> bool {
        self.keep_unused_constants
    }

    pub(crate) fn validate(&self, graph: &Graph) -> Result<()> {
        for (&tensor, pv) in &self.boundary_layouts {
            let invalid = |reason: String| Error::InvalidBoundaryLayout { tensor, reason }.bt();
            if usize::from(tensor) >= graph.tensor_count() {
                return Err(invalid("tensor does not belong to the graph".to_string()));
            }
            let t = graph.tensor(tensor);
            if !matches!(t.role(), TensorRole::Input | TensorRole::Output) {
                return Err(invalid(format!("role {:?} is not a graph boundary", t.role())));
            }
            if pv.rank() != t.rank().max(1) {
                return Err(invalid(format!(
                    "permute vector {pv} does not match rank {}",
                    t.rank()
                )));
            }
        }
        Ok(())
    }
}
