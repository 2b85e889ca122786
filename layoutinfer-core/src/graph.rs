use std::{env, fs, path::Path, process::Command};

use crate::{
    bail, Context, Element, Error, OpId, OpKind, Operation, Result, Tensor, TensorId, TensorRole,
    TensorSpec,
};

use petgraph::Graph as PetGraph;
use petgraph::{
    dot::{Config, Dot},
    graph::NodeIndex,
};

/// A dataflow graph of tensors and operations.
///
/// Tensors and operations live in two arenas and refer to each other by
/// handle. Handles are only meaningful for the graph that issued them.
#[derive(Clone, Debug, Default)]
pub struct Graph {
    tensors: Vec<Tensor>,
    ops: Vec<Operation>,
    inputs: Vec<TensorId>,
    outputs: Vec<TensorId>,
    producers: Vec<Option<OpId>>,
    consumers: Vec<Vec<OpId>>,
}

impl Graph {
    /// Create an empty Graph
    pub fn empty() -> Self {
        Self::default()
    }

    /// Add a tensor without data. Graph inputs and outputs are registered
    /// in creation order.
    pub fn create_tensor(&mut self, spec: TensorSpec) -> Result<TensorId> {
        if spec.role == TensorRole::Constant {
            return Err(Error::InvalidGraph(format!(
                "constant tensor of shape {:?} created without data",
                spec.shape
            ))
            .bt());
        }
        Ok(self.push_tensor(Tensor::new(spec, None)))
    }

    /// Add a constant tensor owning `data`, which must hold exactly
    /// `spec.byte_size()` bytes.
    pub fn create_constant(&mut self, spec: TensorSpec, data: Vec<u8>) -> Result<TensorId> {
        if spec.role != TensorRole::Constant {
            return Err(Error::InvalidGraph(format!(
                "tensor with role {:?} cannot carry data",
                spec.role
            ))
            .bt());
        }
        if data.len() != spec.byte_size() {
            return Err(Error::InvalidGraph(format!(
                "constant of shape {:?} and type {} needs {} bytes, got {}",
                spec.shape,
                spec.dtype.name(),
                spec.byte_size(),
                data.len()
            ))
            .bt());
        }
        Ok(self.push_tensor(Tensor::new(spec, Some(data))))
    }

    /// Add a constant tensor from typed values.
    pub fn create_constant_from<T: Element>(
        &mut self,
        shape: impl Into<Vec<usize>>,
        values: &[T],
    ) -> Result<TensorId> {
        let spec = TensorSpec::new(T::DATA_TYPE, shape, TensorRole::Constant);
        self.create_constant(spec, T::to_bytes(values))
    }

    /// Append an operation reading `inputs` and producing `outputs`.
    pub fn add_op(
        &mut self,
        kind: OpKind,
        inputs: &[TensorId],
        outputs: &[TensorId],
    ) -> Result<OpId> {
        for id in inputs.iter().chain(outputs) {
            self.check_handle(*id)?;
        }
        for &out in outputs {
            match self.tensors[out.0].role() {
                TensorRole::Input | TensorRole::Constant => {
                    bail!(
                        "{} is a graph input or constant and cannot be produced by {}",
                        out,
                        kind.name()
                    )
                }
                TensorRole::Output | TensorRole::Transient => {}
            }
            if let Some(producer) = self.producers[out.0] {
                bail!("{} is already produced by {}", out, producer)
            }
        }

        let id = OpId(self.ops.len());
        for &input in inputs {
            let consumers = &mut self.consumers[input.0];
            if !consumers.contains(&id) {
                consumers.push(id);
            }
        }
        for &out in outputs {
            self.producers[out.0] = Some(id);
        }
        self.ops.push(Operation {
            kind,
            inputs: inputs.to_vec(),
            outputs: outputs.to_vec(),
        });
        Ok(id)
    }

    /// # Panics
    /// If `id` was not issued by this graph.
    pub fn tensor(&self, id: TensorId) -> &Tensor {
        &self.tensors[id.0]
    }

    /// # Panics
    /// If `id` was not issued by this graph.
    pub fn op(&self, id: OpId) -> &Operation {
        &self.ops[id.0]
    }

    pub fn ops(&self) -> impl Iterator<Item = (OpId, &Operation)> {
        self.ops.iter().enumerate().map(|(i, op)| (OpId(i), op))
    }

    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    pub fn tensor_count(&self) -> usize {
        self.tensors.len()
    }

    /// Number of operations whose kind satisfies `pred`.
    pub fn count_ops(&self, pred: impl Fn(&OpKind) -> bool) -> usize {
        self.ops.iter().filter(|op| pred(&op.kind)).count()
    }

    pub fn inputs(&self) -> &[TensorId] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TensorId] {
        &self.outputs
    }

    pub fn constants(&self) -> Vec<TensorId> {
        self.tensors
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_constant())
            .map(|(i, _)| TensorId(i))
            .collect()
    }

    pub fn is_output(&self, id: TensorId) -> bool {
        self.tensors[id.0].role() == TensorRole::Output
    }

    /// Operations reading `id`, in insertion order.
    pub fn consumers(&self, id: TensorId) -> &[OpId] {
        &self.consumers[id.0]
    }

    pub fn producer(&self, id: TensorId) -> Option<OpId> {
        self.producers[id.0]
    }

    pub fn to_petgraph(&self) -> PetGraph<String, ()> {
        let mut g = PetGraph::<String, ()>::new();
        // Boundary tensors and constants get their own nodes; transients are
        // edges between their producer and consumers.
        let mut tensor_nodes: Vec<Option<NodeIndex>> = vec![None; self.tensors.len()];
        for (i, tensor) in self.tensors.iter().enumerate() {
            let label = match tensor.role() {
                TensorRole::Input => format!("Input t{i} {:?}", tensor.shape()),
                TensorRole::Constant => format!("Const t{i} {:?}", tensor.shape()),
                TensorRole::Output => format!("Output t{i} {:?}", tensor.shape()),
                TensorRole::Transient => continue,
            };
            tensor_nodes[i] = Some(g.add_node(label));
        }

        let op_nodes: Vec<NodeIndex> = self
            .ops()
            .map(|(id, op)| g.add_node(format!("{} ({id})", op.name())))
            .collect();

        for (i, op) in self.ops.iter().enumerate() {
            let dst = op_nodes[i];
            for input in &op.inputs {
                let src = match self.producers[input.0] {
                    Some(producer) => Some(op_nodes[producer.0]),
                    None => tensor_nodes[input.0],
                };
                if let Some(src) = src {
                    g.add_edge(src, dst, ());
                }
            }
            for out in &op.outputs {
                if let Some(node) = tensor_nodes[out.0] {
                    g.add_edge(dst, node, ());
                }
            }
        }

        g
    }

    /// Produce a DOT format string of this graph.
    pub fn to_dot(&self) -> String {
        let g = self.to_petgraph();
        format!("{:?}", Dot::with_config(&g, &[Config::EdgeNoLabel]))
    }

    /// Visualize the graph by saving it to this file.
    ///
    /// Install graphvis:
    /// - brew install graphviz
    /// - apt install graphviz
    pub fn visualize<P: AsRef<Path>>(&self, filename: P) -> Result<()> {
        let path = filename.as_ref();
        let dot_path = env::temp_dir().join("layoutinfer-graph.dot");

        fs::write(&dot_path, self.to_dot())
            .with_context(|| format!("writing {}", dot_path.display()))?;
        let status = Command::new("dot")
            .args([
                "-Tpng",
                &dot_path.display().to_string(),
                "-o",
                &path.display().to_string(),
            ])
            .status()
            .context("running graphviz `dot`")?;
        if !status.success() {
            bail!("graphviz exited with {}", status);
        }

        Ok(())
    }

    /// Drop constants no operation reads.
    ///
    /// Tensor handles are renumbered; the returned table maps each old handle
    /// to its new one, or `None` for removed tensors.
    pub(crate) fn prune_unused_constants(&mut self) -> Vec<Option<TensorId>> {
        let mut remap = Vec::with_capacity(self.tensors.len());
        let mut next = 0;
        for (i, tensor) in self.tensors.iter().enumerate() {
            if tensor.is_constant() && self.consumers[i].is_empty() {
                remap.push(None);
            } else {
                remap.push(Some(TensorId(next)));
                next += 1;
            }
        }
        if next == self.tensors.len() {
            return remap;
        }

        let keep = |i: &usize| remap[*i].is_some();
        let tensors = std::mem::take(&mut self.tensors);
        self.tensors = tensors
            .into_iter()
            .enumerate()
            .filter(|(i, _)| keep(i))
            .map(|(_, t)| t)
            .collect();
        let producers = std::mem::take(&mut self.producers);
        self.producers = producers
            .into_iter()
            .enumerate()
            .filter(|(i, _)| keep(i))
            .map(|(_, p)| p)
            .collect();
        let consumers = std::mem::take(&mut self.consumers);
        self.consumers = consumers
            .into_iter()
            .enumerate()
            .filter(|(i, _)| keep(i))
            .map(|(_, c)| c)
            .collect();

        // Kept tensors always have a new handle.
        let relabel = |id: &mut TensorId| {
            if let Some(new) = remap[id.0] {
                *id = new;
            }
        };
        for op in &mut self.ops {
            op.inputs.iter_mut().for_each(relabel);
            op.outputs.iter_mut().for_each(relabel);
        }
        self.inputs.iter_mut().for_each(relabel);
        self.outputs.iter_mut().for_each(relabel);
        remap
    }

    fn push_tensor(&mut self, tensor: Tensor) -> TensorId {
        let id = TensorId(self.tensors.len());
        match tensor.role() {
            TensorRole::Input => self.inputs.push(id),
            TensorRole::Output => self.outputs.push(id),
            TensorRole::Constant | TensorRole::Transient => {}
        }
        self.tensors.push(tensor);
        self.producers.push(None);
        self.consumers.push(Vec::new());
        id
    }

    fn check_handle(&self, id: TensorId) -> Result<()> {
        if id.0 >= self.tensors.len() {
            return Err(Error::InvalidGraph(format!("unknown tensor handle {id}")).bt());
        }
        Ok(())
    }
}
