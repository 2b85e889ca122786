//! Layoutinfer rewrites tensor graphs so that every operator runs in its canonical data layout.
//!
//! Front ends describe networks in whatever layout their framework uses: channel-first
//! convolutions, kernels stored output-channel first, and so on. Kernels, on the other hand, are
//! written for one fixed layout per operator family (`WHCN` activations, `WHIcOc` weights, with
//! dimension 0 innermost). [`layout_inference`] bridges the two. It walks the graph, tracks a
//! [`PermuteVector`] for every tensor, and produces a new graph in which:
//!
//! - layout-sensitive operators receive their canonical layout, through an inserted Transpose or,
//!   for constants, by permuting the data itself,
//! - layout-agnostic operators simply carry the layout they were given,
//! - axis parameters (reduce axes, slice bounds, masks) are remapped instead of moving data,
//! - graph inputs and outputs keep the shape the caller declared.
//!
//! ## A quick guide
//! - Build a source [`Graph`] with [`Graph::create_tensor`], [`Graph::create_constant_from`] and
//!   [`Graph::add_op`].
//! - Run [`layout_inference`], or [`layout_inference_with`] to request boundary layouts through
//!   [`LayoutInferenceOptions`].
//! - Use the returned [`LayoutInference::io_map`] to find the boundary tensors of the new graph.
//!
//! ## What can you do with it?
//! ```
//! use layoutinfer_core::{
//!     layout_inference, Conv2dParams, DataLayout, DataType, Graph, OpKind, PadType, TensorRole,
//!     TensorSpec,
//! };
//!
//! let mut graph = Graph::empty();
//! // Channel-first activations, [C, W, H, N].
//! let input = graph.create_tensor(TensorSpec::new(
//!     DataType::Float32,
//!     [3, 8, 8, 1],
//!     TensorRole::Input,
//! ))?;
//! // Weights stored [Ic, W, H, Oc].
//! let weight = graph.create_constant_from([3, 3, 3, 4], &vec![0.5f32; 108])?;
//! let output = graph.create_tensor(TensorSpec::new(
//!     DataType::Float32,
//!     [4, 6, 6, 1],
//!     TensorRole::Output,
//! ))?;
//! let conv = Conv2dParams {
//!     weights: 4,
//!     ksize: [3, 3],
//!     padding: PadType::Valid,
//!     layout: DataLayout::Cwhn,
//!     ..Default::default()
//! };
//! graph.add_op(OpKind::Conv2d(conv), &[input, weight], &[output])?;
//!
//! let inferred = layout_inference(&graph)?;
//!
//! // One transpose into WHCN before the convolution and one back after it.
//! assert_eq!(inferred.report.inserted_transposes, 2);
//! // The weight was permuted offline.
//! assert_eq!(inferred.report.folded_constants, 1);
//! // The boundary keeps its declared shape.
//! let new_input = inferred.io_map[&input];
//! assert_eq!(inferred.graph.tensor(new_input).shape(), &[3, 8, 8, 1]);
//! # Ok::<(), layoutinfer_core::Error>(())
//! ```

mod dtype;
mod error;
mod graph;
pub mod infer;
pub mod layout;
mod op;
mod permute_vector;
pub mod shape;
mod tensor;
pub mod transpose;

pub use dtype::{DataType, Element};
pub use error::{Context, Error, Result};
pub use graph::Graph;
pub use infer::{
    layout_inference, layout_inference_with, InferenceReport, LayoutInferContext,
    LayoutInference, LayoutInferenceOptions, OpLayoutRule,
};
pub use layout::{DataLayout, KernelLayout};
pub use op::{
    normalize_axes, normalize_axis, Conv1dParams, Conv2dParams, Conv3dParams, DeConv2dParams,
    DepthToSpaceMode, OpId, OpKind, Operation, PadMode, PadType, PoolParams, PoolType,
    ReduceOp, ReduceParams, ResizeParams, ResizeType, RnnActivation, RoundType,
    StridedSliceParams,
};
pub use permute_vector::{PermuteVector, MAX_RANK};
pub use tensor::{Quantization, Tensor, TensorId, TensorRole, TensorSpec};
