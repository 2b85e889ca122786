use std::fmt::Display;

use crate::{shape, DataType, PermuteVector, Result};

/// Handle of a tensor inside one [`crate::Graph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TensorId(pub(crate) usize);

impl From<TensorId> for usize {
    fn from(value: TensorId) -> Self {
        value.0
    }
}

impl From<&TensorId> for usize {
    fn from(value: &TensorId) -> Self {
        value.0
    }
}

impl Display for TensorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "t{}", self.0)
    }
}

/// What a tensor is to its graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TensorRole {
    Input,
    Output,
    /// Carries its data buffer.
    Constant,
    Transient,
}

#[derive(Clone, Debug, PartialEq, Default)]
pub enum Quantization {
    #[default]
    None,
    Asymmetric {
        scale: f32,
        zero_point: i32,
    },
    SymmetricPerChannel {
        channel_dim: usize,
        scales: Vec<f32>,
        zero_points: Vec<i32>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct TensorSpec {
    pub dtype: DataType,
    pub shape: Vec<usize>,
    pub role: TensorRole,
    pub quantization: Quantization,
}

impl TensorSpec {
    pub fn new(dtype: DataType, shape: impl Into<Vec<usize>>, role: TensorRole) -> Self {
        Self {
            dtype,
            shape: shape.into(),
            role,
            quantization: Quantization::None,
        }
    }

    #[must_use]
    pub fn with_quantization(mut self, quantization: Quantization) -> Self {
        self.quantization = quantization;
        self
    }

    #[must_use]
    pub fn as_transient(&self) -> Self {
        Self {
            role: TensorRole::Transient,
            ..self.clone()
        }
    }

    pub fn rank(&self) -> usize {
        self.shape.len()
    }

    pub fn element_count(&self) -> usize {
        shape::element_count(&self.shape)
    }

    pub fn byte_size(&self) -> usize {
        self.element_count() * self.dtype.size_in_bytes()
    }

    /// The spec of this tensor seen through `pv`: the shape is reordered and
    /// a per-channel quantization axis follows its dimension.
    pub fn permuted(&self, pv: &PermuteVector) -> Result<Self> {
        let mut out = self.clone();
        out.shape = shape::permute_shape(&self.shape, pv)?;
        if let Quantization::SymmetricPerChannel { channel_dim, .. } = &mut out.quantization {
            *channel_dim = pv.map_axis(*channel_dim)?;
        }
        Ok(out)
    }
}

/// A tensor owned by a graph.
#[derive(Clone, Debug, PartialEq)]
pub struct Tensor {
    spec: TensorSpec,
    data: Option<Vec<u8>>,
}

impl Tensor {
    pub(crate) fn new(spec: TensorSpec, data: Option<Vec<u8>>) -> Self {
        Self { spec, data }
    }

    pub fn spec(&self) -> &TensorSpec {
        &self.spec
    }

    pub fn shape(&self) -> &[usize] {
        &self.spec.shape
    }

    pub fn rank(&self) -> usize {
        self.spec.rank()
    }

    pub fn role(&self) -> TensorRole {
        self.spec.role
    }

    pub fn is_constant(&self) -> bool {
        self.spec.role == TensorRole::Constant
    }

    /// Data buffer; present exactly for constants.
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }
}
