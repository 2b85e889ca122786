use std::fmt::Display;

use crate::{DataLayout, Error, KernelLayout, Result, TensorId};

/// Handle of an operation inside one [`crate::Graph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(pub(crate) usize);

impl From<OpId> for usize {
    fn from(value: OpId) -> Self {
        value.0
    }
}

impl Display for OpId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "op{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum PadType {
    #[default]
    Auto,
    Valid,
    Same,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum PoolType {
    #[default]
    Max,
    Avg,
    L2,
    AvgAndroid,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum RoundType {
    #[default]
    Floor,
    Ceiling,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReduceOp {
    Mean,
    Max,
    Min,
    Prod,
    Any,
    All,
    Sum,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ResizeType {
    #[default]
    NearestNeighbor,
    Bilinear,
    Area,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum PadMode {
    #[default]
    Constant,
    Reflect,
    Symmetric,
    Edge,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum DepthToSpaceMode {
    #[default]
    Dcr,
    Crd,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum RnnActivation {
    #[default]
    Tanh,
    Relu,
    Relu6,
    Sigmoid,
}

/// 1-D convolution. Inputs: data, weight, optional bias.
#[derive(Clone, Debug, PartialEq)]
pub struct Conv1dParams {
    pub weights: u32,
    pub padding: PadType,
    pub ksize: u32,
    pub stride: u32,
    pub dilation: u32,
    pub pad: [u32; 2],
    pub multiplier: i32,
    pub layout: DataLayout,
    pub kernel_layout: Option<KernelLayout>,
}

/// 2-D convolution, also used for grouped convolution.
/// Inputs: data, weight, optional bias.
#[derive(Clone, Debug, PartialEq)]
pub struct Conv2dParams {
    pub weights: u32,
    pub padding: PadType,
    pub ksize: [u32; 2],
    pub stride: [u32; 2],
    pub dilation: [u32; 2],
    pub pad: [u32; 4],
    pub multiplier: i32,
    pub groups: u32,
    pub layout: DataLayout,
    pub kernel_layout: Option<KernelLayout>,
}

impl Default for Conv2dParams {
    fn default() -> Self {
        Self {
            weights: 0,
            padding: PadType::Auto,
            ksize: [0, 0],
            stride: [1, 1],
            dilation: [1, 1],
            pad: [0; 4],
            multiplier: 0,
            groups: 1,
            layout: DataLayout::Whcn,
            kernel_layout: None,
        }
    }
}

/// 3-D convolution. Inputs: data, weight, optional bias.
#[derive(Clone, Debug, PartialEq)]
pub struct Conv3dParams {
    pub weights: u32,
    pub padding: PadType,
    pub ksize: [u32; 3],
    pub stride: [u32; 3],
    pub dilation: [u32; 3],
    pub pad: [u32; 6],
    pub multiplier: i32,
    pub layout: DataLayout,
    pub kernel_layout: Option<KernelLayout>,
}

/// Transposed 2-D convolution. Inputs: data, weight, optional bias.
#[derive(Clone, Debug, PartialEq)]
pub struct DeConv2dParams {
    pub oc_count: u32,
    pub padding: PadType,
    pub ksize: [u32; 2],
    pub stride: [u32; 2],
    pub output_padding: [u32; 2],
    pub pad: [u32; 4],
    pub group: u32,
    pub layout: DataLayout,
    pub kernel_layout: Option<KernelLayout>,
}

/// Pooling over the spatial axes; `ksize`, `stride` and `pad` carry one
/// entry (two for `pad`) per spatial axis.
#[derive(Clone, Debug, PartialEq)]
pub struct PoolParams {
    pub pool_type: PoolType,
    pub padding: PadType,
    pub ksize: Vec<u32>,
    pub stride: Vec<u32>,
    pub pad: Vec<u32>,
    pub round_type: RoundType,
    pub layout: DataLayout,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResizeParams {
    pub resize_type: ResizeType,
    pub factor: f32,
    pub align_corners: bool,
    pub half_pixel_centers: bool,
    pub target_size: [u32; 2],
    pub layout: DataLayout,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ReduceParams {
    pub op: ReduceOp,
    pub axes: Vec<i32>,
    pub keep_dims: bool,
}

/// Strided slice. `begin`, `end` and `strides` carry one entry per axis;
/// bit `i` of each mask refers to axis `i`.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct StridedSliceParams {
    pub begin: Vec<i32>,
    pub end: Vec<i32>,
    pub strides: Vec<i32>,
    pub begin_mask: i32,
    pub end_mask: i32,
    pub shrink_axis_mask: i32,
}

/// Operator kind and its parameters.
///
/// Axis-valued parameters index the operator's input shape and may be
/// negative (counted from the last axis).
#[derive(Clone, Debug, PartialEq)]
pub enum OpKind {
    Relu,
    Relu1,
    Relu6,
    Elu { alpha: f32 },
    Selu { alpha: f32, gamma: f32 },
    Sigmoid,
    Mish,
    HardSigmoid { alpha: f32, beta: f32 },
    SoftRelu,
    HardSwish,
    Swish { beta: f32 },
    Tanh,
    LeakyRelu { alpha: f32 },
    Gelu { approximate: bool },
    Linear { a: f32, b: f32 },
    Clip { min: f32, max: f32 },
    Neg,
    Abs,
    Sin,
    Cos,
    Exp,
    Log,
    Sqrt,
    Rsqrt,
    Square,
    Floor,
    Ceil,
    Round,
    Sign,
    Erf,
    LogicalNot,
    Cast,

    Add,
    Sub,
    Multiply { scale: f32 },
    Div { scale: f32 },
    Pow,
    Minimum,
    Maximum,
    FloorDiv,
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    Equal,
    NotEqual,
    PRelu { axis: i32 },

    AddN,
    Select,
    LogicalAnd,
    LogicalOr,
    Concat { axis: i32 },
    Stack { axis: i32 },

    Conv1d(Conv1dParams),
    Conv2d(Conv2dParams),
    GroupedConv2d(Conv2dParams),
    DeConv2d(DeConv2dParams),
    Conv3d(Conv3dParams),
    Pool1d(PoolParams),
    Pool2d(PoolParams),
    Pool3d(PoolParams),
    SpaceToDepth { block_size: [u32; 2], layout: DataLayout },
    DepthToSpace { block_size: u32, mode: DepthToSpaceMode, layout: DataLayout },
    SpaceToBatch { block_size: [u32; 2], pad: [u32; 4], layout: DataLayout },
    BatchToSpace { block_size: [u32; 2], crop: [u32; 4], layout: DataLayout },
    Resize(ResizeParams),
    InstanceNorm { eps: f32, layout: DataLayout },
    BatchNorm { eps: f32, layout: DataLayout },

    Reduce(ReduceParams),
    ArgMax { axis: i32 },
    ArgMin { axis: i32 },
    Softmax { axis: i32, beta: f32 },
    LogSoftmax { axis: i32, beta: f32 },
    Lrn { size: i32, bias: f32, alpha: f32, beta: f32, axis: i32 },
    L2Normalization { axis: i32 },
    Split { axis: i32, slices: Vec<u32> },
    /// Removes the listed size-1 axes, or every size-1 axis when empty.
    Squeeze { axes: Vec<i32> },
    StridedSlice(StridedSliceParams),
    Slice { start: Vec<i32>, length: Vec<i32> },
    Reverse { axes: Vec<i32> },
    Pad { front: Vec<u32>, back: Vec<u32>, mode: PadMode, const_val: f32 },
    Tile { multiples: Vec<i32> },
    /// Inputs: data, indices.
    Gather { axis: i32, batch_dims: i32 },
    CumSum { axis: i32, exclusive: bool, reverse: bool },
    /// Outputs: mean, variance.
    Moments { axes: Vec<i32>, keep_dims: bool },

    Transpose { perm: Vec<usize> },

    Reshape { shape: Vec<usize> },
    GatherNd,
    FullyConnected { axis: u32, weights: u32 },
    MatMul { transpose_a: bool, transpose_b: bool },
    RnnCell { activation: RnnActivation },
    LstmCell { cell_clip: f32, activation: RnnActivation },
    UnidirectionalLstm { cell_clip: f32, time_major: bool },
    /// Precompiled network binary, opaque to the pass.
    Nbg { binary: Vec<u8>, inputs: usize, outputs: usize },
    Custom { name: String },
    /// A kind this crate has no rule for; handled by the generic fallback.
    Unsupported { name: String },
}

impl OpKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Relu => "Relu",
            Self::Relu1 => "Relu1",
            Self::Relu6 => "Relu6",
            Self::Elu { .. } => "Elu",
            Self::Selu { .. } => "Selu",
            Self::Sigmoid => "Sigmoid",
            Self::Mish => "Mish",
            Self::HardSigmoid { .. } => "HardSigmoid",
            Self::SoftRelu => "SoftRelu",
            Self::HardSwish => "HardSwish",
            Self::Swish { .. } => "Swish",
            Self::Tanh => "Tanh",
            Self::LeakyRelu { .. } => "LeakyRelu",
            Self::Gelu { .. } => "Gelu",
            Self::Linear { .. } => "Linear",
            Self::Clip { .. } => "Clip",
            Self::Neg => "Neg",
            Self::Abs => "Abs",
            Self::Sin => "Sin",
            Self::Cos => "Cos",
            Self::Exp => "Exp",
            Self::Log => "Log",
            Self::Sqrt => "Sqrt",
            Self::Rsqrt => "Rsqrt",
            Self::Square => "Square",
            Self::Floor => "Floor",
            Self::Ceil => "Ceil",
            Self::Round => "Round",
            Self::Sign => "Sign",
            Self::Erf => "Erf",
            Self::LogicalNot => "LogicalNot",
            Self::Cast => "Cast",
            Self::Add => "Add",
            Self::Sub => "Sub",
            Self::Multiply { .. } => "Multiply",
            Self::Div { .. } => "Div",
            Self::Pow => "Pow",
            Self::Minimum => "Minimum",
            Self::Maximum => "Maximum",
            Self::FloorDiv => "FloorDiv",
            Self::Greater => "Greater",
            Self::GreaterOrEqual => "GreaterOrEqual",
            Self::Less => "Less",
            Self::LessOrEqual => "LessOrEqual",
            Self::Equal => "Equal",
            Self::NotEqual => "NotEqual",
            Self::PRelu { .. } => "PRelu",
            Self::AddN => "AddN",
            Self::Select => "Select",
            Self::LogicalAnd => "LogicalAnd",
            Self::LogicalOr => "LogicalOr",
            Self::Concat { .. } => "Concat",
            Self::Stack { .. } => "Stack",
            Self::Conv1d(_) => "Conv1d",
            Self::Conv2d(_) => "Conv2d",
            Self::GroupedConv2d(_) => "GroupedConv2d",
            Self::DeConv2d(_) => "DeConv2d",
            Self::Conv3d(_) => "Conv3d",
            Self::Pool1d(_) => "Pool1d",
            Self::Pool2d(_) => "Pool2d",
            Self::Pool3d(_) => "Pool3d",
            Self::SpaceToDepth { .. } => "SpaceToDepth",
            Self::DepthToSpace { .. } => "DepthToSpace",
            Self::SpaceToBatch { .. } => "SpaceToBatch",
            Self::BatchToSpace { .. } => "BatchToSpace",
            Self::Resize(_) => "Resize",
            Self::InstanceNorm { .. } => "InstanceNorm",
            Self::BatchNorm { .. } => "BatchNorm",
            Self::Reduce(_) => "Reduce",
            Self::ArgMax { .. } => "ArgMax",
            Self::ArgMin { .. } => "ArgMin",
            Self::Softmax { .. } => "Softmax",
            Self::LogSoftmax { .. } => "LogSoftmax",
            Self::Lrn { .. } => "Lrn",
            Self::L2Normalization { .. } => "L2Normalization",
            Self::Split { .. } => "Split",
            Self::Squeeze { .. } => "Squeeze",
            Self::StridedSlice(_) => "StridedSlice",
            Self::Slice { .. } => "Slice",
            Self::Reverse { .. } => "Reverse",
            Self::Pad { .. } => "Pad",
            Self::Tile { .. } => "Tile",
            Self::Gather { .. } => "Gather",
            Self::CumSum { .. } => "CumSum",
            Self::Moments { .. } => "Moments",
            Self::Transpose { .. } => "Transpose",
            Self::Reshape { .. } => "Reshape",
            Self::GatherNd => "GatherNd",
            Self::FullyConnected { .. } => "FullyConnected",
            Self::MatMul { .. } => "MatMul",
            Self::RnnCell { .. } => "RnnCell",
            Self::LstmCell { .. } => "LstmCell",
            Self::UnidirectionalLstm { .. } => "UnidirectionalLstm",
            Self::Nbg { .. } => "Nbg",
            Self::Custom { .. } => "Custom",
            Self::Unsupported { .. } => "Unsupported",
        }
    }

    /// Declared activation layout, for the kinds that carry one.
    pub fn layout(&self) -> Option<DataLayout> {
        match self {
            Self::Conv1d(p) => Some(p.layout),
            Self::Conv2d(p) | Self::GroupedConv2d(p) => Some(p.layout),
            Self::DeConv2d(p) => Some(p.layout),
            Self::Conv3d(p) => Some(p.layout),
            Self::Pool1d(p) | Self::Pool2d(p) | Self::Pool3d(p) => Some(p.layout),
            Self::Resize(p) => Some(p.layout),
            Self::SpaceToDepth { layout, .. }
            | Self::DepthToSpace { layout, .. }
            | Self::SpaceToBatch { layout, .. }
            | Self::BatchToSpace { layout, .. }
            | Self::InstanceNorm { layout, .. }
            | Self::BatchNorm { layout, .. } => Some(*layout),
            _ => None,
        }
    }
}

impl OpKind {
    /// Weight layout in effect for convolutions: the declared one, or the
    /// one implied by the data layout.
    pub fn kernel_layout(&self) -> Option<KernelLayout> {
        let resolve = |declared: Option<KernelLayout>, layout: DataLayout, any: KernelLayout| {
            declared.unwrap_or(match layout {
                DataLayout::Any => any,
                other => other.default_kernel_layout(),
            })
        };
        match self {
            Self::Conv1d(p) => Some(resolve(p.kernel_layout, p.layout, KernelLayout::WIcOc)),
            Self::Conv2d(p) | Self::GroupedConv2d(p) => {
                Some(resolve(p.kernel_layout, p.layout, KernelLayout::WhIcOc))
            }
            Self::DeConv2d(p) => Some(resolve(p.kernel_layout, p.layout, KernelLayout::WhIcOc)),
            Self::Conv3d(p) => Some(resolve(p.kernel_layout, p.layout, KernelLayout::WhdIcOc)),
            _ => None,
        }
    }

    /// The same operator declared in its canonical data and kernel layouts.
    pub fn canonicalized(&self) -> Self {
        let kernel_layout = self.kernel_layout().map(|k| k.canonical());
        let mut kind = self.clone();
        match &mut kind {
            Self::Conv1d(p) => {
                p.layout = p.layout.canonical();
                p.kernel_layout = kernel_layout;
            }
            Self::Conv2d(p) | Self::GroupedConv2d(p) => {
                p.layout = p.layout.canonical();
                p.kernel_layout = kernel_layout;
            }
            Self::DeConv2d(p) => {
                p.layout = p.layout.canonical();
                p.kernel_layout = kernel_layout;
            }
            Self::Conv3d(p) => {
                p.layout = p.layout.canonical();
                p.kernel_layout = kernel_layout;
            }
            Self::Pool1d(p) | Self::Pool2d(p) | Self::Pool3d(p) => p.layout = p.layout.canonical(),
            Self::Resize(p) => p.layout = p.layout.canonical(),
            Self::SpaceToDepth { layout, .. }
            | Self::DepthToSpace { layout, .. }
            | Self::SpaceToBatch { layout, .. }
            | Self::BatchToSpace { layout, .. }
            | Self::InstanceNorm { layout, .. }
            | Self::BatchNorm { layout, .. } => *layout = layout.canonical(),
            _ => {}
        }
        kind
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Operation {
    pub kind: OpKind,
    pub inputs: Vec<TensorId>,
    pub outputs: Vec<TensorId>,
}

impl Operation {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

/// Resolve a possibly negative axis against `rank`.
pub fn normalize_axis(axis: i32, rank: usize) -> Result<usize> {
    let resolved = if axis < 0 { axis + rank as i32 } else { axis };
    if resolved < 0 || resolved as usize >= rank {
        return Err(Error::AxisNotFound {
            axis: axis.unsigned_abs() as usize,
            permutation: (0..rank).collect(),
        }
        .bt());
    }
    Ok(resolved as usize)
}

/// [`normalize_axis`] over a list, dropping duplicates while keeping order.
pub fn normalize_axes(axes: &[i32], rank: usize) -> Result<Vec<usize>> {
    let mut out: Vec<usize> = Vec::with_capacity(axes.len());
    for &axis in axes {
        let a = normalize_axis(axis, rank)?;
        if !out.contains(&a) {
            out.push(a);
        }
    }
    Ok(out)
}
