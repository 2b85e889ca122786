//! Rewrite rules, one per operator family.

mod activation;
mod axis;
mod concat;
mod conv;
mod elementwise;
mod passthrough;
mod reduce;
mod slice;
mod spatial;
mod transpose;

pub use activation::ActivationRule;
pub use axis::{AxisRule, GatherRule, SqueezeRule};
pub use concat::{MultiInputRule, StackRule};
pub use conv::ConvRule;
pub use elementwise::ElementwiseRule;
pub use passthrough::{FallbackRule, PassthroughRule};
pub use reduce::{ArgRule, MomentsRule, ReduceRule};
pub use slice::{remap_strided_slice, PerAxisRule, StridedSliceRule};
pub use spatial::SpatialRule;
pub use transpose::TransposeRule;

use crate::OpKind;

use super::rule::OpLayoutRule;

/// The rule responsible for `kind`.
pub fn rule_for(kind: &OpKind) -> &'static dyn OpLayoutRule {
    match kind {
        OpKind::Relu
        | OpKind::Relu1
        | OpKind::Relu6
        | OpKind::Elu { .. }
        | OpKind::Selu { .. }
        | OpKind::Sigmoid
        | OpKind::Mish
        | OpKind::HardSigmoid { .. }
        | OpKind::SoftRelu
        | OpKind::HardSwish
        | OpKind::Swish { .. }
        | OpKind::Tanh
        | OpKind::LeakyRelu { .. }
        | OpKind::Gelu { .. }
        | OpKind::Linear { .. }
        | OpKind::Clip { .. }
        | OpKind::Neg
        | OpKind::Abs
        | OpKind::Sin
        | OpKind::Cos
        | OpKind::Exp
        | OpKind::Log
        | OpKind::Sqrt
        | OpKind::Rsqrt
        | OpKind::Square
        | OpKind::Floor
        | OpKind::Ceil
        | OpKind::Round
        | OpKind::Sign
        | OpKind::Erf
        | OpKind::LogicalNot
        | OpKind::Cast => &ActivationRule,

        OpKind::Add
        | OpKind::Sub
        | OpKind::Multiply { .. }
        | OpKind::Div { .. }
        | OpKind::Pow
        | OpKind::Minimum
        | OpKind::Maximum
        | OpKind::FloorDiv
        | OpKind::Greater
        | OpKind::GreaterOrEqual
        | OpKind::Less
        | OpKind::LessOrEqual
        | OpKind::Equal
        | OpKind::NotEqual
        | OpKind::PRelu { .. } => &ElementwiseRule,

        OpKind::AddN
        | OpKind::Select
        | OpKind::LogicalAnd
        | OpKind::LogicalOr
        | OpKind::Concat { .. } => &MultiInputRule,
        OpKind::Stack { .. } => &StackRule,

        OpKind::Conv1d(_)
        | OpKind::Conv2d(_)
        | OpKind::GroupedConv2d(_)
        | OpKind::DeConv2d(_)
        | OpKind::Conv3d(_) => &ConvRule,
        OpKind::Pool1d(_)
        | OpKind::Pool2d(_)
        | OpKind::Pool3d(_)
        | OpKind::SpaceToDepth { .. }
        | OpKind::DepthToSpace { .. }
        | OpKind::SpaceToBatch { .. }
        | OpKind::BatchToSpace { .. }
        | OpKind::Resize(_)
        | OpKind::InstanceNorm { .. }
        | OpKind::BatchNorm { .. } => &SpatialRule,

        OpKind::Reduce(_) => &ReduceRule,
        OpKind::ArgMax { .. } | OpKind::ArgMin { .. } => &ArgRule,
        OpKind::Moments { .. } => &MomentsRule,
        OpKind::Softmax { .. }
        | OpKind::LogSoftmax { .. }
        | OpKind::Lrn { .. }
        | OpKind::L2Normalization { .. }
        | OpKind::CumSum { .. }
        | OpKind::Split { .. } => &AxisRule,
        OpKind::Squeeze { .. } => &SqueezeRule,
        OpKind::Gather { .. } => &GatherRule,
        OpKind::StridedSlice(_) => &StridedSliceRule,
        OpKind::Slice { .. }
        | OpKind::Reverse { .. }
        | OpKind::Pad { .. }
        | OpKind::Tile { .. } => &PerAxisRule,

        OpKind::Transpose { .. } => &TransposeRule,

        OpKind::Reshape { .. }
        | OpKind::GatherNd
        | OpKind::FullyConnected { .. }
        | OpKind::MatMul { .. }
        | OpKind::RnnCell { .. }
        | OpKind::LstmCell { .. }
        | OpKind::UnidirectionalLstm { .. }
        | OpKind::Nbg { .. }
        | OpKind::Custom { .. } => &PassthroughRule,
        OpKind::Unsupported { .. } => &FallbackRule,
    }
}
