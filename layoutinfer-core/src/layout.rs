//! Declared data layouts and the canonical layout each operator family runs in.
//!
//! Layout names list axes innermost first. Kernels natively consume `WHCN`
//! activations (`WCN` for 1-D, `WHDCN` for 3-D) and `WHIcOc` weights.

use crate::PermuteVector;

pub const CWHN_TO_WHCN: [usize; 4] = [1, 2, 0, 3];
pub const CWN_TO_WCN: [usize; 3] = [1, 0, 2];
pub const CWHDN_TO_WHDCN: [usize; 5] = [1, 2, 3, 0, 4];

pub const IC_WH_OC_TO_WH_IC_OC: [usize; 4] = [1, 2, 0, 3];
pub const OC_IC_WH_TO_WH_IC_OC: [usize; 4] = [2, 3, 1, 0];
pub const IC_OC_WH_TO_WH_IC_OC: [usize; 4] = [2, 3, 0, 1];
pub const IC_W_OC_TO_W_IC_OC: [usize; 3] = [1, 0, 2];
pub const IC_WHD_OC_TO_WHD_IC_OC: [usize; 5] = [1, 2, 3, 0, 4];
pub const OC_IC_WHD_TO_WHD_IC_OC: [usize; 5] = [2, 3, 4, 1, 0];

/// Activation layout declared by an operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum DataLayout {
    /// No constraint; treated as the canonical layout of the operator.
    #[default]
    Any,
    Whcn,
    Cwhn,
    Wcn,
    Cwn,
    Whdcn,
    Cwhdn,
}

impl DataLayout {
    /// Is this layout the channel-first variant (channel at axis 0)?
    pub fn is_channel_first(&self) -> bool {
        matches!(self, Self::Cwhn | Self::Cwn | Self::Cwhdn)
    }

    /// The weight layout implied when an operator declares none.
    pub fn default_kernel_layout(&self) -> KernelLayout {
        match self {
            Self::Cwhn => KernelLayout::IcWhOc,
            Self::Cwn => KernelLayout::IcWOc,
            Self::Cwhdn => KernelLayout::IcWhdOc,
            Self::Wcn => KernelLayout::WIcOc,
            Self::Whdcn => KernelLayout::WhdIcOc,
            Self::Any | Self::Whcn => KernelLayout::WhIcOc,
        }
    }

    /// Canonical counterpart for the same spatial rank.
    pub fn canonical(&self) -> Self {
        match self {
            Self::Cwhn | Self::Whcn => Self::Whcn,
            Self::Cwn | Self::Wcn => Self::Wcn,
            Self::Cwhdn | Self::Whdcn => Self::Whdcn,
            Self::Any => Self::Any,
        }
    }
}

/// Weight layout declared by a convolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KernelLayout {
    WhIcOc,
    IcWhOc,
    OcIcWh,
    IcOcWh,
    WIcOc,
    IcWOc,
    WhdIcOc,
    IcWhdOc,
    OcIcWhd,
}

impl KernelLayout {
    pub fn canonical(&self) -> Self {
        match self {
            Self::WhIcOc | Self::IcWhOc | Self::OcIcWh | Self::IcOcWh => Self::WhIcOc,
            Self::WIcOc | Self::IcWOc => Self::WIcOc,
            Self::WhdIcOc | Self::IcWhdOc | Self::OcIcWhd => Self::WhdIcOc,
        }
    }
}

fn table(axes: &[usize]) -> PermuteVector {
    let pv = PermuteVector::from_slice(axes);
    debug_assert!(pv.is_ok(), "layout table {axes:?} is not a permutation");
    pv.unwrap_or_else(|_| PermuteVector::identity(axes.len()))
}

/// Permute vector an activation must carry to be consumed by a kernel that
/// declared `layout`, for a tensor of `rank`.
pub fn required_data_pv(layout: DataLayout, rank: usize) -> PermuteVector {
    match (layout, rank) {
        (DataLayout::Cwhn, 4) => table(&CWHN_TO_WHCN),
        (DataLayout::Cwn, 3) => table(&CWN_TO_WCN),
        (DataLayout::Cwhdn, 5) => table(&CWHDN_TO_WHDCN),
        _ => PermuteVector::identity(rank),
    }
}

/// Permute vector that brings a weight declared in `layout` to its
/// canonical layout.
pub fn required_kernel_pv(layout: KernelLayout) -> PermuteVector {
    match layout {
        KernelLayout::WhIcOc => PermuteVector::identity(4),
        KernelLayout::IcWhOc => table(&IC_WH_OC_TO_WH_IC_OC),
        KernelLayout::OcIcWh => table(&OC_IC_WH_TO_WH_IC_OC),
        KernelLayout::IcOcWh => table(&IC_OC_WH_TO_WH_IC_OC),
        KernelLayout::WIcOc => PermuteVector::identity(3),
        KernelLayout::IcWOc => table(&IC_W_OC_TO_W_IC_OC),
        KernelLayout::WhdIcOc => PermuteVector::identity(5),
        KernelLayout::IcWhdOc => table(&IC_WHD_OC_TO_WHD_IC_OC),
        KernelLayout::OcIcWhd => table(&OC_IC_WHD_TO_WHD_IC_OC),
    }
}
