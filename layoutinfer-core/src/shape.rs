//! Shape helpers.
//!
//! Shapes are listed innermost dimension first: `[W, H, C, N]` stores `W`
//! contiguously.

use crate::{Error, PermuteVector, Result};

/// Number of elements of a shape. The empty shape is a scalar.
pub fn element_count(shape: &[usize]) -> usize {
    shape.iter().product()
}

/// Element strides for a dense tensor whose dimension 0 varies fastest.
pub fn dim_strides(shape: &[usize]) -> Vec<usize> {
    let mut strides = Vec::with_capacity(shape.len());
    let mut acc = 1;
    for dim in shape {
        strides.push(acc);
        acc *= *dim;
    }
    strides
}

/// Shape seen after permuting: `out[i] = shape[pv[i]]`.
pub fn permute_shape(shape: &[usize], pv: &PermuteVector) -> Result<Vec<usize>> {
    pv.apply(shape)
}

/// Positional expansion of `origin` against `reference`.
///
/// Walks the reference and keeps the next origin dimension whenever it
/// equals the reference dimension at that slot, padding with 1 otherwise.
/// This is not right-aligned broadcasting: `[3]` against `[8, 8, 3, 1]`
/// expands to `[1, 1, 3, 1]`, but `[3]` against `[3, 8, 8, 1]` expands to
/// `[3, 1, 1, 1]`.
///
/// Returns the expanded shape together with the slot each placed origin
/// dimension landed in. Trailing size-1 origin dimensions that found no slot
/// are absent from the second vector.
pub fn expanded_shape(
    reference: &[usize],
    origin: &[usize],
) -> Result<(Vec<usize>, Vec<usize>)> {
    let mut expanded = Vec::with_capacity(reference.len());
    let mut slots = Vec::with_capacity(origin.len());
    for (slot, dim) in reference.iter().enumerate() {
        if slots.len() < origin.len() && *dim == origin[slots.len()] {
            expanded.push(*dim);
            slots.push(slot);
        } else {
            expanded.push(1);
        }
    }
    if element_count(&expanded) != element_count(origin) {
        return Err(Error::ShapeExpansion {
            reference: reference.to_vec(),
            original: origin.to_vec(),
        }
        .bt());
    }
    Ok((expanded, slots))
}

