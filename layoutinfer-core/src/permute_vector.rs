use std::fmt::Display;

use crate::{Error, Result};

/// Largest rank a permute vector may carry.
pub const MAX_RANK: usize = 10;

/// An axis permutation of fixed rank.
///
/// `p[i]` is the original axis that currently occupies position `i` of the
/// rewritten tensor. The identity permutation means the tensor is already
/// laid out in its original axis order.
///
/// ```
/// use layoutinfer_core::PermuteVector;
///
/// let cwhn_to_whcn = PermuteVector::from_slice(&[1, 2, 0, 3]).unwrap();
/// let back = cwhn_to_whcn.reverse();
/// assert!(cwhn_to_whcn.add(&back).unwrap().is_aligned());
/// assert_eq!(cwhn_to_whcn.map_axis(0).unwrap(), 2);
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct PermuteVector(Vec<usize>);

impl PermuteVector {
    /// Identity permutation. Rank 0 is treated as a rank-1 scalar.
    pub fn identity(rank: usize) -> Self {
        Self((0..rank.max(1)).collect())
    }

    /// Build from an explicit axis list, checking it is a bijection on `[0, len)`.
    pub fn from_slice(axes: &[usize]) -> Result<Self> {
        if axes.is_empty() || axes.len() > MAX_RANK {
            return Err(Error::InvalidPermutation(axes.to_vec()).bt());
        }
        let mut seen = [false; MAX_RANK];
        for &a in axes {
            if a >= axes.len() || seen[a] {
                return Err(Error::InvalidPermutation(axes.to_vec()).bt());
            }
            seen[a] = true;
        }
        Ok(Self(axes.to_vec()))
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn at(&self, i: usize) -> usize {
        self.0[i]
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// True when this is the identity.
    pub fn is_aligned(&self) -> bool {
        self.0.iter().enumerate().all(|(i, &a)| i == a)
    }

    /// The inverse `q` with `q[p[i]] = i`.
    pub fn reverse(&self) -> Self {
        let mut out = vec![0; self.rank()];
        for (i, &a) in self.0.iter().enumerate() {
            out[a] = i;
        }
        Self(out)
    }

    /// Composition `result[i] = self[other[i]]`: `other` is applied first,
    /// then `self`.
    ///
    /// The residual transpose that takes a tensor from `current` to
    /// `required` is `current.reverse().add(&required)`.
    pub fn add(&self, other: &Self) -> Result<Self> {
        self.check_rank(other.rank())?;
        Ok(Self(other.0.iter().map(|&i| self.0[i]).collect()))
    }

    /// Position currently holding original axis `axis`.
    pub fn map_axis(&self, axis: usize) -> Result<usize> {
        self.0
            .iter()
            .position(|&a| a == axis)
            .ok_or_else(|| {
                Error::AxisNotFound {
                    axis,
                    permutation: self.0.clone(),
                }
                .bt()
            })
    }

    /// [`PermuteVector::map_axis`] over a list of axes.
    pub fn map_axes(&self, axes: &[usize]) -> Result<Vec<usize>> {
        axes.iter().map(|&a| self.map_axis(a)).collect()
    }

    /// Reorder a per-axis array: `out[i] = values[p[i]]`.
    ///
    /// Shapes, slice bounds, paddings and tile multiples are all indexed by
    /// original axis and move this way.
    pub fn apply<T: Clone>(&self, values: &[T]) -> Result<Vec<T>> {
        self.check_rank(values.len())?;
        Ok(self.0.iter().map(|&a| values[a].clone()).collect())
    }

    /// Reorder a bit-mask over axes: bit `i` of the result is bit `p[i]`.
    pub fn map_mask(&self, mask: i32) -> i32 {
        self.0
            .iter()
            .enumerate()
            .filter(|&(_, &a)| mask & (1 << a) != 0)
            .fold(0, |m, (i, _)| m | (1 << i))
    }

    /// Permute vector of a tensor after the original axes in `removed` have
    /// been dropped.
    ///
    /// The slots holding removed axes disappear, and each remaining value is
    /// decremented by the number of removed axes smaller than it. Dropping
    /// every axis leaves a rank-1 identity.
    pub fn drop_axes(&self, removed: &[usize]) -> Self {
        let kept: Vec<usize> = self
            .0
            .iter()
            .filter(|a| !removed.contains(*a))
            .map(|&a| a - removed.iter().filter(|&&r| r < a).count())
            .collect();
        if kept.is_empty() {
            Self::identity(1)
        } else {
            Self(kept)
        }
    }

    /// Permute vector of a tensor that gains a new original axis `axis`,
    /// placed at rewritten position `position`.
    pub fn insert_axis(&self, position: usize, axis: usize) -> Result<Self> {
        if position > self.rank() || axis > self.rank() || self.rank() == MAX_RANK {
            return Err(Error::RankMismatch {
                expected: self.rank() + 1,
                actual: position.max(axis),
            }
            .bt());
        }
        let lift = |a: usize| if a < axis { a } else { a + 1 };
        let mut out: Vec<usize> = self.0.iter().map(|&a| lift(a)).collect();
        out.insert(position, axis);
        Ok(Self(out))
    }

    fn check_rank(&self, rank: usize) -> Result<()> {
        if rank != self.rank() {
            return Err(Error::RankMismatch {
                expected: self.rank(),
                actual: rank,
            }
            .bt());
        }
        Ok(())
    }
}

impl Display for PermuteVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.0)
    }
}
