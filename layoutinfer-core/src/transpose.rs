//! Physical permutation of dense constant buffers.

use rayon::prelude::*;

use crate::{shape, Error, PermuteVector, Result};

/// Reorder the bytes of a dense tensor so that it has shape
/// `out[i] = shape[pv[i]]`.
///
/// `data` is laid out with dimension 0 varying fastest and holds
/// `elem_size` bytes per element. Rows of the output are filled in parallel.
pub fn permute_bytes(
    data: &[u8],
    shape: &[usize],
    elem_size: usize,
    pv: &PermuteVector,
) -> Result<Vec<u8>> {
    let count = shape::element_count(shape);
    if data.len() != count * elem_size {
        return Err(Error::InvalidGraph(format!(
            "buffer of {} bytes does not match shape {:?} with {} byte elements",
            data.len(),
            shape,
            elem_size
        ))
        .bt());
    }
    if shape.is_empty() || count == 0 || pv.is_aligned() {
        return Ok(data.to_vec());
    }

    let out_shape = shape::permute_shape(shape, pv)?;
    // Stride in the source buffer of each output dimension.
    let src_strides = pv.apply(&shape::dim_strides(shape))?;
    let row_len = out_shape[0];
    let row_bytes = row_len * elem_size;

    let mut out = vec![0u8; data.len()];
    out.par_chunks_mut(row_bytes)
        .enumerate()
        .for_each(|(row, dst)| {
            let mut rest = row;
            let mut base = 0;
            for (dim, stride) in out_shape.iter().zip(&src_strides).skip(1) {
                base += (rest % dim) * stride;
                rest /= dim;
            }
            for j in 0..row_len {
                let src = (base + j * src_strides[0]) * elem_size;
                dst[j * elem_size..(j + 1) * elem_size]
                    .copy_from_slice(&data[src..src + elem_size]);
            }
        });
    Ok(out)
}
