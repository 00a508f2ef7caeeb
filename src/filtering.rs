//! Per-row predictor arithmetic shared by the PNG reader and writer.
//!
//! From the PNG spec:
//!
//! > Filters are applied to **bytes**, not to pixels, regardless of the bit
//! > depth or color type of the image.
//!
//! The reader uses the `reconstruct_*` direction, the writer the `filter_*`
//! direction. Everything is modulo 256 except the interior of the Paeth
//! predictor, which the spec requires to be computed exactly.

/// The Paeth predictor function computes a simple linear function of the
/// three neighboring bytes (left `a`, above `b`, upper left `c`).
///
/// The output is the neighboring byte closest to the computed estimate,
/// breaking ties in the order `a`, `b`, `c`. If a neighbor isn't present
/// because this is the top or left edge of the image, substitute 0 for it.
#[inline]
#[must_use]
pub const fn paeth_predictor(a: u8, b: u8, c: u8) -> u8 {
  // The spec says "The calculations within the PaethPredictor function shall
  // be performed exactly, without overflow", so i32 math here, which is wide
  // enough for any u8 inputs.
  let a_ = a as i32;
  let b_ = b as i32;
  let c_ = c as i32;
  let p = a_ + b_ - c_;
  let pa = (p - a_).abs();
  let pb = (p - b_).abs();
  let pc = (p - c_).abs();
  // The order of evaluation of these tests is load bearing.
  if pa <= pb && pa <= pc {
    a
  } else if pb <= pc {
    b
  } else {
    c
  }
}

/// Reconstruct filter type 1 ("Sub"): `fx` is the filtered byte, `ra` the
/// reconstructed byte `left_delta` positions to the left.
#[inline]
#[must_use]
pub const fn reconstruct_sub(fx: u8, ra: u8) -> u8 {
  fx.wrapping_add(ra)
}

/// Reconstruct filter type 2 ("Up"): `rb` is the reconstructed byte at the
/// same position in the previous row.
#[inline]
#[must_use]
pub const fn reconstruct_up(fx: u8, rb: u8) -> u8 {
  fx.wrapping_add(rb)
}

/// Reconstruct filter type 3 ("Average").
#[inline]
#[must_use]
pub const fn reconstruct_average(fx: u8, ra: u8, rb: u8) -> u8 {
  fx.wrapping_add(((ra as u32 + rb as u32) / 2) as u8)
}

/// Reconstruct filter type 4 ("Paeth"); `rc` is the reconstructed byte above
/// and `left_delta` to the left.
#[inline]
#[must_use]
pub const fn reconstruct_paeth(fx: u8, ra: u8, rb: u8, rc: u8) -> u8 {
  fx.wrapping_add(paeth_predictor(ra, rb, rc))
}

/// Filter type 1 ("Sub"): the raw byte minus its left neighbor.
#[inline]
#[must_use]
pub const fn filter_sub(x: u8, ra: u8) -> u8 {
  x.wrapping_sub(ra)
}

/// Filter type 2 ("Up").
#[inline]
#[must_use]
pub const fn filter_up(x: u8, rb: u8) -> u8 {
  x.wrapping_sub(rb)
}

/// Filter type 3 ("Average").
#[inline]
#[must_use]
pub const fn filter_average(x: u8, ra: u8, rb: u8) -> u8 {
  x.wrapping_sub(((ra as u32 + rb as u32) / 2) as u8)
}

/// Filter type 4 ("Paeth").
#[inline]
#[must_use]
pub const fn filter_paeth(x: u8, ra: u8, rb: u8, rc: u8) -> u8 {
  x.wrapping_sub(paeth_predictor(ra, rb, rc))
}
