#![allow(dead_code)]

use crate::{PngOptError, PngOptResult};

#[inline]
#[must_use]
pub(crate) fn u32_be(bytes: &[u8]) -> u32 {
  u32::from_be_bytes(bytes.try_into().unwrap())
}

#[inline]
pub(crate) fn put_u32_be(bytes: &mut [u8], k: u32) {
  bytes[..4].copy_from_slice(&k.to_be_bytes());
}

#[inline]
pub(crate) fn put_u32_le(bytes: &mut [u8], k: u32) {
  bytes[..4].copy_from_slice(&k.to_le_bytes());
}

#[inline]
pub(crate) fn put_u16_le(bytes: &mut [u8], k: u16) {
  bytes[..2].copy_from_slice(&k.to_le_bytes());
}

/// `a + b`, or `IntegerOverflow` when the exact sum doesn't fit in 32 bits.
#[inline]
pub(crate) fn add_check(a: u32, b: u32) -> PngOptResult<u32> {
  a.checked_add(b).ok_or(PngOptError::IntegerOverflow)
}

/// Checks that `a + b` wouldn't overflow, then returns `a` unchanged.
#[inline]
pub(crate) fn add0_check(a: u32, b: u32) -> PngOptResult<u32> {
  add_check(a, b).map(|_| a)
}

/// `a * b`, or `IntegerOverflow` when the exact product doesn't fit in 32
/// bits.
#[inline]
pub(crate) fn multiply_check(a: u32, b: u32) -> PngOptResult<u32> {
  a.checked_mul(b).ok_or(PngOptError::IntegerOverflow)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn checked_math_accepts_exact_fits() {
    assert_eq!(add_check(u32::MAX - 1, 1), Ok(u32::MAX));
    assert_eq!(add0_check(u32::MAX - 1, 1), Ok(u32::MAX - 1));
    assert_eq!(multiply_check(0x1_0000, 0xFFFF), Ok(0xFFFF_0000));
    assert_eq!(multiply_check(0, u32::MAX), Ok(0));
  }

  #[test]
  fn checked_math_rejects_overflow() {
    assert_eq!(add_check(u32::MAX, 1), Err(PngOptError::IntegerOverflow));
    assert_eq!(add0_check(1, u32::MAX), Err(PngOptError::IntegerOverflow));
    assert_eq!(multiply_check(0x1_0000, 0x1_0000), Err(PngOptError::IntegerOverflow));
  }

  #[test]
  fn endian_helpers_round_trip() {
    let mut buf = [0_u8; 4];
    put_u32_be(&mut buf, 0x0102_0304);
    assert_eq!(buf, [1, 2, 3, 4]);
    assert_eq!(u32_be(&buf), 0x0102_0304);
    put_u32_le(&mut buf, 0x0102_0304);
    assert_eq!(buf, [4, 3, 2, 1]);
    put_u16_le(&mut buf, 0x0102);
    assert_eq!(&buf[..2], &[2, 1]);
  }
}
