//! Provides the heap-allocated image container that every stage mutates.

use bitfrob::{u8_bit_split_1x8_rev, u8_bit_split_2x4_rev, u8_bit_split_4x2_rev};

use crate::pixel_formats::RGB8;
use crate::util::multiply_check;
use crate::{PngOptError, PngOptResult};

/// The color models this crate processes.
///
/// The discriminants are the PNG color type codes. Alpha-carrying types are
/// rejected at the reader boundary and never appear here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ColorType {
  /// Greyscale
  Gray = 0,
  /// Red, Green, Blue
  Rgb = 2,
  /// Index into a palette of RGB8 entries.
  Indexed = 3,
}
impl ColorType {
  /// The number of components per pixel: 3 for RGB, 1 otherwise.
  #[inline]
  #[must_use]
  pub const fn channel_count(self) -> u32 {
    match self {
      Self::Rgb => 3,
      Self::Gray | Self::Indexed => 1,
    }
  }
}
impl TryFrom<u8> for ColorType {
  type Error = ();
  #[inline]
  fn try_from(value: u8) -> Result<Self, Self::Error> {
    Ok(match value {
      0 => ColorType::Gray,
      2 => ColorType::Rgb,
      3 => ColorType::Indexed,
      _ => return Err(()),
    })
  }
}

/// Bytes per row for the given geometry, overflow-checked.
///
/// `⌈width · cpp · bpc / 8⌉`, where every intermediate product must fit in 32
/// bits.
#[inline]
pub(crate) fn row_length_for(width: u32, bpc: u8, color_type: ColorType) -> PngOptResult<u32> {
  let samples = multiply_check(width, color_type.channel_count())?;
  let bits = multiply_check(samples, bpc as u32)?;
  Ok(bits / 8 + (bits % 8 != 0) as u32)
}

/// A raster image in one of the supported packings.
///
/// The pixel buffer holds exactly `row_length() * height` bytes; within a
/// row, samples are packed MSB-first and any unused trailing bits of the last
/// byte are zero (the PNG writer transiently works on unmasked copies, but
/// the image itself always satisfies this). The palette is non-empty exactly
/// when `color_type` is [`ColorType::Indexed`].
///
/// The image exclusively owns both buffers; converters reallocate them in
/// place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
  pub width: u32,
  pub height: u32,
  /// bits per component, one of 1/2/4/8.
  pub bpc: u8,
  pub color_type: ColorType,
  pub pixels: Vec<u8>,
  pub palette: Vec<RGB8>,
}
impl Image {
  /// Allocates a zeroed image of the given geometry.
  ///
  /// Fails with `Malformed` on zero dimensions or an unsupported bit depth,
  /// with `IntegerOverflow` when `row_length * height` doesn't fit in 32
  /// bits, and with `Alloc` when the buffer can't be reserved.
  pub fn new(width: u32, height: u32, bpc: u8, color_type: ColorType) -> PngOptResult<Self> {
    if width == 0 || height == 0 {
      return Err(PngOptError::Malformed("zero width or height"));
    }
    if !matches!(bpc, 1 | 2 | 4 | 8) {
      return Err(PngOptError::Malformed("unsupported bit depth"));
    }
    let row_length = row_length_for(width, bpc, color_type)?;
    let total = multiply_check(row_length, height)? as usize;
    let mut pixels: Vec<u8> = Vec::new();
    pixels.try_reserve(total)?;
    pixels.resize(total, 0);
    Ok(Self { width, height, bpc, color_type, pixels, palette: Vec::new() })
  }

  /// Components per pixel: 3 for RGB, 1 otherwise.
  #[inline]
  #[must_use]
  pub const fn cpp(&self) -> u32 {
    self.color_type.channel_count()
  }

  /// Samples in one row (`width * cpp`).
  #[inline]
  #[must_use]
  pub fn samples_per_row(&self) -> u32 {
    // Validated to fit at construction time.
    (self.width as u64 * self.cpp() as u64) as u32
  }

  /// Bytes in one packed row.
  #[inline]
  #[must_use]
  pub fn row_length(&self) -> u32 {
    let bits = self.samples_per_row() as u64 * self.bpc as u64;
    (bits / 8 + (bits % 8 != 0) as u64) as u32
  }

  /// Byte length of the palette (3 per entry), 0 for non-indexed images.
  #[inline]
  #[must_use]
  pub fn palette_size(&self) -> u32 {
    (self.palette.len() * 3) as u32
  }

  /// The palette as raw `RGBRGB...` bytes.
  #[inline]
  #[must_use]
  pub fn palette_bytes(&self) -> &[u8] {
    bytemuck::cast_slice(&self.palette)
  }

  /// Iterates the packed rows of the pixel buffer.
  #[inline]
  pub fn rows(&self) -> impl Iterator<Item = &[u8]> {
    self.pixels.chunks_exact(self.row_length() as usize)
  }

  /// The AND-mask for the last byte of a row: keeps the used high bits and
  /// clears the unused trailing bits. 0xFF when rows end on a byte boundary.
  #[inline]
  #[must_use]
  pub fn trailing_mask(&self) -> u8 {
    let rem = (self.samples_per_row() as u64 * self.bpc as u64) % 8;
    if rem == 0 {
      0xFF
    } else {
      (0x7F00_u32 >> rem) as u8
    }
  }

  /// Zeroes the unused trailing bits of every row's last byte.
  pub fn mask_trailing_bits(&mut self) {
    let mask = self.trailing_mask();
    if mask == 0xFF {
      return;
    }
    let row_length = self.row_length() as usize;
    for row in self.pixels.chunks_exact_mut(row_length) {
      row[row_length - 1] &= mask;
    }
  }

  /// Verifies the palette invariants: absent for Gray/RGB, 1..=256 entries
  /// and every packed pixel index in range for Indexed.
  pub fn check_palette(&self) -> PngOptResult<()> {
    if self.color_type != ColorType::Indexed {
      if !self.palette.is_empty() {
        return Err(PngOptError::Malformed("unexpected palette"));
      }
      return Ok(());
    }
    if self.palette.is_empty() || self.palette.len() > 256 {
      return Err(PngOptError::Malformed("bad palette size"));
    }
    let entries = self.palette.len() as u32;
    let samples = self.samples_per_row() as usize;
    for row in self.rows() {
      for index in packed_row_samples(row, self.bpc, samples) {
        if index as u32 >= entries {
          return Err(PngOptError::Malformed("palette index out of range"));
        }
      }
    }
    Ok(())
  }
}

/// Iterates the first `count` packed samples of a row, MSB-first, without
/// expanding their bit depth.
pub(crate) fn packed_row_samples(
  row: &[u8], bpc: u8, count: usize,
) -> Box<dyn Iterator<Item = u8> + '_> {
  match bpc {
    1 => Box::new(row.iter().flat_map(|&b| u8_bit_split_1x8_rev(b)).take(count)),
    2 => Box::new(row.iter().flat_map(|&b| u8_bit_split_2x4_rev(b)).take(count)),
    4 => Box::new(row.iter().flat_map(|&b| u8_bit_split_4x2_rev(b)).take(count)),
    _ => Box::new(row.iter().copied().take(count)),
  }
}
