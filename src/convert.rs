//! Lossless conversions between the gray, indexed, and RGB forms and between
//! bit depths.
//!
//! The color-model converters require bpc 8 (the optimizer's canonical
//! analysis form); [`Image::convert_to_bpc`] is the only one that touches
//! packing.

use bitfrob::u8_replicate_bits;

use crate::image::{packed_row_samples, row_length_for};
use crate::palette::build_indexed;
use crate::pixel_formats::RGB8;
use crate::util::multiply_check;
use crate::{ColorType, Image, PngOptError, PngOptResult};

impl Image {
  /// Expands the image to packed RGB triplets. Gray samples are replicated
  /// across the three channels; indexed pixels are resolved through the
  /// palette, which is then dropped.
  ///
  /// Requires bpc 8.
  pub fn convert_to_rgb(&mut self) -> PngOptResult<()> {
    debug_assert_eq!(self.bpc, 8);
    if self.color_type == ColorType::Rgb {
      return Ok(());
    }
    let total = multiply_check(multiply_check(self.width, 3)?, self.height)? as usize;
    let mut out: Vec<u8> = Vec::new();
    out.try_reserve(total)?;
    match self.color_type {
      ColorType::Gray => {
        for &v in &self.pixels {
          out.extend_from_slice(&[v, v, v]);
        }
      }
      ColorType::Indexed => {
        for &px in &self.pixels {
          let entry = *self
            .palette
            .get(px as usize)
            .ok_or(PngOptError::Malformed("palette index out of range"))?;
          out.extend_from_slice(&[entry.r, entry.g, entry.b]);
        }
      }
      ColorType::Rgb => (),
    }
    self.pixels = out;
    self.color_type = ColorType::Rgb;
    self.palette = Vec::new();
    Ok(())
  }

  /// Collapses the image to one gray sample per pixel. Fails with
  /// `Unsupported` when any relevant triplet has differing channels.
  ///
  /// Requires bpc 8.
  pub fn convert_to_gray(&mut self) -> PngOptResult<()> {
    debug_assert_eq!(self.bpc, 8);
    match self.color_type {
      ColorType::Gray => Ok(()),
      ColorType::Indexed => {
        if !self.palette.iter().all(|entry| entry.is_gray()) {
          return Err(PngOptError::Unsupported("image is not grayscale"));
        }
        for px in &mut self.pixels {
          *px = self
            .palette
            .get(*px as usize)
            .ok_or(PngOptError::Malformed("palette index out of range"))?
            .r;
        }
        self.color_type = ColorType::Gray;
        self.palette = Vec::new();
        Ok(())
      }
      ColorType::Rgb => {
        let count = self.pixels.len() / 3;
        for i in 0..count {
          let [r, g, b] = [self.pixels[3 * i], self.pixels[3 * i + 1], self.pixels[3 * i + 2]];
          if r != g || g != b {
            return Err(PngOptError::Unsupported("image is not grayscale"));
          }
          self.pixels[i] = r;
        }
        self.pixels.truncate(count);
        self.color_type = ColorType::Gray;
        Ok(())
      }
    }
  }

  /// Converts to indexed color. Gray images take the identity gray ramp as
  /// their palette and are then normalized down to the levels in use; RGB
  /// images go through the palette builder and fail with `Unsupported` when
  /// they hold more than 256 distinct colors.
  ///
  /// Requires bpc 8.
  pub fn convert_to_indexed(&mut self) -> PngOptResult<()> {
    debug_assert_eq!(self.bpc, 8);
    match self.color_type {
      ColorType::Indexed => Ok(()),
      ColorType::Gray => {
        // A gray sample is its own index into the identity ramp.
        self.palette = (0..=255).map(|v| RGB8 { r: v, g: v, b: v }).collect();
        self.color_type = ColorType::Indexed;
        self.normalize_palette()
      }
      ColorType::Rgb => {
        let palette = build_indexed(&mut self.pixels)
          .ok_or(PngOptError::Unsupported("too many colors"))?;
        self.palette = palette;
        self.color_type = ColorType::Indexed;
        Ok(())
      }
    }
  }

  /// Repacks the image at another bit depth, MSB-first, zeroing trailing row
  /// bits.
  ///
  /// Upconversion replicates component bits (so a 4-bit nibble `n` becomes
  /// `(n<<4)|n`) and carries index values verbatim. Downconversion keeps the
  /// high bits of components and the low bits of indexes (palette indexes
  /// are expected to be normalized-small), and refuses with `Unsupported`
  /// when the target depth is below [`min_bpc`](Image::min_bpc).
  pub fn convert_to_bpc(&mut self, to_bpc: u8) -> PngOptResult<()> {
    if !matches!(to_bpc, 1 | 2 | 4 | 8) {
      return Err(PngOptError::Unsupported("unsupported bit depth"));
    }
    if self.bpc == to_bpc {
      return Ok(());
    }
    let height = self.height;
    let samples = self.samples_per_row() as usize;
    if self.bpc != 8 {
      // Expand to the one-sample-per-byte form first.
      let total = multiply_check(samples as u32, height)? as usize;
      let mut out: Vec<u8> = Vec::new();
      out.try_reserve(total)?;
      let expand_components = self.color_type != ColorType::Indexed;
      let bpc = self.bpc;
      for row in self.rows() {
        for s in packed_row_samples(row, bpc, samples) {
          out.push(if expand_components { u8_replicate_bits(bpc as u32, s) } else { s });
        }
      }
      self.pixels = out;
      self.bpc = 8;
    }
    if to_bpc < 8 {
      if to_bpc < self.min_bpc() {
        return Err(PngOptError::Unsupported("bpc conversion would lose precision"));
      }
      let new_row_length = row_length_for(self.width, to_bpc, self.color_type)?;
      let total = multiply_check(new_row_length, height)? as usize;
      let mut out: Vec<u8> = Vec::new();
      out.try_reserve(total)?;
      let keep_low_bits = self.color_type == ColorType::Indexed;
      for row in self.rows() {
        let mut acc = 0_u8;
        let mut filled = 0_u8;
        for &v in row {
          let bits = if keep_low_bits { v & ((1_u8 << to_bpc) - 1) } else { v >> (8 - to_bpc) };
          acc = (acc << to_bpc) | bits;
          filled += to_bpc;
          if filled == 8 {
            out.push(acc);
            acc = 0;
            filled = 0;
          }
        }
        if filled > 0 {
          // Unused trailing bits stay zero.
          out.push(acc << (8 - filled));
        }
      }
      self.pixels = out;
      self.bpc = to_bpc;
    }
    Ok(())
  }
}
