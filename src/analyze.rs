//! Queries that drive the output-form decision: gray feasibility, distinct
//! color counting, and minimum lossless bit depth.
//!
//! Everything here assumes the image has already been brought to 8 bits per
//! component; [`optimize_for_png`](crate::optimize_for_png) does that before
//! asking.

use bitfrob::u8_replicate_bits;

use crate::palette::ColorTable;
use crate::pixel_formats::RGB8;
use crate::{ColorType, Image};

/// Smallest depth whose bit-replication round trip reproduces `v` exactly:
/// e.g. 0x00/0xFF survive depth 1, 0x55 survives depth 2, 0x70 needs 8.
#[inline]
#[must_use]
fn sample_min_bpc(v: u8) -> u8 {
  if u8_replicate_bits(1, v >> 7) == v {
    1
  } else if u8_replicate_bits(2, v >> 6) == v {
    2
  } else if u8_replicate_bits(4, v >> 4) == v {
    4
  } else {
    8
  }
}

impl Image {
  /// Whether the image can be expressed as grayscale without loss: every
  /// relevant RGB triplet has r == g == b.
  ///
  /// Requires bpc 8.
  #[must_use]
  pub fn is_gray_ok(&self) -> bool {
    debug_assert_eq!(self.bpc, 8);
    match self.color_type {
      ColorType::Gray => true,
      ColorType::Indexed => self.palette.iter().all(|entry| entry.is_gray()),
      ColorType::Rgb => self.pixels.chunks_exact(3).all(|c| c[0] == c[1] && c[1] == c[2]),
    }
  }

  /// Number of distinct colors the image actually uses, capped at 257 (any
  /// value above 256 just means "doesn't fit a palette").
  ///
  /// Requires bpc 8.
  #[must_use]
  pub fn color_count(&self) -> u32 {
    debug_assert_eq!(self.bpc, 8);
    match self.color_type {
      ColorType::Gray => {
        let mut seen = [false; 256];
        for &v in &self.pixels {
          seen[v as usize] = true;
        }
        seen.iter().filter(|&&s| s).count() as u32
      }
      ColorType::Rgb => {
        let mut table = ColorTable::new();
        for c in self.pixels.chunks_exact(3) {
          if !table.insert(RGB8 { r: c[0], g: c[1], b: c[2] }) {
            return 257;
          }
        }
        table.distinct() as u32
      }
      ColorType::Indexed => {
        // Referenced entries first, then deduplicate their colors: two
        // indexes pointing at the same RGB value are one color.
        let mut used = [false; 256];
        for &px in &self.pixels {
          used[px as usize] = true;
        }
        let mut table = ColorTable::new();
        for (i, &entry) in self.palette.iter().enumerate() {
          if used[i] && !table.insert(entry) {
            return 257;
          }
        }
        table.distinct() as u32
      }
    }
  }

  /// Smallest bpc in {1,2,4,8} at which an RGB rendition of the image is
  /// lossless.
  ///
  /// Requires bpc 8.
  #[must_use]
  pub fn min_rgb_bpc(&self) -> u8 {
    debug_assert_eq!(self.bpc, 8);
    let samples: &[u8] = match self.color_type {
      ColorType::Indexed => self.palette_bytes(),
      ColorType::Gray | ColorType::Rgb => &self.pixels,
    };
    let mut min = 1;
    for &v in samples {
      min = min.max(sample_min_bpc(v));
      if min == 8 {
        break;
      }
    }
    min
  }

  /// Smallest bpc in {1,2,4,8} the image itself can be stored at: the
  /// ceiling log2 of the color count for indexed images, [`min_rgb_bpc`]
  /// otherwise.
  ///
  /// Requires bpc 8.
  #[must_use]
  pub fn min_bpc(&self) -> u8 {
    match self.color_type {
      ColorType::Indexed => match self.color_count() {
        0..=2 => 1,
        3..=4 => 2,
        5..=16 => 4,
        _ => 8,
      },
      ColorType::Gray | ColorType::Rgb => self.min_rgb_bpc(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::PngOptResult;

  fn rgb_image(colors: &[[u8; 3]]) -> PngOptResult<Image> {
    let mut img = Image::new(colors.len() as u32, 1, 8, ColorType::Rgb)?;
    for (dst, src) in img.pixels.chunks_exact_mut(3).zip(colors) {
      dst.copy_from_slice(src);
    }
    Ok(img)
  }

  #[test]
  fn sample_min_bpc_tracks_replication() {
    assert_eq!(sample_min_bpc(0x00), 1);
    assert_eq!(sample_min_bpc(0xFF), 1);
    assert_eq!(sample_min_bpc(0x55), 2);
    assert_eq!(sample_min_bpc(0xAA), 2);
    assert_eq!(sample_min_bpc(0x11), 4);
    assert_eq!(sample_min_bpc(0x77), 4);
    assert_eq!(sample_min_bpc(0x80), 8);
    assert_eq!(sample_min_bpc(0x10), 8);
  }

  #[test]
  fn gray_ok_by_color_type() {
    let gray = Image::new(4, 1, 8, ColorType::Gray).unwrap();
    assert!(gray.is_gray_ok());
    let rgb = rgb_image(&[[7, 7, 7], [0, 0, 0]]).unwrap();
    assert!(rgb.is_gray_ok());
    let rgb = rgb_image(&[[7, 7, 7], [0, 1, 0]]).unwrap();
    assert!(!rgb.is_gray_ok());
    let mut indexed = Image::new(1, 1, 8, ColorType::Indexed).unwrap();
    indexed.palette = vec![RGB8 { r: 3, g: 3, b: 3 }, RGB8 { r: 1, g: 2, b: 3 }];
    // The palette scan covers all entries, referenced or not.
    assert!(!indexed.is_gray_ok());
    indexed.palette[1] = RGB8 { r: 9, g: 9, b: 9 };
    assert!(indexed.is_gray_ok());
  }

  #[test]
  fn color_count_deduplicates_indexed_entries() {
    let mut img = Image::new(4, 1, 8, ColorType::Indexed).unwrap();
    let green = RGB8 { r: 0, g: 255, b: 0 };
    img.palette = vec![green, RGB8::default(), green, RGB8 { r: 1, g: 1, b: 1 }];
    img.pixels.copy_from_slice(&[0, 2, 0, 2]);
    // Index 1 and 3 are unreferenced, and 0/2 are the same color.
    assert_eq!(img.color_count(), 1);
    img.pixels.copy_from_slice(&[0, 1, 2, 3]);
    assert_eq!(img.color_count(), 3);
  }

  #[test]
  fn color_count_caps_above_256() {
    let mut img = Image::new(300, 1, 8, ColorType::Rgb).unwrap();
    for (i, px) in img.pixels.chunks_exact_mut(3).enumerate() {
      px.copy_from_slice(&[(i >> 8) as u8, i as u8, 0]);
    }
    assert_eq!(img.color_count(), 257);
  }

  #[test]
  fn min_bpc_quantizes_color_count() {
    let mut img = Image::new(2, 1, 8, ColorType::Indexed).unwrap();
    img.palette = (0..5_u8).map(|v| RGB8 { r: v, g: 0, b: 0 }).collect();
    img.pixels.copy_from_slice(&[0, 1]);
    assert_eq!(img.min_bpc(), 1);
    img.pixels.copy_from_slice(&[0, 4]);
    assert_eq!(img.min_bpc(), 1);
    let mut img = Image::new(5, 1, 8, ColorType::Indexed).unwrap();
    img.palette = (0..5_u8).map(|v| RGB8 { r: v, g: 0, b: 0 }).collect();
    img.pixels.copy_from_slice(&[0, 1, 2, 3, 4]);
    assert_eq!(img.min_bpc(), 4);
  }

  #[test]
  fn min_rgb_bpc_scans_the_right_samples() {
    let rgb = rgb_image(&[[0, 255, 0], [255, 255, 255]]).unwrap();
    assert_eq!(rgb.min_rgb_bpc(), 1);
    let rgb = rgb_image(&[[0, 255, 0], [0x55, 0, 0]]).unwrap();
    assert_eq!(rgb.min_rgb_bpc(), 2);
    let rgb = rgb_image(&[[1, 2, 3]]).unwrap();
    assert_eq!(rgb.min_rgb_bpc(), 8);
    let mut indexed = Image::new(1, 1, 8, ColorType::Indexed).unwrap();
    indexed.palette = vec![RGB8 { r: 0x33, g: 0xFF, b: 0x00 }];
    assert_eq!(indexed.min_rgb_bpc(), 4);
  }
}
