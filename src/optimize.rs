//! The output-form policy: which color model and bit depth to write.

use log::debug;

use crate::{ColorType, Image, PngOptError, PngOptResult};

#[derive(Debug, Clone, Copy)]
enum Target {
  Gray(u8),
  Indexed(u8),
  Rgb(u8),
}

/// Rewrites `image` into the cheapest representation that is lossless for
/// its pixel content.
///
/// The image is first brought to the canonical 8-bits-per-component analysis
/// form (and indexed palettes are normalized so the analysis sees exactly
/// the referenced colors). The decision then walks a fixed preference order:
/// at each depth, gray beats indexed beats sub-8-bit RGB, smaller depths
/// beat larger ones, and plain 8-bit RGB covers images whose samples really
/// need 8 bits. An image matching no row fails with `Unsupported`; that can
/// only happen in standard mode, for more than 256 distinct colors whose
/// samples would all fit below 8 bits.
///
/// `force_gray` fails with `Unsupported` when the image isn't expressible as
/// grayscale. Sub-8-bit RGB targets are only eligible when `is_extended` is
/// set, since they aren't valid PNG.
pub fn optimize_for_png(
  image: &mut Image, force_gray: bool, is_extended: bool,
) -> PngOptResult<()> {
  image.convert_to_bpc(8)?;
  if image.color_type == ColorType::Indexed {
    image.normalize_palette()?;
  }
  let gray_ok = image.is_gray_ok();
  if force_gray && !gray_ok {
    return Err(PngOptError::Unsupported("image is not grayscale"));
  }
  let min_rgb_bpc = image.min_rgb_bpc();
  let color_count = image.color_count();
  debug!("optimize: gray_ok={gray_ok} min_rgb_bpc={min_rgb_bpc} color_count={color_count}");

  let target = if gray_ok && min_rgb_bpc == 1 {
    Target::Gray(1)
  } else if color_count <= 2 && !force_gray {
    Target::Indexed(1)
  } else if gray_ok && min_rgb_bpc == 2 {
    Target::Gray(2)
  } else if color_count <= 4 && !force_gray {
    Target::Indexed(2)
  } else if min_rgb_bpc == 1 && !force_gray && is_extended {
    Target::Rgb(1)
  } else if gray_ok && min_rgb_bpc == 4 {
    Target::Gray(4)
  } else if color_count <= 16 && !force_gray {
    Target::Indexed(4)
  } else if min_rgb_bpc == 2 && !force_gray && is_extended {
    Target::Rgb(2)
  } else if gray_ok && min_rgb_bpc == 8 {
    Target::Gray(8)
  } else if color_count <= 256 && !force_gray {
    Target::Indexed(8)
  } else if min_rgb_bpc == 4 && !force_gray && is_extended {
    Target::Rgb(4)
  } else if min_rgb_bpc == 8 && !force_gray {
    Target::Rgb(8)
  } else {
    return Err(PngOptError::Unsupported("no matching output representation"));
  };
  debug!("optimize: target {target:?}");

  match target {
    Target::Gray(bpc) => {
      image.convert_to_gray()?;
      image.convert_to_bpc(bpc)
    }
    Target::Indexed(bpc) => {
      image.convert_to_indexed()?;
      image.convert_to_bpc(bpc)
    }
    Target::Rgb(bpc) => {
      image.convert_to_rgb()?;
      image.convert_to_bpc(bpc)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::pixel_formats::RGB8;

  fn rgb_image(width: u32, height: u32, colors: &[[u8; 3]]) -> Image {
    let mut img = Image::new(width, height, 8, ColorType::Rgb).unwrap();
    for (i, px) in img.pixels.chunks_exact_mut(3).enumerate() {
      px.copy_from_slice(&colors[i % colors.len()]);
    }
    img
  }

  #[test]
  fn two_gray_levels_become_gray_1() {
    let mut img = rgb_image(8, 2, &[[0, 0, 0], [255, 255, 255]]);
    optimize_for_png(&mut img, false, false).unwrap();
    assert_eq!((img.color_type, img.bpc), (ColorType::Gray, 1));
  }

  #[test]
  fn two_colors_become_indexed_1() {
    let mut img = rgb_image(8, 2, &[[0, 0, 0], [255, 0, 0]]);
    optimize_for_png(&mut img, false, false).unwrap();
    assert_eq!((img.color_type, img.bpc), (ColorType::Indexed, 1));
    assert_eq!(img.palette.len(), 2);
  }

  #[test]
  fn four_bit_replicable_colors_prefer_rgb1_when_extended() {
    let colors = [[0, 0, 0], [255, 0, 0], [0, 255, 0], [0, 0, 255], [255, 255, 0]];
    let mut img = rgb_image(5, 1, &colors);
    optimize_for_png(&mut img, false, true).unwrap();
    assert_eq!((img.color_type, img.bpc), (ColorType::Rgb, 1));
    let mut img = rgb_image(5, 1, &colors);
    optimize_for_png(&mut img, false, false).unwrap();
    assert_eq!((img.color_type, img.bpc), (ColorType::Indexed, 4));
  }

  #[test]
  fn many_colors_fall_back_to_rgb_8() {
    let mut img = Image::new(300, 1, 8, ColorType::Rgb).unwrap();
    for (i, px) in img.pixels.chunks_exact_mut(3).enumerate() {
      px.copy_from_slice(&[(i >> 8) as u8, i as u8, 7]);
    }
    optimize_for_png(&mut img, false, false).unwrap();
    assert_eq!((img.color_type, img.bpc), (ColorType::Rgb, 8));
  }

  /// More than 256 distinct colors built only from nibble-replicated
  /// components: no indexed row fits, no gray row applies, and RGB@8 is
  /// reserved for samples that need the full depth.
  fn nibble_color_image() -> Image {
    let mut img = Image::new(300, 1, 8, ColorType::Rgb).unwrap();
    for (i, px) in img.pixels.chunks_exact_mut(3).enumerate() {
      let (r, g, b) = ((i % 16) as u8, ((i / 16) % 16) as u8, (i / 256) as u8);
      px.copy_from_slice(&[r * 0x11, g * 0x11, b * 0x11]);
    }
    img
  }

  #[test]
  fn many_nibble_colors_need_the_extended_rgb_4_row() {
    let mut img = nibble_color_image();
    assert_eq!(img.min_rgb_bpc(), 4);
    assert_eq!(img.color_count(), 257);
    optimize_for_png(&mut img, false, true).unwrap();
    assert_eq!((img.color_type, img.bpc), (ColorType::Rgb, 4));
  }

  #[test]
  fn many_nibble_colors_match_no_standard_row() {
    let mut img = nibble_color_image();
    assert_eq!(
      optimize_for_png(&mut img, false, false),
      Err(PngOptError::Unsupported("no matching output representation"))
    );
  }

  #[test]
  fn force_gray_rejects_colorful_images() {
    let mut img = rgb_image(4, 1, &[[1, 2, 3]]);
    assert_eq!(
      optimize_for_png(&mut img, true, false),
      Err(PngOptError::Unsupported("image is not grayscale"))
    );
  }

  #[test]
  fn force_gray_skips_the_indexed_rows() {
    // Two gray levels that need 8 bits each: indexed@1 would win normally.
    let mut img = rgb_image(8, 1, &[[10, 10, 10], [20, 20, 20]]);
    optimize_for_png(&mut img, true, false).unwrap();
    assert_eq!((img.color_type, img.bpc), (ColorType::Gray, 8));
    let mut img = rgb_image(8, 1, &[[10, 10, 10], [20, 20, 20]]);
    optimize_for_png(&mut img, false, false).unwrap();
    assert_eq!((img.color_type, img.bpc), (ColorType::Indexed, 1));
  }

  #[test]
  fn sixteen_gray_levels_pick_gray_4() {
    let levels: Vec<[u8; 3]> =
      (0..16_u8).map(|v| [v * 0x11, v * 0x11, v * 0x11]).collect();
    let mut img = rgb_image(16, 1, &levels);
    optimize_for_png(&mut img, false, false).unwrap();
    assert_eq!((img.color_type, img.bpc), (ColorType::Gray, 4));
  }

  #[test]
  fn indexed_input_is_normalized_before_analysis() {
    // A junk unused palette entry must not force the image off the gray path.
    let mut img = Image::new(4, 1, 8, ColorType::Indexed).unwrap();
    img.palette = vec![
      RGB8 { r: 0, g: 0, b: 0 },
      RGB8 { r: 200, g: 10, b: 30 },
      RGB8 { r: 255, g: 255, b: 255 },
    ];
    img.pixels.copy_from_slice(&[0, 2, 2, 0]);
    optimize_for_png(&mut img, false, false).unwrap();
    assert_eq!((img.color_type, img.bpc), (ColorType::Gray, 1));
  }
}
