//! The binary [Netpbm](https://en.wikipedia.org/wiki/Netpbm) formats: `P4`
//! bitmaps, `P5` grayscale, `P6` RGB.
//!
//! This is deliberately minimal sequential I/O: header fields are separated
//! by exactly one whitespace character, the maximum sample value must be
//! 255, and the ascii formats (`P1`..`P3`) are not accepted.
//!
//! PBM polarity is inverted relative to PNG grayscale (`P4` stores 1 for
//! black); the reader and writer both flip the bits so a PBM ↔ 1-bit gray
//! round trip is lossless.

use std::io::Write;

use crate::{ColorType, Image, PngOptError, PngOptResult};

/// Pulls the `P<digit>` magic off the front of the bytes.
fn pull_tag(bytes: &[u8]) -> PngOptResult<(u8, &[u8])> {
  match bytes {
    [b'P', tag, rest @ ..] if (b'1'..=b'6').contains(tag) => Ok((tag - b'0', rest)),
    _ => Err(PngOptError::Malformed("not a pnm file")),
  }
}

/// Consumes exactly one whitespace character.
fn pull_one_ws(bytes: &[u8]) -> PngOptResult<&[u8]> {
  match bytes {
    [ws, rest @ ..] if ws.is_ascii_whitespace() => Ok(rest),
    _ => Err(PngOptError::Malformed("bad pnm header")),
  }
}

/// Pulls an ascii decimal value off the front of the bytes, leaving the
/// terminating character in place.
fn pull_ascii_u32(bytes: &[u8]) -> PngOptResult<(u32, &[u8])> {
  let end = bytes.iter().position(|b| !b.is_ascii_digit()).unwrap_or(bytes.len());
  if end == 0 {
    return Err(PngOptError::Malformed("bad pnm header"));
  }
  let digits = core::str::from_utf8(&bytes[..end])
    .map_err(|_| PngOptError::Malformed("bad pnm header"))?;
  let value =
    digits.parse::<u32>().map_err(|_| PngOptError::Malformed("bad pnm header"))?;
  Ok((value, &bytes[end..]))
}

/// Parses a binary PNM image: `P4` → 1-bit gray, `P5` → 8-bit gray, `P6` →
/// 8-bit RGB.
pub fn netpbm_read(bytes: &[u8]) -> PngOptResult<Image> {
  let (tag, rest) = pull_tag(bytes)?;
  if !matches!(tag, 4 | 5 | 6) {
    return Err(PngOptError::Unsupported("ascii pnm formats not supported"));
  }
  let rest = pull_one_ws(rest)?;
  let (width, rest) = pull_ascii_u32(rest)?;
  let rest = pull_one_ws(rest)?;
  let (height, rest) = pull_ascii_u32(rest)?;
  let data = if tag == 4 {
    pull_one_ws(rest)?
  } else {
    let rest = pull_one_ws(rest)?;
    let (max, rest) = pull_ascii_u32(rest)?;
    if max != 255 {
      return Err(PngOptError::Malformed("pnm maxval must be 255"));
    }
    pull_one_ws(rest)?
  };
  let (bpc, color_type) = match tag {
    4 => (1, ColorType::Gray),
    5 => (8, ColorType::Gray),
    _ => (8, ColorType::Rgb),
  };
  let mut image = Image::new(width, height, bpc, color_type)?;
  let total = image.pixels.len();
  let src = data.get(..total).ok_or(PngOptError::Malformed("truncated pnm"))?;
  if tag == 4 {
    // PBM rows are byte aligned at the same width, only the polarity flips.
    for (dst, &s) in image.pixels.iter_mut().zip(src) {
      *dst = !s;
    }
    image.mask_trailing_bits();
  } else {
    image.pixels.copy_from_slice(src);
  }
  Ok(image)
}

/// Writes a 1-bit gray image as a binary `P4` bitmap.
pub fn netpbm_write_p4<W: Write>(sink: &mut W, image: &Image) -> PngOptResult<()> {
  if image.color_type != ColorType::Gray || image.bpc != 1 {
    return Err(PngOptError::Unsupported("image is not a 1-bit bitmap"));
  }
  writeln!(sink, "P4 {} {}", image.width, image.height)?;
  let row_length = image.row_length() as usize;
  let mask = image.trailing_mask();
  let mut buf = vec![0_u8; row_length];
  for row in image.rows() {
    for (dst, &s) in buf.iter_mut().zip(row) {
      *dst = !s;
    }
    // Keep the padding bits zero after the inversion.
    buf[row_length - 1] &= mask;
    sink.write_all(&buf)?;
  }
  Ok(())
}

/// Writes an 8-bit gray image as a binary `P5` graymap.
pub fn netpbm_write_p5<W: Write>(sink: &mut W, image: &Image) -> PngOptResult<()> {
  if image.color_type != ColorType::Gray || image.bpc != 8 {
    return Err(PngOptError::Unsupported("image is not 8-bit grayscale"));
  }
  writeln!(sink, "P5 {} {} 255", image.width, image.height)?;
  sink.write_all(&image.pixels)?;
  Ok(())
}

/// Writes an 8-bit RGB image as a binary `P6` pixmap.
pub fn netpbm_write_p6<W: Write>(sink: &mut W, image: &Image) -> PngOptResult<()> {
  if image.color_type != ColorType::Rgb || image.bpc != 8 {
    return Err(PngOptError::Unsupported("image is not 8-bit rgb"));
  }
  writeln!(sink, "P6 {} {} 255", image.width, image.height)?;
  sink.write_all(&image.pixels)?;
  Ok(())
}
