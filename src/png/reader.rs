//! PNG decoding into an [`Image`].

use log::warn;
use miniz_oxide::inflate::{
  core::{
    decompress,
    inflate_flags::{
      TINFL_FLAG_HAS_MORE_INPUT, TINFL_FLAG_PARSE_ZLIB_HEADER,
      TINFL_FLAG_USING_NON_WRAPPING_OUTPUT_BUF,
    },
    DecompressorOxide,
  },
  TINFLStatus,
};

use super::{
  is_png_signature_correct, PngChunkTag, PngRawChunkIter, FILTER_METHOD_RAW,
  FILTER_METHOD_STANDARD,
};
use crate::filtering::{reconstruct_average, reconstruct_paeth, reconstruct_sub, reconstruct_up};
use crate::pixel_formats::RGB8;
use crate::util::{add_check, multiply_check};
use crate::{ColorType, Image, PngOptError, PngOptResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ihdr {
  width: u32,
  height: u32,
  bpc: u8,
  color_type: ColorType,
  filter_method: u8,
}

fn parse_ihdr(data: &[u8]) -> PngOptResult<Ihdr> {
  match data {
    [w0, w1, w2, w3, h0, h1, h2, h3, bpc, color_type, compression, filter_method, interlace] => {
      let width = u32::from_be_bytes([*w0, *w1, *w2, *w3]);
      let height = u32::from_be_bytes([*h0, *h1, *h2, *h3]);
      if width == 0 || height == 0 {
        return Err(PngOptError::Malformed("zero width or height"));
      }
      if !matches!(*bpc, 1 | 2 | 4 | 8) {
        // 16-bit samples deliberately included in the rejection.
        return Err(PngOptError::Malformed("unsupported bit depth"));
      }
      let color_type = match *color_type {
        4 | 6 => return Err(PngOptError::Malformed("alpha color types not supported")),
        ct => ColorType::try_from(ct).map_err(|_| PngOptError::Malformed("bad color type"))?,
      };
      if *compression != 0 {
        return Err(PngOptError::Malformed("bad compression method"));
      }
      match *filter_method {
        FILTER_METHOD_STANDARD | FILTER_METHOD_RAW => (),
        2 => return Err(PngOptError::Malformed("tiff2 predictor not supported")),
        _ => return Err(PngOptError::Malformed("bad filter method")),
      }
      if *interlace != 0 {
        return Err(PngOptError::Malformed("interlacing not supported"));
      }
      Ok(Ihdr { width, height, bpc: *bpc, color_type, filter_method: *filter_method })
    }
    _ => Err(PngOptError::Malformed("bad ihdr size")),
  }
}

/// Oversized palettes are silently clamped to what the bit depth can index.
fn parse_plte(data: &[u8], bpc: u8) -> PngOptResult<Vec<RGB8>> {
  if data.is_empty() || data.len() % 3 != 0 || data.len() > 768 {
    return Err(PngOptError::Malformed("bad palette size"));
  }
  let entries: &[RGB8] = bytemuck::cast_slice(data);
  let indexable = 1_usize << bpc;
  let entries = &entries[..entries.len().min(indexable)];
  let mut palette: Vec<RGB8> = Vec::new();
  palette.try_reserve(entries.len())?;
  palette.extend_from_slice(entries);
  Ok(palette)
}

/// Inflates the concatenated IDAT payloads into `out`.
///
/// `out` must be pre-zeroed and exactly the size of the pixel area. Problems
/// that appear only after the pixel area is complete (a bad adler32,
/// trailing compressed data) are warnings; a broken stream before that point
/// is fatal, and a stream that simply ends early leaves the zero fill in
/// place with a warning.
fn inflate_idat_into<'inp>(
  out: &mut [u8], it: impl Iterator<Item = &'inp [u8]>,
) -> PngOptResult<()> {
  let mut it = it.peekable();
  let r = &mut DecompressorOxide::new();
  let mut out_pos = 0;
  let mut zlib_header = true;
  while let Some(in_buf) = it.next() {
    let has_more = it.peek().is_some();
    let flags = if zlib_header { TINFL_FLAG_PARSE_ZLIB_HEADER } else { 0 }
      | TINFL_FLAG_USING_NON_WRAPPING_OUTPUT_BUF
      | if has_more { TINFL_FLAG_HAS_MORE_INPUT } else { 0 };
    let (status, _input_read, bytes_written) = decompress(r, in_buf, out, out_pos, flags);
    zlib_header = false;
    out_pos += bytes_written;
    match status {
      TINFLStatus::Done => {
        if out_pos < out.len() {
          warn!("short image data, zero filling {} bytes", out.len() - out_pos);
        }
        return Ok(());
      }
      TINFLStatus::Adler32Mismatch => {
        warn!("bad image data or bad adler32");
        return Ok(());
      }
      TINFLStatus::HasMoreOutput => {
        // The pixel area is full and compressed data is still pending.
        warn!("too much image data");
        return Ok(());
      }
      TINFLStatus::NeedsMoreInput | TINFLStatus::FailedCannotMakeProgress => {
        if has_more {
          continue;
        }
        if out_pos == out.len() {
          warn!("bad image data or bad adler32");
        } else {
          warn!("short image data, zero filling {} bytes", out.len() - out_pos);
        }
        return Ok(());
      }
      TINFLStatus::BadParam | TINFLStatus::Failed => {
        if out_pos == out.len() {
          warn!("bad image data or bad adler32");
          return Ok(());
        }
        return Err(PngOptError::Malformed("bad image data"));
      }
    }
  }
  // No IDAT payload produced any output at all.
  warn!("short image data, zero filling {} bytes", out.len() - out_pos);
  Ok(())
}

/// Reconstructs filtered rows in place. Each line is a filter id byte
/// followed by `rlen` filtered bytes.
fn unfilter_rows(
  buf: &mut [u8], rlen: usize, height: usize, left_delta: usize,
) -> PngOptResult<()> {
  let line = rlen + 1;
  for y in 0..height {
    let (done, rest) = buf.split_at_mut(y * line);
    let prev: &[u8] = if y > 0 { &done[(y - 1) * line + 1..] } else { &[] };
    let row = &mut rest[..line];
    let (filter, row) = row.split_at_mut(1);
    match filter[0] {
      0 => (),
      1 => {
        // Sub; bytes before left_delta have no left neighbor.
        for i in left_delta..rlen {
          row[i] = reconstruct_sub(row[i], row[i - left_delta]);
        }
      }
      2 => {
        // Up has no effect on the first row.
        if y > 0 {
          for i in 0..rlen {
            row[i] = reconstruct_up(row[i], prev[i]);
          }
        }
      }
      3 => {
        for i in 0..rlen {
          let a = if i >= left_delta { row[i - left_delta] } else { 0 };
          let b = if y > 0 { prev[i] } else { 0 };
          row[i] = reconstruct_average(row[i], a, b);
        }
      }
      4 => {
        for i in 0..rlen {
          let a = if i >= left_delta { row[i - left_delta] } else { 0 };
          let (b, c) = if y > 0 {
            (prev[i], if i >= left_delta { prev[i - left_delta] } else { 0 })
          } else {
            (0, 0)
          };
          row[i] = reconstruct_paeth(row[i], a, b, c);
        }
      }
      _ => return Err(PngOptError::Malformed("bad predictor")),
    }
  }
  Ok(())
}

/// Decodes a PNG byte stream into a fully populated [`Image`].
///
/// Accepts color types 0/2/3 at bit depths 1/2/4/8, filter method 0
/// (standard) and the filter-method-1 extension (raw rows, no per-row filter
/// byte). Every chunk's CRC is verified. When `force_bpc8` is set, the pixel
/// buffer is upconverted to 8 bits per component before returning.
pub fn read_png(bytes: &[u8], force_bpc8: bool) -> PngOptResult<Image> {
  if !is_png_signature_correct(bytes) {
    return Err(PngOptError::Malformed("not a png file"));
  }
  let mut chunks = PngRawChunkIter::new(bytes);
  let first = chunks.next().ok_or(PngOptError::Malformed("truncated png"))?;
  if first.tag != PngChunkTag::IHDR {
    return Err(PngOptError::Malformed("first chunk is not ihdr"));
  }
  first.check_crc()?;
  let ihdr = parse_ihdr(first.data)?;
  let mut image = Image::new(ihdr.width, ihdr.height, ihdr.bpc, ihdr.color_type)?;

  let mut palette: Option<Vec<RGB8>> = None;
  let mut idats: Vec<&[u8]> = Vec::new();
  let mut saw_iend = false;
  for chunk in chunks {
    chunk.check_crc()?;
    match chunk.tag {
      PngChunkTag::IHDR => return Err(PngOptError::Malformed("duplicate ihdr")),
      PngChunkTag::PLTE => {
        if !idats.is_empty() {
          return Err(PngOptError::Malformed("plte after idat"));
        }
        if palette.is_some() {
          return Err(PngOptError::Malformed("duplicate plte"));
        }
        if ihdr.color_type == ColorType::Gray {
          return Err(PngOptError::Malformed("unexpected palette"));
        }
        palette = Some(parse_plte(chunk.data, ihdr.bpc)?);
      }
      PngChunkTag::IDAT => idats.push(chunk.data),
      PngChunkTag::IEND => {
        saw_iend = true;
        break;
      }
      _ => (),
    }
  }
  if !saw_iend {
    return Err(PngOptError::Malformed("truncated png"));
  }
  if idats.is_empty() {
    return Err(PngOptError::Malformed("missing image data"));
  }
  if ihdr.color_type == ColorType::Indexed {
    image.palette = palette.ok_or(PngOptError::Malformed("missing palette"))?;
  }

  let rlen = image.row_length();
  let line = if ihdr.filter_method == FILTER_METHOD_STANDARD { add_check(rlen, 1)? } else { rlen };
  let total = multiply_check(line, ihdr.height)? as usize;
  let mut inflated: Vec<u8> = Vec::new();
  inflated.try_reserve(total)?;
  inflated.resize(total, 0);
  inflate_idat_into(&mut inflated, idats.iter().copied())?;

  if ihdr.filter_method == FILTER_METHOD_STANDARD {
    let left_delta = ((ihdr.bpc as u32 * image.cpp() + 7) >> 3) as usize;
    unfilter_rows(&mut inflated, rlen as usize, ihdr.height as usize, left_delta)?;
    for (dst, src) in
      image.pixels.chunks_exact_mut(rlen as usize).zip(inflated.chunks_exact(line as usize))
    {
      dst.copy_from_slice(&src[1..]);
    }
  } else {
    // Raw mode: the inflated stream is the whole pixel area.
    image.pixels.copy_from_slice(&inflated);
  }
  image.mask_trailing_bits();
  image.check_palette()?;
  if force_bpc8 {
    image.convert_to_bpc(8)?;
  }
  Ok(image)
}
