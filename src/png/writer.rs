//! PNG encoding from an [`Image`].

use std::io::{Seek, SeekFrom, Write};

use log::debug;
use miniz_oxide::deflate::core::{
  compress, create_comp_flags_from_zip_params, CompressorOxide, TDEFLFlush, TDEFLStatus,
};

use super::{Crc32, Predictor, FILTER_METHOD_RAW, FILTER_METHOD_STANDARD, PNG_SIGNATURE};
use crate::filtering::{filter_average, filter_paeth, filter_sub, filter_up};
use crate::util::{add_check, put_u32_be};
use crate::{ColorType, Image, PngOptError, PngOptResult};

/// Knobs for [`write_png`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WritePngOptions {
  /// Allow non-standard output (filter method 1 / sub-8-bit RGB).
  pub is_extended: bool,
  /// Requested row prediction strategy; see [`Predictor`] for how it
  /// resolves.
  pub predictor: Predictor,
  /// Deflate level, 0..=9.
  pub level: u8,
}
impl Default for WritePngOptions {
  #[inline]
  fn default() -> Self {
    Self { is_extended: false, predictor: Predictor::Smart, level: 9 }
  }
}

/// What a [`Predictor`] request actually turns into for a given image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResolvedPredictor {
  /// Filter method 1: raw rows, no per-row filter byte.
  Raw,
  /// Filter method 0, every row uses filter 0.
  PngNone,
  /// Filter method 0, per-row filter by row-sum heuristic.
  PngAuto,
}

fn resolve_predictor(
  predictor: Predictor, image: &Image, is_extended: bool,
) -> PngOptResult<ResolvedPredictor> {
  let requested = match predictor {
    Predictor::Tiff2 => return Err(PngOptError::Unsupported("tiff2 predictor not supported")),
    Predictor::Smart => {
      // The historical libpng heuristic: adaptive filtering only pays off on
      // 8-bit direct-color data.
      if image.bpc == 8 && matches!(image.color_type, ColorType::Gray | ColorType::Rgb) {
        Predictor::PngAuto
      } else {
        Predictor::None
      }
    }
    p => p,
  };
  Ok(match requested {
    Predictor::PngAuto => ResolvedPredictor::PngAuto,
    Predictor::None if is_extended => ResolvedPredictor::Raw,
    // Standard mode must stay valid PNG, so everything else becomes a plain
    // filter-0 stream.
    _ => ResolvedPredictor::PngNone,
  })
}

fn write_chunk<W: Write>(sink: &mut W, tag: [u8; 4], payload: &[u8]) -> PngOptResult<()> {
  sink.write_all(&(payload.len() as u32).to_be_bytes())?;
  sink.write_all(&tag)?;
  sink.write_all(payload)?;
  let mut crc = Crc32::new();
  crc.update(&tag);
  crc.update(payload);
  sink.write_all(&crc.finish().to_be_bytes())?;
  Ok(())
}

/// Streams the IDAT payload: rows go in, deflated bytes go out to the sink
/// while the chunk CRC and payload size accumulate.
///
/// The zlib wrapper writes the adler32 trailer on its own at stream end.
struct IdatSink<'w, W: Write> {
  sink: &'w mut W,
  compressor: Box<CompressorOxide>,
  crc: Crc32,
  size: u32,
  buf: Vec<u8>,
}
impl<'w, W: Write> IdatSink<'w, W> {
  fn new(sink: &'w mut W, level: u8) -> Self {
    let flags = create_comp_flags_from_zip_params(level as i32, 15, 0);
    let mut crc = Crc32::new();
    crc.update(b"IDAT");
    Self {
      sink,
      compressor: Box::new(CompressorOxide::new(flags)),
      crc,
      size: 0,
      buf: vec![0; 32 * 1024],
    }
  }

  fn feed(&mut self, mut data: &[u8]) -> PngOptResult<()> {
    while !data.is_empty() {
      let (status, consumed, produced) =
        compress(&mut self.compressor, data, &mut self.buf, TDEFLFlush::None);
      self.emit(produced)?;
      match status {
        TDEFLStatus::Okay | TDEFLStatus::Done => (),
        _ => return Err(PngOptError::Deflate("deflate stream failure")),
      }
      data = &data[consumed..];
    }
    Ok(())
  }

  /// Flushes the stream closed; returns the payload size and chunk CRC.
  fn finish(mut self) -> PngOptResult<(u32, u32)> {
    loop {
      let (status, _consumed, produced) =
        compress(&mut self.compressor, &[], &mut self.buf, TDEFLFlush::Finish);
      self.emit(produced)?;
      match status {
        TDEFLStatus::Done => return Ok((self.size, self.crc.finish())),
        TDEFLStatus::Okay => (),
        _ => return Err(PngOptError::Deflate("deflate stream failure")),
      }
    }
  }

  fn emit(&mut self, produced: usize) -> PngOptResult<()> {
    if produced > 0 {
      let out = &self.buf[..produced];
      self.sink.write_all(out)?;
      self.crc.update(out);
      self.size = add_check(self.size, produced as u32)?;
    }
    Ok(())
  }
}

/// Filters every row through all five candidates and feeds the one with the
/// smallest sum of absolute signed byte values, ties to the lowest filter id.
///
/// The scratch layout matches the classic encoder: five `row_length + 1`
/// candidate slots (filter byte + filtered row) followed by one slot holding
/// the previous raw row. Trailing padding bits are fed unmasked: the padding
/// byte is a valid sample of the current row, and masking it would perturb
/// the Sub/Paeth prediction of the next row.
fn feed_auto_filtered<W: Write>(idat: &mut IdatSink<'_, W>, image: &Image) -> PngOptResult<()> {
  let rlen = image.row_length() as usize;
  let line = rlen + 1;
  let left_delta = ((image.bpc as u32 * image.cpp() + 7) >> 3) as usize;
  let mut scratch: Vec<u8> = Vec::new();
  scratch.try_reserve(line * 6)?;
  scratch.resize(line * 6, 0);
  let (candidates, prev) = scratch.split_at_mut(line * 5);
  for (filter_id, slot) in candidates.chunks_exact_mut(line).enumerate() {
    slot[0] = filter_id as u8;
  }
  // prev is all zeros here, which is exactly the "row above the first row".
  for row in image.rows() {
    {
      let (none_slot, rest) = candidates.split_at_mut(line);
      let (sub_slot, rest) = rest.split_at_mut(line);
      let (up_slot, rest) = rest.split_at_mut(line);
      let (avg_slot, paeth_slot) = rest.split_at_mut(line);
      none_slot[1..].copy_from_slice(row);
      let raw = &none_slot[1..];
      let sub = &mut sub_slot[1..];
      let up = &mut up_slot[1..];
      let avg = &mut avg_slot[1..];
      let paeth = &mut paeth_slot[1..];
      for i in 0..rlen {
        let v = raw[i];
        let vpr = prev[i + 1];
        if i < left_delta {
          sub[i] = v;
          up[i] = filter_up(v, vpr);
          avg[i] = filter_average(v, 0, vpr);
          // Same as v - paeth_predictor(0, vpr, 0).
          paeth[i] = filter_up(v, vpr);
        } else {
          let vpc = raw[i - left_delta];
          sub[i] = filter_sub(v, vpc);
          up[i] = filter_up(v, vpr);
          avg[i] = filter_average(v, vpc, vpr);
          paeth[i] = filter_paeth(v, vpc, vpr, prev[i + 1 - left_delta]);
        }
      }
      prev[1..].copy_from_slice(raw);
    }
    let mut best = 0_usize;
    let mut best_sum = u32::MAX;
    for (filter_id, slot) in candidates.chunks_exact(line).enumerate() {
      let sum: u32 = slot[1..].iter().map(|&b| (b as i8).unsigned_abs() as u32).sum();
      if sum < best_sum {
        best_sum = sum;
        best = filter_id;
      }
    }
    idat.feed(&candidates[best * line..][..line])?;
  }
  Ok(())
}

/// Encodes `image` as a PNG stream: signature, IHDR, PLTE (indexed only),
/// one IDAT, IEND.
///
/// The IDAT length field is written as zero and patched afterwards by
/// seeking back, which is why the sink must be seekable; the sink position
/// is restored to the end of the stream before returning.
pub fn write_png<W: Write + Seek>(
  sink: &mut W, image: &Image, opts: &WritePngOptions,
) -> PngOptResult<()> {
  if opts.level > 9 {
    return Err(PngOptError::Unsupported("bad deflate level"));
  }
  image.check_palette()?;
  let resolved = resolve_predictor(opts.predictor, image, opts.is_extended)?;
  debug!("writing png with predictor {resolved:?}, level {}", opts.level);
  let rlen = image.row_length();
  if rlen >> 24 != 0 {
    // The per-row sum of the auto filter must fit in 32 bits.
    return Err(PngOptError::Unsupported("image row too large"));
  }
  let filter_method = match resolved {
    ResolvedPredictor::Raw => FILTER_METHOD_RAW,
    _ => FILTER_METHOD_STANDARD,
  };

  sink.write_all(&PNG_SIGNATURE)?;
  let mut ihdr = [0_u8; 13];
  put_u32_be(&mut ihdr[0..], image.width);
  put_u32_be(&mut ihdr[4..], image.height);
  ihdr[8] = image.bpc;
  ihdr[9] = image.color_type as u8;
  ihdr[10] = 0;
  ihdr[11] = filter_method;
  ihdr[12] = 0;
  write_chunk(sink, *b"IHDR", &ihdr)?;
  if image.color_type == ColorType::Indexed {
    write_chunk(sink, *b"PLTE", image.palette_bytes())?;
  }

  let idat_len_pos = sink.stream_position()?;
  sink.write_all(&0_u32.to_be_bytes())?;
  sink.write_all(b"IDAT")?;
  let mut idat = IdatSink::new(sink, opts.level);
  match resolved {
    ResolvedPredictor::Raw => {
      for row in image.rows() {
        idat.feed(row)?;
      }
    }
    ResolvedPredictor::PngNone => {
      for row in image.rows() {
        idat.feed(&[0])?;
        idat.feed(row)?;
      }
    }
    ResolvedPredictor::PngAuto => feed_auto_filtered(&mut idat, image)?,
  }
  let (size, crc) = idat.finish()?;
  sink.write_all(&crc.to_be_bytes())?;
  write_chunk(sink, *b"IEND", &[])?;

  let end_pos = sink.stream_position()?;
  sink.seek(SeekFrom::Start(idat_len_pos))?;
  sink.write_all(&size.to_be_bytes())?;
  sink.seek(SeekFrom::Start(end_pos))?;
  Ok(())
}
