//! The PNG codec: chunk framing, IHDR/PLTE/IDAT/IEND, CRC-32, the zlib
//! stream, and the five row predictors on both paths.
//!
//! The general format of a PNG is an 8-byte signature followed by "chunks".
//! This crate consumes and produces the four critical chunk types only:
//!
//! * **IHDR** — dimensions, bit depth, color type, and the filter method.
//! * **PLTE** — the palette for indexed-color images.
//! * **IDAT** — the pixel area as one zlib stream (possibly split across
//!   several chunks on read; always a single chunk on write).
//! * **IEND** — end of stream.
//!
//! Ancillary chunks are CRC-checked and skipped on read, never written.
//!
//! Two deviations from stock PNG, both opt-in via the "extended" flag:
//!
//! * filter method 1 ("raw rows"): the pixel area is deflated with no
//!   per-row filter byte and no prediction. The reader always accepts it;
//!   the writer only emits it in extended mode.
//! * filter method 2 is reserved for a TIFF-style predictor and rejected in
//!   both directions.
//!
//! Reading is all-in-memory over a byte slice; writing streams into any
//! `Write + Seek` sink (seekable because the IDAT length is patched after
//! the deflate stream closes).

mod crc32;
pub(crate) use crc32::*;

mod raw_chunk;
pub use raw_chunk::*;

mod reader;
pub use reader::*;

mod writer;
pub use writer::*;

/// The first eight bytes of a PNG datastream.
pub const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Standard PNG filter method: one filter byte per row.
pub(crate) const FILTER_METHOD_STANDARD: u8 = 0;
/// Extension filter method: raw rows, no per-row filter byte.
pub(crate) const FILTER_METHOD_RAW: u8 = 1;

/// Row prediction strategies the writer can be asked for.
///
/// Only [`PngAuto`](Predictor::PngAuto) and [`PngNone`](Predictor::PngNone)
/// produce stock PNG; the rest either resolve to one of those or require the
/// extended mode. See [`write_png`] for the resolution rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Predictor {
  /// Raw rows with no per-row filter byte (filter method 1, extended only).
  None,
  /// TIFF predictor 2. Reserved, always rejected.
  Tiff2,
  /// Filter method 0 with the None filter on every row.
  PngNone,
  /// Filter method 0 with a per-row filter chosen by the row-sum heuristic.
  PngAuto,
  /// The historical libpng heuristic: [`PngAuto`](Predictor::PngAuto) for
  /// 8-bit gray/RGB images, [`None`](Predictor::None) otherwise.
  #[default]
  Smart,
}

/// Checks if the initial 8 bytes of `bytes` are the PNG signature.
#[inline]
#[must_use]
pub const fn is_png_signature_correct(bytes: &[u8]) -> bool {
  matches!(bytes, [137, 80, 78, 71, 13, 10, 26, 10, ..])
}
