#![forbid(unsafe_code)]

//! Lossless raster image size optimizer.
//!
//! `pngopt` reads a PNG or binary PNM image and rewrites it as the smallest
//! PNG that reproduces the pixel stream byte-exactly. "Smallest" is searched
//! along three axes:
//!
//! * the color model (gray, indexed palette, or RGB),
//! * the bit depth (1, 2, 4, or 8 bits per component),
//! * the per-row prediction filter (None/Sub/Up/Average/Paeth, chosen per
//!   row by a signed-byte row-sum heuristic).
//!
//! The main pipeline is [`read_png`] (or [`netpbm_read`]) →
//! [`optimize_for_png`] → [`write_png`]. All stages operate on the [`Image`]
//! container, which owns its pixel buffer and palette exclusively.
//!
//! Everything is single threaded and synchronous: a file is read, processed,
//! and written within one call chain. The writer needs a seekable sink
//! because it patches the IDAT chunk length after the deflate stream closes.
//!
//! In standard mode the output is always valid PNG. With the extended flag
//! the writer may also emit filter method 1 ("raw rows", no per-row filter
//! byte), which the reader accepts as well.

mod analyze;
pub use analyze::*;

mod convert;
pub use convert::*;

mod filtering;
pub use filtering::*;

mod fixtures;
pub use fixtures::*;

mod image;
pub use image::*;

mod netpbm;
pub use netpbm::*;

mod optimize;
pub use optimize::*;

mod palette;
pub use palette::*;

pub mod pixel_formats;

pub mod png;
pub use png::{read_png, write_png, Predictor, WritePngOptions};

mod util;

pub type PngOptResult<T> = Result<T, PngOptError>;

/// An error from the `pngopt` crate.
///
/// Every variant is fatal to the operation that returned it; recoverable
/// conditions (a bad adler32 after the pixel area is complete, a short or
/// over-long inflate stream) are logged as warnings instead and never appear
/// here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum PngOptError {
  /// Checked 32-bit arithmetic would overflow (image dimensions, palette
  /// sizes, row budgets).
  IntegerOverflow,

  /// The allocator couldn't give us enough space.
  Alloc,

  /// The input bytes don't form an image we can process.
  Malformed(&'static str),

  /// The input is fine, but the requested operation can't be performed
  /// losslessly (or at all) on it.
  Unsupported(&'static str),

  /// The compression engine reported a failure while producing output.
  Deflate(&'static str),

  /// Underlying file I/O failed.
  Io(std::io::ErrorKind),

  /// A `--regression-test` check didn't hold.
  RegressionFailed(&'static str),
}
impl core::fmt::Display for PngOptError {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    match self {
      PngOptError::IntegerOverflow => write!(f, "integer overflow"),
      PngOptError::Alloc => write!(f, "out of memory"),
      PngOptError::Malformed(msg) => write!(f, "{msg}"),
      PngOptError::Unsupported(msg) => write!(f, "{msg}"),
      PngOptError::Deflate(msg) => write!(f, "{msg}"),
      PngOptError::Io(kind) => write!(f, "i/o error: {kind}"),
      PngOptError::RegressionFailed(msg) => write!(f, "regression test failed: {msg}"),
    }
  }
}
impl std::error::Error for PngOptError {}
impl From<std::collections::TryReserveError> for PngOptError {
  #[inline]
  fn from(_: std::collections::TryReserveError) -> Self {
    Self::Alloc
  }
}
impl From<std::io::Error> for PngOptError {
  #[inline]
  fn from(e: std::io::Error) -> Self {
    Self::Io(e.kind())
  }
}

/// Decodes an image of either supported input format, sniffed by content:
/// the PNG signature, or a binary PNM `P` magic.
pub fn read_image(bytes: &[u8], force_bpc8: bool) -> PngOptResult<Image> {
  if png::is_png_signature_correct(bytes) {
    read_png(bytes, force_bpc8)
  } else if bytes.first() == Some(&b'P') {
    let mut image = netpbm_read(bytes)?;
    if force_bpc8 {
      image.convert_to_bpc(8)?;
    }
    Ok(image)
  } else {
    Err(PngOptError::Malformed("unknown input image format"))
  }
}
