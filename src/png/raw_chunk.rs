//! Raw chunk framing: length, tag, payload, stored CRC.

use core::fmt::{Debug, Write};

use super::Crc32;
use crate::util::u32_be;
use crate::{PngOptError, PngOptResult};

/// A four-byte chunk tag, e.g. `IHDR`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub(crate) struct PngChunkTag(pub(crate) [u8; 4]);
impl PngChunkTag {
  pub const IHDR: Self = Self(*b"IHDR");
  pub const PLTE: Self = Self(*b"PLTE");
  pub const IDAT: Self = Self(*b"IDAT");
  pub const IEND: Self = Self(*b"IEND");
}
impl Debug for PngChunkTag {
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    for &b in self.0.iter() {
      f.write_char(b as char)?;
    }
    Ok(())
  }
}

/// An unparsed chunk from a PNG.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PngRawChunk<'b> {
  pub(crate) tag: PngChunkTag,
  pub(crate) data: &'b [u8],
  pub(crate) stored_crc: u32,
}
impl Debug for PngRawChunk<'_> {
  #[inline]
  fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    f.debug_struct("PngRawChunk")
      .field("tag", &self.tag)
      .field("len", &self.data.len())
      .field("stored_crc", &format_args!("{:08X}", self.stored_crc))
      .finish()
  }
}
impl PngRawChunk<'_> {
  /// CRC-32 over the chunk's tag and payload, which is what the stored
  /// value is supposed to match.
  #[inline]
  #[must_use]
  pub fn actual_crc(&self) -> u32 {
    let mut crc = Crc32::new();
    crc.update(&self.tag.0);
    crc.update(self.data);
    crc.finish()
  }

  /// Fails with `Malformed` when the stored CRC doesn't match the payload.
  #[inline]
  pub fn check_crc(&self) -> PngOptResult<()> {
    if self.actual_crc() == self.stored_crc {
      Ok(())
    } else {
      Err(PngOptError::Malformed("chunk crc mismatch"))
    }
  }
}

/// Splits `count` bytes off the front of `*bytes`, advancing it, or returns
/// `None` without advancing when not enough bytes remain.
fn split_front<'b>(bytes: &mut &'b [u8], count: usize) -> Option<&'b [u8]> {
  if count > bytes.len() {
    return None;
  }
  let (head, tail) = bytes.split_at(count);
  *bytes = tail;
  Some(head)
}

/// An iterator that produces successive raw chunks from PNG bytes.
///
/// Truncated trailing data simply ends the iteration; the reader decides
/// whether stopping before IEND is an error.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PngRawChunkIter<'b>(&'b [u8]);
impl<'b> PngRawChunkIter<'b> {
  /// Pass the full PNG bytes, the 8-byte signature is skipped automatically.
  #[inline]
  pub fn new(bytes: &'b [u8]) -> Self {
    Self(bytes.get(8..).unwrap_or(&[]))
  }
}
impl<'b> Iterator for PngRawChunkIter<'b> {
  type Item = PngRawChunk<'b>;
  fn next(&mut self) -> Option<Self::Item> {
    let rest = &mut self.0;
    let length = u32_be(split_front(rest, 4)?) as usize;
    let tag = PngChunkTag(split_front(rest, 4)?.try_into().ok()?);
    let data = split_front(rest, length)?;
    let stored_crc = u32_be(split_front(rest, 4)?);
    Some(PngRawChunk { tag, data, stored_crc })
  }
}
