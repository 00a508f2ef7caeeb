//! CRC-32 (the PNG/zlib polynomial) over chunk tag + payload bytes.

/// The reflected CRC-32 polynomial shared by PNG and zlib.
const POLYNOMIAL: u32 = 0xEDB8_8320;

/// One table entry: the CRC contribution of a single input byte, i.e. eight
/// rounds of the shift-and-conditionally-xor step.
const fn table_entry(byte: u32) -> u32 {
  let mut value = byte;
  let mut round = 0;
  while round < 8 {
    value = if value & 1 == 0 { value >> 1 } else { (value >> 1) ^ POLYNOMIAL };
    round += 1;
  }
  value
}

const CRC_TABLE: [u32; 256] = {
  let mut table = [0_u32; 256];
  let mut byte = 0;
  while byte < 256 {
    table[byte] = table_entry(byte as u32);
    byte += 1;
  }
  table
};

/// A running CRC-32.
///
/// A chunk's CRC covers its 4-byte tag and then the payload, so the writer
/// seeds an accumulator with the tag and keeps updating it while the payload
/// streams out.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Crc32(u32);
impl Crc32 {
  #[inline]
  #[must_use]
  pub fn new() -> Self {
    Self(u32::MAX)
  }

  #[inline]
  pub fn update(&mut self, bytes: &[u8]) {
    let mut crc = self.0;
    for &byte in bytes {
      let i = (crc ^ u32::from(byte)) as u8 as usize;
      crc = CRC_TABLE[i] ^ (crc >> 8);
    }
    self.0 = crc;
  }

  #[inline]
  #[must_use]
  pub fn finish(self) -> u32 {
    self.0 ^ u32::MAX
  }
}

/// One-shot CRC-32 of a byte sequence.
#[inline]
#[must_use]
pub(crate) fn png_crc(bytes: &[u8]) -> u32 {
  let mut crc = Crc32::new();
  crc.update(bytes);
  crc.finish()
}
