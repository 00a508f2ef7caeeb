//! Palette construction via an open-addressing color hash, and palette
//! normalization.

use crate::pixel_formats::RGB8;
use crate::{ColorType, Image, PngOptError, PngOptResult};

/// Slot count of the hash table; prime, and comfortably larger than the 256
/// colors a palette can hold so probing stays short.
const SLOT_COUNT: usize = 1409;
/// Modulus for the probe step, `SLOT_COUNT - 1`.
const PROBE_MOD: u32 = 1408;
/// High-byte tag marking a slot occupied during the discovery phase, so that
/// color 0x000000 never looks like an empty slot.
const OCCUPIED_TAG: u32 = 1 << 24;

/// Accumulates distinct 24-bit colors, rejecting the 257th.
///
/// Linear probing with a step derived from the color itself: primary slot
/// `K mod 1409`, step `1 + (K mod 1408)` where `K = (r<<16)|(g<<8)|b`. The
/// step is nonzero and less than the prime slot count, so a probe sequence
/// visits every slot.
pub(crate) struct ColorTable {
  slots: Vec<u32>,
  /// Packed colors in insertion order.
  colors: Vec<u32>,
}
impl ColorTable {
  #[must_use]
  pub fn new() -> Self {
    Self { slots: vec![0; SLOT_COUNT], colors: Vec::new() }
  }

  /// The slot holding `k`, or the empty slot where `k` would go.
  fn probe(&self, k: u32) -> usize {
    let mut i = (k % SLOT_COUNT as u32) as usize;
    let step = (1 + (k % PROBE_MOD)) as usize;
    loop {
      let v = self.slots[i];
      if v == 0 || (v & 0x00FF_FFFF) == k {
        return i;
      }
      i = (i + step) % SLOT_COUNT;
    }
  }

  /// Records a color. Returns false when this would be the 257th distinct
  /// color (the table is left unchanged in that case).
  pub fn insert(&mut self, color: RGB8) -> bool {
    let k = color.packed();
    let i = self.probe(k);
    if self.slots[i] == 0 {
      if self.colors.len() == 256 {
        return false;
      }
      self.slots[i] = OCCUPIED_TAG | k;
      self.colors.push(k);
    }
    true
  }

  /// Number of distinct colors recorded so far.
  #[must_use]
  pub fn distinct(&self) -> usize {
    self.colors.len()
  }

  /// Sorts the recorded colors ascending and assigns each its palette index.
  ///
  /// The colors are distinct, so the unstable standard sort produces the
  /// same palette a stable one would.
  #[must_use]
  pub fn finish(mut self) -> PaletteMap {
    self.colors.sort_unstable();
    for (index, &k) in self.colors.iter().enumerate() {
      let i = self.probe(k);
      // Complementing the index keeps the high byte nonzero for index 0, and
      // index 255 can only belong to a color >= 255, so no occupied slot can
      // collapse to the empty value.
      self.slots[i] = ((255 - index as u32) << 24) | k;
    }
    PaletteMap { slots: self.slots, colors: self.colors }
  }
}

/// The result of [`ColorTable::finish`]: a sorted palette plus color→index
/// lookup.
pub(crate) struct PaletteMap {
  slots: Vec<u32>,
  colors: Vec<u32>,
}
impl PaletteMap {
  /// The palette in ascending packed-color order.
  #[must_use]
  pub fn palette(&self) -> Vec<RGB8> {
    self.colors.iter().map(|&k| RGB8::from_packed(k)).collect()
  }

  /// The palette index assigned to a color that was inserted into the table.
  #[must_use]
  pub fn index_of(&self, color: RGB8) -> u8 {
    let k = color.packed();
    let mut i = (k % SLOT_COUNT as u32) as usize;
    let step = (1 + (k % PROBE_MOD)) as usize;
    loop {
      let v = self.slots[i];
      if v == 0 {
        // Only reachable for colors that were never inserted.
        debug_assert!(false, "color {k:06X} missing from palette table");
        return 0;
      }
      if (v & 0x00FF_FFFF) == k {
        return 255 - (v >> 24) as u8;
      }
      i = (i + step) % SLOT_COUNT;
    }
  }
}

/// Builds a sorted palette from a `3·N`-byte RGB sample sequence, rewriting
/// the buffer in place to `N` palette index bytes.
///
/// Returns `None` (the "too many colors" sentinel) when the input holds more
/// than 256 distinct colors; the buffer is untouched in that case.
pub(crate) fn build_indexed(rgb: &mut Vec<u8>) -> Option<Vec<RGB8>> {
  let mut table = ColorTable::new();
  for chunk in rgb.chunks_exact(3) {
    if !table.insert(RGB8 { r: chunk[0], g: chunk[1], b: chunk[2] }) {
      return None;
    }
  }
  let map = table.finish();
  let count = rgb.len() / 3;
  for i in 0..count {
    let color = RGB8 { r: rgb[3 * i], g: rgb[3 * i + 1], b: rgb[3 * i + 2] };
    rgb[i] = map.index_of(color);
  }
  rgb.truncate(count);
  Some(map.palette())
}

impl Image {
  /// Shrinks the palette of an indexed image to exactly the distinct colors
  /// in use, sorted ascending, and remaps the pixel indexes accordingly.
  ///
  /// Requires bpc 8.
  pub fn normalize_palette(&mut self) -> PngOptResult<()> {
    debug_assert_eq!(self.bpc, 8);
    if self.color_type != ColorType::Indexed {
      return Err(PngOptError::Unsupported("not an indexed image"));
    }
    self.check_palette()?;
    let mut used = [false; 256];
    for &px in &self.pixels {
      used[px as usize] = true;
    }
    // Point every unused entry at a used color so it vanishes when the
    // builder deduplicates.
    let first_used = match self.palette.iter().enumerate().find(|&(i, _)| used[i]) {
      Some((i, _)) => self.palette[i],
      None => return Err(PngOptError::Malformed("palette index out of range")),
    };
    for (i, entry) in self.palette.iter_mut().enumerate() {
      if !used[i] {
        *entry = first_used;
      }
    }
    // The builder run over the palette bytes themselves yields the new
    // palette and, in the rewritten buffer, the old-index → new-index map.
    let mut map_bytes: Vec<u8> = Vec::new();
    map_bytes.try_reserve(self.palette.len() * 3)?;
    map_bytes.extend_from_slice(self.palette_bytes());
    let palette = match build_indexed(&mut map_bytes) {
      Some(palette) => palette,
      None => return Err(PngOptError::Unsupported("too many colors")),
    };
    for px in &mut self.pixels {
      *px = map_bytes[*px as usize];
    }
    self.palette = palette;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn builder_sorts_and_rewrites_in_place() {
    // Blue, black, red, blue again.
    let mut buf = vec![0, 0, 255, 0, 0, 0, 255, 0, 0, 0, 0, 255];
    let palette = build_indexed(&mut buf).unwrap();
    assert_eq!(
      palette,
      vec![
        RGB8 { r: 0, g: 0, b: 0 },
        RGB8 { r: 0, g: 0, b: 255 },
        RGB8 { r: 255, g: 0, b: 0 },
      ]
    );
    assert_eq!(buf, vec![1, 0, 2, 1]);
  }

  #[test]
  fn builder_handles_color_zero() {
    // Black hashes to slot 0 with step 1; the tag byte must keep it distinct
    // from an empty slot.
    let mut buf = vec![0, 0, 0, 0, 0, 0];
    let palette = build_indexed(&mut buf).unwrap();
    assert_eq!(palette, vec![RGB8 { r: 0, g: 0, b: 0 }]);
    assert_eq!(buf, vec![0, 0]);
  }

  #[test]
  fn builder_accepts_exactly_256_colors() {
    let mut buf: Vec<u8> = (0..=255_u8).flat_map(|v| [v, 0, 0]).collect();
    let palette = build_indexed(&mut buf).unwrap();
    assert_eq!(palette.len(), 256);
    // Sorted ascending by packed value means sorted by red channel here.
    assert_eq!(buf, (0..=255_u8).collect::<Vec<u8>>());
  }

  #[test]
  fn builder_signals_too_many_colors() {
    let mut buf: Vec<u8> = (0..257_u32).flat_map(|v| [(v >> 8) as u8, v as u8, 0]).collect();
    let before = buf.clone();
    assert!(build_indexed(&mut buf).is_none());
    assert_eq!(buf, before);
  }

  #[test]
  fn colliding_probe_sequences_stay_distinct() {
    // k and k + 1409·m share a primary slot; the per-color step still has to
    // separate them.
    let ks = [0_u32, 1409, 2818, 4227, 5636];
    let mut table = ColorTable::new();
    for &k in &ks {
      assert!(table.insert(RGB8::from_packed(k)));
    }
    assert_eq!(table.distinct(), ks.len());
    let map = table.finish();
    for (i, &k) in ks.iter().enumerate() {
      assert_eq!(map.index_of(RGB8::from_packed(k)), i as u8);
    }
  }

  #[test]
  fn normalize_collapses_duplicate_entries() {
    let mut img = Image::new(2, 1, 8, ColorType::Indexed).unwrap();
    let green = RGB8 { r: 0, g: 255, b: 0 };
    img.palette = vec![RGB8::default(); 64];
    img.palette[0x10] = green;
    img.palette[0x20] = green;
    img.pixels.copy_from_slice(&[0x10, 0x20]);
    img.normalize_palette().unwrap();
    assert_eq!(img.palette, vec![green]);
    assert_eq!(img.pixels, vec![0, 0]);
  }

  #[test]
  fn normalize_drops_unused_entries_even_entry_zero() {
    let mut img = Image::new(3, 1, 8, ColorType::Indexed).unwrap();
    img.palette = vec![
      RGB8 { r: 9, g: 9, b: 9 },
      RGB8 { r: 200, g: 0, b: 0 },
      RGB8 { r: 0, g: 0, b: 7 },
    ];
    img.pixels.copy_from_slice(&[1, 2, 1]);
    img.normalize_palette().unwrap();
    assert_eq!(
      img.palette,
      vec![RGB8 { r: 0, g: 0, b: 7 }, RGB8 { r: 200, g: 0, b: 0 }]
    );
    assert_eq!(img.pixels, vec![1, 0, 1]);
  }
}
