use std::io::Cursor;

use pngopt::png::PngRawChunkIter;
use pngopt::{
  chess_fixture, optimize_for_png, read_png, squares_fixture, write_png, ColorType, Image,
  PngOptError, Predictor, WritePngOptions,
};

fn encode(image: &Image, opts: &WritePngOptions) -> Vec<u8> {
  let mut sink = Cursor::new(Vec::new());
  write_png(&mut sink, image, opts).unwrap();
  sink.into_inner()
}

fn assert_round_trip(image: &Image, opts: &WritePngOptions) {
  let bytes = encode(image, opts);
  let back = read_png(&bytes, false).unwrap();
  assert_eq!(&back, image, "round trip with {opts:?}");
}

/// A deterministic but busy pixel pattern.
fn patterned(image: &mut Image) {
  for (i, px) in image.pixels.iter_mut().enumerate() {
    *px = (i as u32).wrapping_mul(0x9E37).wrapping_shr(3) as u8;
  }
  image.mask_trailing_bits();
}

fn test_palette(entries: u8) -> Vec<pngopt::pixel_formats::RGB8> {
  (0..entries).map(|v| pngopt::pixel_formats::RGB8 { r: v, g: v.wrapping_mul(3), b: v }).collect()
}

#[test]
fn round_trips_every_color_type_and_depth() {
  for bpc in [1_u8, 2, 4, 8] {
    let mut gray = Image::new(13, 7, bpc, ColorType::Gray).unwrap();
    patterned(&mut gray);
    assert_round_trip(&gray, &WritePngOptions::default());

    let mut indexed = Image::new(13, 7, bpc, ColorType::Indexed).unwrap();
    indexed.palette = test_palette(1_u8 << bpc.min(4));
    patterned(&mut indexed);
    if bpc == 8 {
      // Keep every index inside the 16-entry palette.
      for px in &mut indexed.pixels {
        *px &= 0x0F;
      }
    }
    assert_round_trip(&indexed, &WritePngOptions::default());
  }
  let mut rgb = Image::new(13, 7, 8, ColorType::Rgb).unwrap();
  patterned(&mut rgb);
  assert_round_trip(&rgb, &WritePngOptions::default());
}

#[test]
fn round_trips_every_predictor_mode() {
  let mut rgb = Image::new(29, 11, 8, ColorType::Rgb).unwrap();
  patterned(&mut rgb);
  for predictor in [Predictor::PngNone, Predictor::PngAuto, Predictor::Smart] {
    assert_round_trip(&rgb, &WritePngOptions { predictor, ..Default::default() });
    assert_round_trip(&rgb, &WritePngOptions { predictor, is_extended: true, ..Default::default() });
  }
  assert_round_trip(
    &rgb,
    &WritePngOptions { predictor: Predictor::None, is_extended: true, ..Default::default() },
  );
  // In standard mode a raw-rows request degrades to valid PNG.
  assert_round_trip(
    &rgb,
    &WritePngOptions { predictor: Predictor::None, ..Default::default() },
  );
}

#[test]
fn round_trips_across_deflate_levels() {
  let mut gray = Image::new(40, 5, 8, ColorType::Gray).unwrap();
  patterned(&mut gray);
  for level in [0_u8, 1, 6, 9] {
    assert_round_trip(&gray, &WritePngOptions { level, ..Default::default() });
  }
}

#[test]
fn extended_sub_byte_rgb_round_trips() {
  let mut squares = squares_fixture().unwrap();
  squares.convert_to_bpc(1).unwrap();
  assert_eq!((squares.color_type, squares.bpc), (ColorType::Rgb, 1));
  assert_round_trip(
    &squares,
    &WritePngOptions { is_extended: true, predictor: Predictor::None, ..Default::default() },
  );
  assert_round_trip(&squares, &WritePngOptions { is_extended: true, ..Default::default() });
}

#[test]
fn optimized_fixture_recovers_the_original_pixels() {
  // Invariant: optimize, encode, decode, convert back to rgb8, compare.
  for (fixture, extended) in
    [(chess_fixture().unwrap(), false), (squares_fixture().unwrap(), false)]
  {
    let mut rgb_reference = fixture.clone();
    rgb_reference.convert_to_rgb().unwrap();
    let mut optimized = fixture;
    optimize_for_png(&mut optimized, false, extended).unwrap();
    let bytes =
      encode(&optimized, &WritePngOptions { is_extended: extended, ..Default::default() });
    let mut back = read_png(&bytes, false).unwrap();
    back.convert_to_bpc(8).unwrap();
    back.convert_to_rgb().unwrap();
    assert_eq!(back.pixels, rgb_reference.pixels);
  }
}

#[test]
fn every_written_chunk_carries_a_valid_crc() {
  let chess = chess_fixture().unwrap();
  let bytes = encode(&chess, &WritePngOptions::default());
  let mut count = 0;
  for chunk in PngRawChunkIter::new(&bytes) {
    chunk.check_crc().unwrap();
    count += 1;
  }
  // IHDR, IDAT, IEND; nothing else for a gray image, and the patched IDAT
  // length means the iterator sees all three.
  assert_eq!(count, 3);
}

#[test]
fn corrupted_streams_are_rejected() {
  let chess = chess_fixture().unwrap();
  let bytes = encode(&chess, &WritePngOptions::default());
  // Flip one IDAT payload byte: the chunk CRC no longer matches.
  let mut corrupt = bytes.clone();
  let at = corrupt.len() - 20;
  corrupt[at] ^= 0xFF;
  assert_eq!(read_png(&corrupt, false), Err(PngOptError::Malformed("chunk crc mismatch")));
  // Cut the stream before IEND.
  let truncated = &bytes[..bytes.len() - 12];
  assert_eq!(read_png(truncated, false), Err(PngOptError::Malformed("truncated png")));
  // Lose the signature.
  assert!(read_png(&bytes[1..], false).is_err());
}

#[test]
fn force_bpc8_upconverts_after_decode() {
  let mut gray1 = Image::new(9, 3, 1, ColorType::Gray).unwrap();
  patterned(&mut gray1);
  let bytes = encode(&gray1, &WritePngOptions::default());
  let back = read_png(&bytes, true).unwrap();
  assert_eq!(back.bpc, 8);
  let mut expanded = gray1.clone();
  expanded.convert_to_bpc(8).unwrap();
  assert_eq!(back, expanded);
}
