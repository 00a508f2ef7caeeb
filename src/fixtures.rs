//! In-memory test images and the CLI `--regression-test` mode.

use std::io::Cursor;

use crate::pixel_formats::RGB8;
use crate::png::{read_png, write_png, PngRawChunkIter, Predictor, WritePngOptions};
use crate::{optimize_for_png, ColorType, Image, PngOptError, PngOptResult};

/// A 91×84 two-level grayscale chess board with a border, the classic
/// regression image.
pub fn chess_fixture() -> PngOptResult<Image> {
  let (width, height) = (91_u32, 84_u32);
  let mut image = Image::new(width, height, 8, ColorType::Gray)?;
  for y in 0..height {
    for x in 0..width {
      let on = (x == 1 || x == 82 || y == 1 || y == 82)
        || ((2..82).contains(&x) && (2..82).contains(&y) && ((x + 8) / 10 + (y + 8) / 10) % 2 != 0);
      image.pixels[(y * width + x) as usize] = if on { 0xFF } else { 0x00 };
    }
  }
  Ok(image)
}

/// A 91×84 four-color block pattern whose colors have 1-bit components but
/// are not all gray.
pub fn squares_fixture() -> PngOptResult<Image> {
  const COLORS: [[u8; 3]; 4] = [[0, 0, 0], [255, 0, 0], [0, 255, 0], [255, 255, 0]];
  let (width, height) = (91_u32, 84_u32);
  let mut image = Image::new(width, height, 8, ColorType::Rgb)?;
  for y in 0..height {
    for x in 0..width {
      let color = COLORS[((x / 10 + y / 10) % 4) as usize];
      let at = ((y * width + x) * 3) as usize;
      image.pixels[at..at + 3].copy_from_slice(&color);
    }
  }
  Ok(image)
}

fn check(cond: bool, msg: &'static str) -> PngOptResult<()> {
  if cond {
    Ok(())
  } else {
    Err(PngOptError::RegressionFailed(msg))
  }
}

fn encode(image: &Image, opts: &WritePngOptions) -> PngOptResult<Vec<u8>> {
  let mut sink = Cursor::new(Vec::new());
  write_png(&mut sink, image, opts)?;
  Ok(sink.into_inner())
}

/// Writes with the given options, reads back, and compares everything that
/// must survive: geometry, color model, depth, palette, pixels.
fn round_trip(image: &Image, opts: &WritePngOptions) -> PngOptResult<()> {
  let bytes = encode(image, opts)?;
  let back = read_png(&bytes, false)?;
  check(back == *image, "png round trip changed the image")
}

/// The IDAT payload of an encoded PNG, inflated.
fn inflated_idat(bytes: &[u8]) -> PngOptResult<Vec<u8>> {
  let mut idat = Vec::new();
  for chunk in PngRawChunkIter::new(bytes) {
    if chunk.tag.0 == *b"IDAT" {
      idat.extend_from_slice(chunk.data);
    }
  }
  miniz_oxide::inflate::decompress_to_vec_zlib(&idat)
    .map_err(|_| PngOptError::RegressionFailed("idat does not inflate"))
}

/// Runs the built-in scenario checks. Any failure is fatal to the caller.
pub fn run_regression() -> PngOptResult<()> {
  // Chess: two gray levels, picks gray at 1 bit, survives a round trip.
  let chess = chess_fixture()?;
  check(chess.color_count() == 2, "chess color count");
  check(chess.is_gray_ok(), "chess gray check");
  check(chess.min_rgb_bpc() == 1, "chess min rgb bpc");
  let mut optimized = chess.clone();
  optimize_for_png(&mut optimized, false, false)?;
  check(
    optimized.color_type == ColorType::Gray && optimized.bpc == 1,
    "chess optimized form",
  );
  round_trip(&optimized, &WritePngOptions::default())?;
  round_trip(&chess, &WritePngOptions { predictor: Predictor::PngAuto, ..Default::default() })?;

  // Squares: four non-gray 1-bit-component colors. A 2-bit indexed row is
  // smaller than a 1-bit RGB row, so the decision table lands on indexed in
  // both modes.
  let squares = squares_fixture()?;
  check(squares.color_count() == 4, "squares color count");
  check(!squares.is_gray_ok(), "squares gray check");
  check(squares.min_rgb_bpc() == 1, "squares min rgb bpc");
  for is_extended in [false, true] {
    let mut optimized = squares.clone();
    optimize_for_png(&mut optimized, false, is_extended)?;
    check(
      optimized.color_type == ColorType::Indexed && optimized.bpc == 2,
      "squares optimized form",
    );
    check(optimized.palette.len() == 4, "squares palette size");
    round_trip(&optimized, &WritePngOptions::default())?;
  }
  // With a fifth color the palette rows stop paying off at 2 bits and the
  // extended 1-bit RGB form wins.
  let mut five = squares_fixture()?;
  five.pixels[0..3].copy_from_slice(&[0, 255, 255]);
  check(five.color_count() == 5, "five color count");
  let mut extended = five.clone();
  optimize_for_png(&mut extended, false, true)?;
  check(extended.color_type == ColorType::Rgb && extended.bpc == 1, "five extended form");
  round_trip(
    &extended,
    &WritePngOptions { is_extended: true, predictor: Predictor::None, ..Default::default() },
  )?;
  let mut standard = five;
  optimize_for_png(&mut standard, false, false)?;
  check(
    standard.color_type == ColorType::Indexed && standard.bpc == 4,
    "five standard form",
  );
  round_trip(&standard, &WritePngOptions::default())?;

  // On a constant-color image the heuristic picks Sub for the first row
  // (only the leftmost byte survives) and Up (all zeros) for every row
  // after, so the filtered stream is almost entirely zero bytes.
  let mut constant = Image::new(100, 10, 8, ColorType::Gray)?;
  constant.pixels.fill(0x42);
  let bytes =
    encode(&constant, &WritePngOptions { predictor: Predictor::PngAuto, ..Default::default() })?;
  let raw = inflated_idat(&bytes)?;
  check(raw.len() == 101 * 10, "constant image idat size");
  for (y, line) in raw.chunks_exact(101).enumerate() {
    if y == 0 {
      check(line[0] == 1, "constant image first row filter");
      check(line[1] == 0x42, "constant image first row seed byte");
      check(line[2..].iter().all(|&b| b == 0), "constant image first row bytes");
    } else {
      check(line[0] == 2, "constant image row filter");
      check(line[1..].iter().all(|&b| b == 0), "constant image row bytes");
    }
  }
  let back = read_png(&bytes, false)?;
  check(back == constant, "constant image round trip");

  // An all-zeros image makes every filter produce the row itself, so the
  // tie-break lands on filter 0 for every row.
  let zeros = Image::new(100, 10, 8, ColorType::Gray)?;
  let bytes =
    encode(&zeros, &WritePngOptions { predictor: Predictor::PngAuto, ..Default::default() })?;
  let raw = inflated_idat(&bytes)?;
  check(raw.iter().all(|&b| b == 0), "all zero image filter choice");
  check(read_png(&bytes, false)? == zeros, "all zero image round trip");

  // A 2×2 checkerboard of extremes exercises the Paeth corner cases.
  let mut paeth = Image::new(2, 2, 8, ColorType::Rgb)?;
  paeth.pixels.copy_from_slice(&[0, 0, 0, 255, 255, 255, 255, 255, 255, 0, 0, 0]);
  round_trip(&paeth, &WritePngOptions { predictor: Predictor::PngAuto, ..Default::default() })?;

  // Raw-row (filter method 1) output decodes back losslessly.
  round_trip(
    &chess,
    &WritePngOptions { is_extended: true, predictor: Predictor::None, ..Default::default() },
  )?;

  // Palette normalization folds duplicate entries onto one index.
  let mut dup = Image::new(4, 1, 8, ColorType::Indexed)?;
  let green = RGB8 { r: 0, g: 255, b: 0 };
  dup.palette = vec![RGB8::default(); 64];
  dup.palette[0x10] = green;
  dup.palette[0x20] = green;
  dup.pixels.copy_from_slice(&[0x10, 0x20, 0x10, 0x20]);
  dup.normalize_palette()?;
  check(dup.palette == vec![green], "normalized palette entries");
  check(dup.pixels.iter().all(|&px| px == 0), "normalized palette indexes");

  Ok(())
}
