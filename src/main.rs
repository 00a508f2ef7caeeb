//! The `pngopt` command line tool.
//!
//! Reads one image (PNG or binary PNM, detected by content), optionally
//! optimizes it, and writes it in the format named by the output file
//! extension. Any fatal error prints a `fatal:` diagnostic and exits with
//! code 120.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};

use pngopt::{
  netpbm_write_p4, netpbm_write_p5, netpbm_write_p6, optimize_for_png, read_image, run_regression,
  write_png, ColorType, Image, PngOptError, PngOptResult, Predictor, WritePngOptions,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PredictorArg {
  /// Raw rows without filter bytes (extended output only).
  None,
  /// TIFF predictor 2 (reserved, always fails).
  Tiff2,
  /// Filter 0 on every row.
  Pngnone,
  /// Per-row filter by the row-sum heuristic.
  Pngauto,
  /// Pngauto for 8-bit gray/RGB, none otherwise.
  Smart,
}
impl From<PredictorArg> for Predictor {
  fn from(arg: PredictorArg) -> Self {
    match arg {
      PredictorArg::None => Predictor::None,
      PredictorArg::Tiff2 => Predictor::Tiff2,
      PredictorArg::Pngnone => Predictor::PngNone,
      PredictorArg::Pngauto => Predictor::PngAuto,
      PredictorArg::Smart => Predictor::Smart,
    }
  }
}

/// Losslessly optimize raster images into small PNG files.
#[derive(Debug, Parser)]
#[command(name = "pngopt", version)]
struct Args {
  /// Input image (PNG or binary PNM).
  #[arg(required_unless_present = "regression_test")]
  input: Option<PathBuf>,

  /// Output image; the format follows the extension
  /// (.png .ppm .pgm .pbm .pnm).
  #[arg(required_unless_present = "regression_test")]
  output: Option<PathBuf>,

  /// Allow extended (non-standard) PNG output for extra savings.
  #[arg(long)]
  extended: bool,

  /// Row predictor strategy for PNG output.
  #[arg(long, value_enum, default_value_t = PredictorArg::Smart)]
  predictor: PredictorArg,

  /// Fail unless the image can be written as grayscale.
  #[arg(long)]
  force_gray: bool,

  /// Deflate effort for PNG output.
  #[arg(long, default_value_t = 9, value_parser = clap::value_parser!(u8).range(0..=9))]
  level: u8,

  /// Run the built-in self checks instead of converting anything.
  #[arg(long)]
  regression_test: bool,
}

fn output_kind(path: &Path) -> PngOptResult<&'static str> {
  let ext = path
    .extension()
    .and_then(|e| e.to_str())
    .map(|e| e.to_ascii_lowercase())
    .ok_or(PngOptError::Unsupported("unknown output file extension"))?;
  match ext.as_str() {
    "png" => Ok("png"),
    "ppm" => Ok("ppm"),
    "pgm" => Ok("pgm"),
    "pbm" => Ok("pbm"),
    "pnm" => Ok("pnm"),
    _ => Err(PngOptError::Unsupported("unknown output file extension")),
  }
}

fn write_output(path: &Path, image: &mut Image, args: &Args) -> PngOptResult<()> {
  let kind = output_kind(path)?;
  let mut sink = BufWriter::new(File::create(path)?);
  match kind {
    "png" => {
      optimize_for_png(image, args.force_gray, args.extended)?;
      let opts = WritePngOptions {
        is_extended: args.extended,
        predictor: args.predictor.into(),
        level: args.level,
      };
      write_png(&mut sink, image, &opts)?;
    }
    "ppm" => {
      image.convert_to_bpc(8)?;
      image.convert_to_rgb()?;
      netpbm_write_p6(&mut sink, image)?;
    }
    "pgm" => {
      image.convert_to_bpc(8)?;
      image.convert_to_gray()?;
      netpbm_write_p5(&mut sink, image)?;
    }
    "pbm" => {
      image.convert_to_bpc(8)?;
      image.convert_to_gray()?;
      image.convert_to_bpc(1)?;
      netpbm_write_p4(&mut sink, image)?;
    }
    _ => {
      // .pnm: pick the closest binary Netpbm form for the pixels we have.
      if image.color_type == ColorType::Gray && image.bpc == 1 {
        netpbm_write_p4(&mut sink, image)?;
      } else {
        image.convert_to_bpc(8)?;
        if image.color_type == ColorType::Gray {
          netpbm_write_p5(&mut sink, image)?;
        } else {
          image.convert_to_rgb()?;
          netpbm_write_p6(&mut sink, image)?;
        }
      }
    }
  }
  sink.flush()?;
  Ok(())
}

fn run(args: &Args) -> PngOptResult<()> {
  if args.regression_test {
    return run_regression();
  }
  let (input, output) = match (&args.input, &args.output) {
    (Some(input), Some(output)) => (input, output),
    _ => return Err(PngOptError::Unsupported("input and output paths are required")),
  };
  let bytes = std::fs::read(input)?;
  let mut image = read_image(&bytes, false)?;
  write_output(output, &mut image, args)
}

fn main() {
  env_logger::init();
  let args = Args::parse();
  if let Err(e) = run(&args) {
    eprintln!("fatal: {e}");
    std::process::exit(120);
  }
}
