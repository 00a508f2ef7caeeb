use std::path::Path;
use std::process::Command;

fn pngopt() -> Command {
  Command::new(env!("CARGO_BIN_EXE_pngopt"))
}

fn run(args: &[&str]) -> std::process::Output {
  pngopt().args(args).output().unwrap()
}

fn path_str(path: &Path) -> &str {
  path.to_str().unwrap()
}

#[test]
fn regression_mode_passes() {
  let out = run(&["--regression-test"]);
  assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
}

#[test]
fn pgm_to_png_to_pgm_is_lossless() {
  let dir = tempfile::tempdir().unwrap();
  let src = dir.path().join("in.pgm");
  let png = dir.path().join("mid.png");
  let back = dir.path().join("out.pgm");
  // A 4x2 graymap with two levels; the png step will squeeze it to 1 bit.
  let pgm: Vec<u8> =
    [b"P5 4 2 255\n".as_slice(), &[0, 255, 0, 255, 255, 0, 255, 0]].concat();
  std::fs::write(&src, &pgm).unwrap();

  let out = run(&[path_str(&src), path_str(&png)]);
  assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
  let out = run(&[path_str(&png), path_str(&back)]);
  assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
  assert_eq!(std::fs::read(&back).unwrap(), pgm);
}

#[test]
fn uppercase_extension_is_accepted() {
  let dir = tempfile::tempdir().unwrap();
  let src = dir.path().join("in.pgm");
  let png = dir.path().join("OUT.PNG");
  std::fs::write(&src, [b"P5 1 1 255\n".as_slice(), &[7]].concat()).unwrap();
  let out = run(&[path_str(&src), path_str(&png)]);
  assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
  let written = std::fs::read(&png).unwrap();
  assert!(written.starts_with(&[137, 80, 78, 71, 13, 10, 26, 10]));
}

#[test]
fn fatal_errors_exit_with_120() {
  let dir = tempfile::tempdir().unwrap();
  let missing = dir.path().join("nope.png");
  let out_png = dir.path().join("out.png");
  let out = run(&[path_str(&missing), path_str(&out_png)]);
  assert_eq!(out.status.code(), Some(120));
  assert!(String::from_utf8_lossy(&out.stderr).starts_with("fatal:"));

  // The reserved tiff2 predictor is a fatal request.
  let src = dir.path().join("in.pgm");
  std::fs::write(&src, [b"P5 1 1 255\n".as_slice(), &[7]].concat()).unwrap();
  let out = run(&["--predictor", "tiff2", path_str(&src), path_str(&out_png)]);
  assert_eq!(out.status.code(), Some(120));

  // Unknown output extensions are rejected before any work happens.
  let out = run(&[path_str(&src), path_str(&dir.path().join("out.gif"))]);
  assert_eq!(out.status.code(), Some(120));

  // force-gray on a colorful image fails.
  let ppm = dir.path().join("color.ppm");
  std::fs::write(&ppm, [b"P6 1 1 255\n".as_slice(), &[1, 2, 3]].concat()).unwrap();
  let out = run(&["--force-gray", path_str(&ppm), path_str(&out_png)]);
  assert_eq!(out.status.code(), Some(120));
}
