//! Survey file loaders.
//!
//! Parsers work on text so uploads and files on disk share one path; the
//! `load_*` wrappers only add the read. A malformed row never aborts a load:
//! it is counted, logged and skipped.

use crate::distortion::DistortionParams;
use crate::error::LoadError;
use crate::pose::{to_inverse_matrix, to_rotation, AxisConvention};
use crate::profile::{ProfileDistance, ProfileSet, ProfileTrack};
use crate::projection::CameraIntrinsics;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Rows that parsed, plus how many did not.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRows<T> {
    pub rows: Vec<T>,
    pub skipped: usize,
}

impl<T> ParsedRows<T> {
    fn map<U>(self, f: impl FnMut(T) -> U) -> ParsedRows<U> {
        ParsedRows {
            rows: self.rows.into_iter().map(f).collect(),
            skipped: self.skipped,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Separator {
    Comma,
    Whitespace,
}

impl Separator {
    fn split<'a>(&self, line: &'a str) -> Vec<&'a str> {
        match self {
            Separator::Comma => line.split(',').map(str::trim).collect(),
            Separator::Whitespace => line.split_whitespace().collect(),
        }
    }
}

/// Parses fixed-width numeric rows. Blank lines are ignored.
pub fn parse_rows(text: &str, separator: Separator, columns: usize) -> ParsedRows<Vec<f64>> {
    let mut rows = Vec::new();
    let mut skipped = 0;

    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let cells = separator.split(line);
        let parsed: Option<Vec<f64>> = if cells.len() == columns {
            cells.iter().map(|c| c.parse::<f64>().ok()).collect()
        } else {
            None
        };
        match parsed {
            Some(row) => rows.push(row),
            None => {
                warn!("skipping malformed row {}: {:?}", line_no + 1, line);
                skipped += 1;
            }
        }
    }

    ParsedRows { rows, skipped }
}

fn parse_vec3_rows(text: &str, separator: Separator) -> ParsedRows<[f64; 3]> {
    parse_rows(text, separator, 3).map(|r| [r[0], r[1], r[2]])
}

/// Translation CSV in file order, returned in renderer order.
pub fn parse_translations(text: &str, convention: &AxisConvention) -> ParsedRows<Vector3<f64>> {
    parse_vec3_rows(text, Separator::Comma).map(|row| convention.to_renderer(row))
}

/// Rotation CSV, `[x, z, y]` Euler degrees per row.
pub fn parse_rotations(text: &str) -> ParsedRows<Vector3<f64>> {
    parse_vec3_rows(text, Separator::Comma).map(Vector3::from)
}

/// Vector data polyline, one `x, y, z` point per CSV row.
pub fn parse_polyline(text: &str) -> ParsedRows<Vector3<f64>> {
    parse_vec3_rows(text, Separator::Comma).map(Vector3::from)
}

/// Camera timestamp CSV: header line, then integer nanoseconds in the first
/// column. Returned as seconds relative to the first timestamp.
pub fn parse_timestamps(text: &str) -> ParsedRows<f64> {
    let mut raw = Vec::new();
    let mut skipped = 0;

    for line in text.lines().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let first = line.split(',').next().unwrap_or("").trim();
        match first.parse::<i64>() {
            Ok(ns) => raw.push(ns),
            Err(_) => match first.parse::<f64>() {
                Ok(ns) if ns.is_finite() => raw.push(ns as i64),
                _ => {
                    warn!("skipping malformed timestamp {:?}", line);
                    skipped += 1;
                }
            },
        }
    }

    let t0 = raw.first().copied().unwrap_or(0);
    let rows = raw
        .iter()
        .map(|&ns| (i128::from(ns) - i128::from(t0)) as f64 / 1e9)
        .collect();
    ParsedRows { rows, skipped }
}

/// Point-cloud chunk timestamps: whitespace separated, seconds in column two.
pub fn parse_pcl_timestamps(text: &str) -> ParsedRows<f64> {
    let mut rows = Vec::new();
    let mut skipped = 0;

    for line in text.lines() {
        let cells: Vec<&str> = line.split_whitespace().collect();
        if cells.is_empty() {
            continue;
        }
        match cells.get(1).and_then(|c| c.parse::<f64>().ok()) {
            Some(t) => rows.push(t),
            None => skipped += 1,
        }
    }

    ParsedRows { rows, skipped }
}

fn read(path: &Path) -> Result<String, LoadError> {
    fs::read_to_string(path).map_err(|e| LoadError::io(path, e))
}

pub fn load_translations(path: &Path, convention: &AxisConvention) -> Result<ParsedRows<Vector3<f64>>, LoadError> {
    Ok(parse_translations(&read(path)?, convention))
}

pub fn load_rotations(path: &Path) -> Result<ParsedRows<Vector3<f64>>, LoadError> {
    Ok(parse_rotations(&read(path)?))
}

pub fn load_timestamps(path: &Path) -> Result<ParsedRows<f64>, LoadError> {
    Ok(parse_timestamps(&read(path)?))
}

pub fn load_pcl_timestamps(path: &Path) -> Result<ParsedRows<f64>, LoadError> {
    Ok(parse_pcl_timestamps(&read(path)?))
}

pub fn load_polyline(path: &Path) -> Result<ParsedRows<Vector3<f64>>, LoadError> {
    Ok(parse_polyline(&read(path)?))
}

// ============================================================================
// PROFILE TRACKS
// ============================================================================

/// Where the four predicted profile tracks live.
///
/// Files are whitespace separated and named `{prefix}_{25|50|75|100}.csv`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileFiles {
    pub directory: PathBuf,
    pub translation_prefix: String,
    pub rotation_prefix: String,
}

/// Builds one distance's track from its translation and rotation text.
///
/// Rotations are kept as inverse matrices, the form the profile is placed with.
pub fn parse_profile_track(translations: &str, rotations: &str, convention: &AxisConvention) -> ProfileTrack {
    let t = parse_vec3_rows(translations, Separator::Whitespace).map(|row| convention.to_renderer(row));
    let r = parse_vec3_rows(rotations, Separator::Whitespace)
        .map(|row| to_inverse_matrix(&to_rotation(&Vector3::from(row))));

    if t.rows.len() != r.rows.len() {
        warn!(
            "profile track mismatch: {} translations, {} rotations",
            t.rows.len(),
            r.rows.len()
        );
    }
    ProfileTrack::new(t.rows, &r.rows)
}

pub fn load_profile_set(files: &ProfileFiles, convention: &AxisConvention) -> Result<ProfileSet, LoadError> {
    let mut tracks: [ProfileTrack; 4] = Default::default();
    for distance in ProfileDistance::ALL {
        let t = read(&files.directory.join(distance.file_name(&files.translation_prefix)))?;
        let r = read(&files.directory.join(distance.file_name(&files.rotation_prefix)))?;
        tracks[distance.index()] = parse_profile_track(&t, &r, convention);
        debug!("loaded {} profile track ({} poses)", distance, tracks[distance.index()].len());
    }
    Ok(ProfileSet::new(tracks))
}

// ============================================================================
// CALIBRATION
// ============================================================================

/// Intrinsics and lens coefficients from one calibration document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub intrinsics: CameraIntrinsics,
    pub distortion: DistortionParams,
}

#[derive(Debug, Deserialize)]
struct MatrixNode {
    data: Vec<f64>,
}

#[derive(Debug, Deserialize)]
struct RawCalibration {
    #[serde(rename = "Camera.width")]
    width: f64,
    #[serde(rename = "Camera.height")]
    height: f64,
    #[serde(rename = "CameraMat")]
    camera_matrix: MatrixNode,
    #[serde(rename = "DistCoeffs", default)]
    dist_coeffs: Option<MatrixNode>,
}

/// OpenCV writes a `%YAML:1.0` header and `!!opencv-matrix` tags that plain
/// YAML parsers refuse.
fn strip_opencv_markup(text: &str) -> String {
    text.lines()
        .filter(|line| !line.trim_start().starts_with("%YAML"))
        .map(|line| line.replace("!!opencv-matrix", ""))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Parses a calibration document.
///
/// `CameraMat.data` is the row-major 3×3 matrix (`fx = data[0]`,
/// `fy = data[4]`, `cx = data[2]`, `cy = data[5]`); `DistCoeffs.data` is in
/// OpenCV order and optional.
pub fn parse_calibration(text: &str) -> Result<Calibration, LoadError> {
    let raw: RawCalibration = serde_yaml::from_str(&strip_opencv_markup(text))?;

    let k = &raw.camera_matrix.data;
    if k.len() != 9 {
        return Err(LoadError::shape(format!(
            "CameraMat.data must hold 9 values, got {}",
            k.len()
        )));
    }
    let intrinsics = CameraIntrinsics::new(raw.width, raw.height, k[0], k[4], k[2], k[5]);

    let distortion = match &raw.dist_coeffs {
        Some(node) => DistortionParams::from_opencv(&node.data).ok_or_else(|| {
            LoadError::shape(format!(
                "DistCoeffs.data must hold at least 4 values, got {}",
                node.data.len()
            ))
        })?,
        None => DistortionParams::default(),
    };

    Ok(Calibration {
        intrinsics,
        distortion,
    })
}

pub fn load_calibration(path: &Path) -> Result<Calibration, LoadError> {
    parse_calibration(&read(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Matrix3;

    #[test]
    fn test_translations_are_permuted() {
        let parsed = parse_translations("2,3,1\n5,6,4\n", &AxisConvention::SURVEY);
        assert_eq!(parsed.rows, vec![Vector3::new(1.0, 2.0, 3.0), Vector3::new(4.0, 5.0, 6.0)]);
        assert_eq!(parsed.skipped, 0);
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let parsed = parse_rotations("1,2,3\n1,2\nx,2,3\n\n4,5,6");
        assert_eq!(parsed.rows.len(), 2);
        assert_eq!(parsed.skipped, 2);
    }

    #[test]
    fn test_empty_input() {
        let parsed = parse_rotations("");
        assert!(parsed.rows.is_empty());
        assert!(parse_timestamps("").rows.is_empty());
    }

    #[test]
    fn test_timestamps_are_zero_based_seconds() {
        let text = "timestamp,frame\n1700000000000000000,0\n1700000000040000000,1\n1700000001000000000,2\n";
        let parsed = parse_timestamps(text);
        assert_eq!(parsed.rows.len(), 3);
        assert_eq!(parsed.rows[0], 0.0);
        assert_relative_eq!(parsed.rows[1], 0.04, epsilon = 1e-12);
        assert_relative_eq!(parsed.rows[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_timestamps_span_full_i64_range() {
        let text = format!("timestamp\n{}\n{}\n", i64::MIN, i64::MAX);
        let parsed = parse_timestamps(&text);
        assert_eq!(parsed.rows.len(), 2);
        assert_relative_eq!(parsed.rows[1], u64::MAX as f64 / 1e9, max_relative = 1e-12);
    }

    #[test]
    fn test_pcl_timestamps_second_column() {
        let parsed = parse_pcl_timestamps("0 0.00\n1 0.10\nbroken\n2 0.20\n");
        assert_eq!(parsed.rows, vec![0.0, 0.1, 0.2]);
        assert_eq!(parsed.skipped, 1);
    }

    #[test]
    fn test_profile_track_stores_inverse_rotations() {
        let track = parse_profile_track("0 0 5\n", "0 90 0\n", &AxisConvention::SURVEY);
        let m = track.transform_at(0).unwrap();

        // Translation (y, z, x) = (0, 0, 5) → (5, 0, 0)
        assert_eq!(m.apply(&Vector3::zeros()), Vector3::new(5.0, 0.0, 0.0));
        let expected = to_inverse_matrix(&to_rotation(&Vector3::new(0.0, 90.0, 0.0)));
        let r: Matrix3<f64> = m.matrix().fixed_view::<3, 3>(0, 0).into_owned();
        assert_relative_eq!(r, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_calibration_plain_yaml() {
        let text = r#"
Camera.width: 2048
Camera.height: 1536
CameraMat:
  rows: 3
  cols: 3
  data: [1200.0, 0.0, 1010.5, 0.0, 1190.0, 770.25, 0.0, 0.0, 1.0]
DistCoeffs:
  rows: 1
  cols: 5
  data: [-0.18, 0.027, -0.0012, 0.0008, 0.335]
"#;
        let calib = parse_calibration(text).unwrap();
        assert_eq!(calib.intrinsics.width, 2048.0);
        assert_eq!(calib.intrinsics.fx, 1200.0);
        assert_eq!(calib.intrinsics.fy, 1190.0);
        assert_eq!(calib.intrinsics.cx, 1010.5);
        assert_eq!(calib.intrinsics.cy, 770.25);
        assert_eq!(calib.distortion.p1, -0.0012);
        assert_eq!(calib.distortion.k3, 0.335);
    }

    #[test]
    fn test_calibration_opencv_markup() {
        let text = "%YAML:1.0\n---\nCamera.width: 640\nCamera.height: 480\nCameraMat: !!opencv-matrix\n  rows: 3\n  cols: 3\n  dt: d\n  data: [500, 0, 320, 0, 500, 240, 0, 0, 1]\n";
        let calib = parse_calibration(text).unwrap();
        assert_eq!(calib.intrinsics.cx, 320.0);
        assert!(calib.distortion.is_identity());
    }

    #[test]
    fn test_calibration_wrong_matrix_size() {
        let text = "Camera.width: 640\nCamera.height: 480\nCameraMat:\n  data: [500, 0, 320]\n";
        assert!(matches!(parse_calibration(text), Err(LoadError::Shape(_))));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = load_rotations(Path::new("/nonexistent/rot.csv")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/rot.csv"));
    }
}
