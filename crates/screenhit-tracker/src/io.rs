//! JSON records for calibration and tracker configuration.
//!
//! Depth file:
//!
//! ```json
//! { "screen_depth": 1.75, "timestamp": "2025-12-02T10:41:07.512334",
//!   "source": "user_measurement", "confidence": 0.95 }
//! ```
//!
//! Screen area file: `{ "screen_area": [[x, y], [x, y], [x, y], [x, y]] }`.

use std::fs;
use std::path::Path;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};

use screenhit_core::ScreenPolygon;
use screenhit_depth::DepthProbeParams;

use crate::color::ColorDetectorParams;
use crate::error::CalibrationIoError;
use crate::hit::HitParams;
use crate::motion::MotionDetectorParams;
use crate::params::TrackerParams;
use crate::selector::TrackerMode;

/// Read a file, mapping "not found" to `None`.
fn read_optional(path: &Path) -> Result<Option<String>, CalibrationIoError> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn write_pretty<T: Serialize>(value: &T, path: &Path) -> Result<(), CalibrationIoError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

fn round_to(v: f64, digits: i32) -> f64 {
    let f = 10f64.powi(digits);
    (v * f).round() / f
}

/// ISO-8601 timestamps without offset, as written by the calibration flow.
/// RFC 3339 strings with an offset are accepted and kept as wall-clock time.
mod iso_timestamp {
    use chrono::{DateTime, NaiveDateTime};
    use serde::{Deserialize, Deserializer, Serializer};

    const WRITE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
    const READ_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&ts.format(WRITE_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid ISO-8601 timestamp {raw:?}")))
    }

    pub fn parse(raw: &str) -> Option<NaiveDateTime> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.naive_local());
        }
        NaiveDateTime::parse_from_str(raw, READ_FORMAT).ok()
    }
}

fn default_source() -> String {
    "unknown".to_string()
}

fn default_confidence() -> f64 {
    1.0
}

/// Persisted screen depth.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DepthCalibrationRecord {
    /// Meters, rounded to millimeters.
    pub screen_depth: f64,
    /// Files written before timestamps existed read as the epoch.
    #[serde(with = "iso_timestamp", default)]
    pub timestamp: NaiveDateTime,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

impl DepthCalibrationRecord {
    /// New record stamped now. Depth is rounded to 3 decimals, confidence
    /// clamped to `[0, 1]` and rounded to 2.
    pub fn new(depth_m: f64, source: &str, confidence: f64) -> Result<Self, CalibrationIoError> {
        if !depth_m.is_finite() || depth_m <= 0.0 {
            return Err(CalibrationIoError::InvalidDepth(depth_m));
        }
        Ok(Self {
            screen_depth: round_to(depth_m, 3),
            timestamp: Local::now().naive_local(),
            source: source.to_string(),
            confidence: round_to(confidence.clamp(0.0, 1.0), 2),
        })
    }

    /// `Ok(None)` when the file does not exist.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Option<Self>, CalibrationIoError> {
        let Some(raw) = read_optional(path.as_ref())? else {
            return Ok(None);
        };
        let record: Self = serde_json::from_str(&raw)?;
        if !record.screen_depth.is_finite() || record.screen_depth <= 0.0 {
            return Err(CalibrationIoError::InvalidDepth(record.screen_depth));
        }
        Ok(Some(record))
    }

    /// Write as pretty JSON, creating parent directories.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CalibrationIoError> {
        write_pretty(self, path.as_ref())
    }
}

/// Persisted screen polygon.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScreenAreaRecord {
    pub screen_area: Vec<[i32; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screen_depth: Option<f64>,
}

impl ScreenAreaRecord {
    pub fn from_polygon(polygon: &ScreenPolygon, screen_depth: Option<f64>) -> Self {
        Self {
            screen_area: polygon
                .vertices()
                .iter()
                .map(|p| [p.x.round() as i32, p.y.round() as i32])
                .collect(),
            screen_depth,
        }
    }

    /// The four stored points as a polygon.
    pub fn to_polygon(&self) -> Result<ScreenPolygon, CalibrationIoError> {
        if self.screen_area.len() != 4 {
            return Err(CalibrationIoError::WrongPointCount(self.screen_area.len()));
        }
        let points: Vec<(i32, i32)> = self.screen_area.iter().map(|&[x, y]| (x, y)).collect();
        Ok(ScreenPolygon::from_pixels(&points)?)
    }

    /// `Ok(None)` when the file does not exist.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Option<Self>, CalibrationIoError> {
        match read_optional(path.as_ref())? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CalibrationIoError> {
        write_pretty(self, path.as_ref())
    }
}

/// Tracker configuration file. Every section is optional; absent sections
/// keep their defaults.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    #[serde(default)]
    pub mode: Option<TrackerMode>,
    #[serde(default)]
    pub color: Option<ColorDetectorParams>,
    #[serde(default)]
    pub motion: Option<MotionDetectorParams>,
    #[serde(default)]
    pub hit: Option<HitParams>,
    #[serde(default)]
    pub depth: Option<DepthProbeParams>,
    #[serde(default)]
    pub acquisition_timeout_ms: Option<u64>,
}

impl TrackerConfig {
    /// Snapshot of fully specified parameters.
    pub fn from_params(params: &TrackerParams) -> Self {
        Self {
            mode: Some(params.mode),
            color: Some(params.color),
            motion: Some(params.motion),
            hit: Some(params.hit),
            depth: Some(params.depth),
            acquisition_timeout_ms: Some(params.acquisition_timeout_ms),
        }
    }

    /// Defaults with this file's overrides applied.
    pub fn build_params(&self) -> TrackerParams {
        let mut params = TrackerParams::default();
        if let Some(mode) = self.mode {
            params.mode = mode;
        }
        if let Some(color) = self.color {
            params.color = color;
        }
        if let Some(motion) = self.motion {
            params.motion = motion;
        }
        if let Some(hit) = self.hit {
            params.hit = hit;
        }
        if let Some(depth) = self.depth {
            params.depth = depth;
        }
        if let Some(ms) = self.acquisition_timeout_ms {
            params.acquisition_timeout_ms = ms;
        }
        params
    }

    /// `Ok(None)` when the file does not exist.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Option<Self>, CalibrationIoError> {
        match read_optional(path.as_ref())? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), CalibrationIoError> {
        write_pretty(self, path.as_ref())
    }
}
