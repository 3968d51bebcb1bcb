//! Screen calibration: polygon plus reference depth.
//!
//! A [`ScreenCalibration`] is immutable. Re-calibrating builds a new one and
//! the [`CalibrationStore`] swaps it in wholesale, so a reader holding the
//! previous `Arc` never observes a half-updated value.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use screenhit_core::ScreenPolygon;

use crate::error::CalibrationIoError;
use crate::io::{DepthCalibrationRecord, ScreenAreaRecord};

/// Screen boundary and distance as measured by a calibration flow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScreenCalibration {
    pub polygon: ScreenPolygon,
    /// Camera-to-screen distance, meters.
    pub depth_m: f32,
    pub timestamp: NaiveDateTime,
    /// Trust in `[0, 1]` reported by the calibration flow.
    pub confidence: f32,
    pub source: String,
}

impl ScreenCalibration {
    /// Calibration stamped with the current local time.
    pub fn new(
        polygon: ScreenPolygon,
        depth_m: f32,
        source: impl Into<String>,
        confidence: f32,
    ) -> Result<Self, CalibrationIoError> {
        if !depth_m.is_finite() || depth_m <= 0.0 {
            return Err(CalibrationIoError::InvalidDepth(depth_m as f64));
        }
        Ok(Self {
            polygon,
            depth_m,
            timestamp: Local::now().naive_local(),
            confidence: confidence.clamp(0.0, 1.0),
            source: source.into(),
        })
    }

    fn from_parts(polygon: ScreenPolygon, depth: &DepthCalibrationRecord) -> Self {
        Self {
            polygon,
            depth_m: depth.screen_depth as f32,
            timestamp: depth.timestamp,
            confidence: depth.confidence as f32,
            source: depth.source.clone(),
        }
    }
}

/// Where the calibration files live.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationPaths {
    pub screen_area: PathBuf,
    pub screen_depth: PathBuf,
}

impl CalibrationPaths {
    /// Both files under `root`, in the conventional sub-directories.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            screen_area: root.join("ScreenAreaLogs").join("area_log.json"),
            screen_depth: root.join("ScreenDepthLogs").join("depth_log.json"),
        }
    }
}

impl Default for CalibrationPaths {
    fn default() -> Self {
        Self::under(".")
    }
}

/// What a session still needs before hits can be evaluated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Readiness {
    pub has_polygon: bool,
    pub has_depth: bool,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        self.has_polygon && self.has_depth
    }

    /// Human-readable names of the missing pieces, for a setup prompt.
    pub fn missing(&self) -> Vec<&'static str> {
        let mut out = Vec::new();
        if !self.has_polygon {
            out.push("screen area");
        }
        if !self.has_depth {
            out.push("screen depth");
        }
        out
    }
}

/// Owns the persisted screen polygon and depth and the combined calibration.
#[derive(Clone, Debug)]
pub struct CalibrationStore {
    paths: CalibrationPaths,
    polygon: Option<ScreenPolygon>,
    depth: Option<DepthCalibrationRecord>,
    current: Option<Arc<ScreenCalibration>>,
}

impl CalibrationStore {
    /// Empty store writing to `paths`. Nothing is read.
    pub fn new(paths: CalibrationPaths) -> Self {
        Self {
            paths,
            polygon: None,
            depth: None,
            current: None,
        }
    }

    /// Load whatever calibration exists at `paths`. Missing files are not an
    /// error; malformed ones are.
    pub fn open(paths: CalibrationPaths) -> Result<Self, CalibrationIoError> {
        let area = ScreenAreaRecord::load_json(&paths.screen_area)?;
        let mut depth = DepthCalibrationRecord::load_json(&paths.screen_depth)?;

        let polygon = match &area {
            Some(record) => Some(record.to_polygon()?),
            None => None,
        };
        // older area files carried the depth inline
        if depth.is_none() {
            if let Some(d) = area.as_ref().and_then(|a| a.screen_depth) {
                depth = Some(DepthCalibrationRecord::new(d, "area_log", 1.0)?);
            }
        }

        let mut store = Self::new(paths);
        store.polygon = polygon;
        store.depth = depth;
        store.rebuild();
        match store.current.as_deref() {
            Some(c) => info!(
                "loaded screen calibration: {} vertices, depth {:.3}m ({}, {})",
                c.polygon.vertices().len(),
                c.depth_m,
                c.source,
                c.timestamp
            ),
            None => warn!("screen calibration incomplete: missing {}", store.readiness().missing().join(", ")),
        }
        Ok(store)
    }

    pub fn paths(&self) -> &CalibrationPaths {
        &self.paths
    }

    /// The combined calibration, once both polygon and depth are known.
    pub fn current(&self) -> Option<Arc<ScreenCalibration>> {
        self.current.clone()
    }

    pub fn polygon(&self) -> Option<&ScreenPolygon> {
        self.polygon.as_ref()
    }

    pub fn depth(&self) -> Option<&DepthCalibrationRecord> {
        self.depth.as_ref()
    }

    pub fn readiness(&self) -> Readiness {
        Readiness {
            has_polygon: self.polygon.is_some(),
            has_depth: self.depth.is_some(),
        }
    }

    /// Replace the screen polygon and persist it.
    pub fn set_screen_area(&mut self, polygon: ScreenPolygon) -> Result<(), CalibrationIoError> {
        let record = ScreenAreaRecord::from_polygon(&polygon, self.depth.as_ref().map(|d| d.screen_depth));
        record.write_json(&self.paths.screen_area)?;
        self.polygon = Some(polygon);
        self.rebuild();
        Ok(())
    }

    /// Rectangle from its top-left and bottom-right corners.
    pub fn set_screen_area_corners(
        &mut self,
        top_left: (i32, i32),
        bottom_right: (i32, i32),
    ) -> Result<(), CalibrationIoError> {
        self.set_screen_area(ScreenPolygon::from_corners(top_left, bottom_right))
    }

    /// Replace the screen depth and persist it.
    pub fn set_screen_depth(
        &mut self,
        depth_m: f64,
        source: &str,
        confidence: f64,
    ) -> Result<(), CalibrationIoError> {
        let record = DepthCalibrationRecord::new(depth_m, source, confidence)?;
        record.write_json(&self.paths.screen_depth)?;
        info!("screen depth set to {:.3}m ({source})", record.screen_depth);
        self.depth = Some(record);
        self.rebuild();
        Ok(())
    }

    /// Forget the screen depth and delete its file.
    pub fn clear_depth(&mut self) -> Result<(), CalibrationIoError> {
        match fs::remove_file(&self.paths.screen_depth) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        self.depth = None;
        self.current = None;
        Ok(())
    }

    fn rebuild(&mut self) {
        self.current = match (&self.polygon, &self.depth) {
            (Some(polygon), Some(depth)) => Some(Arc::new(ScreenCalibration::from_parts(
                polygon.clone(),
                depth,
            ))),
            _ => None,
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn square() -> ScreenPolygon {
        ScreenPolygon::from_pixels(&[(10, 10), (300, 12), (298, 200), (8, 198)]).unwrap()
    }

    #[test]
    fn rejects_non_positive_depth() {
        assert!(matches!(
            ScreenCalibration::new(square(), 0.0, "t", 1.0),
            Err(CalibrationIoError::InvalidDepth(_))
        ));
        let c = ScreenCalibration::new(square(), 1.7, "t", 3.0).unwrap();
        assert_relative_eq!(c.confidence, 1.0);
    }

    #[test]
    fn empty_directory_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CalibrationStore::open(CalibrationPaths::under(dir.path())).unwrap();
        assert!(store.current().is_none());
        assert_eq!(store.readiness().missing(), vec!["screen area", "screen depth"]);
    }

    #[test]
    fn set_persist_reload() {
        let dir = tempfile::tempdir().unwrap();
        let paths = CalibrationPaths::under(dir.path());
        let mut store = CalibrationStore::new(paths.clone());
        store.set_screen_area(square()).unwrap();
        assert!(store.current().is_none());
        assert_eq!(store.readiness().missing(), vec!["screen depth"]);
        store.set_screen_depth(1.75049, "user_measurement", 0.951).unwrap();

        let first = store.current().unwrap();
        assert_relative_eq!(first.depth_m, 1.75);

        let reopened = CalibrationStore::open(paths).unwrap();
        let loaded = reopened.current().unwrap();
        assert_eq!(loaded.polygon, first.polygon);
        assert_relative_eq!(loaded.confidence, 0.95);
        assert_eq!(loaded.source, "user_measurement");
        assert!(reopened.readiness().is_ready());
    }

    #[test]
    fn recalibration_replaces_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = CalibrationStore::new(CalibrationPaths::under(dir.path()));
        store.set_screen_area_corners((0, 0), (100, 100)).unwrap();
        store.set_screen_depth(2.0, "a", 1.0).unwrap();
        let before = store.current().unwrap();
        store.set_screen_depth(1.5, "b", 1.0).unwrap();
        let after = store.current().unwrap();
        assert_relative_eq!(before.depth_m, 2.0);
        assert_relative_eq!(after.depth_m, 1.5);
        assert!(!Arc::ptr_eq(&before, &after));
    }

    #[test]
    fn clear_depth_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = CalibrationPaths::under(dir.path());
        let mut store = CalibrationStore::new(paths.clone());
        store.set_screen_area(square()).unwrap();
        store.set_screen_depth(2.0, "a", 1.0).unwrap();
        store.clear_depth().unwrap();
        assert!(!paths.screen_depth.exists());
        assert!(store.current().is_none());
        store.clear_depth().unwrap();
    }

    #[test]
    fn legacy_inline_depth_is_picked_up() {
        let dir = tempfile::tempdir().unwrap();
        let paths = CalibrationPaths::under(dir.path());
        fs::create_dir_all(paths.screen_area.parent().unwrap()).unwrap();
        fs::write(
            &paths.screen_area,
            r#"{"screen_area": [[0,0],[640,0],[640,400],[0,400]], "screen_depth": 1.8}"#,
        )
        .unwrap();
        let store = CalibrationStore::open(paths).unwrap();
        assert_relative_eq!(store.current().unwrap().depth_m, 1.8);
    }

    #[test]
    fn malformed_file_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let paths = CalibrationPaths::under(dir.path());
        fs::create_dir_all(paths.screen_depth.parent().unwrap()).unwrap();
        fs::write(&paths.screen_depth, "{ not json").unwrap();
        assert!(matches!(
            CalibrationStore::open(paths),
            Err(CalibrationIoError::Json(_))
        ));
    }
}
