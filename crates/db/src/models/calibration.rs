//! Calibration point, coordinate settings and cached transform models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sitecheck_core::error::CoreError;
use sitecheck_core::geo::{CoordinatePathway, GpsCoord, ModelCoord, ModelUnit};
use sitecheck_core::transform::{CoordinateTransform, Correspondence, TransformKind};
use sitecheck_core::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Calibration points
// ---------------------------------------------------------------------------

/// A row from the `calibration_points` table. Never hard-deleted.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CalibrationPoint {
    pub id: DbId,
    pub project_id: DbId,
    pub model_x: f64,
    pub model_y: f64,
    pub model_z: Option<f64>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub accuracy_m: Option<f64>,
    pub description: Option<String>,
    pub element_guid: Option<String>,
    pub is_active: bool,
    pub captured_at: Timestamp,
    pub captured_by: String,
    pub deactivated_at: Option<Timestamp>,
    pub deactivated_by: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl CalibrationPoint {
    pub fn model(&self) -> ModelCoord {
        ModelCoord {
            x: self.model_x,
            y: self.model_y,
            z: self.model_z,
        }
    }

    pub fn gps(&self) -> GpsCoord {
        GpsCoord {
            latitude: self.latitude,
            longitude: self.longitude,
            altitude: self.altitude,
            accuracy_m: self.accuracy_m,
        }
    }

    pub fn correspondence(&self) -> Correspondence {
        Correspondence {
            model: self.model(),
            gps: self.gps(),
        }
    }
}

/// DTO for capturing a calibration point.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCalibrationPoint {
    pub model: ModelCoord,
    pub gps: GpsCoord,
    pub description: Option<String>,
    pub element_guid: Option<String>,
    pub captured_by: String,
}

// ---------------------------------------------------------------------------
// Coordinate settings
// ---------------------------------------------------------------------------

/// A row from `project_coordinate_settings`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CoordinateSettings {
    pub project_id: DbId,
    pub coordinate_system: String,
    pub model_unit: String,
    pub points_version: i64,
    pub is_calibrated: bool,
    pub active_point_count: i32,
    pub rmse_m: Option<f64>,
    pub max_error_m: Option<f64>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl CoordinateSettings {
    pub fn pathway(&self) -> Result<CoordinatePathway, CoreError> {
        CoordinatePathway::from_str_db(&self.coordinate_system)
    }

    pub fn unit(&self) -> Result<ModelUnit, CoreError> {
        ModelUnit::from_str_db(&self.model_unit)
    }
}

/// Display cache mirrored from the latest fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationSummary {
    pub is_calibrated: bool,
    pub active_point_count: i32,
    pub rmse_m: Option<f64>,
    pub max_error_m: Option<f64>,
}

// ---------------------------------------------------------------------------
// Cached transform
// ---------------------------------------------------------------------------

/// A row from `coordinate_transforms`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct CoordinateTransformRow {
    pub project_id: DbId,
    pub source_version: i64,
    pub kind: String,
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
    pub rotation_deg: f64,
    pub scale: f64,
    pub model_origin_x: f64,
    pub model_origin_y: f64,
    pub origin_latitude: f64,
    pub origin_longitude: f64,
    pub point_count: i32,
    pub rmse_m: f64,
    pub max_error_m: f64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl CoordinateTransformRow {
    /// Rebuild the domain transform. `None` if the stored kind is unknown.
    pub fn to_transform(&self) -> Option<CoordinateTransform> {
        Some(CoordinateTransform {
            kind: TransformKind::from_str_db(&self.kind)?,
            a: self.a,
            b: self.b,
            c: self.c,
            d: self.d,
            tx: self.tx,
            ty: self.ty,
            rotation_deg: self.rotation_deg,
            scale: self.scale,
            model_origin_x: self.model_origin_x,
            model_origin_y: self.model_origin_y,
            origin_latitude: self.origin_latitude,
            origin_longitude: self.origin_longitude,
            point_count: self.point_count.max(0) as usize,
            rmse_m: self.rmse_m,
            max_error_m: self.max_error_m,
        })
    }
}
