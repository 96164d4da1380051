//! Calibration status, input validation, and conversion pathway resolution.

use serde::Serialize;

use crate::error::CoreError;
use crate::geo::{FixedProjection, GpsCoord, ModelCoord, ModelUnit};
use crate::transform::{apply, apply_inverse, CoordinateTransform};
use crate::types::DbId;

/// GPS samples less accurate than this are accepted but surfaced to the operator.
pub const POOR_ACCURACY_THRESHOLD_M: f64 = 5.0;

/// Maximum length of a calibration point's reference description.
pub const MAX_DESCRIPTION_LENGTH: usize = 500;

/// Outcome of resolving a project's local transform.
///
/// `NotCalibrated` is an ordinary state (nothing surveyed yet), distinct
/// from a transform error (surveyed data that is mathematically unusable).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CalibrationStatus {
    NotCalibrated { active_points: usize },
    Calibrated { transform: CoordinateTransform },
}

impl CalibrationStatus {
    pub fn transform(&self) -> Option<&CoordinateTransform> {
        match self {
            Self::Calibrated { transform } => Some(transform),
            Self::NotCalibrated { .. } => None,
        }
    }

    pub fn is_calibrated(&self) -> bool {
        matches!(self, Self::Calibrated { .. })
    }
}

/// Validate the model side of a new calibration point.
pub fn validate_model_coord(model: &ModelCoord) -> Result<(), CoreError> {
    if !model.x.is_finite() || !model.y.is_finite() || model.z.is_some_and(|z| !z.is_finite()) {
        return Err(CoreError::Validation(
            "Model coordinates must be finite numbers".to_string(),
        ));
    }
    Ok(())
}

/// Validate a reference description length.
pub fn validate_description(description: Option<&str>) -> Result<(), CoreError> {
    if let Some(d) = description {
        if d.len() > MAX_DESCRIPTION_LENGTH {
            return Err(CoreError::Validation(format!(
                "Description exceeds maximum length of {MAX_DESCRIPTION_LENGTH} characters (got {})",
                d.len()
            )));
        }
    }
    Ok(())
}

/// Operator-facing notice for a poor-accuracy GPS sample, if any.
pub fn accuracy_notice(gps: &GpsCoord) -> Option<String> {
    match gps.accuracy_m {
        Some(acc) if acc > POOR_ACCURACY_THRESHOLD_M => Some(format!(
            "GPS accuracy {acc:.1} m exceeds {POOR_ACCURACY_THRESHOLD_M:.1} m; the point was saved but may degrade the calibration"
        )),
        _ => None,
    }
}

/// The conversion route a project uses, with whatever state it needs.
#[derive(Debug, Clone, Copy)]
pub enum EffectivePathway<'a> {
    Fixed {
        projection: FixedProjection,
        unit: ModelUnit,
    },
    Local {
        project_id: DbId,
        status: &'a CalibrationStatus,
    },
}

impl EffectivePathway<'_> {
    pub fn model_to_gps(&self, model: &ModelCoord) -> Result<GpsCoord, CoreError> {
        validate_model_coord(model)?;
        match self {
            Self::Fixed { projection, unit } => Ok(projection.model_to_gps(model, *unit)),
            Self::Local { project_id, status } => {
                let transform = require_transform(*project_id, status)?;
                Ok(apply(transform, model))
            }
        }
    }

    pub fn gps_to_model(&self, gps: &GpsCoord) -> Result<ModelCoord, CoreError> {
        gps.validate()?;
        match self {
            Self::Fixed { projection, unit } => Ok(projection.gps_to_model(gps, *unit)),
            Self::Local { project_id, status } => {
                let transform = require_transform(*project_id, status)?;
                Ok(apply_inverse(transform, gps)?)
            }
        }
    }
}

fn require_transform(
    project_id: DbId,
    status: &CalibrationStatus,
) -> Result<&CoordinateTransform, CoreError> {
    match status {
        CalibrationStatus::Calibrated { transform } => Ok(transform),
        CalibrationStatus::NotCalibrated { active_points } => Err(CoreError::NotCalibrated {
            project_id,
            active_points: *active_points,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::{fit_transform, Correspondence};
    use assert_matches::assert_matches;

    fn calibrated() -> CalibrationStatus {
        let transform = fit_transform(&[
            Correspondence {
                model: ModelCoord::new(0.0, 0.0),
                gps: GpsCoord::new(59.4370, 24.7536),
            },
            Correspondence {
                model: ModelCoord::new(100.0, 0.0),
                gps: GpsCoord::new(59.4370, 24.7550),
            },
        ])
        .unwrap();
        CalibrationStatus::Calibrated { transform }
    }

    #[test]
    fn not_calibrated_is_reported_distinctly() {
        let status = CalibrationStatus::NotCalibrated { active_points: 1 };
        let pathway = EffectivePathway::Local {
            project_id: 7,
            status: &status,
        };
        assert_matches!(
            pathway.model_to_gps(&ModelCoord::new(1.0, 2.0)),
            Err(CoreError::NotCalibrated {
                project_id: 7,
                active_points: 1
            })
        );
    }

    #[test]
    fn local_pathway_round_trips() {
        let status = calibrated();
        let pathway = EffectivePathway::Local {
            project_id: 1,
            status: &status,
        };
        let gps = pathway.model_to_gps(&ModelCoord::new(25.0, 0.0)).unwrap();
        let model = pathway.gps_to_model(&gps).unwrap();
        assert!((model.x - 25.0).abs() < 1e-6);
        assert!(model.y.abs() < 1e-6);
    }

    #[test]
    fn fixed_pathway_needs_no_calibration() {
        let pathway = EffectivePathway::Fixed {
            projection: FixedProjection::LEst97,
            unit: ModelUnit::Meter,
        };
        let gps = pathway
            .model_to_gps(&ModelCoord::new(542_763.0, 6_589_036.0))
            .unwrap();
        assert!((gps.latitude - 59.437).abs() < 1e-4);
        assert!((gps.longitude - 24.7536).abs() < 1e-4);
    }

    #[test]
    fn invalid_gps_is_a_validation_error() {
        let status = calibrated();
        let pathway = EffectivePathway::Local {
            project_id: 1,
            status: &status,
        };
        assert_matches!(
            pathway.gps_to_model(&GpsCoord::new(123.0, 0.0)),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn poor_accuracy_produces_notice() {
        let mut gps = GpsCoord::new(59.0, 24.0);
        assert!(accuracy_notice(&gps).is_none());
        gps.accuracy_m = Some(2.0);
        assert!(accuracy_notice(&gps).is_none());
        gps.accuracy_m = Some(12.5);
        assert!(accuracy_notice(&gps).unwrap().contains("12.5"));
    }

    #[test]
    fn description_length_is_bounded() {
        assert!(validate_description(None).is_ok());
        assert!(validate_description(Some("corner column C4")).is_ok());
        assert!(validate_description(Some(&"x".repeat(MAX_DESCRIPTION_LENGTH + 1))).is_err());
    }
}
