//! Calibration points and the cached model ↔ GPS transform of each project.
//!
//! Every point mutation bumps `points_version` on the project's settings row
//! in the same transaction. The cached transform records the version it was
//! fitted from, so a reader recomputes exactly when the active point set
//! changed since the last fit. Because the fit is a pure function of that
//! set, two readers racing on the same version store identical results and
//! an older fit never replaces a newer one.

use serde::Serialize;
use serde_json::json;
use sqlx::PgPool;
use sitecheck_core::audit::{AuditAction, AuditDraft, EntityType};
use sitecheck_core::calibration::{
    accuracy_notice, validate_description, validate_model_coord, CalibrationStatus,
    EffectivePathway,
};
use sitecheck_core::element::validate_guid;
use sitecheck_core::error::CoreError;
use sitecheck_core::geo::{CoordinatePathway, GpsCoord, ModelCoord, ModelUnit};
use sitecheck_core::transform::{
    evaluate_accuracy, fit_transform, AccuracyReport, CoordinateTransform, Correspondence,
    MIN_POINTS,
};
use sitecheck_core::types::DbId;
use sitecheck_db::models::calibration::{
    CalibrationPoint, CalibrationSummary, CoordinateSettings, CreateCalibrationPoint,
};
use sitecheck_db::repositories::{
    AuditLogRepo, CalibrationPointRepo, CoordinateSettingsRepo, CoordinateTransformRepo,
};

use crate::error::EngineError;

/// A stored point plus the operator notice for a poor GPS sample.
#[derive(Debug, Clone, Serialize)]
pub struct AddedPoint {
    pub point: CalibrationPoint,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

/// Residuals of the current fit, aligned with `points`.
#[derive(Debug, Clone, Serialize)]
pub struct CalibrationAccuracy {
    pub transform: CoordinateTransform,
    pub report: AccuracyReport,
    pub points: Vec<CalibrationPoint>,
}

fn point_snapshot(p: &CalibrationPoint) -> serde_json::Value {
    json!({
        "model_x": p.model_x,
        "model_y": p.model_y,
        "model_z": p.model_z,
        "latitude": p.latitude,
        "longitude": p.longitude,
        "altitude": p.altitude,
        "accuracy_m": p.accuracy_m,
        "description": p.description,
        "element_guid": p.element_guid,
        "is_active": p.is_active,
        "deactivated_at": p.deactivated_at,
        "deactivated_by": p.deactivated_by,
    })
}

fn settings_not_found(project_id: DbId) -> EngineError {
    CoreError::not_found("project", project_id).into()
}

pub struct CalibrationStore;

impl CalibrationStore {
    // -----------------------------------------------------------------------
    // Points
    // -----------------------------------------------------------------------

    /// Capture a reference point. Poor-accuracy samples are stored like any
    /// other and reported back through [`AddedPoint::notice`].
    pub async fn add_point(
        pool: &PgPool,
        project_id: DbId,
        input: &CreateCalibrationPoint,
    ) -> Result<AddedPoint, EngineError> {
        validate_model_coord(&input.model)?;
        input.gps.validate()?;
        validate_description(input.description.as_deref())?;
        if let Some(guid) = &input.element_guid {
            validate_guid(guid)?;
        }
        if input.captured_by.trim().is_empty() {
            return Err(CoreError::Validation("captured_by must not be empty".to_string()).into());
        }

        let mut tx = pool.begin().await?;

        let version = CoordinateSettingsRepo::bump_points_version(&mut *tx, project_id)
            .await?
            .ok_or_else(|| settings_not_found(project_id))?;
        let point = CalibrationPointRepo::create(&mut *tx, project_id, input).await?;
        AuditLogRepo::record(
            &mut *tx,
            &AuditDraft::created(
                project_id,
                EntityType::CalibrationPoint,
                point.id,
                point_snapshot(&point),
                &input.captured_by,
            ),
        )
        .await?;

        tx.commit().await?;

        let notice = accuracy_notice(&input.gps);
        if let Some(msg) = &notice {
            tracing::warn!(
                project_id,
                point_id = point.id,
                accuracy_m = input.gps.accuracy_m,
                "{msg}",
            );
        }
        tracing::info!(project_id, point_id = point.id, points_version = version, "Calibration point added");

        Ok(AddedPoint { point, notice })
    }

    /// Soft-disable a point. Deactivating an inactive point returns it
    /// unchanged and leaves the version and cached transform alone.
    pub async fn deactivate_point(
        pool: &PgPool,
        project_id: DbId,
        point_id: DbId,
        actor: &str,
    ) -> Result<CalibrationPoint, EngineError> {
        let mut tx = pool.begin().await?;

        let Some(point) =
            CalibrationPointRepo::deactivate(&mut *tx, project_id, point_id, actor).await?
        else {
            let existing = CalibrationPointRepo::find_by_id(&mut *tx, project_id, point_id)
                .await?
                .ok_or_else(|| CoreError::not_found("calibration_point", point_id))?;
            tx.rollback().await?;
            return Ok(existing);
        };

        let version = CoordinateSettingsRepo::bump_points_version(&mut *tx, project_id)
            .await?
            .ok_or_else(|| settings_not_found(project_id))?;

        let mut before = point_snapshot(&point);
        before["is_active"] = json!(true);
        before["deactivated_at"] = json!(null);
        before["deactivated_by"] = json!(null);
        AuditLogRepo::record(
            &mut *tx,
            &AuditDraft::changed(
                project_id,
                EntityType::CalibrationPoint,
                point.id,
                AuditAction::Update,
                &before,
                &point_snapshot(&point),
                actor,
            ),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(project_id, point_id, points_version = version, "Calibration point deactivated");
        Ok(point)
    }

    pub async fn list_points(
        pool: &PgPool,
        project_id: DbId,
        include_inactive: bool,
    ) -> Result<Vec<CalibrationPoint>, EngineError> {
        let points = if include_inactive {
            CalibrationPointRepo::list_all(pool, project_id).await?
        } else {
            CalibrationPointRepo::list_active(pool, project_id).await?
        };
        Ok(points)
    }

    // -----------------------------------------------------------------------
    // Transform
    // -----------------------------------------------------------------------

    /// The project's local transform, refitted if the active point set
    /// changed since the cached fit.
    ///
    /// Fewer than two active points is [`CalibrationStatus::NotCalibrated`],
    /// not an error. Points that cannot be fitted (collinear, coincident)
    /// are a `Transform` error.
    pub async fn get_transform(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<CalibrationStatus, EngineError> {
        // Read the version and the point set under a shared lock on the
        // settings row so they belong together.
        let mut tx = pool.begin().await?;
        let settings = CoordinateSettingsRepo::find_for_share(&mut *tx, project_id)
            .await?
            .ok_or_else(|| settings_not_found(project_id))?;
        let version = settings.points_version;

        if let Some(cached) = CoordinateTransformRepo::find(&mut *tx, project_id).await? {
            if cached.source_version == version {
                if let Some(transform) = cached.to_transform() {
                    tx.commit().await?;
                    return Ok(CalibrationStatus::Calibrated { transform });
                }
            }
        }

        let points = CalibrationPointRepo::list_active(&mut *tx, project_id).await?;
        tx.commit().await?;

        let active = points.len();
        if active < MIN_POINTS {
            CoordinateTransformRepo::delete_stale(pool, project_id, version).await?;
            CoordinateSettingsRepo::update_summary(
                pool,
                project_id,
                version,
                &CalibrationSummary {
                    is_calibrated: false,
                    active_point_count: active as i32,
                    rmse_m: None,
                    max_error_m: None,
                },
            )
            .await?;
            return Ok(CalibrationStatus::NotCalibrated {
                active_points: active,
            });
        }

        let correspondences: Vec<Correspondence> =
            points.iter().map(CalibrationPoint::correspondence).collect();
        let transform = match fit_transform(&correspondences) {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!(project_id, points_version = version, error = %e, "Calibration fit failed");
                CoordinateTransformRepo::delete_stale(pool, project_id, version).await?;
                CoordinateSettingsRepo::update_summary(
                    pool,
                    project_id,
                    version,
                    &CalibrationSummary {
                        is_calibrated: false,
                        active_point_count: active as i32,
                        rmse_m: None,
                        max_error_m: None,
                    },
                )
                .await?;
                return Err(e.into());
            }
        };

        let stored =
            CoordinateTransformRepo::upsert_if_newer(pool, project_id, version, &transform).await?;
        CoordinateSettingsRepo::update_summary(
            pool,
            project_id,
            version,
            &CalibrationSummary {
                is_calibrated: true,
                active_point_count: active as i32,
                rmse_m: Some(transform.rmse_m),
                max_error_m: Some(transform.max_error_m),
            },
        )
        .await?;

        tracing::debug!(
            project_id,
            points_version = version,
            kind = transform.kind.as_str(),
            rmse_m = transform.rmse_m,
            stored,
            "Calibration transform fitted",
        );
        Ok(CalibrationStatus::Calibrated { transform })
    }

    /// Per-point residuals of a fit over the current active points.
    pub async fn accuracy_report(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<CalibrationAccuracy, EngineError> {
        let points = CalibrationPointRepo::list_active(pool, project_id).await?;
        if points.len() < MIN_POINTS {
            return Err(CoreError::NotCalibrated {
                project_id,
                active_points: points.len(),
            }
            .into());
        }
        let correspondences: Vec<Correspondence> =
            points.iter().map(CalibrationPoint::correspondence).collect();
        let transform = fit_transform(&correspondences)?;
        let report = evaluate_accuracy(&transform, &correspondences);
        Ok(CalibrationAccuracy {
            transform,
            report,
            points,
        })
    }

    // -----------------------------------------------------------------------
    // Conversion
    // -----------------------------------------------------------------------

    pub async fn settings(pool: &PgPool, project_id: DbId) -> Result<CoordinateSettings, EngineError> {
        CoordinateSettingsRepo::find(pool, project_id)
            .await?
            .ok_or_else(|| settings_not_found(project_id))
    }

    /// Switch a project between the local calibration and a fixed CRS.
    pub async fn set_coordinate_system(
        pool: &PgPool,
        project_id: DbId,
        coordinate_system: &str,
        model_unit: Option<&str>,
    ) -> Result<CoordinateSettings, EngineError> {
        let pathway = CoordinatePathway::from_str_db(coordinate_system)?;
        let unit = model_unit.map(ModelUnit::from_str_db).transpose()?;

        let settings = CoordinateSettingsRepo::set_coordinate_system(
            pool,
            project_id,
            pathway.as_str(),
            unit.map(|u| u.as_str()),
        )
        .await?
        .ok_or_else(|| settings_not_found(project_id))?;

        tracing::info!(
            project_id,
            coordinate_system = %settings.coordinate_system,
            model_unit = %settings.model_unit,
            "Coordinate system changed",
        );
        Ok(settings)
    }

    pub async fn convert_model_to_gps(
        pool: &PgPool,
        project_id: DbId,
        model: &ModelCoord,
    ) -> Result<GpsCoord, EngineError> {
        let settings = Self::settings(pool, project_id).await?;
        match settings.pathway()? {
            CoordinatePathway::Fixed(projection) => Ok(EffectivePathway::Fixed {
                projection,
                unit: settings.unit()?,
            }
            .model_to_gps(model)?),
            CoordinatePathway::Local => {
                let status = Self::get_transform(pool, project_id).await?;
                Ok(EffectivePathway::Local {
                    project_id,
                    status: &status,
                }
                .model_to_gps(model)?)
            }
        }
    }

    pub async fn convert_gps_to_model(
        pool: &PgPool,
        project_id: DbId,
        gps: &GpsCoord,
    ) -> Result<ModelCoord, EngineError> {
        let settings = Self::settings(pool, project_id).await?;
        match settings.pathway()? {
            CoordinatePathway::Fixed(projection) => Ok(EffectivePathway::Fixed {
                projection,
                unit: settings.unit()?,
            }
            .gps_to_model(gps)?),
            CoordinatePathway::Local => {
                let status = Self::get_transform(pool, project_id).await?;
                Ok(EffectivePathway::Local {
                    project_id,
                    status: &status,
                }
                .gps_to_model(gps)?)
            }
        }
    }
}
