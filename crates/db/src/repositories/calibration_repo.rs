//! Repositories for calibration points, coordinate settings and the cached
//! coordinate transform.

use sqlx::{PgExecutor, PgPool};
use sitecheck_core::transform::CoordinateTransform;
use sitecheck_core::types::DbId;

use crate::models::calibration::{
    CalibrationPoint, CalibrationSummary, CoordinateSettings, CoordinateTransformRow,
    CreateCalibrationPoint,
};

// ---------------------------------------------------------------------------
// Column lists
// ---------------------------------------------------------------------------

const POINT_COLUMNS: &str = "\
    id, project_id, model_x, model_y, model_z, latitude, longitude, altitude, \
    accuracy_m, description, element_guid, is_active, captured_at, captured_by, \
    deactivated_at, deactivated_by, created_at, updated_at";

const SETTINGS_COLUMNS: &str = "\
    project_id, coordinate_system, model_unit, points_version, is_calibrated, \
    active_point_count, rmse_m, max_error_m, created_at, updated_at";

const TRANSFORM_COLUMNS: &str = "\
    project_id, source_version, kind, a, b, c, d, tx, ty, rotation_deg, scale, \
    model_origin_x, model_origin_y, origin_latitude, origin_longitude, point_count, \
    rmse_m, max_error_m, created_at, updated_at";

// ---------------------------------------------------------------------------
// CalibrationPointRepo
// ---------------------------------------------------------------------------

pub struct CalibrationPointRepo;

impl CalibrationPointRepo {
    pub async fn create<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
        input: &CreateCalibrationPoint,
    ) -> Result<CalibrationPoint, sqlx::Error> {
        let query = format!(
            "INSERT INTO calibration_points \
                (project_id, model_x, model_y, model_z, latitude, longitude, altitude, \
                 accuracy_m, description, element_guid, captured_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {POINT_COLUMNS}"
        );
        sqlx::query_as::<_, CalibrationPoint>(&query)
            .bind(project_id)
            .bind(input.model.x)
            .bind(input.model.y)
            .bind(input.model.z)
            .bind(input.gps.latitude)
            .bind(input.gps.longitude)
            .bind(input.gps.altitude)
            .bind(input.gps.accuracy_m)
            .bind(&input.description)
            .bind(&input.element_guid)
            .bind(&input.captured_by)
            .fetch_one(db)
            .await
    }

    pub async fn find_by_id<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
        id: DbId,
    ) -> Result<Option<CalibrationPoint>, sqlx::Error> {
        let query =
            format!("SELECT {POINT_COLUMNS} FROM calibration_points WHERE id = $1 AND project_id = $2");
        sqlx::query_as::<_, CalibrationPoint>(&query)
            .bind(id)
            .bind(project_id)
            .fetch_optional(db)
            .await
    }

    /// Deactivate an active point. Returns `None` if the point was already
    /// inactive (or does not exist), so repeated calls change nothing.
    pub async fn deactivate<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
        id: DbId,
        deactivated_by: &str,
    ) -> Result<Option<CalibrationPoint>, sqlx::Error> {
        let query = format!(
            "UPDATE calibration_points \
             SET is_active = false, deactivated_at = NOW(), deactivated_by = $3 \
             WHERE id = $1 AND project_id = $2 AND is_active \
             RETURNING {POINT_COLUMNS}"
        );
        sqlx::query_as::<_, CalibrationPoint>(&query)
            .bind(id)
            .bind(project_id)
            .bind(deactivated_by)
            .fetch_optional(db)
            .await
    }

    /// Active points in capture order. The fit input order is stable, so
    /// residual indices line up with this list.
    pub async fn list_active<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
    ) -> Result<Vec<CalibrationPoint>, sqlx::Error> {
        let query = format!(
            "SELECT {POINT_COLUMNS} FROM calibration_points \
             WHERE project_id = $1 AND is_active ORDER BY id"
        );
        sqlx::query_as::<_, CalibrationPoint>(&query)
            .bind(project_id)
            .fetch_all(db)
            .await
    }

    /// All points, including deactivated ones.
    pub async fn list_all(pool: &PgPool, project_id: DbId) -> Result<Vec<CalibrationPoint>, sqlx::Error> {
        let query = format!(
            "SELECT {POINT_COLUMNS} FROM calibration_points WHERE project_id = $1 ORDER BY id"
        );
        sqlx::query_as::<_, CalibrationPoint>(&query)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }
}

// ---------------------------------------------------------------------------
// CoordinateSettingsRepo
// ---------------------------------------------------------------------------

pub struct CoordinateSettingsRepo;

impl CoordinateSettingsRepo {
    pub async fn find<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
    ) -> Result<Option<CoordinateSettings>, sqlx::Error> {
        let query = format!(
            "SELECT {SETTINGS_COLUMNS} FROM project_coordinate_settings WHERE project_id = $1"
        );
        sqlx::query_as::<_, CoordinateSettings>(&query)
            .bind(project_id)
            .fetch_optional(db)
            .await
    }

    /// Read the settings row with a shared lock. Point mutations bump the
    /// version under an exclusive row lock, so the active point set stays
    /// consistent with the returned version until the transaction ends.
    pub async fn find_for_share<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
    ) -> Result<Option<CoordinateSettings>, sqlx::Error> {
        let query = format!(
            "SELECT {SETTINGS_COLUMNS} FROM project_coordinate_settings \
             WHERE project_id = $1 FOR SHARE"
        );
        sqlx::query_as::<_, CoordinateSettings>(&query)
            .bind(project_id)
            .fetch_optional(db)
            .await
    }

    /// Increment `points_version`, returning the new value.
    pub async fn bump_points_version<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
    ) -> Result<Option<i64>, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "UPDATE project_coordinate_settings SET points_version = points_version + 1 \
             WHERE project_id = $1 RETURNING points_version",
        )
        .bind(project_id)
        .fetch_optional(db)
        .await
    }

    /// Mirror the latest fit into the display cache, only if it was computed
    /// from the current point set.
    pub async fn update_summary<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
        version: i64,
        summary: &CalibrationSummary,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE project_coordinate_settings \
             SET is_calibrated = $3, active_point_count = $4, rmse_m = $5, max_error_m = $6 \
             WHERE project_id = $1 AND points_version = $2",
        )
        .bind(project_id)
        .bind(version)
        .bind(summary.is_calibrated)
        .bind(summary.active_point_count)
        .bind(summary.rmse_m)
        .bind(summary.max_error_m)
        .execute(db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Switch the conversion pathway and optionally the model unit.
    pub async fn set_coordinate_system<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
        coordinate_system: &str,
        model_unit: Option<&str>,
    ) -> Result<Option<CoordinateSettings>, sqlx::Error> {
        let query = format!(
            "UPDATE project_coordinate_settings \
             SET coordinate_system = $2, model_unit = COALESCE($3, model_unit) \
             WHERE project_id = $1 \
             RETURNING {SETTINGS_COLUMNS}"
        );
        sqlx::query_as::<_, CoordinateSettings>(&query)
            .bind(project_id)
            .bind(coordinate_system)
            .bind(model_unit)
            .fetch_optional(db)
            .await
    }
}

// ---------------------------------------------------------------------------
// CoordinateTransformRepo
// ---------------------------------------------------------------------------

pub struct CoordinateTransformRepo;

impl CoordinateTransformRepo {
    pub async fn find<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
    ) -> Result<Option<CoordinateTransformRow>, sqlx::Error> {
        let query =
            format!("SELECT {TRANSFORM_COLUMNS} FROM coordinate_transforms WHERE project_id = $1");
        sqlx::query_as::<_, CoordinateTransformRow>(&query)
            .bind(project_id)
            .fetch_optional(db)
            .await
    }

    /// Store a fit computed from `source_version`. An existing row is only
    /// replaced by a strictly newer version; returns whether a row was written.
    pub async fn upsert_if_newer<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
        source_version: i64,
        t: &CoordinateTransform,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "INSERT INTO coordinate_transforms \
                (project_id, source_version, kind, a, b, c, d, tx, ty, rotation_deg, scale, \
                 model_origin_x, model_origin_y, origin_latitude, origin_longitude, \
                 point_count, rmse_m, max_error_m) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18) \
             ON CONFLICT (project_id) DO UPDATE SET \
                source_version = EXCLUDED.source_version, kind = EXCLUDED.kind, \
                a = EXCLUDED.a, b = EXCLUDED.b, c = EXCLUDED.c, d = EXCLUDED.d, \
                tx = EXCLUDED.tx, ty = EXCLUDED.ty, \
                rotation_deg = EXCLUDED.rotation_deg, scale = EXCLUDED.scale, \
                model_origin_x = EXCLUDED.model_origin_x, \
                model_origin_y = EXCLUDED.model_origin_y, \
                origin_latitude = EXCLUDED.origin_latitude, \
                origin_longitude = EXCLUDED.origin_longitude, \
                point_count = EXCLUDED.point_count, rmse_m = EXCLUDED.rmse_m, \
                max_error_m = EXCLUDED.max_error_m \
             WHERE coordinate_transforms.source_version < EXCLUDED.source_version",
        )
        .bind(project_id)
        .bind(source_version)
        .bind(t.kind.as_str())
        .bind(t.a)
        .bind(t.b)
        .bind(t.c)
        .bind(t.d)
        .bind(t.tx)
        .bind(t.ty)
        .bind(t.rotation_deg)
        .bind(t.scale)
        .bind(t.model_origin_x)
        .bind(t.model_origin_y)
        .bind(t.origin_latitude)
        .bind(t.origin_longitude)
        .bind(t.point_count as i32)
        .bind(t.rmse_m)
        .bind(t.max_error_m)
        .execute(db)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Drop a cached fit older than `current_version`, e.g. once too few
    /// active points remain to fit anything.
    pub async fn delete_stale<'e>(
        db: impl PgExecutor<'e>,
        project_id: DbId,
        current_version: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "DELETE FROM coordinate_transforms WHERE project_id = $1 AND source_version < $2",
        )
        .bind(project_id)
        .bind(current_version)
        .execute(db)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
