//! Calibration store behaviour against a real database.

mod common;

use approx::assert_abs_diff_eq;
use assert_matches::assert_matches;
use sqlx::PgPool;
use sitecheck_core::calibration::CalibrationStatus;
use sitecheck_core::error::CoreError;
use sitecheck_core::geo::{GpsCoord, ModelCoord};
use sitecheck_core::transform::{TransformError, TransformKind};
use sitecheck_db::repositories::{CoordinateSettingsRepo, CoordinateTransformRepo};
use sitecheck_engine::calibration_store::CalibrationStore;
use sitecheck_engine::EngineError;

use common::{new_project, point};

const LAT: f64 = 59.437;
const LON: f64 = 24.7536;
/// Degrees per 100 m at the test latitude.
const DLAT_100M: f64 = 0.000_898;
const DLON_100M: f64 = 0.001_766_6;

async fn points_version(pool: &PgPool, project_id: i64) -> i64 {
    CoordinateSettingsRepo::find(pool, project_id)
        .await
        .unwrap()
        .unwrap()
        .points_version
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn too_few_points_is_not_calibrated(pool: PgPool) {
    let project_id = new_project(&pool).await;

    let status = CalibrationStore::get_transform(&pool, project_id).await.unwrap();
    assert_eq!(status, CalibrationStatus::NotCalibrated { active_points: 0 });

    CalibrationStore::add_point(&pool, project_id, &point(0.0, 0.0, LAT, LON))
        .await
        .unwrap();
    let status = CalibrationStore::get_transform(&pool, project_id).await.unwrap();
    assert_eq!(status, CalibrationStatus::NotCalibrated { active_points: 1 });

    let err = CalibrationStore::convert_model_to_gps(&pool, project_id, &ModelCoord::new(1.0, 1.0))
        .await
        .unwrap_err();
    assert_matches!(
        err,
        EngineError::Core(CoreError::NotCalibrated { active_points: 1, .. })
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn transform_is_cached_per_points_version(pool: PgPool) {
    let project_id = new_project(&pool).await;
    CalibrationStore::add_point(&pool, project_id, &point(0.0, 0.0, LAT, LON))
        .await
        .unwrap();
    CalibrationStore::add_point(&pool, project_id, &point(100.0, 0.0, LAT, LON + DLON_100M))
        .await
        .unwrap();

    let first = CalibrationStore::get_transform(&pool, project_id).await.unwrap();
    let transform = first.transform().cloned().expect("two points calibrate");
    assert_eq!(transform.kind, TransformKind::Helmert);

    let version = points_version(&pool, project_id).await;
    let cached = CoordinateTransformRepo::find(&pool, project_id)
        .await
        .unwrap()
        .expect("fit is cached");
    assert_eq!(cached.source_version, version);

    let settings = CoordinateSettingsRepo::find(&pool, project_id).await.unwrap().unwrap();
    assert!(settings.is_calibrated);
    assert_eq!(settings.active_point_count, 2);

    let second = CalibrationStore::get_transform(&pool, project_id).await.unwrap();
    assert_eq!(second, first);

    CalibrationStore::add_point(&pool, project_id, &point(0.0, 100.0, LAT + DLAT_100M, LON))
        .await
        .unwrap();
    assert_eq!(points_version(&pool, project_id).await, version + 1);

    let third = CalibrationStore::get_transform(&pool, project_id).await.unwrap();
    let refit = third.transform().expect("three points calibrate");
    assert_eq!(refit.kind, TransformKind::Affine);
    assert_eq!(refit.point_count, 3);
    let cached = CoordinateTransformRepo::find(&pool, project_id).await.unwrap().unwrap();
    assert_eq!(cached.source_version, version + 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn deactivating_twice_bumps_the_version_once(pool: PgPool) {
    let project_id = new_project(&pool).await;
    let added = CalibrationStore::add_point(&pool, project_id, &point(0.0, 0.0, LAT, LON))
        .await
        .unwrap();
    let before = points_version(&pool, project_id).await;

    let first = CalibrationStore::deactivate_point(&pool, project_id, added.point.id, "surveyor")
        .await
        .unwrap();
    assert!(!first.is_active);
    assert_eq!(points_version(&pool, project_id).await, before + 1);

    let second = CalibrationStore::deactivate_point(&pool, project_id, added.point.id, "surveyor")
        .await
        .unwrap();
    assert!(!second.is_active);
    assert_eq!(second.deactivated_at, first.deactivated_at);
    assert_eq!(points_version(&pool, project_id).await, before + 1);

    let all = CalibrationStore::list_points(&pool, project_id, true).await.unwrap();
    assert_eq!(all.len(), 1);
    assert!(CalibrationStore::list_points(&pool, project_id, false)
        .await
        .unwrap()
        .is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn deactivating_unknown_point_is_not_found(pool: PgPool) {
    let project_id = new_project(&pool).await;
    let err = CalibrationStore::deactivate_point(&pool, project_id, 999, "surveyor")
        .await
        .unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn poor_accuracy_is_stored_with_a_notice(pool: PgPool) {
    let project_id = new_project(&pool).await;
    let mut input = point(0.0, 0.0, LAT, LON);
    input.gps = GpsCoord {
        accuracy_m: Some(12.0),
        ..GpsCoord::new(LAT, LON)
    };

    let added = CalibrationStore::add_point(&pool, project_id, &input).await.unwrap();
    assert!(added.notice.is_some());
    assert!(added.point.is_active);
    assert_eq!(added.point.accuracy_m, Some(12.0));

    let good = CalibrationStore::add_point(&pool, project_id, &point(5.0, 5.0, LAT, LON))
        .await
        .unwrap();
    assert!(good.notice.is_none());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn collinear_points_are_a_singular_configuration(pool: PgPool) {
    let project_id = new_project(&pool).await;
    for (x, dlon) in [(0.0, 0.0), (50.0, DLON_100M / 2.0), (100.0, DLON_100M)] {
        CalibrationStore::add_point(&pool, project_id, &point(x, 0.0, LAT, LON + dlon))
            .await
            .unwrap();
    }

    let err = CalibrationStore::get_transform(&pool, project_id).await.unwrap_err();
    assert_matches!(
        err,
        EngineError::Core(CoreError::Transform(TransformError::SingularConfiguration { .. }))
    );

    let settings = CoordinateSettingsRepo::find(&pool, project_id).await.unwrap().unwrap();
    assert!(!settings.is_calibrated);
    assert_eq!(settings.active_point_count, 3);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn local_conversion_round_trips(pool: PgPool) {
    let project_id = new_project(&pool).await;
    for p in [
        point(0.0, 0.0, LAT, LON),
        point(100.0, 0.0, LAT, LON + DLON_100M),
        point(0.0, 100.0, LAT + DLAT_100M, LON),
    ] {
        CalibrationStore::add_point(&pool, project_id, &p).await.unwrap();
    }

    let model = ModelCoord::new(30.0, 40.0);
    let gps = CalibrationStore::convert_model_to_gps(&pool, project_id, &model)
        .await
        .unwrap();
    assert!(gps.latitude > LAT && gps.latitude < LAT + DLAT_100M);
    assert!(gps.longitude > LON && gps.longitude < LON + DLON_100M);

    let back = CalibrationStore::convert_gps_to_model(&pool, project_id, &gps)
        .await
        .unwrap();
    assert_abs_diff_eq!(back.x, model.x, epsilon = 1e-4);
    assert_abs_diff_eq!(back.y, model.y, epsilon = 1e-4);

    let accuracy = CalibrationStore::accuracy_report(&pool, project_id).await.unwrap();
    assert_eq!(accuracy.points.len(), 3);
    assert_eq!(accuracy.report.per_point.len(), 3);
    assert!(accuracy.report.rmse_m < 0.01);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn fixed_projection_needs_no_calibration(pool: PgPool) {
    let project_id = new_project(&pool).await;

    let settings = CalibrationStore::set_coordinate_system(&pool, project_id, "EPSG:3857", Some("m"))
        .await
        .unwrap();
    assert_eq!(settings.coordinate_system, "EPSG:3857");
    assert_eq!(settings.model_unit, "m");

    let model = ModelCoord::new(2_755_000.0, 8_300_000.0);
    let gps = CalibrationStore::convert_model_to_gps(&pool, project_id, &model)
        .await
        .unwrap();
    let back = CalibrationStore::convert_gps_to_model(&pool, project_id, &gps)
        .await
        .unwrap();
    assert_abs_diff_eq!(back.x, model.x, epsilon = 1e-3);
    assert_abs_diff_eq!(back.y, model.y, epsilon = 1e-3);

    let err = CalibrationStore::set_coordinate_system(&pool, project_id, "EPSG:4326", None)
        .await
        .unwrap_err();
    assert_eq!(err.code(), "VALIDATION_ERROR");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn concurrent_readers_see_a_consistent_fit_while_points_change(pool: PgPool) {
    let project_id = new_project(&pool).await;
    CalibrationStore::add_point(&pool, project_id, &point(0.0, 0.0, LAT, LON))
        .await
        .unwrap();
    CalibrationStore::add_point(&pool, project_id, &point(100.0, 0.0, LAT, LON + DLON_100M))
        .await
        .unwrap();

    let read = || CalibrationStore::get_transform(&pool, project_id);
    let third = point(0.0, 100.0, LAT + DLAT_100M, LON);
    let (r1, r2, r3, added, r4, r5, r6) = tokio::join!(
        read(),
        read(),
        read(),
        CalibrationStore::add_point(&pool, project_id, &third),
        read(),
        read(),
        read(),
    );
    added.unwrap();

    // Each reader saw either the two-point or the three-point set, never a mix.
    for status in [r1, r2, r3, r4, r5, r6] {
        let status = status.unwrap();
        let transform = status.transform().expect("calibrated");
        match transform.point_count {
            2 => assert_eq!(transform.kind, TransformKind::Helmert),
            3 => assert_eq!(transform.kind, TransformKind::Affine),
            n => panic!("fit over {n} points"),
        }
    }

    // Whatever order the racing writes landed in, the cache ends on the
    // newest point set.
    let settled = CalibrationStore::get_transform(&pool, project_id).await.unwrap();
    assert_eq!(settled.transform().unwrap().point_count, 3);
    let cached = CoordinateTransformRepo::find(&pool, project_id).await.unwrap().unwrap();
    assert_eq!(cached.source_version, points_version(&pool, project_id).await);
    let settings = CoordinateSettingsRepo::find(&pool, project_id).await.unwrap().unwrap();
    assert_eq!(settings.active_point_count, 3);
}
