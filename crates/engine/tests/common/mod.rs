//! Shared fixtures for engine integration tests.

use sqlx::PgPool;
use sitecheck_core::element::ElementDescriptors;
use sitecheck_core::geo::{GpsCoord, ModelCoord};
use sitecheck_core::types::DbId;
use sitecheck_core::workflow::{Actor, ActorRole, TransitionRequest, WorkflowAction};
use sitecheck_db::models::calibration::CreateCalibrationPoint;
use sitecheck_db::models::checkpoint::{Checkpoint, CreateCheckpoint};
use sitecheck_db::models::element::{CreateElement, Element};
use sitecheck_db::models::project::CreateProject;
use sitecheck_db::repositories::ProjectRepo;
use sitecheck_engine::lifecycle::ElementLifecycle;
use sitecheck_engine::workflow::InspectionWorkflow;

pub fn inspector() -> Actor {
    Actor::new("ines", ActorRole::Inspector)
}

pub fn reviewer() -> Actor {
    Actor::new("rein", ActorRole::Reviewer)
}

pub fn admin() -> Actor {
    Actor::new("ada", ActorRole::Admin)
}

pub async fn new_project(pool: &PgPool) -> DbId {
    ProjectRepo::create(
        pool,
        &CreateProject {
            name: "Harbour Tower".to_string(),
            coordinate_system: None,
            model_unit: None,
        },
    )
    .await
    .unwrap()
    .id
}

pub async fn new_element(pool: &PgPool, project_id: DbId, guid: &str) -> Element {
    ElementLifecycle::create_element(
        pool,
        project_id,
        &CreateElement {
            guid: guid.to_string(),
            descriptors: ElementDescriptors {
                assembly_mark: Some(format!("M-{guid}")),
                product_name: Some("Precast column".into()),
                object_type: Some("IfcColumn".into()),
            },
        },
        "importer",
    )
    .await
    .unwrap()
}

pub async fn new_checkpoint(pool: &PgPool, project_id: DbId, element_id: DbId) -> Checkpoint {
    InspectionWorkflow::create_checkpoint(
        pool,
        project_id,
        &CreateCheckpoint {
            element_id: Some(element_id),
            group_id: None,
            name: "Anchor bolts".into(),
            assigned_to: None,
        },
        "planner",
    )
    .await
    .unwrap()
}

/// Run `actions` in order against a checkpoint, panicking on failure.
pub async fn drive(pool: &PgPool, project_id: DbId, checkpoint_id: DbId, actions: &[WorkflowAction]) {
    for action in actions {
        let actor = if action.is_decision() { reviewer() } else { inspector() };
        InspectionWorkflow::transition(
            pool,
            project_id,
            checkpoint_id,
            &TransitionRequest::new(*action),
            &actor,
        )
        .await
        .unwrap();
    }
}

/// A checkpoint already waiting for review.
pub async fn completed_checkpoint(pool: &PgPool, project_id: DbId, guid: &str) -> Checkpoint {
    let element = new_element(pool, project_id, guid).await;
    let cp = new_checkpoint(pool, project_id, element.id).await;
    drive(
        pool,
        project_id,
        cp.id,
        &[WorkflowAction::Start, WorkflowAction::Complete],
    )
    .await;
    cp
}

pub fn point(x: f64, y: f64, lat: f64, lon: f64) -> CreateCalibrationPoint {
    CreateCalibrationPoint {
        model: ModelCoord::new(x, y),
        gps: GpsCoord::new(lat, lon),
        description: Some("Column grid intersection".into()),
        element_guid: None,
        captured_by: "surveyor".into(),
    }
}
