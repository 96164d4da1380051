//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods. Single
//! statement methods accept any `PgExecutor`, so they run against the pool
//! or inside a caller's transaction (`&mut *tx`) alike.

pub mod audit_repo;
pub mod bulk_action_repo;
pub mod calibration_repo;
pub mod checkpoint_repo;
pub mod element_repo;
pub mod plan_item_repo;
pub mod project_repo;
pub mod upload_queue_repo;

pub use audit_repo::AuditLogRepo;
pub use bulk_action_repo::BulkActionLogRepo;
pub use calibration_repo::{CalibrationPointRepo, CoordinateSettingsRepo, CoordinateTransformRepo};
pub use checkpoint_repo::{CheckpointRepo, InspectionResultRepo};
pub use element_repo::{CheckpointGroupRepo, ElementRepo};
pub use plan_item_repo::PlanItemRepo;
pub use project_repo::ProjectRepo;
pub use upload_queue_repo::UploadQueueRepo;
