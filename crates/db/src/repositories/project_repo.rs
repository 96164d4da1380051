//! Repository for the `projects` table.

use sqlx::PgPool;
use sitecheck_core::types::DbId;

use crate::models::project::{CreateProject, Project};

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, name, created_at, updated_at";

/// Provides CRUD operations for projects.
pub struct ProjectRepo;

impl ProjectRepo {
    /// Insert a project together with its coordinate settings row.
    ///
    /// Settings default to the `local` pathway with millimetre model units.
    pub async fn create(pool: &PgPool, input: &CreateProject) -> Result<Project, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let query = format!("INSERT INTO projects (name) VALUES ($1) RETURNING {COLUMNS}");
        let project = sqlx::query_as::<_, Project>(&query)
            .bind(&input.name)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO project_coordinate_settings (project_id, coordinate_system, model_unit) \
             VALUES ($1, COALESCE($2, 'local'), COALESCE($3, 'mm'))",
        )
        .bind(project.id)
        .bind(&input.coordinate_system)
        .bind(&input.model_unit)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(project)
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Project>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects WHERE id = $1");
        sqlx::query_as::<_, Project>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List all projects ordered by most recently created first.
    pub async fn list(pool: &PgPool) -> Result<Vec<Project>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM projects ORDER BY created_at DESC, id DESC");
        sqlx::query_as::<_, Project>(&query).fetch_all(pool).await
    }
}
