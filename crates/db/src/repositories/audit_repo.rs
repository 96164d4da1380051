//! Repository for the append-only `audit_log` table.

use sqlx::{PgExecutor, PgPool};
use sitecheck_core::audit::{AuditDraft, EntityType};
use sitecheck_core::types::{DbId, Timestamp};
use uuid::Uuid;

use crate::models::audit::{AuditLogEntry, AuditQuery};

/// Column list for `audit_log` SELECT queries.
const COLUMNS: &str = "\
    id, project_id, entity_type, entity_id, action, old_values, new_values, \
    actor, bulk_action_id, created_at";

/// Default and maximum page sizes for reporting queries.
const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

// ---------------------------------------------------------------------------
// AuditLogRepo
// ---------------------------------------------------------------------------

/// Append and query operations for the audit trail. There is no update or
/// delete; the table refuses both.
pub struct AuditLogRepo;

impl AuditLogRepo {
    /// Append one entry. Call inside the mutating operation's transaction.
    pub async fn record<'e>(
        db: impl PgExecutor<'e>,
        entry: &AuditDraft,
    ) -> Result<AuditLogEntry, sqlx::Error> {
        let query = format!(
            "INSERT INTO audit_log \
                (project_id, entity_type, entity_id, action, old_values, new_values, \
                 actor, bulk_action_id) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AuditLogEntry>(&query)
            .bind(entry.project_id)
            .bind(entry.entity_type.as_str())
            .bind(entry.entity_id)
            .bind(entry.action.as_str())
            .bind(&entry.old_values)
            .bind(&entry.new_values)
            .bind(&entry.actor)
            .bind(entry.bulk_action_id)
            .fetch_one(db)
            .await
    }

    /// One page of an entity's history, newest first. Pass the smallest id
    /// of the previous page as `before_id` to continue.
    pub async fn query_history<'e>(
        db: impl PgExecutor<'e>,
        entity_type: EntityType,
        entity_id: DbId,
        before_id: Option<DbId>,
        limit: i64,
    ) -> Result<Vec<AuditLogEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM audit_log \
             WHERE entity_type = $1 AND entity_id = $2 \
               AND ($3::BIGINT IS NULL OR id < $3) \
             ORDER BY id DESC \
             LIMIT $4"
        );
        sqlx::query_as::<_, AuditLogEntry>(&query)
            .bind(entity_type.as_str())
            .bind(entity_id)
            .bind(before_id)
            .bind(limit.clamp(1, MAX_LIMIT))
            .fetch_all(db)
            .await
    }

    /// Id of the newest entry for an entity, if it has any.
    pub async fn latest_id<'e>(
        db: impl PgExecutor<'e>,
        entity_type: EntityType,
        entity_id: DbId,
    ) -> Result<Option<DbId>, sqlx::Error> {
        sqlx::query_scalar::<_, Option<DbId>>(
            "SELECT MAX(id) FROM audit_log WHERE entity_type = $1 AND entity_id = $2",
        )
        .bind(entity_type.as_str())
        .bind(entity_id)
        .fetch_one(db)
        .await
    }

    /// All entries produced by one bulk call, in insertion order.
    pub async fn list_by_bulk_action<'e>(
        db: impl PgExecutor<'e>,
        bulk_action_id: Uuid,
    ) -> Result<Vec<AuditLogEntry>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM audit_log WHERE bulk_action_id = $1 ORDER BY id");
        sqlx::query_as::<_, AuditLogEntry>(&query)
            .bind(bulk_action_id)
            .fetch_all(db)
            .await
    }

    /// Query a project's audit trail with filtering and pagination.
    pub async fn query(
        pool: &PgPool,
        project_id: DbId,
        params: &AuditQuery,
    ) -> Result<Vec<AuditLogEntry>, sqlx::Error> {
        let limit = params.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let offset = params.offset.unwrap_or(0).max(0);

        let (where_clause, bind_values, bind_idx) = build_audit_filter(params);

        let query = format!(
            "SELECT {COLUMNS} FROM audit_log WHERE project_id = $1 {where_clause} \
             ORDER BY id DESC \
             LIMIT ${bind_idx} OFFSET ${}",
            bind_idx + 1
        );

        let mut q = sqlx::query_as::<_, AuditLogEntry>(&query).bind(project_id);
        for val in bind_values {
            q = match val {
                BindValue::BigInt(v) => q.bind(v),
                BindValue::Text(v) => q.bind(v),
                BindValue::Uuid(v) => q.bind(v),
                BindValue::Timestamp(v) => q.bind(v),
            };
        }
        q.bind(limit).bind(offset).fetch_all(pool).await
    }

    /// Count entries matching the filter (for pagination metadata).
    pub async fn count(
        pool: &PgPool,
        project_id: DbId,
        params: &AuditQuery,
    ) -> Result<i64, sqlx::Error> {
        let (where_clause, bind_values, _) = build_audit_filter(params);
        let query = format!(
            "SELECT COUNT(*)::BIGINT FROM audit_log WHERE project_id = $1 {where_clause}"
        );

        let mut q = sqlx::query_scalar::<_, i64>(&query).bind(project_id);
        for val in bind_values {
            q = match val {
                BindValue::BigInt(v) => q.bind(v),
                BindValue::Text(v) => q.bind(v),
                BindValue::Uuid(v) => q.bind(v),
                BindValue::Timestamp(v) => q.bind(v),
            };
        }
        q.fetch_one(pool).await
    }
}

// ---------------------------------------------------------------------------
// Internal helpers for dynamic query building
// ---------------------------------------------------------------------------

/// Typed bind value for dynamically-built audit queries.
enum BindValue {
    BigInt(i64),
    Text(String),
    Uuid(Uuid),
    Timestamp(Timestamp),
}

/// Build the extra `AND ...` conditions for `params`. `$1` is reserved for
/// the project id.
///
/// Returns `(conditions, bind_values, next_bind_index)`.
fn build_audit_filter(params: &AuditQuery) -> (String, Vec<BindValue>, u32) {
    let mut conditions: Vec<String> = Vec::new();
    let mut bind_idx = 2u32;
    let mut bind_values: Vec<BindValue> = Vec::new();

    if let Some(ref entity_type) = params.entity_type {
        conditions.push(format!("entity_type = ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Text(entity_type.clone()));
    }

    if let Some(entity_id) = params.entity_id {
        conditions.push(format!("entity_id = ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::BigInt(entity_id));
    }

    if let Some(ref action) = params.action {
        conditions.push(format!("action = ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Text(action.clone()));
    }

    if let Some(ref actor) = params.actor {
        conditions.push(format!("actor = ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Text(actor.clone()));
    }

    if let Some(bulk_action_id) = params.bulk_action_id {
        conditions.push(format!("bulk_action_id = ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Uuid(bulk_action_id));
    }

    if let Some(from) = params.from {
        conditions.push(format!("created_at >= ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Timestamp(from));
    }

    if let Some(to) = params.to {
        conditions.push(format!("created_at <= ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Timestamp(to));
    }

    let clause = conditions
        .iter()
        .map(|c| format!("AND {c}"))
        .collect::<Vec<_>>()
        .join(" ");
    (clause, bind_values, bind_idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_filter_starts_binds_after_project() {
        let (clause, binds, idx) = build_audit_filter(&AuditQuery::default());
        assert!(clause.is_empty());
        assert!(binds.is_empty());
        assert_eq!(idx, 2);
    }

    #[test]
    fn filter_numbers_binds_sequentially() {
        let params = AuditQuery {
            entity_type: Some("checkpoint".into()),
            action: Some("approved".into()),
            ..Default::default()
        };
        let (clause, binds, idx) = build_audit_filter(&params);
        assert_eq!(clause, "AND entity_type = $2 AND action = $3");
        assert_eq!(binds.len(), 2);
        assert_eq!(idx, 4);
    }
}
