//! Paged, lazily evaluated entity history backed by the audit log.

use std::collections::VecDeque;

use serde_json::Value;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use sitecheck_core::audit::EntityType;
use sitecheck_core::history::{HistoryEvent, HistoryItem, HistoryReplay};
use sitecheck_core::types::DbId;
use sitecheck_db::repositories::AuditLogRepo;

use crate::error::EngineError;

pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// Begin a read-only transaction whose statements all see one snapshot.
/// An entity row and the newest audit id read inside it agree, since every
/// mutation commits both together.
pub(crate) async fn begin_snapshot(
    pool: &PgPool,
) -> Result<Transaction<'static, Postgres>, EngineError> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
        .execute(&mut *tx)
        .await?;
    Ok(tx)
}

/// Newest-first history of one entity.
///
/// Audit pages are fetched only as [`EntityHistory::next`] drains them.
/// The sequence ends at the creation entry and can be replayed from the
/// start with [`EntityHistory::restart`].
pub struct EntityHistory {
    pool: PgPool,
    entity_type: EntityType,
    entity_id: DbId,
    current: Value,
    /// Exclusive upper bound on entry ids, fixed when the snapshot was read.
    upper_bound: Option<DbId>,
    page_size: i64,
    replay: HistoryReplay,
    page: VecDeque<HistoryEvent>,
    exhausted: bool,
}

impl EntityHistory {
    /// Read the newest entry id for the entity on `conn`. Call it in the
    /// same snapshot that produced `current` and pass the result to
    /// [`EntityHistory::new`].
    pub async fn bound(
        conn: &mut PgConnection,
        entity_type: EntityType,
        entity_id: DbId,
    ) -> Result<Option<DbId>, EngineError> {
        Ok(AuditLogRepo::latest_id(conn, entity_type, entity_id).await?)
    }

    /// `latest_id` is the newest entry reflected in `current`; `None` when
    /// the entity has no entries at all.
    pub fn new(
        pool: PgPool,
        entity_type: EntityType,
        entity_id: DbId,
        current: Value,
        latest_id: Option<DbId>,
    ) -> Self {
        Self {
            pool,
            entity_type,
            entity_id,
            replay: HistoryReplay::new(current.clone()),
            current,
            upper_bound: latest_id.map(|id| id + 1),
            page_size: DEFAULT_PAGE_SIZE,
            page: VecDeque::new(),
            exhausted: latest_id.is_none(),
        }
    }

    pub fn with_page_size(mut self, page_size: i64) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// The next-older event with the entity state right after it.
    pub async fn next(&mut self) -> Result<Option<HistoryItem>, EngineError> {
        if self.replay.is_finished() {
            return Ok(None);
        }
        if self.page.is_empty() && !self.exhausted {
            self.fetch_page().await?;
        }
        match self.page.pop_front() {
            Some(event) => Ok(Some(self.replay.step(event)?)),
            None => Ok(None),
        }
    }

    /// Rewind to the newest event.
    pub fn restart(&mut self) {
        self.replay = HistoryReplay::new(self.current.clone());
        self.page.clear();
        self.exhausted = self.upper_bound.is_none();
    }

    /// Drain up to `limit` items (all remaining if `None`).
    pub async fn take(&mut self, limit: Option<usize>) -> Result<Vec<HistoryItem>, EngineError> {
        let mut items = Vec::new();
        while limit.map_or(true, |n| items.len() < n) {
            match self.next().await? {
                Some(item) => items.push(item),
                None => break,
            }
        }
        Ok(items)
    }

    async fn fetch_page(&mut self) -> Result<(), EngineError> {
        let before = self.replay.cursor().or(self.upper_bound);
        let rows = AuditLogRepo::query_history(
            &self.pool,
            self.entity_type,
            self.entity_id,
            before,
            self.page_size,
        )
        .await?;

        if (rows.len() as i64) < self.page_size {
            self.exhausted = true;
        }
        for row in rows {
            self.page.push_back(row.to_history_event()?);
        }
        Ok(())
    }
}
