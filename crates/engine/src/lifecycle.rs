//! Element identity and lifecycle: registration, GUID remap, logistics
//! milestones, checkpoint groups, plan items and history.

use chrono::Utc;
use sqlx::PgPool;
use sitecheck_core::audit::{AuditAction, AuditDraft, EntityType};
use sitecheck_core::element::{
    normalize_group_members, validate_guid, validate_remap, ElementLifecycleStats,
    GuidDependent, GuidHistoryEntry, GUID_DEPENDENTS,
};
use sitecheck_core::error::CoreError;
use sitecheck_core::types::{DbId, Timestamp};
use sitecheck_db::models::element::{
    CheckpointGroup, CreateCheckpointGroup, CreateElement, Element,
};
use sitecheck_db::models::plan_item::{CreatePlanItem, PlanItem, VALID_KINDS};
use sitecheck_db::repositories::{AuditLogRepo, CheckpointGroupRepo, ElementRepo, PlanItemRepo};

use crate::error::{is_foreign_key_violation, is_unique_violation, EngineError};
use crate::history::{begin_snapshot, EntityHistory};

const ELEMENT_GUID_CONSTRAINT: &str = "uq_elements_project_guid";

/// Default page size for element listings.
pub const DEFAULT_LIST_LIMIT: i64 = 100;
pub const MAX_LIST_LIMIT: i64 = 1000;

fn element_not_found(id: DbId) -> EngineError {
    CoreError::not_found("element", id).into()
}

fn guid_not_found(guid: &str) -> EngineError {
    CoreError::NotFound {
        entity: "element",
        id: guid.to_string(),
    }
    .into()
}

fn require_actor(actor: &str) -> Result<(), CoreError> {
    if actor.trim().is_empty() {
        return Err(CoreError::Validation("Actor must not be empty".to_string()));
    }
    Ok(())
}

pub struct ElementLifecycle;

impl ElementLifecycle {
    // -----------------------------------------------------------------------
    // Registration and lookup
    // -----------------------------------------------------------------------

    /// Register an element under its current model GUID.
    pub async fn create_element(
        pool: &PgPool,
        project_id: DbId,
        input: &CreateElement,
        actor: &str,
    ) -> Result<Element, EngineError> {
        validate_guid(&input.guid)?;
        input.descriptors.validate()?;
        require_actor(actor)?;

        let mut tx = pool.begin().await?;

        if let Some(existing) = ElementRepo::find_by_guid(&mut *tx, project_id, &input.guid).await? {
            return Err(CoreError::DuplicateGuid {
                project_id,
                guid: input.guid.clone(),
                existing_id: existing.id,
            }
            .into());
        }

        let element = match ElementRepo::create(&mut *tx, project_id, input, actor).await {
            Ok(e) => e,
            Err(e) if is_unique_violation(&e, ELEMENT_GUID_CONSTRAINT) => {
                tx.rollback().await?;
                let existing = ElementRepo::find_by_guid(pool, project_id, &input.guid).await?;
                return Err(match existing {
                    Some(holder) => CoreError::DuplicateGuid {
                        project_id,
                        guid: input.guid.clone(),
                        existing_id: holder.id,
                    },
                    None => CoreError::Conflict(format!(
                        "GUID '{}' was taken concurrently; retry",
                        input.guid
                    )),
                }
                .into());
            }
            Err(e) if is_foreign_key_violation(&e) => {
                return Err(CoreError::not_found("project", project_id).into());
            }
            Err(e) => return Err(e.into()),
        };

        AuditLogRepo::record(
            &mut *tx,
            &AuditDraft::created(
                project_id,
                EntityType::Element,
                element.id,
                element.snapshot(),
                actor,
            ),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(project_id, element_id = element.id, guid = %element.guid, "Element created");
        Ok(element)
    }

    pub async fn get_element(
        pool: &PgPool,
        project_id: DbId,
        element_id: DbId,
    ) -> Result<Element, EngineError> {
        ElementRepo::find_by_id(pool, project_id, element_id)
            .await?
            .ok_or_else(|| element_not_found(element_id))
    }

    /// Resolve the element that currently holds `guid`.
    pub async fn find_by_guid(
        pool: &PgPool,
        project_id: DbId,
        guid: &str,
    ) -> Result<Element, EngineError> {
        validate_guid(guid)?;
        ElementRepo::find_by_guid(pool, project_id, guid)
            .await?
            .ok_or_else(|| guid_not_found(guid))
    }

    pub async fn list_elements(
        pool: &PgPool,
        project_id: DbId,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Element>, EngineError> {
        let limit = limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT);
        let offset = offset.unwrap_or(0).max(0);
        Ok(ElementRepo::list(pool, project_id, limit, offset).await?)
    }

    // -----------------------------------------------------------------------
    // GUID remap
    // -----------------------------------------------------------------------

    /// Move an element from `old_guid` to `new_guid`, rewriting every GUID
    /// dependent in the same transaction. Returns the element's stable id.
    ///
    /// Audited dependents (checkpoint groups and plan items) get their own
    /// `guid_changed` entry, so their history replays across the remap.
    pub async fn remap_guid(
        pool: &PgPool,
        project_id: DbId,
        old_guid: &str,
        new_guid: &str,
        actor: &str,
    ) -> Result<DbId, EngineError> {
        Self::remap_guid_with(pool, GUID_DEPENDENTS, project_id, old_guid, new_guid, actor).await
    }

    /// [`Self::remap_guid`] over an explicit dependent list. Any failed
    /// rewrite rolls the whole remap back.
    pub async fn remap_guid_with(
        pool: &PgPool,
        dependents: &[GuidDependent],
        project_id: DbId,
        old_guid: &str,
        new_guid: &str,
        actor: &str,
    ) -> Result<DbId, EngineError> {
        validate_remap(old_guid, new_guid)?;
        require_actor(actor)?;

        let mut tx = pool.begin().await?;

        let element = ElementRepo::lock_by_guid(&mut *tx, project_id, old_guid)
            .await?
            .ok_or_else(|| guid_not_found(old_guid))?;

        if let Some(holder) = ElementRepo::find_by_guid(&mut *tx, project_id, new_guid).await? {
            return Err(CoreError::ConflictingGuid {
                project_id,
                guid: new_guid.to_string(),
                holder_id: holder.id,
            }
            .into());
        }

        let entry = GuidHistoryEntry {
            old_guid: old_guid.to_string(),
            changed_at: Utc::now(),
            changed_by: actor.to_string(),
        };
        let updated = match ElementRepo::update_guid(&mut *tx, element.id, new_guid, &entry).await {
            Ok(e) => e,
            Err(e) if is_unique_violation(&e, ELEMENT_GUID_CONSTRAINT) => {
                tx.rollback().await?;
                let holder = ElementRepo::find_by_guid(pool, project_id, new_guid).await?;
                return Err(match holder {
                    Some(h) => CoreError::ConflictingGuid {
                        project_id,
                        guid: new_guid.to_string(),
                        holder_id: h.id,
                    },
                    None => CoreError::Conflict(format!(
                        "GUID '{new_guid}' was taken concurrently; retry"
                    )),
                }
                .into());
            }
            Err(e) => return Err(e.into()),
        };

        let groups = CheckpointGroupRepo::lock_containing(&mut *tx, project_id, old_guid).await?;
        let plan_items = PlanItemRepo::lock_by_guid(&mut *tx, project_id, old_guid).await?;

        let mut rewritten = 0u64;
        for dependent in dependents {
            let n = ElementRepo::rewrite_dependent(&mut *tx, dependent, project_id, old_guid, new_guid)
                .await?;
            tracing::debug!(
                table = dependent.table,
                column = dependent.column,
                rows = n,
                "GUID dependent rewritten",
            );
            rewritten += n;
        }

        for before in &groups {
            let after = CheckpointGroupRepo::find_by_id(&mut *tx, project_id, before.id)
                .await?
                .ok_or_else(|| CoreError::not_found("checkpoint_group", before.id))?;
            if after.member_guids != before.member_guids {
                AuditLogRepo::record(
                    &mut *tx,
                    &AuditDraft::changed(
                        project_id,
                        EntityType::CheckpointGroup,
                        before.id,
                        AuditAction::GuidChanged,
                        &before.snapshot(),
                        &after.snapshot(),
                        actor,
                    ),
                )
                .await?;
            }
        }
        for before in &plan_items {
            let after = PlanItemRepo::find_by_id(&mut *tx, project_id, before.id)
                .await?
                .ok_or_else(|| CoreError::not_found("plan_item", before.id))?;
            if after.element_guid != before.element_guid {
                AuditLogRepo::record(
                    &mut *tx,
                    &AuditDraft::changed(
                        project_id,
                        EntityType::PlanItem,
                        before.id,
                        AuditAction::GuidChanged,
                        &before.snapshot(),
                        &after.snapshot(),
                        actor,
                    ),
                )
                .await?;
            }
        }

        AuditLogRepo::record(
            &mut *tx,
            &AuditDraft::changed(
                project_id,
                EntityType::Element,
                element.id,
                AuditAction::GuidChanged,
                &element.snapshot(),
                &updated.snapshot(),
                actor,
            ),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(
            project_id,
            element_id = element.id,
            old_guid,
            new_guid,
            dependents_rewritten = rewritten,
            "Element GUID remapped",
        );
        Ok(element.id)
    }

    // -----------------------------------------------------------------------
    // History
    // -----------------------------------------------------------------------

    /// Lazy newest-first history of an element, each step carrying the
    /// element's audited fields right after the event.
    pub async fn get_history(
        pool: &PgPool,
        project_id: DbId,
        element_id: DbId,
    ) -> Result<EntityHistory, EngineError> {
        let mut tx = begin_snapshot(pool).await?;
        let element = ElementRepo::find_by_id(&mut *tx, project_id, element_id)
            .await?
            .ok_or_else(|| element_not_found(element_id))?;
        let latest = EntityHistory::bound(&mut *tx, EntityType::Element, element.id).await?;
        tx.commit().await?;

        Ok(EntityHistory::new(
            pool.clone(),
            EntityType::Element,
            element.id,
            element.snapshot(),
            latest,
        ))
    }

    // -----------------------------------------------------------------------
    // Logistics milestones
    // -----------------------------------------------------------------------

    pub async fn record_arrival(
        pool: &PgPool,
        project_id: DbId,
        element_id: DbId,
        at: Option<Timestamp>,
        actor: &str,
    ) -> Result<Element, EngineError> {
        Self::record_milestone(pool, project_id, element_id, Milestone::Arrival, at, actor).await
    }

    pub async fn record_installation(
        pool: &PgPool,
        project_id: DbId,
        element_id: DbId,
        at: Option<Timestamp>,
        actor: &str,
    ) -> Result<Element, EngineError> {
        Self::record_milestone(pool, project_id, element_id, Milestone::Installation, at, actor)
            .await
    }

    async fn record_milestone(
        pool: &PgPool,
        project_id: DbId,
        element_id: DbId,
        milestone: Milestone,
        at: Option<Timestamp>,
        actor: &str,
    ) -> Result<Element, EngineError> {
        require_actor(actor)?;
        let at = at.unwrap_or_else(Utc::now);

        let mut tx = pool.begin().await?;
        let element = ElementRepo::lock_by_id(&mut *tx, project_id, element_id)
            .await?
            .ok_or_else(|| element_not_found(element_id))?;

        let already = match milestone {
            Milestone::Arrival => element.arrived_at.is_some(),
            Milestone::Installation => element.installed_at.is_some(),
        };
        if already {
            return Err(CoreError::Conflict(format!(
                "Element {element_id} {} is already recorded",
                milestone.as_str()
            ))
            .into());
        }

        let updated = match milestone {
            Milestone::Arrival => ElementRepo::record_arrival(&mut *tx, element.id, at, actor).await?,
            Milestone::Installation => {
                ElementRepo::record_installation(&mut *tx, element.id, at, actor).await?
            }
        };

        AuditLogRepo::record(
            &mut *tx,
            &AuditDraft::changed(
                project_id,
                EntityType::Element,
                element.id,
                AuditAction::Update,
                &element.snapshot(),
                &updated.snapshot(),
                actor,
            ),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(project_id, element_id, milestone = milestone.as_str(), "Element milestone recorded");
        Ok(updated)
    }

    pub async fn lifecycle_stats(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<ElementLifecycleStats, EngineError> {
        Ok(ElementRepo::lifecycle_stats(pool, project_id).await?)
    }

    // -----------------------------------------------------------------------
    // Checkpoint groups
    // -----------------------------------------------------------------------

    /// Define a group over existing elements. Member elements are locked
    /// so a concurrent remap cannot leave a stale GUID in the group.
    pub async fn create_group(
        pool: &PgPool,
        project_id: DbId,
        input: &CreateCheckpointGroup,
        actor: &str,
    ) -> Result<CheckpointGroup, EngineError> {
        let members = normalize_group_members(&input.name, &input.member_guids)?;
        require_actor(actor)?;

        let mut tx = pool.begin().await?;

        let found = ElementRepo::lock_by_guids(&mut *tx, project_id, &members).await?;
        if let Some(missing) = members
            .iter()
            .find(|guid| !found.iter().any(|e| &e.guid == *guid))
        {
            return Err(guid_not_found(missing));
        }

        let normalized = CreateCheckpointGroup {
            name: input.name.trim().to_string(),
            member_guids: members,
        };
        let group = CheckpointGroupRepo::create(&mut *tx, project_id, &normalized, actor).await?;

        AuditLogRepo::record(
            &mut *tx,
            &AuditDraft::created(
                project_id,
                EntityType::CheckpointGroup,
                group.id,
                group.snapshot(),
                actor,
            ),
        )
        .await?;

        tx.commit().await?;

        tracing::info!(project_id, group_id = group.id, members = group.member_guids.len(), "Checkpoint group created");
        Ok(group)
    }

    pub async fn list_groups(
        pool: &PgPool,
        project_id: DbId,
    ) -> Result<Vec<CheckpointGroup>, EngineError> {
        Ok(CheckpointGroupRepo::list_by_project(pool, project_id).await?)
    }

    /// Lazy newest-first history of a group's name and members.
    pub async fn group_history(
        pool: &PgPool,
        project_id: DbId,
        group_id: DbId,
    ) -> Result<EntityHistory, EngineError> {
        let mut tx = begin_snapshot(pool).await?;
        let group = CheckpointGroupRepo::find_by_id(&mut *tx, project_id, group_id)
            .await?
            .ok_or_else(|| CoreError::not_found("checkpoint_group", group_id))?;
        let latest = EntityHistory::bound(&mut *tx, EntityType::CheckpointGroup, group.id).await?;
        tx.commit().await?;

        Ok(EntityHistory::new(
            pool.clone(),
            EntityType::CheckpointGroup,
            group.id,
            group.snapshot(),
            latest,
        ))
    }

    // -----------------------------------------------------------------------
    // Plan items
    // -----------------------------------------------------------------------

    /// Schedule a delivery or installation for the element holding
    /// `element_guid`. The GUID is stored by value and follows remaps.
    pub async fn create_plan_item(
        pool: &PgPool,
        project_id: DbId,
        input: &CreatePlanItem,
        actor: &str,
    ) -> Result<PlanItem, EngineError> {
        validate_guid(&input.element_guid)?;
        require_actor(actor)?;
        if !VALID_KINDS.contains(&input.kind.as_str()) {
            return Err(CoreError::Validation(format!(
                "Invalid plan item kind '{}'. Must be one of: {}",
                input.kind,
                VALID_KINDS.join(", ")
            ))
            .into());
        }

        let mut tx = pool.begin().await?;
        ElementRepo::lock_by_guid(&mut *tx, project_id, &input.element_guid)
            .await?
            .ok_or_else(|| guid_not_found(&input.element_guid))?;
        let item = PlanItemRepo::create(&mut *tx, project_id, input).await?;
        AuditLogRepo::record(
            &mut *tx,
            &AuditDraft::created(project_id, EntityType::PlanItem, item.id, item.snapshot(), actor),
        )
        .await?;
        tx.commit().await?;

        tracing::info!(project_id, plan_item_id = item.id, kind = %item.kind, "Plan item created");
        Ok(item)
    }

    pub async fn list_plan_items(
        pool: &PgPool,
        project_id: DbId,
        guid: Option<&str>,
    ) -> Result<Vec<PlanItem>, EngineError> {
        let items = match guid {
            Some(g) => PlanItemRepo::list_by_guid(pool, project_id, g).await?,
            None => PlanItemRepo::list_by_project(pool, project_id).await?,
        };
        Ok(items)
    }
}

#[derive(Debug, Clone, Copy)]
enum Milestone {
    Arrival,
    Installation,
}

impl Milestone {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Arrival => "arrival",
            Self::Installation => "installation",
        }
    }
}
