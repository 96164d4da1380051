//! Entity history reconstruction from audit entries.
//!
//! Entries are consumed newest-first. Starting from the entity's current
//! snapshot, each entry yields the state right after it happened, then its
//! `old_values` are folded back in to obtain the state before it. Only
//! one snapshot is held at a time, so callers can page through entries
//! lazily and stop early.
//!
//! The walk must land exactly on the creation snapshot. A mismatch means
//! some write reached the entity without an audit entry, and every state
//! before that write is unknown, so the replay fails instead of guessing.

use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::audit::AuditAction;
use crate::error::CoreError;
use crate::types::{DbId, Timestamp};

/// One audit entry as seen by the replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEvent {
    pub id: DbId,
    pub action: AuditAction,
    pub old_values: Option<Value>,
    pub new_values: Option<Value>,
    pub actor: String,
    pub created_at: Timestamp,
    pub bulk_action_id: Option<Uuid>,
}

/// An event plus the reconstructed entity state right after it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryItem {
    #[serde(flatten)]
    pub event: HistoryEvent,
    pub state: Value,
}

/// Step-by-step replay state.
#[derive(Debug, Clone)]
pub struct HistoryReplay {
    state: Value,
    last_id: Option<DbId>,
    finished: bool,
}

impl HistoryReplay {
    /// Begin from the entity's current snapshot (`Value::Null` if deleted).
    pub fn new(current: Value) -> Self {
        Self {
            state: current,
            last_id: None,
            finished: false,
        }
    }

    /// Id of the last consumed entry; the next page starts strictly below it.
    pub fn cursor(&self) -> Option<DbId> {
        self.last_id
    }

    /// Whether the creation entry has been consumed.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Consume the next-older entry.
    pub fn step(&mut self, event: HistoryEvent) -> Result<HistoryItem, CoreError> {
        if self.finished {
            return Err(CoreError::Internal(format!(
                "audit entry {} precedes the creation entry",
                event.id
            )));
        }
        if self.last_id.is_some_and(|last| event.id >= last) {
            return Err(CoreError::Internal(format!(
                "audit entries out of order: {} after {:?}",
                event.id, self.last_id
            )));
        }

        let after = self.state.clone();
        self.state = match event.action {
            AuditAction::Create => {
                self.finished = true;
                if let Some(created) = &event.new_values {
                    if *created != after {
                        return Err(CoreError::Internal(format!(
                            "audit trail diverges at creation entry {}: replayed {after}, recorded {created}",
                            event.id
                        )));
                    }
                }
                Value::Null
            }
            AuditAction::Delete => event.old_values.clone().unwrap_or(Value::Null),
            _ => unapply(&after, event.old_values.as_ref()),
        };
        self.last_id = Some(event.id);

        Ok(HistoryItem { event, state: after })
    }
}

fn unapply(after: &Value, old_values: Option<&Value>) -> Value {
    let mut before: Map<String, Value> = after.as_object().cloned().unwrap_or_default();
    if let Some(Value::Object(old)) = old_values {
        for (key, value) in old {
            before.insert(key.clone(), value.clone());
        }
    }
    Value::Object(before)
}

/// Lazy iterator over an in-memory or streamed newest-first event source.
///
/// Restart by building a new `History` from the same source.
pub struct History<I> {
    replay: HistoryReplay,
    events: I,
}

impl<I> History<I>
where
    I: Iterator<Item = HistoryEvent>,
{
    pub fn new(current: Value, events: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            replay: HistoryReplay::new(current),
            events: events.into_iter(),
        }
    }
}

impl<I> Iterator for History<I>
where
    I: Iterator<Item = HistoryEvent>,
{
    type Item = Result<HistoryItem, CoreError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.replay.is_finished() {
            return None;
        }
        let event = self.events.next()?;
        Some(self.replay.step(event))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use serde_json::json;

    fn event(id: DbId, action: AuditAction, old: Option<Value>, new: Option<Value>) -> HistoryEvent {
        HistoryEvent {
            id,
            action,
            old_values: old,
            new_values: new,
            actor: "tester".into(),
            created_at: Utc::now(),
            bulk_action_id: None,
        }
    }

    fn events() -> Vec<HistoryEvent> {
        vec![
            event(
                3,
                AuditAction::GuidChanged,
                Some(json!({"guid": "B"})),
                Some(json!({"guid": "C"})),
            ),
            event(
                2,
                AuditAction::GuidChanged,
                Some(json!({"guid": "A"})),
                Some(json!({"guid": "B"})),
            ),
            event(
                1,
                AuditAction::Create,
                None,
                Some(json!({"guid": "A", "assembly_mark": "C-12"})),
            ),
        ]
    }

    #[test]
    fn reconstructs_state_after_each_event_newest_first() {
        let current = json!({"guid": "C", "assembly_mark": "C-12"});
        let items: Vec<_> = History::new(current, events())
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].state["guid"], "C");
        assert_eq!(items[1].state["guid"], "B");
        assert_eq!(items[2].state["guid"], "A");
        assert_eq!(items[2].state["assembly_mark"], "C-12");
        assert_eq!(items[2].event.action, AuditAction::Create);
    }

    #[test]
    fn history_is_restartable_and_lazy() {
        let current = json!({"guid": "C", "assembly_mark": "C-12"});
        let first: Vec<_> = History::new(current.clone(), events()).take(1).collect();
        assert_eq!(first.len(), 1);

        let full: Vec<_> = History::new(current, events()).collect();
        assert_eq!(full.len(), 3);
    }

    #[test]
    fn stops_after_creation_entry() {
        let mut evs = events();
        evs.push(event(0, AuditAction::Update, None, None));
        let n = History::new(json!({"guid": "C", "assembly_mark": "C-12"}), evs).count();
        assert_eq!(n, 3);
    }

    #[test]
    fn unaudited_write_is_detected_at_creation() {
        // The current row carries a mark no entry ever recorded.
        let current = json!({"guid": "C", "assembly_mark": "C-14"});
        let items: Vec<_> = History::new(current, events()).collect();

        assert_eq!(items.len(), 3);
        assert!(items[0].is_ok());
        assert!(items[1].is_ok());
        assert_matches!(&items[2], Err(CoreError::Internal(msg)) if msg.contains("diverges"));
    }

    #[test]
    fn divergence_ends_the_replay() {
        let evs = vec![
            event(2, AuditAction::Create, None, Some(json!({"guid": "A"}))),
            event(1, AuditAction::Update, None, None),
        ];
        let mut replay = HistoryReplay::new(json!({"guid": "B"}));
        assert!(replay.step(evs[0].clone()).is_err());
        assert!(replay.is_finished());
        assert!(replay.step(evs[1].clone()).is_err());
    }

    #[test]
    fn out_of_order_entries_are_rejected() {
        let mut replay = HistoryReplay::new(json!({}));
        replay.step(event(5, AuditAction::Update, None, None)).unwrap();
        assert_eq!(replay.cursor(), Some(5));
        assert!(replay.step(event(7, AuditAction::Update, None, None)).is_err());
    }

    #[test]
    fn deleted_entity_reconstructs_from_snapshot() {
        let evs = vec![
            event(2, AuditAction::Delete, Some(json!({"guid": "A"})), None),
            event(1, AuditAction::Create, None, Some(json!({"guid": "A"}))),
        ];
        let items: Vec<_> = History::new(Value::Null, evs)
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(items[0].state, Value::Null);
        assert_eq!(items[1].state, json!({"guid": "A"}));
    }
}
