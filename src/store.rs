//! The record store: durable CRUD over the NPC collection document.
//!
//! Every mutation is one queued read-modify-write cycle against the medium;
//! reads bypass the queue and see whole documents only. The collection is
//! kept as raw JSON values internally so records that no longer validate
//! survive rewrites untouched.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::medium::{Medium, MediumError};
use crate::mutex::WriteQueue;
use crate::schema::{
    self, CapabilitiesPatch, NpcPatch, PersonaPatch, RulesPatch, ValidationError,
};
use crate::types::{Npc, StoredNpc};

#[derive(Debug, Error)]
pub enum StoreError {
    /// Input did not conform to the schema. Carries the field-path map;
    /// nothing was persisted.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The storage medium could not be read or written.
    #[error(transparent)]
    Medium(#[from] MediumError),
    /// The stored document could not be decoded (or a record could not be
    /// encoded). Distinct from an absent document, which reads as empty.
    #[error("collection document is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Persists the NPC collection behind list/get/create/update/delete.
///
/// The write queue is owned by the store, so "process-wide serialization"
/// means sharing one store instance (typically in an `Arc`). Separate store
/// instances — e.g. in tests — get independent queues by construction.
pub struct NpcStore {
    medium: Arc<dyn Medium>,
    queue: WriteQueue,
}

impl NpcStore {
    pub fn new(medium: Arc<dyn Medium>) -> Self {
        Self {
            medium,
            queue: WriteQueue::new(),
        }
    }

    /// Returns every stored record, each revalidated or passed through raw.
    /// Never mutates; not queue-protected.
    pub async fn list_all(&self) -> Result<Vec<StoredNpc>, StoreError> {
        let raw = self.read_raw().await?;
        Ok(raw.into_iter().map(schema::revalidate).collect())
    }

    /// Linear lookup over the current snapshot. `None` for a missing id is a
    /// normal outcome, not an error.
    pub async fn get_by_id(&self, id: &str) -> Result<Option<StoredNpc>, StoreError> {
        let raw = self.read_raw().await?;
        Ok(raw
            .into_iter()
            .find(|record| record_id(record) == Some(id))
            .map(schema::revalidate))
    }

    /// Validates `input` on the create path and appends the new record in
    /// one queued read-append-write cycle. Returns the persisted record with
    /// its generated id and identical created/updated timestamps.
    pub async fn create(&self, input: &Value) -> Result<Npc, StoreError> {
        let draft = schema::validate_create(input)?;
        self.queue
            .run(|| async {
                let mut raw = self.read_raw().await?;
                // Capture "now" once so createdAt and updatedAt cannot skew.
                let now = Utc::now();
                let npc = draft.into_record(Uuid::new_v4().to_string(), now);
                raw.push(serde_json::to_value(&npc)?);
                self.write_raw(&raw).await?;
                log::info!("created npc {} ({})", npc.name, npc.id);
                Ok(npc)
            })
            .await
    }

    /// Validates `input` on the update path and merges it onto the record in
    /// one queued cycle. Top-level fields replace wholesale; `persona`,
    /// `rules` and `capabilities` merge shallowly key-by-key. Returns `None`
    /// when the id is absent — a missing record is never created.
    pub async fn update(&self, id: &str, input: &Value) -> Result<Option<StoredNpc>, StoreError> {
        let patch = schema::validate_update(input)?;
        self.queue
            .run(|| async {
                let mut raw = self.read_raw().await?;
                let Some(index) = raw.iter().position(|record| record_id(record) == Some(id))
                else {
                    return Ok(None);
                };
                apply_patch(&mut raw[index], &patch, Utc::now());
                let merged = raw[index].clone();
                self.write_raw(&raw).await?;
                log::info!("updated npc {}", id);
                Ok(Some(schema::revalidate(merged)))
            })
            .await
    }

    /// Removes the record if present. Returns whether a removal occurred;
    /// nothing is written when the id is absent.
    pub async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        self.queue
            .run(|| async {
                let mut raw = self.read_raw().await?;
                let before = raw.len();
                raw.retain(|record| record_id(record) != Some(id));
                if raw.len() == before {
                    return Ok(false);
                }
                self.write_raw(&raw).await?;
                log::info!("deleted npc {}", id);
                Ok(true)
            })
            .await
    }

    async fn read_raw(&self) -> Result<Vec<Value>, StoreError> {
        match self.medium.read_document().await? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            // No document yet: first use initializes an empty collection.
            None => Ok(Vec::new()),
        }
    }

    async fn write_raw(&self, records: &[Value]) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(records)?;
        self.medium.write_document(&bytes).await?;
        Ok(())
    }
}

fn record_id(record: &Value) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

/// Applies a validated patch onto the raw stored object. Working at the JSON
/// level keeps keys the schema does not know about (legacy fields) intact.
fn apply_patch(record: &mut Value, patch: &NpcPatch, now: DateTime<Utc>) {
    let Some(obj) = record.as_object_mut() else {
        return;
    };
    if let Some(name) = &patch.name {
        obj.insert("name".to_string(), json!(name));
    }
    if let Some(role) = &patch.role {
        obj.insert("role".to_string(), json!(role));
    }
    if let Some(lore_facts) = &patch.lore_facts {
        obj.insert("lore_facts".to_string(), json!(lore_facts));
    }
    if let Some(persona) = &patch.persona {
        merge_keys(obj, "persona", persona_entries(persona));
    }
    if let Some(rules) = &patch.rules {
        merge_keys(obj, "rules", rules_entries(rules));
    }
    if let Some(capabilities) = &patch.capabilities {
        merge_keys(obj, "capabilities", capabilities_entries(capabilities));
    }
    obj.insert("updatedAt".to_string(), json!(now));
}

/// Shallow per-object merge: supplied sub-fields overwrite, omitted
/// sub-fields keep their prior value. Not a deep recursive merge. A slot
/// holding a non-object (malformed legacy data) is replaced by a fresh
/// object before merging, so the patched record can validate again.
fn merge_keys(obj: &mut Map<String, Value>, field: &str, entries: Vec<(&'static str, Value)>) {
    let slot = obj.entry(field).or_insert_with(|| json!({}));
    if !slot.is_object() {
        *slot = json!({});
    }
    if let Some(nested) = slot.as_object_mut() {
        for (key, value) in entries {
            nested.insert(key.to_string(), value);
        }
    }
}

fn persona_entries(patch: &PersonaPatch) -> Vec<(&'static str, Value)> {
    let mut entries = Vec::new();
    if let Some(v) = &patch.backstory {
        entries.push(("backstory", json!(v)));
    }
    if let Some(v) = &patch.goals {
        entries.push(("goals", json!(v)));
    }
    if let Some(v) = &patch.voice_style {
        entries.push(("voice_style", json!(v)));
    }
    entries
}

fn rules_entries(patch: &RulesPatch) -> Vec<(&'static str, Value)> {
    let mut entries = Vec::new();
    if let Some(v) = &patch.do_not {
        entries.push(("do_not", json!(v)));
    }
    if let Some(v) = &patch.spoiler_policy {
        entries.push(("spoiler_policy", json!(v)));
    }
    entries
}

fn capabilities_entries(patch: &CapabilitiesPatch) -> Vec<(&'static str, Value)> {
    let mut entries = Vec::new();
    if let Some(v) = &patch.allowed_gestures {
        entries.push(("allowed_gestures", json!(v)));
    }
    if let Some(v) = &patch.allowed_actions {
        entries.push(("allowed_actions", json!(v)));
    }
    entries
}
