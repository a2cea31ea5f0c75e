//! # NPC Studio Store
//!
//! A JSON-backed record store for NPC characters: schema validation, a write
//! queue that serialises read-modify-write cycles, and a pluggable storage
//! medium behind the collection document.
//!
//! ## Features
//!
//! - **Record Store**: list/get/create/update/delete over a single JSON
//!   collection document, each mutation observable as atomic
//! - **Write Queue**: at most one read-modify-write cycle in flight, strict
//!   submission order, failures never poison the queue
//! - **Schema Validator**: defaults, closed gesture/action enumerations, and
//!   field-path error maps that report every invalid field
//! - **Legacy Tolerance**: stored records that no longer validate still read
//!   back raw instead of being rejected
//! - **Storage Medium**: local JSON file, remote blob over HTTP, or
//!   in-memory for tests
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use npc_studio::{FileMedium, NpcStore};
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), npc_studio::StoreError> {
//! let store = NpcStore::new(Arc::new(FileMedium::new("data/npcs.json")));
//!
//! let npc = store
//!     .create(&json!({ "name": "Aldric", "role": "Merchant" }))
//!     .await?;
//!
//! let fetched = store.get_by_id(&npc.id).await?;
//! # Ok(())
//! # }
//! ```

pub mod medium;
pub mod mutex;
pub mod schema;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use medium::{FileMedium, HttpBlobMedium, Medium, MediumError, MemoryMedium};
pub use mutex::WriteQueue;
pub use schema::{
    validate_create, validate_update, CapabilitiesPatch, NpcDraft, NpcPatch, PersonaPatch,
    RulesPatch, ValidationError,
};
pub use store::{NpcStore, StoreError};
pub use types::{Action, Capabilities, Gesture, Npc, Persona, Rules, StoredNpc};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
