//! Validation and normalization of NPC records.
//!
//! Two entry points feed writes: [`validate_create`] (required fields plus
//! defaults) and [`validate_update`] (everything optional, only supplied
//! fields checked). Reads go through [`revalidate`], which self-heals legacy
//! flat-field records and passes anything still malformed through raw.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::types::{Action, Capabilities, Gesture, Npc, Persona, Rules, StoredNpc};

/// Validation outcome carrying every invalid field path with a reason.
///
/// Paths are dotted, with numeric segments for sequence members, e.g.
/// `capabilities.allowed_gestures.0`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("validation failed for {} field(s)", fields.len())]
pub struct ValidationError {
    pub fields: BTreeMap<String, String>,
}

impl ValidationError {
    fn single(path: impl Into<String>, message: impl Into<String>) -> Self {
        let mut fields = BTreeMap::new();
        fields.insert(path.into(), message.into());
        Self { fields }
    }
}

/// Collects one message per field path; the first problem reported for a
/// path wins, matching how the web form displays errors.
#[derive(Default)]
struct Errors {
    fields: BTreeMap<String, String>,
}

impl Errors {
    fn push(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.fields.entry(path.into()).or_insert_with(|| message.into());
    }

    fn finish<T>(self, value: T) -> Result<T, ValidationError> {
        if self.fields.is_empty() {
            Ok(value)
        } else {
            Err(ValidationError {
                fields: self.fields,
            })
        }
    }
}

/// A validated, defaulted record awaiting its generated fields.
#[derive(Debug, Clone)]
pub struct NpcDraft {
    pub name: String,
    pub role: String,
    pub persona: Persona,
    pub rules: Rules,
    pub capabilities: Capabilities,
    pub lore_facts: Vec<String>,
}

impl NpcDraft {
    /// Stamps the generated fields onto the draft. `now` is captured once by
    /// the caller so `createdAt` and `updatedAt` start identical.
    pub(crate) fn into_record(self, id: String, now: DateTime<Utc>) -> Npc {
        Npc {
            id,
            name: self.name,
            role: self.role,
            persona: self.persona,
            rules: self.rules,
            capabilities: self.capabilities,
            lore_facts: self.lore_facts,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A validated partial update. Top-level fields replace wholesale; nested
/// patches carry per-key options so the store can merge shallowly.
#[derive(Debug, Clone, Default)]
pub struct NpcPatch {
    pub name: Option<String>,
    pub role: Option<String>,
    pub persona: Option<PersonaPatch>,
    pub rules: Option<RulesPatch>,
    pub capabilities: Option<CapabilitiesPatch>,
    pub lore_facts: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct PersonaPatch {
    pub backstory: Option<String>,
    pub goals: Option<String>,
    pub voice_style: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RulesPatch {
    pub do_not: Option<Vec<String>>,
    pub spoiler_policy: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct CapabilitiesPatch {
    pub allowed_gestures: Option<Vec<Gesture>>,
    pub allowed_actions: Option<Vec<Action>>,
}

/// Validates input for the create path: `name` and `role` are required,
/// everything else defaults. Every invalid field is reported, not just the
/// first.
pub fn validate_create(input: &Value) -> Result<NpcDraft, ValidationError> {
    let obj = match input.as_object() {
        Some(obj) => obj,
        None => return Err(ValidationError::single("_", "Expected a JSON object")),
    };

    let mut errs = Errors::default();
    let name = required_display_string(obj, "name", "Name is required", &mut errs);
    let role = required_display_string(obj, "role", "Role is required", &mut errs);

    let persona = match obj.get("persona") {
        Some(value) => parse_persona(value, &mut errs),
        None => Persona::default(),
    };
    let rules = match obj.get("rules") {
        Some(value) => parse_rules(value, &mut errs),
        None => Rules::default(),
    };
    let capabilities = match obj.get("capabilities") {
        Some(value) => parse_capabilities(value, &mut errs),
        None => Capabilities::default(),
    };
    let lore_facts = match obj.get("lore_facts") {
        Some(value) => parse_string_list(value, "lore_facts", &mut errs),
        None => Vec::new(),
    };

    errs.finish(NpcDraft {
        name: name.unwrap_or_default(),
        role: role.unwrap_or_default(),
        persona,
        rules,
        capabilities,
        lore_facts,
    })
}

/// Validates input for the update path: every field optional, only supplied
/// fields are checked. Supplied `name`/`role` must still be non-empty.
pub fn validate_update(input: &Value) -> Result<NpcPatch, ValidationError> {
    let obj = match input.as_object() {
        Some(obj) => obj,
        None => return Err(ValidationError::single("_", "Expected a JSON object")),
    };

    let mut errs = Errors::default();
    let mut patch = NpcPatch::default();

    if obj.contains_key("name") {
        patch.name = required_display_string(obj, "name", "Name is required", &mut errs);
    }
    if obj.contains_key("role") {
        patch.role = required_display_string(obj, "role", "Role is required", &mut errs);
    }
    if let Some(value) = obj.get("persona") {
        patch.persona = Some(parse_persona_patch(value, &mut errs));
    }
    if let Some(value) = obj.get("rules") {
        patch.rules = Some(parse_rules_patch(value, &mut errs));
    }
    if let Some(value) = obj.get("capabilities") {
        patch.capabilities = Some(parse_capabilities_patch(value, &mut errs));
    }
    if let Some(value) = obj.get("lore_facts") {
        patch.lore_facts = Some(parse_string_list(value, "lore_facts", &mut errs));
    }

    errs.finish(patch)
}

/// Read-path entry point. Applies the legacy flat-field migration, then
/// parses against the schema. A record that still fails comes back as
/// [`StoredNpc::Legacy`] holding the stored value untouched, so old data
/// displays even if imperfect.
pub fn revalidate(raw: Value) -> StoredNpc {
    let migrated = migrate_legacy(raw.clone());
    match serde_json::from_value::<Npc>(migrated) {
        Ok(npc) if is_well_formed(&npc) => StoredNpc::Valid(npc),
        _ => StoredNpc::Legacy(raw),
    }
}

fn is_well_formed(npc: &Npc) -> bool {
    !npc.name.trim().is_empty() && !npc.role.trim().is_empty() && Uuid::parse_str(&npc.id).is_ok()
}

/// Old flat records predate the nested `persona` block. Fold what we can
/// into the new shape so they parse; the flat keys are dropped in the
/// migrated view. Applied once on read, never written back by itself.
fn migrate_legacy(mut value: Value) -> Value {
    const FLAT_KEYS: [&str; 5] = ["backstory", "description", "goals", "personality", "quirks"];

    let Some(obj) = value.as_object_mut() else {
        return value;
    };
    if obj.contains_key("persona") || !FLAT_KEYS.iter().any(|&k| obj.contains_key(k)) {
        return value;
    }

    let backstory = take_string(obj, "backstory")
        .or_else(|| take_string(obj, "description"))
        .unwrap_or_default();
    let goals = take_string(obj, "goals").unwrap_or_default();
    for key in FLAT_KEYS {
        obj.remove(key);
    }
    obj.insert(
        "persona".to_string(),
        json!({ "backstory": backstory, "goals": goals, "voice_style": "" }),
    );
    value
}

fn take_string(obj: &mut Map<String, Value>, key: &str) -> Option<String> {
    match obj.remove(key) {
        Some(Value::String(s)) => Some(s),
        Some(other) => {
            // Not a string; put it back so the record fails parsing honestly.
            obj.insert(key.to_string(), other);
            None
        }
        None => None,
    }
}

fn required_display_string(
    obj: &Map<String, Value>,
    key: &str,
    missing_message: &str,
    errs: &mut Errors,
) -> Option<String> {
    match obj.get(key) {
        None | Some(Value::Null) => {
            errs.push(key, missing_message);
            None
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            errs.push(key, missing_message);
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            errs.push(key, "Expected string");
            None
        }
    }
}

fn optional_string(
    obj: &Map<String, Value>,
    key: &str,
    path: &str,
    errs: &mut Errors,
) -> Option<String> {
    match obj.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            errs.push(path, "Expected string");
            None
        }
    }
}

fn parse_string_list(value: &Value, path: &str, errs: &mut Errors) -> Vec<String> {
    match value.as_array() {
        Some(items) => items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| match item {
                Value::String(s) => Some(s.clone()),
                _ => {
                    errs.push(format!("{path}.{i}"), "Expected string");
                    None
                }
            })
            .collect(),
        None => {
            errs.push(path, "Expected array of strings");
            Vec::new()
        }
    }
}

fn parse_enum_list<T: Copy>(
    value: &Value,
    path: &str,
    parse: fn(&str) -> Option<T>,
    kind: &str,
    errs: &mut Errors,
) -> Vec<T> {
    match value.as_array() {
        Some(items) => items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| match item.as_str() {
                Some(s) => match parse(s) {
                    Some(member) => Some(member),
                    None => {
                        errs.push(format!("{path}.{i}"), format!("Invalid {kind} '{s}'"));
                        None
                    }
                },
                None => {
                    errs.push(format!("{path}.{i}"), "Expected string");
                    None
                }
            })
            .collect(),
        None => {
            errs.push(path, "Expected array");
            Vec::new()
        }
    }
}

fn parse_persona(value: &Value, errs: &mut Errors) -> Persona {
    let mut persona = Persona::default();
    match value.as_object() {
        Some(map) => {
            if let Some(s) = optional_string(map, "backstory", "persona.backstory", errs) {
                persona.backstory = s;
            }
            if let Some(s) = optional_string(map, "goals", "persona.goals", errs) {
                persona.goals = s;
            }
            if let Some(s) = optional_string(map, "voice_style", "persona.voice_style", errs) {
                persona.voice_style = s;
            }
        }
        None => errs.push("persona", "Expected object"),
    }
    persona
}

fn parse_persona_patch(value: &Value, errs: &mut Errors) -> PersonaPatch {
    let mut patch = PersonaPatch::default();
    match value.as_object() {
        Some(map) => {
            patch.backstory = optional_string(map, "backstory", "persona.backstory", errs);
            patch.goals = optional_string(map, "goals", "persona.goals", errs);
            patch.voice_style = optional_string(map, "voice_style", "persona.voice_style", errs);
        }
        None => errs.push("persona", "Expected object"),
    }
    patch
}

fn parse_rules(value: &Value, errs: &mut Errors) -> Rules {
    let mut rules = Rules::default();
    match value.as_object() {
        Some(map) => {
            if let Some(list) = map.get("do_not") {
                rules.do_not = parse_string_list(list, "rules.do_not", errs);
            }
            if let Some(s) = optional_string(map, "spoiler_policy", "rules.spoiler_policy", errs) {
                rules.spoiler_policy = s;
            }
        }
        None => errs.push("rules", "Expected object"),
    }
    rules
}

fn parse_rules_patch(value: &Value, errs: &mut Errors) -> RulesPatch {
    let mut patch = RulesPatch::default();
    match value.as_object() {
        Some(map) => {
            patch.do_not = map
                .get("do_not")
                .map(|list| parse_string_list(list, "rules.do_not", errs));
            patch.spoiler_policy =
                optional_string(map, "spoiler_policy", "rules.spoiler_policy", errs);
        }
        None => errs.push("rules", "Expected object"),
    }
    patch
}

fn parse_capabilities(value: &Value, errs: &mut Errors) -> Capabilities {
    let mut capabilities = Capabilities::default();
    match value.as_object() {
        Some(map) => {
            if let Some(list) = map.get("allowed_gestures") {
                capabilities.allowed_gestures = parse_enum_list(
                    list,
                    "capabilities.allowed_gestures",
                    Gesture::parse,
                    "gesture",
                    errs,
                );
            }
            if let Some(list) = map.get("allowed_actions") {
                capabilities.allowed_actions = parse_enum_list(
                    list,
                    "capabilities.allowed_actions",
                    Action::parse,
                    "action",
                    errs,
                );
            }
        }
        None => errs.push("capabilities", "Expected object"),
    }
    capabilities
}

fn parse_capabilities_patch(value: &Value, errs: &mut Errors) -> CapabilitiesPatch {
    let mut patch = CapabilitiesPatch::default();
    match value.as_object() {
        Some(map) => {
            patch.allowed_gestures = map.get("allowed_gestures").map(|list| {
                parse_enum_list(
                    list,
                    "capabilities.allowed_gestures",
                    Gesture::parse,
                    "gesture",
                    errs,
                )
            });
            patch.allowed_actions = map.get("allowed_actions").map(|list| {
                parse_enum_list(
                    list,
                    "capabilities.allowed_actions",
                    Action::parse,
                    "action",
                    errs,
                )
            });
        }
        None => errs.push("capabilities", "Expected object"),
    }
    patch
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_fills_defaults_for_omitted_substructures() {
        let draft = validate_create(&json!({ "name": "Aldric", "role": "Merchant" })).unwrap();

        assert_eq!(draft.name, "Aldric");
        assert_eq!(draft.role, "Merchant");
        assert_eq!(draft.persona, Persona::default());
        assert_eq!(draft.rules, Rules::default());
        assert_eq!(draft.capabilities.allowed_gestures, vec![Gesture::None]);
        assert_eq!(draft.capabilities.allowed_actions, vec![Action::None]);
        assert!(draft.lore_facts.is_empty());
    }

    #[test]
    fn create_rejects_empty_and_whitespace_name() {
        let err = validate_create(&json!({ "name": "", "role": "Guard" })).unwrap_err();
        assert_eq!(err.fields.get("name").unwrap(), "Name is required");

        let err = validate_create(&json!({ "name": "   ", "role": "Guard" })).unwrap_err();
        assert!(err.fields.contains_key("name"));
    }

    #[test]
    fn create_rejects_unknown_gesture_at_exact_path() {
        let err = validate_create(&json!({
            "name": "Aldric",
            "role": "Merchant",
            "capabilities": { "allowed_gestures": ["nod", "fly"] }
        }))
        .unwrap_err();

        assert_eq!(
            err.fields.get("capabilities.allowed_gestures.1").unwrap(),
            "Invalid gesture 'fly'"
        );
    }

    #[test]
    fn create_reports_every_invalid_field() {
        let err = validate_create(&json!({
            "role": "Guard",
            "capabilities": { "allowed_actions": ["teleport"] },
            "lore_facts": ["fine", 7]
        }))
        .unwrap_err();

        assert!(err.fields.contains_key("name"));
        assert!(err.fields.contains_key("capabilities.allowed_actions.0"));
        assert!(err.fields.contains_key("lore_facts.1"));
        assert_eq!(err.fields.len(), 3);
    }

    #[test]
    fn create_rejects_non_object_input() {
        let err = validate_create(&json!([1, 2, 3])).unwrap_err();
        assert!(err.fields.contains_key("_"));
    }

    #[test]
    fn update_accepts_partial_nested_input() {
        let patch = validate_update(&json!({ "persona": { "goals": "B2" } })).unwrap();

        assert!(patch.name.is_none());
        let persona = patch.persona.unwrap();
        assert_eq!(persona.goals.as_deref(), Some("B2"));
        assert!(persona.backstory.is_none());
        assert!(persona.voice_style.is_none());
        assert!(patch.rules.is_none());
    }

    #[test]
    fn update_still_rejects_empty_supplied_name() {
        let err = validate_update(&json!({ "name": "" })).unwrap_err();
        assert_eq!(err.fields.get("name").unwrap(), "Name is required");
    }

    #[test]
    fn revalidate_accepts_current_shape() {
        let raw = json!({
            "id": "4b4b1a0e-8f00-4a63-9a50-0f1c4c5f9e21",
            "name": "Aldric",
            "role": "Merchant",
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-02T00:00:00Z"
        });
        match revalidate(raw) {
            StoredNpc::Valid(npc) => assert_eq!(npc.name, "Aldric"),
            StoredNpc::Legacy(_) => panic!("expected a valid record"),
        }
    }

    #[test]
    fn revalidate_migrates_flat_legacy_fields_into_persona() {
        let raw = json!({
            "id": "4b4b1a0e-8f00-4a63-9a50-0f1c4c5f9e21",
            "name": "Greta",
            "role": "Baker",
            "backstory": "Grew up above the bakery",
            "goals": "Perfect the honey loaf",
            "quirks": "Hums while kneading",
            "createdAt": "2023-06-01T00:00:00Z",
            "updatedAt": "2023-06-01T00:00:00Z"
        });
        match revalidate(raw) {
            StoredNpc::Valid(npc) => {
                assert_eq!(npc.persona.backstory, "Grew up above the bakery");
                assert_eq!(npc.persona.goals, "Perfect the honey loaf");
                assert_eq!(npc.persona.voice_style, "");
            }
            StoredNpc::Legacy(_) => panic!("flat record should migrate"),
        }
    }

    #[test]
    fn revalidate_migrates_records_with_a_single_flat_field() {
        let raw = json!({
            "id": "9c0d2f14-62ab-4a7e-8a33-5cf0d1a0b7aa",
            "name": "Old Tom",
            "role": "Ferryman",
            "description": "Ran the river crossing for forty years",
            "createdAt": "2023-01-01T00:00:00Z",
            "updatedAt": "2023-01-01T00:00:00Z"
        });
        match revalidate(raw) {
            StoredNpc::Valid(npc) => {
                assert_eq!(npc.persona.backstory, "Ran the river crossing for forty years");
                assert_eq!(npc.persona.goals, "");
            }
            StoredNpc::Legacy(_) => panic!("description-only record should migrate"),
        }
    }

    #[test]
    fn revalidate_passes_malformed_records_through_untouched() {
        // Pinned leniency: the raw stored object comes back as-is, not
        // repaired and not rejected.
        let raw = json!({ "id": "not-a-uuid", "name": "Orphan" });
        match revalidate(raw.clone()) {
            StoredNpc::Legacy(value) => assert_eq!(value, raw),
            StoredNpc::Valid(_) => panic!("record without role must not validate"),
        }
    }
}
