use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A gesture a generated response may ask the character to perform.
///
/// Closed enumeration: anything outside this list fails validation rather
/// than being silently dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gesture {
    None,
    Nod,
    Wave,
    Point,
    Shrug,
    Angry,
}

impl Gesture {
    /// All gesture values, in wire order (exported so forms can iterate them).
    pub const ALL: [Gesture; 6] = [
        Gesture::None,
        Gesture::Nod,
        Gesture::Wave,
        Gesture::Point,
        Gesture::Shrug,
        Gesture::Angry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Gesture::None => "none",
            Gesture::Nod => "nod",
            Gesture::Wave => "wave",
            Gesture::Point => "point",
            Gesture::Shrug => "shrug",
            Gesture::Angry => "angry",
        }
    }

    pub fn parse(s: &str) -> Option<Gesture> {
        Gesture::ALL.iter().copied().find(|g| g.as_str() == s)
    }
}

/// A world action a generated response may ask the character to take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    None,
    GoTo,
    Pickup,
    Equip,
    StartQuest,
    GiveItem,
    SetFlag,
}

impl Action {
    /// All action values, in wire order.
    pub const ALL: [Action; 7] = [
        Action::None,
        Action::GoTo,
        Action::Pickup,
        Action::Equip,
        Action::StartQuest,
        Action::GiveItem,
        Action::SetFlag,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::None => "none",
            Action::GoTo => "go_to",
            Action::Pickup => "pickup",
            Action::Equip => "equip",
            Action::StartQuest => "start_quest",
            Action::GiveItem => "give_item",
            Action::SetFlag => "set_flag",
        }
    }

    pub fn parse(s: &str) -> Option<Action> {
        Action::ALL.iter().copied().find(|a| a.as_str() == s)
    }
}

/// Free-text character background. Every field defaults to empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    #[serde(default)]
    pub backstory: String,
    #[serde(default)]
    pub goals: String,
    #[serde(default)]
    pub voice_style: String,
}

/// Behavioral constraints for the character.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rules {
    #[serde(default)]
    pub do_not: Vec<String>,
    #[serde(default)]
    pub spoiler_policy: String,
}

/// What the character is allowed to do. Both lists default to `["none"]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default = "Capabilities::default_gestures")]
    pub allowed_gestures: Vec<Gesture>,
    #[serde(default = "Capabilities::default_actions")]
    pub allowed_actions: Vec<Action>,
}

impl Capabilities {
    fn default_gestures() -> Vec<Gesture> {
        vec![Gesture::None]
    }

    fn default_actions() -> Vec<Action> {
        vec![Action::None]
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            allowed_gestures: Self::default_gestures(),
            allowed_actions: Self::default_actions(),
        }
    }
}

/// One NPC record: the unit of storage.
///
/// `id` and `created_at` are fixed at creation; `updated_at` is refreshed on
/// every successful mutation. Timestamps travel as ISO-8601 strings under the
/// interchange names `createdAt`/`updatedAt`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Npc {
    pub id: String,
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub persona: Persona,
    #[serde(default)]
    pub rules: Rules,
    #[serde(default)]
    pub capabilities: Capabilities,
    #[serde(default)]
    pub lore_facts: Vec<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

/// What a read returns for each stored element.
///
/// Records that fail schema validation on read are passed through raw rather
/// than rejected, so old data stays visible even if imperfect. Consumers
/// that need the typed record must branch on this.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StoredNpc {
    Valid(Npc),
    Legacy(serde_json::Value),
}

impl StoredNpc {
    /// The record's id, if it has one in either shape.
    pub fn id(&self) -> Option<&str> {
        match self {
            StoredNpc::Valid(npc) => Some(&npc.id),
            StoredNpc::Legacy(raw) => raw.get("id").and_then(|v| v.as_str()),
        }
    }

    pub fn as_npc(&self) -> Option<&Npc> {
        match self {
            StoredNpc::Valid(npc) => Some(npc),
            StoredNpc::Legacy(_) => None,
        }
    }

    pub fn into_npc(self) -> Option<Npc> {
        match self {
            StoredNpc::Valid(npc) => Some(npc),
            StoredNpc::Legacy(_) => None,
        }
    }
}
