use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::models::bullet::{normalize_bullets, Bullet};

/// Bullet id -> percentage string ("" or "0".."100").
pub type BulletWeights = BTreeMap<String, String>;

/// Category name -> generated summary.
pub type Summaries = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum RankCategory {
    #[default]
    Officer,
    Enlisted,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActiveTab {
    #[default]
    Chat,
    Bullets,
    Oer,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Preferences {
    pub rank_category: RankCategory,
    pub rank: String,
    pub last_active_tab: ActiveTab,
    pub competency_preferences: Vec<String>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            rank_category: RankCategory::Officer,
            rank: "O3".to_string(),
            last_active_tab: ActiveTab::Chat,
            competency_preferences: Vec::new(),
        }
    }
}

/// Evaluation header fields. Dates are ISO date strings, everything else is free-form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct EvaluationData {
    pub start_date: String,
    pub end_date: String,
    pub officer_name: String,
    pub unit_name: String,
    pub position: String,
}

/// Partial update for [`Preferences`]. Only `Some` fields are written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreferencesPatch {
    pub rank_category: Option<RankCategory>,
    pub rank: Option<String>,
    pub last_active_tab: Option<ActiveTab>,
    pub competency_preferences: Option<Vec<String>>,
}

impl PreferencesPatch {
    pub fn rank(rank: impl Into<String>) -> Self {
        Self {
            rank: Some(rank.into()),
            ..Self::default()
        }
    }

    pub fn apply_to(self, prefs: &mut Preferences) {
        if let Some(v) = self.rank_category {
            prefs.rank_category = v;
        }
        if let Some(v) = self.rank {
            prefs.rank = v;
        }
        if let Some(v) = self.last_active_tab {
            prefs.last_active_tab = v;
        }
        if let Some(v) = self.competency_preferences {
            prefs.competency_preferences = v;
        }
    }
}

/// Partial update for [`EvaluationData`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvaluationDataPatch {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub officer_name: Option<String>,
    pub unit_name: Option<String>,
    pub position: Option<String>,
}

impl EvaluationDataPatch {
    pub fn apply_to(self, data: &mut EvaluationData) {
        let fields = [
            (self.start_date, &mut data.start_date),
            (self.end_date, &mut data.end_date),
            (self.officer_name, &mut data.officer_name),
            (self.unit_name, &mut data.unit_name),
            (self.position, &mut data.position),
        ];
        for (patch, slot) in fields {
            if let Some(v) = patch {
                *slot = v;
            }
        }
    }
}

/// A saved conversation with the bullet assistant. Messages are kept as
/// opaque JSON; only the web app interprets them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatSession {
    pub messages: Vec<Value>,
    pub last_competency: String,
}

/// Session id -> chat session.
pub type ChatSessions = BTreeMap<String, ChatSession>;

const KNOWN_FIELDS: &[&str] = &[
    "bullets",
    "preferences",
    "chatSessions",
    "evaluationData",
    "bulletWeights",
    "summaries",
];

/// The per-user document persisted as one JSON blob.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct UserDocument {
    pub bullets: Vec<Bullet>,
    pub preferences: Preferences,
    pub chat_sessions: ChatSessions,
    pub evaluation_data: EvaluationData,
    pub bullet_weights: BulletWeights,
    pub summaries: Summaries,
    /// Top-level keys written by other clients, carried through saves untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl UserDocument {
    /// Builds a document from a stored `content` blob, which may come from an
    /// older or partial schema. Every top-level field that is missing or
    /// malformed falls back to its default; the rest are kept.
    pub fn from_remote_content(content: &Value) -> Self {
        let defaults = Self::default();

        let bullets = match content.get("bullets") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| match serde_json::from_value::<Bullet>(item.clone()) {
                    Ok(b) => Some(b),
                    Err(e) => {
                        warn!("Skipping unreadable stored bullet: {e}");
                        None
                    }
                })
                .collect(),
            Some(Value::Null) | None => defaults.bullets,
            Some(_) => {
                warn!("Stored 'bullets' is not an array, using defaults");
                defaults.bullets
            }
        };

        Self {
            bullets: normalize_bullets(bullets),
            preferences: field_or_default(content, "preferences", defaults.preferences),
            chat_sessions: field_or_default(content, "chatSessions", defaults.chat_sessions),
            evaluation_data: field_or_default(content, "evaluationData", defaults.evaluation_data),
            bullet_weights: field_or_default(content, "bulletWeights", defaults.bullet_weights),
            summaries: field_or_default(content, "summaries", defaults.summaries),
            extra: content
                .as_object()
                .map(|obj| {
                    obj.iter()
                        .filter(|(k, _)| !KNOWN_FIELDS.contains(&k.as_str()))
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    pub fn applied_bullets(&self) -> impl Iterator<Item = &Bullet> {
        self.bullets.iter().filter(|b| b.is_applied)
    }
}

fn field_or_default<T: DeserializeOwned>(content: &Value, key: &str, default: T) -> T {
    match content.get(key) {
        None | Some(Value::Null) => default,
        Some(v) => serde_json::from_value(v.clone()).unwrap_or_else(|e| {
            warn!("Stored '{key}' is malformed ({e}), using defaults");
            default
        }),
    }
}
