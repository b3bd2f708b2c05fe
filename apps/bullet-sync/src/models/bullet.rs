use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::evaluation::taxonomy::category_for;
use crate::models::document::RankCategory;

/// A single achievement statement tied to a competency.
///
/// `category` is derived from `competency` through the taxonomy when the bullet
/// is drafted; it is stored so the report layout never has to re-derive it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bullet {
    #[serde(default)]
    pub id: String,
    pub competency: String,
    pub content: String,
    #[serde(default)]
    pub is_applied: bool,
    #[serde(default)]
    pub category: String,
    /// Epoch milliseconds.
    #[serde(default)]
    pub created_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Bullet {
    /// Drafts a new, not-yet-applied bullet with a fresh id and the category
    /// looked up for the given rank.
    pub fn draft(
        competency: &str,
        content: &str,
        rank_category: RankCategory,
        rank: &str,
        source: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            competency: competency.to_string(),
            content: content.trim().to_string(),
            is_applied: false,
            category: category_for(rank_category, rank, competency).to_string(),
            created_at: Utc::now().timestamp_millis(),
            source,
        }
    }
}

/// Gives id-less bullets (older schema) a fresh id and drops repeated ids.
/// The first occurrence of an id wins; order is otherwise preserved.
pub fn normalize_bullets(bullets: Vec<Bullet>) -> Vec<Bullet> {
    let mut seen = HashSet::with_capacity(bullets.len());
    let mut out = Vec::with_capacity(bullets.len());

    for mut bullet in bullets {
        if bullet.id.trim().is_empty() {
            bullet.id = Uuid::new_v4().to_string();
        }
        if !seen.insert(bullet.id.clone()) {
            warn!("Dropping duplicate bullet id {}", bullet.id);
            continue;
        }
        out.push(bullet);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bullet(id: &str, content: &str) -> Bullet {
        Bullet {
            id: id.to_string(),
            competency: "Teamwork".to_string(),
            content: content.to_string(),
            is_applied: false,
            category: "Leadership Skills".to_string(),
            created_at: 0,
            source: None,
        }
    }

    #[test]
    fn test_draft_derives_category_from_competency() {
        let b = Bullet::draft(
            "Teamwork",
            "  Led 12-person boarding team through 40 inspections  ",
            RankCategory::Officer,
            "O3",
            Some("chat".to_string()),
        );
        assert_eq!(b.category, "Leadership Skills");
        assert_eq!(b.content, "Led 12-person boarding team through 40 inspections");
        assert!(!b.is_applied);
        assert!(Uuid::parse_str(&b.id).is_ok());
        assert!(b.created_at > 0);
    }

    #[test]
    fn test_normalize_keeps_first_duplicate() {
        let out = normalize_bullets(vec![
            bullet("a", "first"),
            bullet("b", "other"),
            bullet("a", "second"),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].content, "first");
        assert_eq!(out[1].id, "b");
    }

    #[test]
    fn test_normalize_assigns_missing_ids() {
        let out = normalize_bullets(vec![bullet("", "x"), bullet("", "y")]);
        assert_eq!(out.len(), 2);
        assert_ne!(out[0].id, out[1].id);
        assert!(!out[0].id.is_empty());
    }

    #[test]
    fn test_legacy_bullet_without_flags_deserializes() {
        let b: Bullet = serde_json::from_value(serde_json::json!({
            "id": "x1",
            "competency": "Writing",
            "content": "Drafted 3 SOPs"
        }))
        .unwrap();
        assert!(!b.is_applied);
        assert_eq!(b.category, "");
        assert_eq!(b.source, None);
    }
}
