//! Per-category bullet weights.
//!
//! Weights are percentage strings keyed by bullet id. Within a category the
//! weights of applied bullets must add up to exactly 100 before the category
//! can be summarized.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::models::bullet::Bullet;
use crate::models::document::UserDocument;

pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Error, PartialEq)]
pub enum WeightError {
    #[error("Weights for \"{category}\" must sum to 100% (currently {total}%)")]
    Unbalanced { category: String, total: i64 },

    #[error("No applied bullets in \"{0}\"")]
    EmptyCategory(String),
}

/// An applied bullet together with its raw weight string.
#[derive(Debug, Clone)]
pub struct WeightedEntry<'a> {
    pub bullet: &'a Bullet,
    pub weight: &'a str,
}

#[derive(Debug, Clone)]
pub struct CategoryGroup<'a> {
    pub category: String,
    pub entries: Vec<WeightedEntry<'a>>,
}

impl CategoryGroup<'_> {
    pub fn total(&self) -> i64 {
        self.entries.iter().map(|e| parse_weight(e.weight)).sum()
    }

    fn has_entered_weight(&self) -> bool {
        self.entries.iter().any(|e| !e.weight.trim().is_empty())
    }
}

/// Bullet payload sent to the summarizer.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WeightedBullet {
    pub content: String,
    pub competency: String,
    pub weight: i64,
}

/// Parses the leading integer of a weight string. Blank or non-numeric input is 0.
pub fn parse_weight(raw: &str) -> i64 {
    let raw = raw.trim();
    let (sign, digits) = match raw.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, raw.strip_prefix('+').unwrap_or(raw)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().map(|n| sign * n).unwrap_or(0)
}

/// Groups applied bullets by category, in the order categories first appear.
pub fn group_applied_by_category(doc: &UserDocument) -> Vec<CategoryGroup<'_>> {
    let mut groups: Vec<CategoryGroup<'_>> = Vec::new();

    for bullet in doc.applied_bullets() {
        let category = if bullet.category.trim().is_empty() {
            UNCATEGORIZED
        } else {
            bullet.category.as_str()
        };
        let weight = doc
            .bullet_weights
            .get(&bullet.id)
            .map(String::as_str)
            .unwrap_or("");
        let entry = WeightedEntry { bullet, weight };

        match groups.iter_mut().find(|g| g.category == category) {
            Some(group) => group.entries.push(entry),
            None => groups.push(CategoryGroup {
                category: category.to_string(),
                entries: vec![entry],
            }),
        }
    }

    groups
}

/// Categories whose entered weights do not sum to 100, with a display message.
/// A category with no weights entered yet is not an error.
pub fn weight_errors(doc: &UserDocument) -> BTreeMap<String, String> {
    group_applied_by_category(doc)
        .into_iter()
        .filter(|g| g.has_entered_weight() && g.total() != 100)
        .map(|g| {
            let message = format!("Weights must sum to 100% (currently {}%)", g.total());
            (g.category, message)
        })
        .collect()
}

/// Validates one category for summarization and returns its weighted bullets.
/// Zero-weight bullets are left out of the payload.
pub fn weighted_bullets_for(
    doc: &UserDocument,
    category: &str,
) -> Result<Vec<WeightedBullet>, WeightError> {
    let group = group_applied_by_category(doc)
        .into_iter()
        .find(|g| g.category == category)
        .ok_or_else(|| WeightError::EmptyCategory(category.to_string()))?;

    let total = group.total();
    if total != 100 {
        return Err(WeightError::Unbalanced {
            category: category.to_string(),
            total,
        });
    }

    Ok(group
        .entries
        .iter()
        .map(|e| WeightedBullet {
            content: e.bullet.content.clone(),
            competency: e.bullet.competency.clone(),
            weight: parse_weight(e.weight),
        })
        .filter(|b| b.weight > 0)
        .collect())
}
