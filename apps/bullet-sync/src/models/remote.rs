use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::document::UserDocument;

/// Title written on the first create. The store defaults it otherwise.
pub const DOCUMENT_TITLE: &str = "Bullet Builder Workspace";

/// A stored record as returned by `GET /api/user-data`, newest first.
/// `content` is left untyped so older schemas can be backfilled on load.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    pub id: String,
    #[serde(default)]
    pub content: Value,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecord<'a> {
    pub user_id: &'a str,
    pub content: &'a UserDocument,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRecord<'a> {
    pub id: &'a str,
    pub user_id: &'a str,
    pub content: &'a UserDocument,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
}

/// Response to a create. `id` is optional on the wire: a body without it is
/// reported to the engine rather than rejected here.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CreateAck {
    #[serde(default)]
    pub id: Option<String>,
}

/// Error body shape used by every non-2xx response of the store.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_parses_prisma_row() {
        let record: RemoteRecord = serde_json::from_value(json!({
            "id": "clx9abc",
            "userId": "u1",
            "userEmail": "doe@uscg.mil",
            "title": "Untitled Work",
            "content": { "bullets": [] },
            "createdAt": "2025-03-01T12:00:00.000Z",
            "updatedAt": "2025-03-02T08:30:00.000Z"
        }))
        .unwrap();
        assert_eq!(record.id, "clx9abc");
        assert!(record.updated_at.is_some());
        assert!(record.content.get("bullets").is_some());
    }

    #[test]
    fn test_update_payload_shape() {
        let doc = UserDocument::default();
        let value = serde_json::to_value(UpdateRecord {
            id: "w1",
            user_id: "u1",
            content: &doc,
            title: None,
        })
        .unwrap();
        assert_eq!(value["id"], "w1");
        assert_eq!(value["userId"], "u1");
        assert!(value.get("title").is_none());
        assert_eq!(value["content"]["preferences"]["rank"], "O3");
    }
}
