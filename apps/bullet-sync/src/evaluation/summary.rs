//! Category summaries for the evaluation report.
//!
//! A category may only be summarized once the weights of its applied bullets
//! add up to 100. The summary itself comes from the web app's summarize
//! endpoint and is stored back into the document through the sync engine.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::evaluation::weights::{weighted_bullets_for, WeightError, WeightedBullet};
use crate::models::document::{RankCategory, Summaries};
use crate::sync::UserDataSync;

const SUMMARIZE_PATH: &str = "/api/summarize";

#[derive(Debug, Error)]
pub enum SummaryError {
    #[error(transparent)]
    Weights(#[from] WeightError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Summarizer error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Summarizer rejected the request: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeRequest {
    pub bullets: Vec<WeightedBullet>,
    pub category_name: String,
    pub rank_category: RankCategory,
    pub rank: String,
}

#[derive(Debug, Deserialize)]
struct SummarizeResponse {
    #[serde(default)]
    success: bool,
    summary: Option<String>,
    error: Option<String>,
}

/// Produces a narrative summary for one weighted category.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, request: &SummarizeRequest) -> Result<String, SummaryError>;
}

pub struct HttpSummarizer {
    client: Client,
    endpoint: String,
    cookie: Option<String>,
}

impl HttpSummarizer {
    pub fn new(client: Client, base_url: &str, cookie: Option<String>) -> Self {
        Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), SUMMARIZE_PATH),
            cookie,
        }
    }
}

#[async_trait]
impl Summarizer for HttpSummarizer {
    async fn summarize(&self, request: &SummarizeRequest) -> Result<String, SummaryError> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(reqwest::header::COOKIE, cookie);
        }
        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<SummarizeResponse>(&body)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or(body);
            return Err(SummaryError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: SummarizeResponse = serde_json::from_str(&body)?;
        match parsed {
            SummarizeResponse {
                success: true,
                summary: Some(summary),
                ..
            } if !summary.trim().is_empty() => Ok(summary),
            SummarizeResponse { error, .. } => Err(SummaryError::Rejected(
                error.unwrap_or_else(|| "empty summary".to_string()),
            )),
        }
    }
}

/// Summarizes one category of the current document and stores the result.
///
/// Weights are validated first; an unbalanced category never reaches the
/// summarizer and leaves the document as it was.
pub async fn summarize_category(
    sync: &UserDataSync,
    summarizer: &dyn Summarizer,
    category: &str,
) -> Result<String, SummaryError> {
    let request = sync.with_document(|doc| {
        weighted_bullets_for(doc, category).map(|bullets| SummarizeRequest {
            bullets,
            category_name: category.to_string(),
            rank_category: doc.preferences.rank_category,
            rank: doc.preferences.rank.clone(),
        })
    });
    let request = match request {
        Ok(request) => request,
        Err(e) => {
            warn!("Not summarizing \"{category}\": {e}");
            return Err(e.into());
        }
    };

    let summary = summarizer.summarize(&request).await?;
    info!(
        "Summarized \"{}\" from {} bullet(s)",
        category,
        request.bullets.len()
    );

    let mut update = Summaries::new();
    update.insert(category.to_string(), summary.clone());
    sync.update_summaries(update);

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::{http::StatusCode, response::IntoResponse, routing::post, Json, Router};
    use serde_json::{json, Value};

    use super::*;
    use crate::auth::{AuthContext, AuthStatus, UserIdentity};
    use crate::config::SyncConfig;
    use crate::evaluation::weights::tests::two_category_doc;
    use crate::store::testing::ScriptedStore;

    #[derive(Default)]
    struct RecordingSummarizer {
        requests: Mutex<Vec<SummarizeRequest>>,
    }

    #[async_trait]
    impl Summarizer for RecordingSummarizer {
        async fn summarize(&self, request: &SummarizeRequest) -> Result<String, SummaryError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(format!("Summary of {}", request.category_name))
        }
    }

    async fn sync_with_two_categories() -> (AuthContext, UserDataSync) {
        let auth = AuthContext::new(AuthStatus::Authenticated(UserIdentity {
            id: "u1".to_string(),
            email: None,
        }));
        let store = Arc::new(ScriptedStore::new());
        let sync = UserDataSync::spawn(store, auth.subscribe(), SyncConfig::default());
        tokio::time::sleep(Duration::from_millis(1)).await;

        let doc = two_category_doc();
        sync.update_bullets(doc.bullets);
        sync.update_bullet_weights(doc.bullet_weights);
        (auth, sync)
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbalanced_category_is_rejected_without_side_effects() {
        let (_auth, sync) = sync_with_two_categories().await;
        let summarizer = RecordingSummarizer::default();
        let weights_before = sync.document().bullet_weights;

        let err = summarize_category(&sync, &summarizer, "Performance of Duties")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SummaryError::Weights(WeightError::Unbalanced { total: 85, .. })
        ));
        assert!(summarizer.requests.lock().unwrap().is_empty());
        let doc = sync.document();
        assert_eq!(doc.bullet_weights, weights_before);
        assert!(doc.summaries.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_balanced_category_summary_is_stored() {
        let (_auth, sync) = sync_with_two_categories().await;
        let summarizer = RecordingSummarizer::default();

        let summary = summarize_category(&sync, &summarizer, "Leadership Skills")
            .await
            .unwrap();

        assert_eq!(summary, "Summary of Leadership Skills");
        let requests = summarizer.requests.lock().unwrap().clone();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].rank, "O3");
        let weights: Vec<i64> = requests[0].bullets.iter().map(|b| b.weight).collect();
        assert_eq!(weights, vec![70, 30]);
        assert_eq!(
            sync.document().summaries.get("Leadership Skills").map(String::as_str),
            Some("Summary of Leadership Skills")
        );
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn request() -> SummarizeRequest {
        SummarizeRequest {
            bullets: vec![WeightedBullet {
                content: "Led 12-person boarding team".to_string(),
                competency: "Workplace Climate".to_string(),
                weight: 100,
            }],
            category_name: "Leadership Skills".to_string(),
            rank_category: RankCategory::Officer,
            rank: "O3".to_string(),
        }
    }

    #[tokio::test]
    async fn test_http_summarizer_sends_camel_case_payload() {
        let seen: Arc<Mutex<Option<Value>>> = Arc::default();
        let captured = seen.clone();
        let app = Router::new().route(
            "/api/summarize",
            post(move |Json(body): Json<Value>| async move {
                *captured.lock().unwrap() = Some(body);
                Json(json!({ "success": true, "summary": "Exceptional leader." }))
            }),
        );
        let base = serve(app).await;
        let summarizer = HttpSummarizer::new(Client::new(), &base, None);

        let summary = summarizer.summarize(&request()).await.unwrap();

        assert_eq!(summary, "Exceptional leader.");
        let body = seen.lock().unwrap().clone().unwrap();
        assert_eq!(body["categoryName"], "Leadership Skills");
        assert_eq!(body["rankCategory"], "Officer");
        assert_eq!(body["bullets"][0]["weight"], 100);
    }

    #[tokio::test]
    async fn test_http_summarizer_surfaces_endpoint_error() {
        let app = Router::new().route(
            "/api/summarize",
            post(|| async {
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "success": false, "error": "Missing required fields" })),
                )
                    .into_response()
            }),
        );
        let base = serve(app).await;
        let summarizer = HttpSummarizer::new(Client::new(), &base, None);

        match summarizer.summarize(&request()).await {
            Err(SummaryError::Api { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "Missing required fields");
            }
            other => panic!("expected api error, got {other:?}"),
        }
    }
}
