//! HTTP implementation of [`RemoteStore`] against the web app's `/api/user-data` route.

use async_trait::async_trait;
use reqwest::{header, Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::models::remote::{CreateAck, CreateRecord, ErrorBody, RemoteRecord, UpdateRecord};
use crate::store::{classify_status, RemoteStore, StoreError};

const USER_DATA_PATH: &str = "/api/user-data";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Builds the shared HTTP client used for every call to the web app.
pub fn build_http_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
}

/// Session credentials forwarded as a cookie, the way the browser would send them.
#[derive(Debug, Clone)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
}

impl SessionCookie {
    pub fn header_value(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

#[derive(Clone)]
pub struct HttpRemoteStore {
    client: Client,
    endpoint: String,
    session: Option<SessionCookie>,
}

impl HttpRemoteStore {
    pub fn new(client: Client, base_url: &str, session: Option<SessionCookie>) -> Self {
        Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), USER_DATA_PATH),
            session,
        }
    }

    fn request(&self, method: Method) -> RequestBuilder {
        let builder = self.client.request(method, &self.endpoint);
        match &self.session {
            Some(session) => builder.header(header::COOKIE, session.header_value()),
            None => builder,
        }
    }
}

/// Turns a non-2xx response into a classified [`StoreError`], reading the
/// optional `{ "error": "..." }` body for the message.
async fn check_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|e| e.error)
        .unwrap_or(body);
    warn!("User data store returned {}: {}", status, message);

    Err(StoreError::Api {
        status: status.as_u16(),
        message,
        class: classify_status(status.as_u16()),
    })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, StoreError> {
    let body = response.text().await?;
    serde_json::from_str(&body).map_err(|e| StoreError::Malformed(e.to_string()))
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn fetch_latest(&self) -> Result<Option<RemoteRecord>, StoreError> {
        let response = check_status(self.request(Method::GET).send().await?).await?;
        let records: Vec<RemoteRecord> = read_json(response).await?;
        debug!("Fetched {} user data record(s)", records.len());
        Ok(records.into_iter().next())
    }

    async fn create(&self, record: CreateRecord<'_>) -> Result<CreateAck, StoreError> {
        let response = self.request(Method::POST).json(&record).send().await?;
        let ack: CreateAck = read_json(check_status(response).await?).await?;
        debug!("Created user data record {:?}", ack.id);
        Ok(ack)
    }

    async fn update(&self, record: UpdateRecord<'_>) -> Result<(), StoreError> {
        let response = self.request(Method::PUT).json(&record).send().await?;
        check_status(response).await?;
        debug!("Updated user data record {}", record.id);
        Ok(())
    }
}
