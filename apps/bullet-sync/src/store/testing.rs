//! Scripted in-memory store for engine tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Semaphore;

use crate::models::document::UserDocument;
use crate::models::remote::{CreateAck, CreateRecord, RemoteRecord, UpdateRecord};
use crate::store::{classify_status, RemoteStore, StoreError};

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Fetch,
    Create {
        user_id: String,
        content: UserDocument,
    },
    Update {
        id: String,
        user_id: String,
        content: UserDocument,
    },
}

/// Scripted outcome of the next write (create or update).
#[derive(Debug, Clone)]
pub(crate) enum Outcome {
    Ok,
    OkWithoutId,
    Status(u16),
}

pub(crate) struct ScriptedStore {
    calls: Mutex<Vec<Call>>,
    stored: Mutex<Option<RemoteRecord>>,
    fetch_status: Mutex<Option<u16>>,
    writes: Mutex<VecDeque<Outcome>>,
    always_fail: Mutex<Option<u16>>,
    created_id: String,
    gate: Option<Semaphore>,
}

impl ScriptedStore {
    pub(crate) fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            stored: Mutex::new(None),
            fetch_status: Mutex::new(None),
            writes: Mutex::new(VecDeque::new()),
            always_fail: Mutex::new(None),
            created_id: "abc123".to_string(),
            gate: None,
        }
    }

    /// Writes block until [`ScriptedStore::release`] is called once per write.
    pub(crate) fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    pub(crate) fn with_record(self, id: &str, content: Value) -> Self {
        *self.stored.lock().unwrap() = Some(RemoteRecord {
            id: id.to_string(),
            content,
            title: None,
            updated_at: None,
        });
        self
    }

    pub(crate) fn fail_fetch(&self, status: u16) {
        *self.fetch_status.lock().unwrap() = Some(status);
    }

    pub(crate) fn script(&self, outcome: Outcome) {
        self.writes.lock().unwrap().push_back(outcome);
    }

    pub(crate) fn fail_every_write(&self, status: u16) {
        *self.always_fail.lock().unwrap() = Some(status);
    }

    pub(crate) fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn fetches(&self) -> usize {
        self.calls().iter().filter(|c| **c == Call::Fetch).count()
    }

    pub(crate) fn writes(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| *c != Call::Fetch)
            .collect()
    }

    async fn next_write(&self, call: Call) -> Outcome {
        self.calls.lock().unwrap().push(call);
        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }
        if let Some(status) = *self.always_fail.lock().unwrap() {
            return Outcome::Status(status);
        }
        self.writes.lock().unwrap().pop_front().unwrap_or(Outcome::Ok)
    }
}

fn status_error(status: u16) -> StoreError {
    StoreError::Api {
        status,
        message: format!("scripted {status}"),
        class: classify_status(status),
    }
}

#[async_trait]
impl RemoteStore for ScriptedStore {
    async fn fetch_latest(&self) -> Result<Option<RemoteRecord>, StoreError> {
        self.calls.lock().unwrap().push(Call::Fetch);
        if let Some(status) = *self.fetch_status.lock().unwrap() {
            return Err(status_error(status));
        }
        Ok(self.stored.lock().unwrap().clone())
    }

    async fn create(&self, record: CreateRecord<'_>) -> Result<CreateAck, StoreError> {
        let call = Call::Create {
            user_id: record.user_id.to_string(),
            content: record.content.clone(),
        };
        match self.next_write(call).await {
            Outcome::Ok => Ok(CreateAck {
                id: Some(self.created_id.clone()),
            }),
            Outcome::OkWithoutId => Ok(CreateAck { id: None }),
            Outcome::Status(status) => Err(status_error(status)),
        }
    }

    async fn update(&self, record: UpdateRecord<'_>) -> Result<(), StoreError> {
        let call = Call::Update {
            id: record.id.to_string(),
            user_id: record.user_id.to_string(),
            content: record.content.clone(),
        };
        match self.next_write(call).await {
            Outcome::Ok | Outcome::OkWithoutId => Ok(()),
            Outcome::Status(status) => Err(status_error(status)),
        }
    }
}
