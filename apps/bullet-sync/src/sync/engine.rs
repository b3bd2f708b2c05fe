//! The sync engine.
//!
//! A `UserDataSync` owns the in-memory document and one background worker
//! task. Update calls mutate the document synchronously and leave a pending
//! save behind; the worker is the only code that talks to the store, which is
//! what makes writes single-flight. Loads, flushes, auth transitions and
//! timers are all serialized through the worker's select loop.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch, Notify};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::auth::{AuthStatus, UserIdentity};
use crate::config::SyncConfig;
use crate::errors::SyncError;
use crate::models::bullet::{normalize_bullets, Bullet};
use crate::models::document::{
    ActiveTab, BulletWeights, ChatSession, EvaluationDataPatch, PreferencesPatch, Summaries,
    UserDocument,
};
use crate::models::remote::{CreateRecord, UpdateRecord, DOCUMENT_TITLE};
use crate::store::{ErrorClass, RemoteStore};
use crate::sync::state::{throttled_until, PendingSave, SaveStatus, SyncPhase, Urgency};

struct SyncState {
    document: UserDocument,
    is_loading: bool,
    load_error: Option<String>,
    save_error: Option<String>,
    save_status: SaveStatus,
    phase: SyncPhase,
    remote_id: Option<String>,
    pending: Option<PendingSave>,
    in_flight: bool,
    last_saved_at: Option<Instant>,
    status_reset_at: Option<Instant>,
    user: Option<UserIdentity>,
    /// Bumped whenever the session is reset; results from an older epoch are dropped.
    epoch: u64,
    closed: bool,
}

impl SyncState {
    fn new(auth: &AuthStatus) -> Self {
        Self {
            document: UserDocument::default(),
            is_loading: !matches!(auth, AuthStatus::Unauthenticated),
            load_error: None,
            save_error: None,
            save_status: SaveStatus::Idle,
            phase: SyncPhase::Idle,
            remote_id: None,
            pending: None,
            in_flight: false,
            last_saved_at: None,
            status_reset_at: None,
            user: auth.user().cloned(),
            epoch: 0,
            closed: false,
        }
    }

    /// Back to defaults, cancelling anything pending. The user is kept.
    fn reset(&mut self) {
        self.document = UserDocument::default();
        self.load_error = None;
        self.save_error = None;
        self.phase = SyncPhase::Idle;
        self.remote_id = None;
        self.pending = None;
        self.last_saved_at = None;
        self.status_reset_at = None;
        self.epoch += 1;
    }
}

enum Command {
    Load(oneshot::Sender<()>),
    Flush(oneshot::Sender<Result<(), SyncError>>),
}

struct Inner {
    store: Arc<dyn RemoteStore>,
    auth: watch::Receiver<AuthStatus>,
    config: SyncConfig,
    state: Mutex<SyncState>,
    wake: Notify,
    status_tx: watch::Sender<SaveStatus>,
}

/// Handle to one user's synchronized document.
///
/// Dropping the handle cancels pending saves. A write already on the wire is
/// allowed to finish, but its result is discarded.
pub struct UserDataSync {
    inner: Arc<Inner>,
    commands: mpsc::UnboundedSender<Command>,
}

impl UserDataSync {
    /// Creates the engine and spawns its worker on the current tokio runtime.
    /// If `auth` is already authenticated the first load starts right away.
    pub fn spawn(
        store: Arc<dyn RemoteStore>,
        auth: watch::Receiver<AuthStatus>,
        config: SyncConfig,
    ) -> Self {
        let state = SyncState::new(&auth.borrow());
        let (status_tx, _) = watch::channel(SaveStatus::Idle);
        let inner = Arc::new(Inner {
            store,
            auth: auth.clone(),
            config,
            state: Mutex::new(state),
            wake: Notify::new(),
            status_tx,
        });
        let (commands, rx) = mpsc::unbounded_channel();

        tokio::spawn(run_worker(inner.clone(), rx, auth));

        Self { inner, commands }
    }

    // ── Read side ──────────────────────────────────────────────────────────

    /// Snapshot of the current document, including edits not yet saved.
    pub fn document(&self) -> UserDocument {
        self.inner.lock().document.clone()
    }

    pub fn with_document<R>(&self, f: impl FnOnce(&UserDocument) -> R) -> R {
        f(&self.inner.lock().document)
    }

    pub fn is_loading(&self) -> bool {
        self.inner.lock().is_loading
    }

    pub fn load_error(&self) -> Option<String> {
        self.inner.lock().load_error.clone()
    }

    pub fn save_error(&self) -> Option<String> {
        self.inner.lock().save_error.clone()
    }

    pub fn save_status(&self) -> SaveStatus {
        self.inner.lock().save_status
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SaveStatus> {
        self.inner.status_tx.subscribe()
    }

    pub fn phase(&self) -> SyncPhase {
        self.inner.lock().phase
    }

    pub fn remote_id(&self) -> Option<String> {
        self.inner.lock().remote_id.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.auth.borrow().is_authenticated()
    }

    // ── Mutators ───────────────────────────────────────────────────────────

    /// Replaces the bullet list. Repeated ids are dropped, first one wins.
    pub fn update_bullets(&self, bullets: Vec<Bullet>) {
        let bullets = normalize_bullets(bullets);
        self.inner.mutate(Urgency::Critical, |doc| doc.bullets = bullets);
    }

    /// Appends a bullet unless one with the same id already exists.
    pub fn add_bullet(&self, bullet: Bullet) -> bool {
        let mut state = self.inner.lock();
        if state.document.bullets.iter().any(|b| b.id == bullet.id) {
            debug!("Bullet {} already present, not adding", bullet.id);
            return false;
        }
        let bullets = normalize_bullets(vec![bullet]);
        state.document.bullets.extend(bullets);
        self.inner.schedule_locked(&mut state, Urgency::Critical);
        true
    }

    pub fn update_preferences(&self, patch: PreferencesPatch) {
        self.inner
            .mutate(Urgency::Routine, |doc| patch.apply_to(&mut doc.preferences));
    }

    pub fn set_active_tab(&self, tab: ActiveTab) {
        self.update_preferences(PreferencesPatch {
            last_active_tab: Some(tab),
            ..PreferencesPatch::default()
        });
    }

    pub fn update_evaluation_data(&self, patch: EvaluationDataPatch) {
        self.inner
            .mutate(Urgency::Routine, |doc| patch.apply_to(&mut doc.evaluation_data));
    }

    /// Merges the given weights into the existing map key by key.
    pub fn update_bullet_weights(&self, weights: BulletWeights) {
        self.inner
            .mutate(Urgency::Routine, |doc| doc.bullet_weights.extend(weights));
    }

    /// Merges the given summaries into the existing map key by key.
    pub fn update_summaries(&self, summaries: Summaries) {
        self.inner
            .mutate(Urgency::Routine, |doc| doc.summaries.extend(summaries));
    }

    /// Stores or replaces one chat session, leaving the others as they are.
    pub fn save_chat_session(&self, session_id: impl Into<String>, session: ChatSession) {
        let session_id = session_id.into();
        self.inner.mutate(Urgency::Routine, |doc| {
            doc.chat_sessions.insert(session_id, session);
        });
    }

    /// Requests a save of the current document without changing it.
    pub fn schedule_save(&self, urgency: Urgency) {
        let mut state = self.inner.lock();
        self.inner.schedule_locked(&mut state, urgency);
    }

    // ── Explicit operations ───────────────────────────────────────────────

    /// Reloads the latest remote document, replacing the in-memory one.
    /// Resolves immediately with defaults when nobody is signed in.
    pub async fn load(&self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Load(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Saves right now, skipping the debounce window and the minimum
    /// interval. This is the only save path that reports failure to its caller.
    pub async fn save_now(&self) -> Result<(), SyncError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(Command::Flush(tx))
            .map_err(|_| SyncError::Closed)?;
        rx.await.map_err(|_| SyncError::Closed)?
    }
}

impl Drop for UserDataSync {
    fn drop(&mut self) {
        {
            let mut state = self.inner.lock();
            state.closed = true;
            state.pending = None;
            state.status_reset_at = None;
        }
        self.inner.wake.notify_one();
    }
}

/// What a finished write attempt leads to.
enum AfterAttempt {
    Done(Result<(), SyncError>),
    Retry(Duration),
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, state: &mut SyncState, status: SaveStatus) {
        state.save_status = status;
        self.status_tx.send_replace(status);
    }

    fn mutate(&self, urgency: Urgency, f: impl FnOnce(&mut UserDocument)) {
        let mut state = self.lock();
        f(&mut state.document);
        self.schedule_locked(&mut state, urgency);
    }

    /// Debounces a save request. Without a signed-in user the change stays local.
    fn schedule_locked(&self, state: &mut SyncState, urgency: Urgency) {
        if state.closed || state.user.is_none() {
            return;
        }
        state.pending = Some(PendingSave::schedule(
            state.pending,
            urgency,
            Instant::now(),
            &self.config,
        ));
        if !state.in_flight {
            state.phase = SyncPhase::PendingSave;
        }
        self.wake.notify_one();
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn next_wake(&self) -> Option<Instant> {
        let state = self.lock();
        let pending = state.pending.map(|p| p.deadline);
        match (pending, state.status_reset_at) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn still_signed_in_as(&self, user: &UserIdentity) -> bool {
        self.auth.borrow().user() == Some(user)
    }

    async fn handle_auth(&self, status: &AuthStatus) {
        match status {
            AuthStatus::Authenticated(user) => {
                {
                    let mut state = self.lock();
                    if state.user.as_ref().is_some_and(|u| u != user) {
                        info!("Signed-in user changed, resetting document");
                        state.reset();
                        self.set_status(&mut state, SaveStatus::Idle);
                    }
                    state.user = Some(user.clone());
                    state.is_loading = true;
                }
                self.load().await;
            }
            AuthStatus::Unauthenticated => {
                let mut state = self.lock();
                if state.user.is_some() {
                    info!("Signed out, discarding in-memory document");
                }
                state.reset();
                state.user = None;
                state.is_loading = false;
                self.set_status(&mut state, SaveStatus::Idle);
            }
            AuthStatus::Pending => {}
        }
    }

    async fn load(&self) {
        let (user, epoch) = {
            let mut state = self.lock();
            let Some(user) = state.user.clone() else {
                state.is_loading = false;
                return;
            };
            state.load_error = None;
            (user, state.epoch)
        };

        let result = self.store.fetch_latest().await;

        let mut state = self.lock();
        if state.closed || state.epoch != epoch || !self.still_signed_in_as(&user) {
            debug!("Discarding load result for a stale session");
            return;
        }
        state.is_loading = false;

        match result {
            Ok(Some(record)) => {
                info!("Loaded user data record {}", record.id);
                state.document = UserDocument::from_remote_content(&record.content);
                state.remote_id = Some(record.id);
            }
            Ok(None) => {
                debug!("No saved user data yet, using defaults");
                state.document = UserDocument::default();
                state.remote_id = None;
            }
            Err(e) if matches!(e.class(), ErrorClass::NotFound | ErrorClass::Unauthorized) => {
                debug!("No user data available ({e}), using defaults");
                state.document = UserDocument::default();
                state.remote_id = None;
            }
            Err(e) => {
                warn!("Failed to load user data: {e}");
                state.load_error = Some(format!("Failed to load user data: {e}"));
                state.document = UserDocument::default();
            }
        }
    }

    /// Fires due timers: status revert and debounced saves.
    async fn on_timer(&self) {
        let now = Instant::now();
        let due = {
            let mut state = self.lock();

            if state.status_reset_at.is_some_and(|t| t <= now) {
                state.status_reset_at = None;
                if matches!(state.save_status, SaveStatus::Saved | SaveStatus::Error) {
                    self.set_status(&mut state, SaveStatus::Idle);
                }
            }

            match state.pending {
                Some(pending) if pending.deadline <= now => {
                    match throttled_until(state.last_saved_at, self.config.min_save_interval, now) {
                        Some(ready_at) => {
                            debug!(
                                "Save throttled for {}ms",
                                (ready_at - now).as_millis()
                            );
                            state.pending = Some(PendingSave {
                                deadline: ready_at,
                                ..pending
                            });
                            false
                        }
                        None => true,
                    }
                }
                _ => false,
            }
        };

        if due {
            // Failures are already recorded in save_error / save_status.
            let _ = self.save().await;
        }
    }

    /// Runs one save, retrying transient failures with linear backoff.
    /// Each attempt sends the newest document.
    async fn save(&self) -> Result<(), SyncError> {
        let max_attempts = self.config.max_save_attempts.max(1);
        let mut attempt = 1;

        loop {
            let (document, remote_id, user, epoch) = {
                let mut state = self.lock();
                if state.closed {
                    return Err(SyncError::Closed);
                }
                let Some(user) = state.user.clone() else {
                    state.pending = None;
                    return Err(SyncError::Unauthenticated);
                };
                // The worker may not have seen a sign-out that already happened.
                if !self.still_signed_in_as(&user) {
                    state.in_flight = false;
                    return Err(SyncError::Unauthenticated);
                }
                state.pending = None;
                state.in_flight = true;
                state.status_reset_at = None;
                state.phase = if attempt == 1 {
                    SyncPhase::Saving
                } else {
                    SyncPhase::Retrying { attempt }
                };
                self.set_status(&mut state, SaveStatus::Saving);
                (
                    state.document.clone(),
                    state.remote_id.clone(),
                    user,
                    state.epoch,
                )
            };

            debug!(
                "Saving user data (attempt {attempt}/{max_attempts}, {})",
                if remote_id.is_some() { "update" } else { "create" }
            );
            let result = self
                .write(&document, remote_id.as_deref(), &user.id)
                .await;

            let next = {
                let mut state = self.lock();
                if state.closed || state.epoch != epoch || !self.still_signed_in_as(&user) {
                    debug!("Discarding save result for a closed or stale session");
                    state.in_flight = false;
                    return Err(if state.closed {
                        SyncError::Closed
                    } else {
                        SyncError::Unauthenticated
                    });
                }

                // The record was deleted elsewhere; the next attempt creates a new one.
                let record_gone = remote_id.is_some()
                    && matches!(&result, Err(SyncError::Store(e)) if e.class() == ErrorClass::NotFound);
                if record_gone {
                    warn!("User data record is gone, next save creates a new one");
                    state.remote_id = None;
                }

                match result {
                    Ok(created_id) => {
                        if let Some(id) = created_id {
                            info!("Created user data record {id}");
                            state.remote_id = Some(id);
                        }
                        let now = Instant::now();
                        state.in_flight = false;
                        state.last_saved_at = Some(now);
                        state.save_error = None;
                        state.phase = if state.pending.is_some() {
                            SyncPhase::PendingSave
                        } else {
                            SyncPhase::Idle
                        };
                        self.set_status(&mut state, SaveStatus::Saved);
                        state.status_reset_at = Some(now + self.config.saved_display);
                        AfterAttempt::Done(Ok(()))
                    }
                    Err(e) if (record_gone || e.is_transient()) && attempt < max_attempts => {
                        let delay = if record_gone {
                            Duration::ZERO
                        } else {
                            self.config.retry_backoff * attempt
                        };
                        warn!(
                            "Save attempt {} failed, retrying after {}ms: {}",
                            attempt,
                            delay.as_millis(),
                            e
                        );
                        state.phase = SyncPhase::Retrying {
                            attempt: attempt + 1,
                        };
                        AfterAttempt::Retry(delay)
                    }
                    Err(e) => {
                        error!("Saving user data failed after {attempt} attempt(s): {e}");
                        state.in_flight = false;
                        state.save_error = Some(e.to_string());
                        state.phase = if state.pending.is_some() {
                            SyncPhase::PendingSave
                        } else {
                            SyncPhase::Error
                        };
                        self.set_status(&mut state, SaveStatus::Error);
                        state.status_reset_at = Some(Instant::now() + self.config.error_display);
                        AfterAttempt::Done(Err(e))
                    }
                }
            };

            match next {
                AfterAttempt::Done(result) => return result,
                AfterAttempt::Retry(delay) => {
                    if !self.backoff(delay, &user).await {
                        debug!("Signed out during retry backoff, abandoning save");
                        let mut state = self.lock();
                        state.in_flight = false;
                        state.phase = SyncPhase::Idle;
                        return Err(SyncError::Unauthenticated);
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Waits out a retry delay. Returns false as soon as `user` is no longer
    /// the signed-in user.
    async fn backoff(&self, delay: Duration, user: &UserIdentity) -> bool {
        let mut auth = self.auth.clone();
        let signed_out = async {
            let changed = auth.wait_for(|s| s.user() != Some(user)).await.is_ok();
            if !changed {
                // Auth provider gone: nothing can sign out any more.
                std::future::pending::<()>().await;
            }
        };
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = signed_out => false,
        }
    }

    /// One network write. Returns the new record id after a create.
    async fn write(
        &self,
        document: &UserDocument,
        remote_id: Option<&str>,
        user_id: &str,
    ) -> Result<Option<String>, SyncError> {
        match remote_id {
            Some(id) => {
                self.store
                    .update(UpdateRecord {
                        id,
                        user_id,
                        content: document,
                        title: None,
                    })
                    .await?;
                Ok(None)
            }
            None => {
                let ack = self
                    .store
                    .create(CreateRecord {
                        user_id,
                        content: document,
                        title: Some(DOCUMENT_TITLE),
                    })
                    .await?;
                match ack.id {
                    Some(id) if !id.is_empty() => Ok(Some(id)),
                    _ => Err(SyncError::MissingRecordId),
                }
            }
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn run_worker(
    inner: Arc<Inner>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    mut auth: watch::Receiver<AuthStatus>,
) {
    let mut last_auth = auth.borrow_and_update().clone();
    if last_auth.is_authenticated() {
        inner.load().await;
    }
    let mut auth_open = true;

    loop {
        if inner.is_closed() {
            break;
        }
        let wake_at = inner.next_wake();

        tokio::select! {
            changed = auth.changed(), if auth_open => match changed {
                Ok(()) => {
                    let status = auth.borrow_and_update().clone();
                    if status != last_auth {
                        last_auth = status.clone();
                        inner.handle_auth(&status).await;
                    }
                }
                Err(_) => {
                    debug!("Auth provider dropped, keeping last known status");
                    auth_open = false;
                }
            },
            command = commands.recv() => match command {
                Some(Command::Load(reply)) => {
                    inner.load().await;
                    let _ = reply.send(());
                }
                Some(Command::Flush(reply)) => {
                    let result = inner.save().await;
                    let _ = reply.send(result);
                }
                None => break,
            },
            _ = inner.wake.notified() => {}
            _ = sleep_until_opt(wake_at) => inner.on_timer().await,
        }
    }

    debug!("User data sync worker stopped");
}
