// UserDataSync: keeps the per-user document in memory and mirrors it to the
// remote store with debounced, single-flight, retrying writes.

pub mod engine;
pub mod state;

pub use engine::UserDataSync;
pub use state::{SaveStatus, SyncPhase, Urgency};
