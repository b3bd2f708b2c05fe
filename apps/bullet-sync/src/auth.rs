//! Authentication context handed to the sync engine.
//!
//! The engine only observes authentication; signing in and out happens
//! elsewhere. The current status is published over a `watch` channel so the
//! engine reacts to every transition.

use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserIdentity {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthStatus {
    /// The session has not been resolved yet.
    #[default]
    Pending,
    Authenticated(UserIdentity),
    Unauthenticated,
}

impl AuthStatus {
    pub fn user(&self) -> Option<&UserIdentity> {
        match self {
            AuthStatus::Authenticated(user) => Some(user),
            _ => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user().is_some()
    }
}

/// Owner side of the authentication state.
#[derive(Debug)]
pub struct AuthContext {
    tx: watch::Sender<AuthStatus>,
}

impl AuthContext {
    pub fn new(initial: AuthStatus) -> Self {
        let (tx, _rx) = watch::channel(initial);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthStatus> {
        self.tx.subscribe()
    }

    pub fn status(&self) -> AuthStatus {
        self.tx.borrow().clone()
    }

    pub fn sign_in(&self, user: UserIdentity) {
        self.tx.send_replace(AuthStatus::Authenticated(user));
    }

    pub fn sign_out(&self) {
        self.tx.send_replace(AuthStatus::Unauthenticated);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str) -> UserIdentity {
        UserIdentity {
            id: id.to_string(),
            email: None,
        }
    }

    #[test]
    fn test_status_transitions_are_observed() {
        let auth = AuthContext::new(AuthStatus::Pending);
        let mut rx = auth.subscribe();
        assert!(!rx.borrow_and_update().is_authenticated());

        auth.sign_in(user("u1"));
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().user().map(|u| u.id.as_str()), Some("u1"));

        auth.sign_out();
        assert_eq!(*rx.borrow(), AuthStatus::Unauthenticated);
    }
}
