//! Cancellation with a cause
//!
//! A [`Cancel`] pairs a `CancellationToken` with a write-once cause cell.
//! When a pipeline task fails, it cancels the shared handle with its error;
//! every other task aborts, and the public operation reports the original
//! failure instead of a generic "cancelled". The first cause wins; later
//! attempts are ignored.
//!
//! Child handles observe ancestor cancellation, and [`Cancel::cause`]
//! searches the ancestor chain, so a cause recorded anywhere above a task
//! is what that task reports.

use std::sync::{Arc, OnceLock};
use tokio_util::sync::CancellationToken;

/// A shared cause slot; the boxed error is whatever first went wrong.
pub type CancelCause = Arc<dyn std::error::Error + Send + Sync>;

type CauseCell = Arc<OnceLock<CancelCause>>;

/// Cancellation handle shared across the tasks of one operation.
#[derive(Clone)]
pub struct Cancel {
    token: CancellationToken,
    /// Own cause cell first, then ancestors outward
    chain: Arc<Vec<CauseCell>>,
}

impl Default for Cancel {
    fn default() -> Self {
        Self {
            token: CancellationToken::new(),
            chain: Arc::new(vec![Arc::new(OnceLock::new())]),
        }
    }
}

impl Cancel {
    pub fn new() -> Self {
        Self::default()
    }

    /// A child handle: cancelled when the parent cancels, with its own
    /// cause slot in front of the parent's.
    pub fn child(&self) -> Self {
        let mut chain = Vec::with_capacity(self.chain.len() + 1);
        chain.push(Arc::new(OnceLock::new()));
        chain.extend(self.chain.iter().cloned());
        Self {
            token: self.token.child_token(),
            chain: Arc::new(chain),
        }
    }

    /// Cancel without a cause (caller-driven abort). Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Record the first cause and cancel. Idempotent; only the first cause
    /// on this handle is kept.
    pub fn cancel_with(&self, cause: impl Into<CancelCause>) {
        let _ = self.chain[0].set(cause.into());
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once this handle (or an ancestor) is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// The recorded cause, if a failure triggered the cancellation: this
    /// handle's own cause, else the nearest ancestor's.
    pub fn cause(&self) -> Option<CancelCause> {
        self.chain.iter().find_map(|cell| cell.get()).cloned()
    }
}

impl std::fmt::Debug for Cancel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cancel")
            .field("cancelled", &self.is_cancelled())
            .field("has_cause", &self.cause().is_some())
            .finish()
    }
}
