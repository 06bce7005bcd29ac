//! Latched stop request shared by the application, its [`ServerHandle`]
//! and the HTTP server.
//!
//! [`ServerHandle`]: crate::lifecycle::ServerHandle

use std::sync::Arc;

use tokio::sync::watch;

/// A stop request that stays set once made.
///
/// Clones share the flag. A request made before anyone waits is not lost:
/// [`requested`](Self::requested) resolves immediately.
#[derive(Debug, Clone)]
pub struct Shutdown {
    flag: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self { flag: Arc::new(flag) }
    }

    /// Request a stop. Repeated calls are no-ops.
    pub fn trigger(&self) {
        self.flag.send_if_modified(|requested| !std::mem::replace(requested, true));
    }

    pub fn is_triggered(&self) -> bool {
        *self.flag.borrow()
    }

    /// Resolves once [`trigger`](Self::trigger) has been called on any clone.
    pub async fn requested(&self) {
        let mut rx = self.flag.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|requested| *requested).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
