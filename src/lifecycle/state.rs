//! Server state, observable through a watch channel.

use tokio::sync::watch;

/// Lifecycle position. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServerState {
    Created,
    Configured,
    Serving,
    ShuttingDown,
    Stopped,
}

impl ServerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerState::Created => "created",
            ServerState::Configured => "configured",
            ServerState::Serving => "serving",
            ServerState::ShuttingDown => "shutting_down",
            ServerState::Stopped => "stopped",
        }
    }
}

#[derive(Debug)]
pub(crate) struct StateCell {
    tx: watch::Sender<ServerState>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        let (tx, _) = watch::channel(ServerState::Created);
        Self { tx }
    }

    pub(crate) fn get(&self) -> ServerState {
        *self.tx.borrow()
    }

    pub(crate) fn advance(&self, next: ServerState) {
        self.tx.send_modify(|state| {
            debug_assert!(next > *state, "state moved backwards: {state:?} -> {next:?}");
            *state = next;
        });
        tracing::debug!(state = next.as_str(), "Server state changed");
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.tx.subscribe()
    }
}
