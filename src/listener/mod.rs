//! Application listeners.
//!
//! Two roles, partitioned by the caller when building [`Listeners`]:
//!
//! ```text
//! ConfigListener           (0 or 1) → fills the ConfigSource instead of app.yml
//! ApplicationEventListener (0..n)   → PreApply → PreStart → (serving) → PreStop → PostStop
//! ```
//!
//! Event listeners always fire in registration order. A panic inside a
//! callback is never caught: it aborts whichever phase it happened in.

use std::sync::Arc;

use crate::config::{ConfigError, ConfigSource};

/// Receives the four ordered lifecycle callbacks.
///
/// Every callback defaults to a no-op so implementors only override the
/// phases they care about.
pub trait ApplicationEventListener: Send + Sync {
    /// Before the engine is finalized. Register shared resources here.
    fn pre_apply(&self) {}

    /// Last event before the server starts listening.
    fn pre_start(&self) {}

    /// Termination signal received, before the server drains.
    fn pre_stop(&self) {}

    /// After the server has stopped.
    fn post_stop(&self) {}
}

/// Supplies the configuration instead of the default file.
pub trait ConfigListener: Send + Sync {
    fn read(&self, source: &mut ConfigSource) -> Result<(), ConfigError>;
}

impl<F> ConfigListener for F
where
    F: Fn(&mut ConfigSource) -> Result<(), ConfigError> + Send + Sync,
{
    fn read(&self, source: &mut ConfigSource) -> Result<(), ConfigError> {
        self(source)
    }
}

/// Lifecycle phases an event listener is notified of.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    PreApply,
    PreStart,
    PreStop,
    PostStop,
}

impl LifecycleEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::PreApply => "pre_apply",
            LifecycleEvent::PreStart => "pre_start",
            LifecycleEvent::PreStop => "pre_stop",
            LifecycleEvent::PostStop => "post_stop",
        }
    }
}

/// Listeners supplied at construction, already partitioned by role.
#[derive(Default)]
pub struct Listeners {
    pub(crate) config: Option<Box<dyn ConfigListener>>,
    pub(crate) events: Vec<Arc<dyn ApplicationEventListener>>,
}

impl Listeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the config listener. Only one is honored; a second call replaces
    /// the first.
    pub fn config(mut self, listener: impl ConfigListener + 'static) -> Self {
        if self.config.is_some() {
            tracing::warn!("Config listener already set, replacing it");
        }
        self.config = Some(Box::new(listener));
        self
    }

    /// Append an event listener.
    pub fn event(self, listener: impl ApplicationEventListener + 'static) -> Self {
        self.shared_event(Arc::new(listener))
    }

    /// Append an event listener the caller keeps a handle to.
    pub fn shared_event(mut self, listener: Arc<dyn ApplicationEventListener>) -> Self {
        self.events.push(listener);
        self
    }

    pub fn has_config(&self) -> bool {
        self.config.is_some()
    }

    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}

/// Notify every listener of `event`, in registration order.
pub fn fire(listeners: &[Arc<dyn ApplicationEventListener>], event: LifecycleEvent) {
    tracing::debug!(event = event.as_str(), listeners = listeners.len(), "Firing lifecycle event");
    for listener in listeners {
        match event {
            LifecycleEvent::PreApply => listener.pre_apply(),
            LifecycleEvent::PreStart => listener.pre_start(),
            LifecycleEvent::PreStop => listener.pre_stop(),
            LifecycleEvent::PostStop => listener.post_stop(),
        }
    }
}
