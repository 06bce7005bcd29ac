//! Shared resources registry.
//!
//! A type map the application publishes into (configuration, envelope pool,
//! server handle) and listeners may add to during `pre_apply`.

use std::any::{Any, TypeId};
use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;

use crate::lifecycle::shutdown::Shutdown;

/// One value per type. Cheap to clone; clones share the registry.
#[derive(Clone, Default)]
pub struct Resources {
    entries: Arc<DashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Resources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `value`, replacing any previous value of the same type.
    pub fn insert<T: Any + Send + Sync>(&self, value: T) {
        self.insert_shared(Arc::new(value));
    }

    /// Insert a value that is already shared.
    pub fn insert_shared<T: Any + Send + Sync>(&self, value: Arc<T>) {
        self.entries.insert(TypeId::of::<T>(), value);
    }

    /// Shared handle to the value of type `T`.
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let value = Arc::clone(self.entries.get(&TypeId::of::<T>())?.value());
        value.downcast::<T>().ok()
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for Resources {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resources").field("len", &self.entries.len()).finish()
    }
}

/// Published once the server is listening.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Shutdown,
}

impl ServerHandle {
    pub(crate) fn new(local_addr: SocketAddr, shutdown: Shutdown) -> Self {
        Self {
            local_addr,
            shutdown,
        }
    }

    /// Address actually bound; differs from the config when port is 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Request the same graceful shutdown a termination signal would.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }
}
