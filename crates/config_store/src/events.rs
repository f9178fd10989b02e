//! Synchronous notification primitives.
//!
//! An [`Event`] owns a list of listeners. Subscribing returns a
//! [`Subscription`] that removes the listener when dropped, so a binder that
//! re-binds simply replaces its subscription instead of having to remember to
//! unsubscribe first.

use crate::definition::ConfigDefinition;
use crate::utils::lock;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, trace};
use uuid::Uuid;

type Listener<A> = Arc<dyn Fn(&A) + Send + Sync>;

struct Listeners<A: 'static> {
    entries: Mutex<SmallVec<[(Uuid, Listener<A>); 4]>>,
}

trait ListenerRegistry: Send + Sync {
    fn remove(&self, id: Uuid) -> bool;
    fn contains(&self, id: Uuid) -> bool;
}

impl<A: 'static> ListenerRegistry for Listeners<A> {
    fn remove(&self, id: Uuid) -> bool {
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        before != entries.len()
    }

    fn contains(&self, id: Uuid) -> bool {
        lock(&self.entries).iter().any(|(entry_id, _)| *entry_id == id)
    }
}

/// A list of listeners for payloads of type `A`.
///
/// Clones share the same listener list.
pub struct Event<A: 'static> {
    listeners: Arc<Listeners<A>>,
}

impl<A: 'static> Event<A> {
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Listeners {
                entries: Mutex::new(SmallVec::new()),
            }),
        }
    }

    /// Registers a listener. It stays registered until the returned
    /// subscription is dropped or cancelled, or forever once detached.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&A) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        lock(&self.listeners.entries).push((id, Arc::new(listener)));
        trace!("Subscribed listener {}", id);

        let registry: Arc<dyn ListenerRegistry> = self.listeners.clone();
        Subscription {
            id,
            registry: Arc::downgrade(&registry),
            active: true,
        }
    }

    /// Calls every listener with `args` and returns how many were called.
    ///
    /// The list is snapshotted first, so listeners may subscribe or cancel
    /// while being notified.
    pub fn emit(&self, args: &A) -> usize {
        let snapshot: SmallVec<[Listener<A>; 4]> = lock(&self.listeners.entries)
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in &snapshot {
            listener(args);
        }
        snapshot.len()
    }

    pub fn listener_count(&self) -> usize {
        lock(&self.listeners.entries).len()
    }

    /// Removes every listener, including detached ones.
    pub fn clear(&self) {
        let removed = std::mem::take(&mut *lock(&self.listeners.entries)).len();
        if removed > 0 {
            debug!("Cleared {} listeners", removed);
        }
    }
}

impl<A: 'static> Default for Event<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: 'static> Clone for Event<A> {
    fn clone(&self) -> Self {
        Self {
            listeners: Arc::clone(&self.listeners),
        }
    }
}

impl<A: 'static> fmt::Debug for Event<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

/// Handle to a registered listener. Dropping it removes the listener.
#[must_use = "dropping a Subscription immediately removes its listener"]
pub struct Subscription {
    id: Uuid,
    registry: Weak<dyn ListenerRegistry>,
    active: bool,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Whether the listener is still registered with a live event.
    pub fn is_active(&self) -> bool {
        self.active
            && self
                .registry
                .upgrade()
                .is_some_and(|registry| registry.contains(self.id))
    }

    /// Keeps the listener registered for the lifetime of the event.
    pub fn detach(mut self) {
        self.active = false;
    }

    /// Removes the listener now.
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        if let Some(registry) = self.registry.upgrade() {
            if registry.remove(self.id) {
                trace!("Removed listener {}", self.id);
            }
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}

/// What caused a setting to change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeSource {
    /// `set_value` or `set_serialized_value`.
    Set,
    /// The file was reloaded from disk.
    Reload,
    /// `reset_to_default`.
    Reset,
}

/// Payload of the setting-changed notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingChangedEvent {
    pub definition: ConfigDefinition,
    pub old_value: String,
    pub new_value: String,
    pub source: ChangeSource,
}

/// Payload of the config-reloaded notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigReloadedEvent {
    pub path: Option<PathBuf>,
    /// Bound entries whose value changed.
    pub changed: usize,
    /// Entries left orphaned by this reload.
    pub orphaned: usize,
}
