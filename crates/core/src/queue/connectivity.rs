//! Connectivity monitor: classifies the active network path and publishes
//! debounced change events.

use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use tokio::sync::broadcast;

/// Kind of network interface backing the active path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionType {
    Wifi,
    Cellular,
    WiredEthernet,
    Unknown,
}

/// Snapshot of the classified network path. Process-lifetime only, never
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectivityState {
    pub is_connected: bool,
    pub connection_type: ConnectionType,
    /// Metered or hotspot-style path.
    pub is_expensive: bool,
    /// Path under OS-imposed data restrictions (low-data mode).
    pub is_constrained: bool,
}

impl ConnectivityState {
    /// Initial state before the platform reports a path.
    pub fn offline() -> Self {
        Self {
            is_connected: false,
            connection_type: ConnectionType::Unknown,
            is_expensive: false,
            is_constrained: false,
        }
    }

    pub fn wifi() -> Self {
        Self {
            is_connected: true,
            connection_type: ConnectionType::Wifi,
            is_expensive: false,
            is_constrained: false,
        }
    }

    pub fn cellular(is_expensive: bool, is_constrained: bool) -> Self {
        Self {
            is_connected: true,
            connection_type: ConnectionType::Cellular,
            is_expensive,
            is_constrained,
        }
    }

    /// Policy predicate gating background sync and non-essential loads:
    /// connected over wifi/wired ethernet, or over cellular that is neither
    /// expensive nor constrained.
    pub fn allows_sync(&self) -> bool {
        if !self.is_connected {
            return false;
        }
        match self.connection_type {
            ConnectionType::Wifi | ConnectionType::WiredEthernet => true,
            ConnectionType::Cellular => !self.is_expensive && !self.is_constrained,
            ConnectionType::Unknown => false,
        }
    }
}

/// Connectivity change published to subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityEvent {
    pub state: ConnectivityState,
    /// Edge flag: this change took the device from unreachable to reachable.
    pub became_reachable: bool,
}

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Observes the platform network path and publishes the classified state.
///
/// The platform reachability layer feeds raw path updates through
/// [`ConnectivityMonitor::update`]; updates with an identical classification
/// are debounced so a flapping link does not fire redundant events.
pub struct ConnectivityMonitor {
    state: RwLock<ConnectivityState>,
    events: broadcast::Sender<ConnectivityEvent>,
}

impl ConnectivityMonitor {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: RwLock::new(ConnectivityState::offline()),
            events,
        }
    }

    /// Latest known snapshot. Never blocks on the network.
    pub fn current_state(&self) -> ConnectivityState {
        *self.state.read().unwrap()
    }

    pub fn is_connected(&self) -> bool {
        self.current_state().is_connected
    }

    /// True when the current path should carry background sync traffic.
    pub fn should_sync_now(&self) -> bool {
        self.current_state().allows_sync()
    }

    /// Apply a platform path update. Returns the published event, or `None`
    /// when the classification did not change.
    pub fn update(&self, next: ConnectivityState) -> Option<ConnectivityEvent> {
        let previous = {
            let mut guard = self.state.write().unwrap();
            let previous = *guard;
            if previous == next {
                return None;
            }
            *guard = next;
            previous
        };

        let event = ConnectivityEvent {
            state: next,
            became_reachable: !previous.is_connected && next.is_connected,
        };
        if event.became_reachable {
            log::info!(
                "[Connectivity] Network reachable ({:?})",
                next.connection_type
            );
        } else if !next.is_connected {
            log::warn!("[Connectivity] Network lost");
        } else {
            log::debug!("[Connectivity] Path changed: {:?}", next);
        }

        // No subscribers yet is fine; the engine may not be running.
        let _ = self.events.send(event);
        Some(event)
    }

    /// Subscribe to debounced connectivity changes.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectivityEvent> {
        self.events.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_classification_is_debounced() {
        let monitor = ConnectivityMonitor::new();
        assert!(monitor.update(ConnectivityState::wifi()).is_some());
        assert!(monitor.update(ConnectivityState::wifi()).is_none());
    }

    #[test]
    fn reachable_edge_fires_only_on_offline_to_online() {
        let monitor = ConnectivityMonitor::new();

        let online = monitor.update(ConnectivityState::wifi()).unwrap();
        assert!(online.became_reachable);

        let path_change = monitor.update(ConnectivityState::cellular(false, false)).unwrap();
        assert!(!path_change.became_reachable);

        let offline = monitor.update(ConnectivityState::offline()).unwrap();
        assert!(!offline.became_reachable);
        assert!(!monitor.is_connected());

        let back = monitor.update(ConnectivityState::wifi()).unwrap();
        assert!(back.became_reachable);
    }

    #[test]
    fn subscribers_receive_published_events() {
        let monitor = ConnectivityMonitor::new();
        let mut events = monitor.subscribe();

        monitor.update(ConnectivityState::wifi());
        monitor.update(ConnectivityState::wifi());
        monitor.update(ConnectivityState::offline());

        assert!(events.try_recv().unwrap().became_reachable);
        assert!(!events.try_recv().unwrap().state.is_connected);
        assert!(events.try_recv().is_err());
    }

    #[test]
    fn sync_policy_gates_on_link_quality() {
        assert!(ConnectivityState::wifi().allows_sync());
        assert!(ConnectivityState::cellular(false, false).allows_sync());
        assert!(!ConnectivityState::cellular(true, false).allows_sync());
        assert!(!ConnectivityState::cellular(false, true).allows_sync());
        assert!(!ConnectivityState::offline().allows_sync());

        let wired = ConnectivityState {
            is_connected: true,
            connection_type: ConnectionType::WiredEthernet,
            is_expensive: false,
            is_constrained: false,
        };
        assert!(wired.allows_sync());

        let unknown = ConnectivityState {
            is_connected: true,
            connection_type: ConnectionType::Unknown,
            is_expensive: false,
            is_constrained: false,
        };
        assert!(!unknown.allows_sync());
    }
}
