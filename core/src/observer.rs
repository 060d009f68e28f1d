//! Observer capability for Bluetooth lifecycle notifications.
//!
//! Types implement [`BluetoothEventsObserver`] and override only the callbacks
//! they care about; the remaining ones are no-ops. The hub never owns an
//! observer: it keeps a [`WeakObserver`] per registration, so dropping the last
//! `Arc` elsewhere ends delivery.
//!
//! On subscription the hub immediately calls `bluetooth_available` with the
//! current state, followed by `connected` when a peripheral is already
//! connected. Implementations must therefore accept callbacks while the
//! `subscribe` call is still running.

use std::fmt;
use std::sync::{Arc, Weak};

use crate::peripheral::PeripheralIdentifier;

#[uniffi::trait_interface]
pub trait BluetoothEventsObserver: Send + Sync {
    /// Called whenever adapter availability changes, and once on subscription
    /// with the current value.
    fn bluetooth_available(&self, _available: bool) {}

    /// Called when a peripheral connects, and on subscription if one is
    /// already connected.
    fn connected(&self, _peripheral: PeripheralIdentifier) {}

    fn disconnected(&self) {}
}

/// Non-owning reference to a registered observer.
///
/// Holding (or cloning) a handle never keeps the observer alive. Once
/// [`WeakObserver::resolve`] returns `None` it returns `None` forever.
#[derive(Clone)]
pub struct WeakObserver {
    target: Weak<dyn BluetoothEventsObserver>,
}

impl WeakObserver {
    pub fn new(observer: &Arc<dyn BluetoothEventsObserver>) -> Self {
        Self {
            target: Arc::downgrade(observer),
        }
    }

    /// The live observer, or `None` once every strong owner has released it.
    pub fn resolve(&self) -> Option<Arc<dyn BluetoothEventsObserver>> {
        self.target.upgrade()
    }

    pub fn is_alive(&self) -> bool {
        self.target.strong_count() > 0
    }

    /// Identity check; vtable metadata is ignored.
    pub fn refers_to(&self, observer: &Arc<dyn BluetoothEventsObserver>) -> bool {
        std::ptr::addr_eq(self.target.as_ptr(), Arc::as_ptr(observer))
    }
}

impl fmt::Debug for WeakObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakObserver")
            .field("alive", &self.is_alive())
            .finish()
    }
}

/// One lifecycle transition, as delivered to observers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BluetoothEvent {
    Availability { available: bool },
    Connected { peripheral: PeripheralIdentifier },
    Disconnected,
}

impl BluetoothEvent {
    pub fn deliver_to(&self, observer: &dyn BluetoothEventsObserver) {
        match self {
            BluetoothEvent::Availability { available } => observer.bluetooth_available(*available),
            BluetoothEvent::Connected { peripheral } => observer.connected(peripheral.clone()),
            BluetoothEvent::Disconnected => observer.disconnected(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer_mock::{ConnectionOnlyObserver, RecordingObserver};

    struct Inert;

    impl BluetoothEventsObserver for Inert {}

    #[test]
    fn test_default_callbacks_are_noops() {
        let observer = Inert;
        observer.bluetooth_available(true);
        observer.bluetooth_available(false);
        observer.connected(PeripheralIdentifier::new("6E400001", None));
        observer.disconnected();
    }

    #[test]
    fn test_partial_observer_ignores_availability() {
        let observer = ConnectionOnlyObserver::new();
        let peripheral = PeripheralIdentifier::new("6E400001", None);

        BluetoothEvent::Availability { available: true }.deliver_to(&observer);
        BluetoothEvent::Connected {
            peripheral: peripheral.clone(),
        }
        .deliver_to(&observer);
        BluetoothEvent::Availability { available: false }.deliver_to(&observer);
        BluetoothEvent::Disconnected.deliver_to(&observer);

        assert_eq!(
            observer.events(),
            vec![
                BluetoothEvent::Connected { peripheral },
                BluetoothEvent::Disconnected,
            ]
        );
    }

    #[test]
    fn test_resolve_returns_same_instance() {
        let observer: Arc<dyn BluetoothEventsObserver> = Arc::new(Inert);
        let handle = WeakObserver::new(&observer);

        let resolved = handle.resolve().expect("observer is alive");
        assert!(std::ptr::addr_eq(
            Arc::as_ptr(&resolved),
            Arc::as_ptr(&observer)
        ));
        assert!(handle.refers_to(&observer));
        assert!(handle.is_alive());
    }

    #[test]
    fn test_handle_does_not_extend_lifetime() {
        let observer: Arc<dyn BluetoothEventsObserver> = Arc::new(Inert);
        let handle = WeakObserver::new(&observer);
        let copy = handle.clone();
        assert_eq!(Arc::strong_count(&observer), 1);

        drop(observer);
        assert!(handle.resolve().is_none());
        assert!(copy.resolve().is_none());
        assert!(!handle.is_alive());
    }

    #[test]
    fn test_absent_handle_never_resurrects() {
        let observer: Arc<dyn BluetoothEventsObserver> = Arc::new(Inert);
        let handle = WeakObserver::new(&observer);
        drop(observer);

        let replacement: Arc<dyn BluetoothEventsObserver> = Arc::new(Inert);
        for _ in 0..3 {
            assert!(handle.resolve().is_none());
        }
        assert!(!handle.refers_to(&replacement));
    }

    #[test]
    fn test_refers_to_distinguishes_instances() {
        let a: Arc<dyn BluetoothEventsObserver> = Arc::new(Inert);
        let b: Arc<dyn BluetoothEventsObserver> = Arc::new(Inert);
        let handle = WeakObserver::new(&a);
        assert!(handle.refers_to(&a));
        assert!(!handle.refers_to(&b));
    }

    #[test]
    fn test_event_delivery_calls_matching_callback() {
        let recorder = RecordingObserver::new();
        let peripheral = PeripheralIdentifier::new("6E400001", Some("Strap".to_string()));

        BluetoothEvent::Availability { available: true }.deliver_to(&recorder);
        BluetoothEvent::Connected {
            peripheral: peripheral.clone(),
        }
        .deliver_to(&recorder);
        BluetoothEvent::Disconnected.deliver_to(&recorder);

        assert_eq!(
            recorder.events(),
            vec![
                BluetoothEvent::Availability { available: true },
                BluetoothEvent::Connected { peripheral },
                BluetoothEvent::Disconnected,
            ]
        );
    }
}
