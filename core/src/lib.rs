//! Bluetooth lifecycle notifications with non-owning observer registration.
//!
//! Implement [`BluetoothEventsObserver`] for the callbacks you need and
//! register with an [`EventHub`]. The hub keeps only [`WeakObserver`] handles,
//! so a subscription never keeps an observer alive.
//!
//! ```
//! use std::sync::Arc;
//! use bluejay_events::{BluetoothEventsObserver, EventHub};
//!
//! struct StatusBar;
//!
//! impl BluetoothEventsObserver for StatusBar {
//!     fn bluetooth_available(&self, available: bool) {
//!         println!("bluetooth {}", if available { "on" } else { "off" });
//!     }
//! }
//!
//! let hub = EventHub::default();
//! let status: Arc<dyn BluetoothEventsObserver> = Arc::new(StatusBar);
//! let handle = hub.subscribe(&status);
//! hub.set_bluetooth_available(true);
//!
//! drop(status);
//! assert!(handle.resolve().is_none());
//! ```

pub mod error;
pub mod hub;
pub mod observer;
pub mod observer_mock;
pub mod peripheral;
pub mod settings;

uniffi::include_scaffolding!("bluejay");

pub use error::HubError;
pub use hub::{EventHub, ObserverSubscription};
pub use observer::{BluetoothEvent, BluetoothEventsObserver, WeakObserver};
pub use peripheral::PeripheralIdentifier;
pub use settings::{HubSettings, PrunePolicy};
