use std::sync::{Mutex, PoisonError};

use crate::observer::{BluetoothEvent, BluetoothEventsObserver};
use crate::peripheral::PeripheralIdentifier;

/// Observer that overrides every callback and keeps what it saw, in order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<BluetoothEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BluetoothEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    fn record(&self, event: BluetoothEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl BluetoothEventsObserver for RecordingObserver {
    fn bluetooth_available(&self, available: bool) {
        self.record(BluetoothEvent::Availability { available });
    }

    fn connected(&self, peripheral: PeripheralIdentifier) {
        self.record(BluetoothEvent::Connected { peripheral });
    }

    fn disconnected(&self) {
        self.record(BluetoothEvent::Disconnected);
    }
}

/// Observer that only cares about adapter availability.
#[derive(Debug, Default)]
pub struct AvailabilityOnlyObserver {
    seen: Mutex<Vec<bool>>,
}

impl AvailabilityOnlyObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self) -> Vec<bool> {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl BluetoothEventsObserver for AvailabilityOnlyObserver {
    fn bluetooth_available(&self, available: bool) {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(available);
    }
}

/// Observer that follows the connection but ignores adapter availability.
#[derive(Debug, Default)]
pub struct ConnectionOnlyObserver {
    events: Mutex<Vec<BluetoothEvent>>,
}

impl ConnectionOnlyObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<BluetoothEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl BluetoothEventsObserver for ConnectionOnlyObserver {
    fn connected(&self, peripheral: PeripheralIdentifier) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(BluetoothEvent::Connected { peripheral });
    }

    fn disconnected(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(BluetoothEvent::Disconnected);
    }
}
