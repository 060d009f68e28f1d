//! Connection state and the observer registry that reports on it.
//!
//! [`EventHub`] tracks adapter availability and the connected peripheral, and
//! notifies every live registered observer on each transition. Registration
//! is weak: see [`crate::observer::WeakObserver`].
//!
//! Callbacks never run under the registry lock. Transitions are appended to a
//! FIFO and the first caller to find the queue idle delivers until it is empty,
//! so observers see events in transition order and may call back into the hub.
//! A caller on another thread blocks until its own events have been delivered;
//! a call from inside a callback only queues them.
//! A panicking observer does not stop delivery to the others; the panic is
//! resumed on the delivering thread once the queue is empty.

use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use tracing::{debug, trace, warn};

use crate::error::HubError;
use crate::observer::{BluetoothEvent, BluetoothEventsObserver, WeakObserver};
use crate::peripheral::PeripheralIdentifier;
use crate::settings::{HubSettings, PrunePolicy};

type PanicPayload = Box<dyn Any + Send>;

struct Delivery {
    seq: u64,
    targets: Vec<WeakObserver>,
    event: BluetoothEvent,
}

impl Delivery {
    /// Calls every live target, including the ones after a panicking observer.
    /// Returns the first panic caught.
    fn run(&self) -> Option<PanicPayload> {
        let mut first_panic = None;
        for target in &self.targets {
            let Some(observer) = target.resolve() else {
                trace!(event = ?self.event, "skipping deallocated observer");
                continue;
            };
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| self.event.deliver_to(&*observer)));
            if let Err(payload) = outcome {
                warn!(event = ?self.event, "observer panicked during dispatch");
                first_panic.get_or_insert(payload);
            }
        }
        first_panic
    }
}

/// How the caller of a state change gets its queued events delivered.
enum Dispatch {
    /// The queue was idle; the caller delivers.
    Drain,
    /// Another thread is delivering; the caller waits for this sequence.
    Wait(u64),
    /// The caller is inside a callback on the delivering thread.
    Queued,
}

#[derive(Default)]
struct HubState {
    available: bool,
    connected: Option<PeripheralIdentifier>,
    observers: Vec<WeakObserver>,
    pending: VecDeque<Delivery>,
    last_queued: u64,
    last_delivered: u64,
    drainer: Option<ThreadId>,
}

impl HubState {
    fn prune(&mut self) -> usize {
        let before = self.observers.len();
        self.observers.retain(WeakObserver::is_alive);
        before - self.observers.len()
    }

    fn enqueue(&mut self, targets: Vec<WeakObserver>, event: BluetoothEvent) {
        self.last_queued += 1;
        self.pending.push_back(Delivery {
            seq: self.last_queued,
            targets,
            event,
        });
    }

    fn broadcast(&mut self, prune_policy: PrunePolicy, event: BluetoothEvent) {
        if prune_policy == PrunePolicy::OnDispatch {
            let removed = self.prune();
            if removed > 0 {
                debug!(removed, "pruned deallocated observers");
            }
        }
        let targets = self
            .observers
            .iter()
            .filter(|handle| handle.is_alive())
            .cloned()
            .collect();
        self.enqueue(targets, event);
    }

    fn claim_drain(&mut self) -> bool {
        if self.drainer.is_some() {
            false
        } else {
            self.drainer = Some(thread::current().id());
            true
        }
    }

    fn dispatch_mode(&mut self) -> Dispatch {
        if self.claim_drain() {
            Dispatch::Drain
        } else if self.drainer == Some(thread::current().id()) {
            Dispatch::Queued
        } else {
            Dispatch::Wait(self.last_queued)
        }
    }
}

pub struct EventHub {
    settings: HubSettings,
    state: Mutex<HubState>,
    delivered: Condvar,
}

impl EventHub {
    pub fn new(settings: HubSettings) -> Self {
        Self {
            settings,
            state: Mutex::new(HubState::default()),
            delivered: Condvar::new(),
        }
    }

    /// Registers `observer` without taking ownership of it and replays the
    /// current state: `bluetooth_available` first, then `connected` if a
    /// peripheral is connected.
    ///
    /// The replay has been delivered when this returns. If another thread is
    /// dispatching, this blocks until that thread has delivered the replay.
    /// The exception is a call made from inside an observer callback: there
    /// the replay is queued behind the in-flight events and delivered once
    /// the callback returns.
    /// Subscribing an already registered observer returns its existing handle
    /// and replays nothing.
    pub fn subscribe(&self, observer: &Arc<dyn BluetoothEventsObserver>) -> WeakObserver {
        let (handle, dispatch) = {
            let mut state = self.lock();
            if let Some(existing) = state.observers.iter().find(|h| h.refers_to(observer)) {
                trace!("observer already subscribed");
                return existing.clone();
            }

            let handle = WeakObserver::new(observer);
            state.observers.push(handle.clone());

            let available = state.available;
            state.enqueue(
                vec![handle.clone()],
                BluetoothEvent::Availability { available },
            );
            if let Some(peripheral) = state.connected.clone() {
                state.enqueue(
                    vec![handle.clone()],
                    BluetoothEvent::Connected { peripheral },
                );
            }

            debug!(
                observers = state.observers.len(),
                available, "observer subscribed"
            );
            (handle, state.dispatch_mode())
        };

        self.dispatch(dispatch);
        handle
    }

    /// Subscribes and returns a token that owns `observer`.
    ///
    /// For callers across the FFI boundary, whose objects exist on the Rust
    /// side only as the `Arc` passed in. The registry still holds a weak
    /// handle; cancelling or dropping the token ends delivery.
    pub fn subscribe_retained(
        &self,
        observer: Arc<dyn BluetoothEventsObserver>,
    ) -> Arc<ObserverSubscription> {
        self.subscribe(&observer);
        Arc::new(ObserverSubscription {
            observer: Mutex::new(Some(observer)),
        })
    }

    /// Removes `observer` from the registry, including from deliveries that
    /// are queued but not yet run. Returns false if it was not registered.
    pub fn unsubscribe(&self, observer: &Arc<dyn BluetoothEventsObserver>) -> bool {
        let mut state = self.lock();
        let before = state.observers.len();
        state.observers.retain(|h| !h.refers_to(observer));
        for delivery in state.pending.iter_mut() {
            delivery.targets.retain(|h| !h.refers_to(observer));
        }
        let removed = state.observers.len() < before;
        if removed {
            debug!(observers = state.observers.len(), "observer unsubscribed");
        }
        removed
    }

    /// Records an availability change. Returns false, and notifies nobody,
    /// if the value is unchanged.
    ///
    /// Losing the adapter while connected also drops the connection:
    /// observers see `bluetooth_available(false)` followed by `disconnected()`.
    pub fn set_bluetooth_available(&self, available: bool) -> bool {
        let dispatch = {
            let mut state = self.lock();
            if state.available == available {
                return false;
            }
            state.available = available;
            debug!(available, "bluetooth availability changed");
            state.broadcast(
                self.settings.prune_policy,
                BluetoothEvent::Availability { available },
            );

            if !available {
                if let Some(peripheral) = state.connected.take() {
                    debug!(peripheral = %peripheral, "connection lost with adapter");
                    state.broadcast(self.settings.prune_policy, BluetoothEvent::Disconnected);
                }
            }
            state.dispatch_mode()
        };

        self.dispatch(dispatch);
        true
    }

    pub fn peripheral_connected(&self, peripheral: PeripheralIdentifier) -> Result<(), HubError> {
        let dispatch = {
            let mut state = self.lock();
            if !state.available {
                warn!(peripheral = %peripheral, "connect reported while bluetooth is unavailable");
                return Err(HubError::BluetoothUnavailable);
            }
            if let Some(current) = &state.connected {
                warn!(current = %current, peripheral = %peripheral, "connect reported while connected");
                return Err(HubError::AlreadyConnected {
                    uuid: current.uuid.clone(),
                });
            }

            debug!(peripheral = %peripheral, "peripheral connected");
            state.connected = Some(peripheral.clone());
            state.broadcast(
                self.settings.prune_policy,
                BluetoothEvent::Connected { peripheral },
            );
            state.dispatch_mode()
        };

        self.dispatch(dispatch);
        Ok(())
    }

    /// Clears the connection and returns the peripheral that was connected.
    pub fn peripheral_disconnected(&self) -> Result<PeripheralIdentifier, HubError> {
        let (peripheral, dispatch) = {
            let mut state = self.lock();
            let peripheral = state.connected.take().ok_or(HubError::NotConnected)?;
            debug!(peripheral = %peripheral, "peripheral disconnected");
            state.broadcast(self.settings.prune_policy, BluetoothEvent::Disconnected);
            (peripheral, state.dispatch_mode())
        };

        self.dispatch(dispatch);
        Ok(peripheral)
    }

    pub fn is_bluetooth_available(&self) -> bool {
        self.lock().available
    }

    pub fn connected_peripheral(&self) -> Option<PeripheralIdentifier> {
        self.lock().connected.clone()
    }

    /// Registered handles, including ones whose observer is gone but which
    /// have not been pruned yet.
    pub fn observer_count(&self) -> usize {
        self.lock().observers.len()
    }

    pub fn live_observer_count(&self) -> usize {
        self.lock()
            .observers
            .iter()
            .filter(|handle| handle.is_alive())
            .count()
    }

    /// Drops handles whose observer has been deallocated.
    pub fn prune(&self) -> usize {
        let removed = self.lock().prune();
        if removed > 0 {
            debug!(removed, "pruned deallocated observers");
        }
        removed
    }

    fn lock(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch(&self, dispatch: Dispatch) {
        match dispatch {
            Dispatch::Drain => self.drain(),
            Dispatch::Wait(seq) => self.wait_delivered(seq),
            Dispatch::Queued => {}
        }
    }

    fn wait_delivered(&self, seq: u64) {
        let mut state = self.lock();
        while state.last_delivered < seq {
            state = self
                .delivered
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn drain(&self) {
        let mut first_panic = None;
        let mut finished = None;
        loop {
            let next = {
                let mut state = self.lock();
                if let Some(seq) = finished.take() {
                    state.last_delivered = seq;
                    self.delivered.notify_all();
                }
                let next = state.pending.pop_front();
                if next.is_none() {
                    state.drainer = None;
                }
                next
            };
            let Some(delivery) = next else {
                break;
            };
            if let Some(payload) = delivery.run() {
                first_panic.get_or_insert(payload);
            }
            finished = Some(delivery.seq);
        }

        if let Some(payload) = first_panic {
            panic::resume_unwind(payload);
        }
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(HubSettings::default())
    }
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("EventHub")
            .field("settings", &self.settings)
            .field("available", &state.available)
            .field("connected", &state.connected)
            .field("observers", &state.observers.len())
            .finish()
    }
}

/// Keeps a foreign observer alive for as long as the token is held.
pub struct ObserverSubscription {
    observer: Mutex<Option<Arc<dyn BluetoothEventsObserver>>>,
}

impl ObserverSubscription {
    /// Releases the observer. The hub skips it from the next dispatch on.
    pub fn cancel(&self) {
        let released = self
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if released.is_some() {
            debug!("observer subscription cancelled");
        }
    }

    pub fn is_active(&self) -> bool {
        self.observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl fmt::Debug for ObserverSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObserverSubscription")
            .field("active", &self.is_active())
            .finish()
    }
}
