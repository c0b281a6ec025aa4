// ── Subscription hub ──
//
// Per-device registry of consumer callbacks. Decouples the coordinator
// from consumer implementation details: delivery failures are isolated
// and logged, never propagated into the refresh cycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::warn;

use crate::model::{Device, DeviceId};

/// Error type consumer callbacks may return; it is logged and otherwise
/// ignored.
pub type SubscriberError = Box<dyn std::error::Error + Send + Sync>;

/// A change-notification callback. Receives the device after its update
/// was published, so reading through it observes the new state.
pub type Subscriber = Arc<dyn Fn(&Device) -> Result<(), SubscriberError> + Send + Sync>;

/// Handle identifying one registration, for `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Registry of interested consumers per device.
pub struct SubscriptionHub {
    subscribers: DashMap<DeviceId, Vec<(SubscriptionId, Subscriber)>>,
    next_id: AtomicU64,
}

impl SubscriptionHub {
    pub(crate) fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a callback for one device. The same consumer may
    /// subscribe to multiple devices; each registration gets its own id.
    pub fn subscribe(&self, device: DeviceId, subscriber: Subscriber) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers
            .entry(device)
            .or_default()
            .push((id, subscriber));
        id
    }

    /// Remove a registration. Unknown ids are a no-op, not an error.
    pub fn unsubscribe(&self, device: DeviceId, id: SubscriptionId) {
        if let Some(mut entry) = self.subscribers.get_mut(&device) {
            entry.retain(|(sub_id, _)| *sub_id != id);
        }
    }

    /// Invoke every callback registered for this device. A failing
    /// callback is reported and skipped; the rest still run. Callback
    /// order is unspecified.
    pub(crate) fn notify(&self, device: &Device) {
        let callbacks: Vec<(SubscriptionId, Subscriber)> = match self.subscribers.get(&device.id) {
            Some(entry) => entry.value().clone(),
            None => return,
        };

        for (id, callback) in callbacks {
            if let Err(e) = callback(device) {
                warn!(device = %device.id, subscription = ?id, error = %e, "subscriber callback failed");
            }
        }
    }

    #[cfg(test)]
    fn subscriber_count(&self, device: DeviceId) -> usize {
        self.subscribers.get(&device).map_or(0, |e| e.len())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{ControlState, DeviceFamily};
    use heatlink_api::{DeviceTypeCode, ListedDevice, RawState};
    use std::sync::atomic::AtomicUsize;

    fn device() -> Device {
        let listed = ListedDevice {
            device_id: 1,
            building_id: 1,
            name: None,
            device_type: DeviceTypeCode::AirToAir,
            mac: None,
            serial: None,
            unit_models: Vec::new(),
        };
        Device::first_seen(&listed, DeviceFamily::Ata, &RawState::default()).0
    }

    #[test]
    fn notify_reaches_all_subscribers() {
        let hub = SubscriptionHub::new();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count = Arc::clone(&count);
            hub.subscribe(
                DeviceId(1),
                Arc::new(move |_| {
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            );
        }

        hub.notify(&device());
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn failing_callback_does_not_block_others() {
        let hub = SubscriptionHub::new();
        let count = Arc::new(AtomicUsize::new(0));

        hub.subscribe(DeviceId(1), Arc::new(|_| Err("consumer broke".into())));
        {
            let count = Arc::clone(&count);
            hub.subscribe(
                DeviceId(1),
                Arc::new(move |_| {
                    count.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            );
        }

        hub.notify(&device());
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_is_idempotent() {
        let hub = SubscriptionHub::new();
        let id = hub.subscribe(DeviceId(1), Arc::new(|_| Ok(())));
        assert_eq!(hub.subscriber_count(DeviceId(1)), 1);

        hub.unsubscribe(DeviceId(1), id);
        assert_eq!(hub.subscriber_count(DeviceId(1)), 0);

        // Unknown registration: no-op, no panic.
        hub.unsubscribe(DeviceId(1), id);
        hub.unsubscribe(DeviceId(99), id);
    }

    #[test]
    fn notify_without_subscribers_is_a_no_op() {
        let hub = SubscriptionHub::new();
        hub.notify(&device());
    }

    #[test]
    fn device_gets_state_of_notification_time() {
        let hub = SubscriptionHub::new();
        let seen = Arc::new(AtomicUsize::new(0));
        {
            let seen = Arc::clone(&seen);
            hub.subscribe(
                DeviceId(1),
                Arc::new(move |d| {
                    if let ControlState::Ata(s) = &d.displayed {
                        if s.power == Some(true) {
                            seen.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                    Ok(())
                }),
            );
        }

        let mut d = device();
        if let ControlState::Ata(s) = &mut d.displayed {
            s.power = Some(true);
        }
        hub.notify(&d);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
