// ── Reactive device storage ──
//
// Concurrent storage with O(1) lookups and push-based change
// notification via a `watch` snapshot channel. Per-entry mutation goes
// through `update()`, which holds the map entry exclusively for the
// duration of the closure — this is the per-device critical section the
// coordinator's merge step and the optimistic-apply step both rely on.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::watch;

use crate::model::{Availability, Device, DeviceId};

/// Concurrent, reactive collection of devices.
///
/// Devices are created when first observed in a snapshot and never
/// removed; a device that stops appearing is marked
/// [`Missing`](Availability::Missing) instead, so consumers already
/// bound to it never dangle.
pub struct DeviceStore {
    devices: DashMap<DeviceId, Arc<Device>>,

    /// Version counter, bumped on every mutation.
    version: watch::Sender<u64>,

    /// Full snapshot, rebuilt on mutation, ordered by device id.
    snapshot: watch::Sender<Arc<Vec<Arc<Device>>>>,
}

impl DeviceStore {
    pub(crate) fn new() -> Self {
        let (version, _) = watch::channel(0u64);
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            devices: DashMap::new(),
            version,
            snapshot,
        }
    }

    /// Look up one device.
    pub fn get(&self, id: DeviceId) -> Option<Arc<Device>> {
        self.devices.get(&id).map(|r| Arc::clone(r.value()))
    }

    /// Insert a newly observed device.
    pub(crate) fn insert(&self, device: Device) -> Arc<Device> {
        let id = device.id;
        let device = Arc::new(device);
        self.devices.insert(id, Arc::clone(&device));
        self.publish();
        device
    }

    /// Mutate one device under its entry lock. Returns the updated
    /// device, or `None` if it doesn't exist.
    pub(crate) fn update(
        &self,
        id: DeviceId,
        mutate: impl FnOnce(&mut Device),
    ) -> Option<Arc<Device>> {
        let updated = {
            let mut entry = self.devices.get_mut(&id)?;
            let device = Arc::make_mut(entry.value_mut());
            mutate(device);
            Arc::clone(entry.value())
        };
        self.publish();
        Some(updated)
    }

    /// Current snapshot (cheap `Arc` clone), ordered by device id.
    pub fn snapshot(&self) -> Arc<Vec<Arc<Device>>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot changes.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Vec<Arc<Device>>>> {
        self.snapshot.subscribe()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn ids(&self) -> Vec<DeviceId> {
        self.devices.iter().map(|r| *r.key()).collect()
    }

    /// Mark every live device stale. Returns the devices whose
    /// availability actually changed.
    pub(crate) fn mark_all_stale(&self) -> Vec<Arc<Device>> {
        let mut changed = Vec::new();
        for mut entry in self.devices.iter_mut() {
            if Arc::as_ref(entry.value()).availability == Availability::Live {
                let device = Arc::make_mut(entry.value_mut());
                device.availability = Availability::Stale;
                changed.push(Arc::clone(entry.value()));
            }
        }
        if !changed.is_empty() {
            self.publish();
        }
        changed
    }

    /// Mark devices absent from the latest snapshot as missing.
    /// Returns the devices whose availability actually changed.
    pub(crate) fn mark_missing_except(&self, present: &[DeviceId]) -> Vec<Arc<Device>> {
        let mut changed = Vec::new();
        for mut entry in self.devices.iter_mut() {
            if present.contains(entry.key()) {
                continue;
            }
            if Arc::as_ref(entry.value()).availability != Availability::Missing {
                let device = Arc::make_mut(entry.value_mut());
                device.availability = Availability::Missing;
                changed.push(Arc::clone(entry.value()));
            }
        }
        if !changed.is_empty() {
            self.publish();
        }
        changed
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Rebuild the snapshot and bump the version.
    fn publish(&self) {
        let mut values: Vec<Arc<Device>> =
            self.devices.iter().map(|r| Arc::clone(r.value())).collect();
        values.sort_by_key(|d| d.id);
        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
        self.version.send_modify(|v| *v += 1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{ControlState, DeviceFamily};
    use heatlink_api::{DeviceTypeCode, ListedDevice, RawState};

    fn device(id: u32) -> Device {
        let listed = ListedDevice {
            device_id: id,
            building_id: 1,
            name: Some(format!("dev-{id}")),
            device_type: DeviceTypeCode::AirToAir,
            mac: None,
            serial: None,
            unit_models: Vec::new(),
        };
        let raw = RawState {
            power: Some(false),
            set_temperature: Some(20.0),
            ..RawState::default()
        };
        Device::first_seen(&listed, DeviceFamily::Ata, &raw).0
    }

    #[test]
    fn insert_and_get() {
        let store = DeviceStore::new();
        store.insert(device(1));
        assert_eq!(store.get(DeviceId(1)).unwrap().id, DeviceId(1));
        assert!(store.get(DeviceId(2)).is_none());
    }

    #[test]
    fn snapshot_is_ordered_by_id() {
        let store = DeviceStore::new();
        store.insert(device(3));
        store.insert(device(1));
        store.insert(device(2));
        let snap = store.snapshot();
        let ids: Vec<DeviceId> = snap.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![DeviceId(1), DeviceId(2), DeviceId(3)]);
    }

    #[test]
    fn update_replaces_atomically() {
        let store = DeviceStore::new();
        store.insert(device(1));
        let before = store.get(DeviceId(1)).unwrap();

        store.update(DeviceId(1), |d| {
            if let ControlState::Ata(s) = &mut d.displayed {
                s.target_temperature = Some(22.0);
            }
        });

        // The pre-update Arc still holds the old value; readers never
        // see a half-written device.
        if let ControlState::Ata(s) = &before.displayed {
            assert_eq!(s.target_temperature, Some(20.0));
        }
        if let ControlState::Ata(s) = &store.get(DeviceId(1)).unwrap().displayed {
            assert_eq!(s.target_temperature, Some(22.0));
        }
    }

    #[test]
    fn mark_all_stale_reports_only_transitions() {
        let store = DeviceStore::new();
        store.insert(device(1));
        store.insert(device(2));

        assert_eq!(store.mark_all_stale().len(), 2);
        // Second sweep: already stale, nothing to report.
        assert!(store.mark_all_stale().is_empty());
    }

    #[test]
    fn missing_devices_are_marked_not_deleted() {
        let store = DeviceStore::new();
        store.insert(device(1));
        store.insert(device(2));

        let changed = store.mark_missing_except(&[DeviceId(1)]);
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].id, DeviceId(2));
        assert_eq!(store.len(), 2);
        assert_eq!(
            store.get(DeviceId(2)).unwrap().availability,
            Availability::Missing
        );
    }
}
