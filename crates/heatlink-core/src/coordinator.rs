// ── Refresh coordinator ──
//
// Owns the refresh cadence and guarantees at most one in-flight fetch
// cycle regardless of how many callers ask. Overlapping requests attach
// to the in-flight cycle's outcome instead of issuing duplicate network
// traffic (the service is rate-limited). A cycle is all-or-nothing: any
// fetch error leaves every device's state untouched.
//
// Scheduling is an explicit loop with a cancellation token rather than a
// timer callback, so shutdown and single-flight deduplication are
// first-class. Cadence is measured from cycle end — a slow fetch can
// never overlap the next tick.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use futures_util::future::join_all;
use tokio::sync::{Mutex, broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use heatlink_api::{CloudTransport, ListedDevice, RawState};

use crate::command::{Command, CommandKey, CommandQueue, CommandReceipt};
use crate::config::CoordinatorConfig;
use crate::error::CoreError;
use crate::model::{
    Availability, ControlState, Device, DeviceFamily, DeviceId, Field, SettingValue, VanePosition,
    ZoneId,
};
use crate::store::DeviceStore;
use crate::subscription::{Subscriber, SubscriptionHub, SubscriptionId};

/// The result of one fetch cycle: every listed device paired with its
/// raw state payload. Immutable once produced; superseded wholesale by
/// the next cycle's snapshot.
pub struct RefreshSnapshot {
    pub entries: Vec<(ListedDevice, RawState)>,
    pub fetched_at: Instant,
}

// ── Coordinator ─────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<Inner>`. Drives periodic fetches, merges
/// snapshots with pending commands, and fans out change notifications.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

struct Inner {
    config: CoordinatorConfig,
    transport: Arc<dyn CloudTransport>,
    store: DeviceStore,
    hub: SubscriptionHub,
    queue: CommandQueue,
    cancel: CancellationToken,
    /// Single-flight slot: present while a fetch cycle is in flight.
    /// Joiners subscribe and share the cycle's outcome.
    in_flight: Mutex<Option<broadcast::Sender<Result<(), CoreError>>>>,
    /// When the last cycle succeeded. Initialized to construction time
    /// so the staleness clock starts with the coordinator.
    last_success: StdMutex<Instant>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Coordinator {
    /// Create a coordinator. Does NOT fetch or schedule anything — call
    /// [`start()`](Self::start) for the initial refresh and the periodic
    /// loop, or drive [`request_refresh()`](Self::request_refresh)
    /// manually.
    pub fn new(config: CoordinatorConfig, transport: Arc<dyn CloudTransport>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                store: DeviceStore::new(),
                hub: SubscriptionHub::new(),
                queue: CommandQueue::new(),
                cancel: CancellationToken::new(),
                in_flight: Mutex::new(None),
                last_success: StdMutex::new(Instant::now()),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Perform the initial refresh and spawn the periodic loop.
    ///
    /// The initial refresh error (notably `AuthFailed`) propagates to
    /// the caller so setup problems surface immediately; once started,
    /// periodic failures are retried with backoff and only ever reflect
    /// as staleness.
    pub async fn start(&self) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::Shutdown);
        }

        self.request_refresh().await?;

        let coordinator = self.clone();
        let cancel = self.inner.cancel.clone();
        let handle = tokio::spawn(periodic_refresh_task(coordinator, cancel));
        self.inner.task_handles.lock().await.push(handle);

        info!(
            devices = self.inner.store.len(),
            interval_secs = self.inner.config.refresh_interval().as_secs(),
            "coordinator started"
        );
        Ok(())
    }

    /// Tear down: cancel the in-flight cycle and pending writes, stop
    /// the scheduler, and fail outstanding receipts. Further
    /// `request_refresh`/`enqueue` calls return
    /// [`CoreError::Shutdown`].
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        self.inner.queue.shutdown();
        info!("coordinator shut down");
    }

    // ── Refresh ──────────────────────────────────────────────────────

    /// Refresh every device from the cloud, deduplicating concurrent
    /// callers onto a single fetch cycle.
    ///
    /// If a cycle is already in flight the caller attaches to its
    /// completion; otherwise a new cycle starts. Every attached caller
    /// receives the same outcome — including `AuthFailed`, which is
    /// surfaced here rather than retried silently.
    pub async fn request_refresh(&self) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::Shutdown);
        }

        let mut rx = {
            let mut slot = self.inner.in_flight.lock().await;
            match slot.as_ref() {
                Some(tx) => tx.subscribe(),
                None => {
                    let (tx, rx) = broadcast::channel(1);
                    *slot = Some(tx.clone());

                    let coordinator = self.clone();
                    tokio::spawn(async move {
                        let result = coordinator.run_cycle().await;
                        // Clear the slot before broadcasting so a caller
                        // woken by the result can start a fresh cycle.
                        *coordinator.inner.in_flight.lock().await = None;
                        let _ = tx.send(result);
                    });
                    rx
                }
            }
        };

        rx.recv().await.map_err(|_| CoreError::Shutdown)?
    }

    /// One guarded fetch cycle: fetch, then merge. Cancellation abandons
    /// the in-flight transport calls; the merge itself is synchronous,
    /// so a cancelled cycle never applies a partial snapshot.
    async fn run_cycle(&self) -> Result<(), CoreError> {
        let cancel = self.inner.cancel.clone();
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(CoreError::Shutdown),
            snapshot = self.fetch_snapshot() => snapshot.map(|s| self.apply_snapshot(s)),
        };

        match &result {
            Ok(()) => {
                *self
                    .inner
                    .last_success
                    .lock()
                    .expect("last_success lock poisoned") = Instant::now();
                debug!(devices = self.inner.store.len(), "refresh cycle complete");
            }
            Err(CoreError::Shutdown) => {}
            Err(e) => {
                warn!(error = %e, "refresh cycle failed — keeping previous state");
                self.sweep_stale();
            }
        }
        result
    }

    /// Fetch the listing plus per-device state, concurrently. Any error
    /// fails the whole cycle — snapshots are all-or-nothing.
    async fn fetch_snapshot(&self) -> Result<RefreshSnapshot, CoreError> {
        let listed = self.inner.transport.list_devices().await?;

        let fetches = listed.into_iter().map(|device| {
            let transport = Arc::clone(&self.inner.transport);
            async move {
                let raw = transport
                    .get_state(device.device_id, device.building_id)
                    .await?;
                Ok::<_, heatlink_api::Error>((device, raw))
            }
        });

        let mut entries = Vec::new();
        for result in join_all(fetches).await {
            entries.push(result?);
        }

        Ok(RefreshSnapshot {
            entries,
            fetched_at: Instant::now(),
        })
    }

    /// Merge a snapshot into the store: normalize each payload,
    /// reconcile pending commands, recompute displayed state, and notify
    /// subscribers of devices whose state actually changed. Runs
    /// synchronously — per device, the merge is a critical section
    /// against the optimistic-apply in `enqueue`.
    fn apply_snapshot(&self, snapshot: RefreshSnapshot) {
        let mut present = Vec::with_capacity(snapshot.entries.len());

        for (listed, raw) in snapshot.entries {
            let id = DeviceId(listed.device_id);
            let Some(family) = DeviceFamily::from_code(listed.device_type) else {
                debug!(device = %id, "skipping device of unknown family");
                continue;
            };
            present.push(id);

            match self.inner.store.get(id) {
                None => {
                    let (device, report) = Device::first_seen(&listed, family, &raw);
                    debug!(device = %id, family = ?family, "device first observed");
                    if report.is_partial() {
                        debug!(device = %id, fields = ?report.missing, "partial payload on first fetch");
                    }
                    let device = self.inner.store.insert(device);
                    self.inner.hub.notify(&device);
                }
                Some(previous) => {
                    let (confirmed, report) =
                        ControlState::merge_raw(Some(&previous.confirmed), family, &raw);
                    if report.is_partial() {
                        debug!(
                            device = %id,
                            fields = ?report.missing,
                            "partial update — carrying previous values"
                        );
                    }

                    let reconciled = self.inner.queue.reconcile(
                        id,
                        &confirmed,
                        self.inner.config.command_timeout,
                    );
                    for key in &reconciled.expired {
                        warn!(
                            device = %id,
                            field = %key.field,
                            "command expired unconfirmed — optimistic value reverted"
                        );
                    }

                    let mut displayed = confirmed.clone();
                    self.inner.queue.overlay(id, &mut displayed);

                    let offline = raw.offline;
                    let last_communication = raw.last_communication.clone();
                    let updated = self.inner.store.update(id, move |device| {
                        device.confirmed = confirmed;
                        device.displayed = displayed;
                        device.availability = Availability::Live;
                        if let Some(offline) = offline {
                            device.reported_offline = offline;
                        }
                        if let Some(ts) = last_communication
                            .as_deref()
                            .and_then(crate::model::device::parse_last_communication)
                        {
                            device.last_communication = Some(ts);
                        }
                    });

                    if let Some(updated) = updated {
                        let changed = !report.changed.is_empty()
                            || updated.displayed != previous.displayed
                            || previous.availability != Availability::Live
                            || updated.reported_offline != previous.reported_offline;
                        if changed {
                            self.inner.hub.notify(&updated);
                        }
                    }
                }
            }
        }

        for device in self.inner.store.mark_missing_except(&present) {
            warn!(device = %device.id, "device disappeared from cloud listing — marked unavailable");
            self.inner.hub.notify(&device);
        }
    }

    /// Mark devices stale once the last successful fetch is older than
    /// the configured threshold. Called on cycle failure only.
    fn sweep_stale(&self) {
        let last = *self
            .inner
            .last_success
            .lock()
            .expect("last_success lock poisoned");
        if last.elapsed() < self.inner.config.stale_after {
            return;
        }
        for device in self.inner.store.mark_all_stale() {
            warn!(device = %device.id, "no successful refresh within staleness threshold — marked stale");
            self.inner.hub.notify(&device);
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Issue a write intent.
    ///
    /// The target value is applied to the device's displayed state
    /// immediately (read-your-writes), the transport write goes out, and
    /// a follow-up refresh confirms it. A newer command for the same
    /// (device, zone, field) tuple supersedes an older unconfirmed one.
    pub async fn enqueue(
        &self,
        device_id: DeviceId,
        zone: Option<ZoneId>,
        field: Field,
        value: SettingValue,
    ) -> Result<CommandReceipt, CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::Shutdown);
        }

        let device = self
            .inner
            .store
            .get(device_id)
            .ok_or(CoreError::DeviceNotFound(device_id))?;

        field.validate(&value)?;
        if !device.capabilities.supports(field) {
            return Err(CoreError::UnsupportedField {
                device: device_id,
                field,
            });
        }
        check_zone(&device, field, zone)?;

        // Build the wire write once up front so an inexpressible
        // combination fails here, not inside the writer task.
        field.wire_write(device_id, device.family, zone, &value)?;

        let key = CommandKey {
            device: device_id,
            zone,
            field,
        };
        let (receipt, spawn_writer) = self.inner.queue.insert(key, value);
        debug!(device = %device_id, field = %field, value = %value, "command enqueued");

        // Optimistic apply: the issuer (and every other reader) sees the
        // target value before the confirming fetch completes.
        if let Some(updated) = self.inner.store.update(device_id, |d| {
            d.displayed.apply(field, zone, value);
        }) {
            self.inner.hub.notify(&updated);
        }

        if spawn_writer {
            let coordinator = self.clone();
            let handle = tokio::spawn(async move { coordinator.write_task(key).await });
            let mut handles = self.inner.task_handles.lock().await;
            handles.retain(|h| !h.is_finished());
            handles.push(handle);
        }

        Ok(receipt)
    }

    /// Writer loop for one (device, zone, field) tuple. Writes are
    /// serialized: a supersession while a write is out only replaces the
    /// target, and the newest target is written once the in-flight call
    /// returns. The confirming refresh fires after the burst settles.
    async fn write_task(&self, key: CommandKey) {
        let Some(device) = self.inner.store.get(key.device) else {
            return;
        };
        let cancel = self.inner.cancel.clone();

        loop {
            let Some(target) = self.inner.queue.begin_write(&key) else {
                break;
            };
            let write = match key.field.wire_write(key.device, device.family, key.zone, &target) {
                Ok(write) => write,
                Err(e) => {
                    warn!(device = %key.device, field = %key.field, error = %e, "unwritable command target");
                    self.inner.queue.finish_write(&key);
                    break;
                }
            };

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return,
                res = self
                    .inner
                    .transport
                    .set_state(key.device.0, device.building.0, &write) => res,
            };
            if let Err(e) = result {
                warn!(
                    device = %key.device,
                    field = %key.field,
                    error = %e,
                    "write failed — leaving command to the confirmation timeout"
                );
            }

            if self.inner.queue.finish_write(&key) {
                // Superseded mid-flight: issue the newer target first,
                // confirm the whole burst with one refresh at the end.
                continue;
            }
            let _ = self.request_refresh().await;
            break;
        }
    }

    // ── Out-of-band vane commands ────────────────────────────────────

    /// Fire-and-forget horizontal vane positioning for ATA devices.
    /// A thin alias over [`enqueue`](Self::enqueue) — no extra logic.
    pub async fn set_vane_horizontal(
        &self,
        device: DeviceId,
        position: VanePosition,
    ) -> Result<CommandReceipt, CoreError> {
        self.enqueue(
            device,
            None,
            Field::VaneHorizontal,
            SettingValue::Vane(position),
        )
        .await
    }

    /// Fire-and-forget vertical vane positioning for ATA devices.
    pub async fn set_vane_vertical(
        &self,
        device: DeviceId,
        position: VanePosition,
    ) -> Result<CommandReceipt, CoreError> {
        self.enqueue(
            device,
            None,
            Field::VaneVertical,
            SettingValue::Vane(position),
        )
        .await
    }

    // ── Consumer surface ─────────────────────────────────────────────

    /// Look up one device.
    pub fn device(&self, id: DeviceId) -> Option<Arc<Device>> {
        self.inner.store.get(id)
    }

    /// Current snapshot of every known device, ordered by id.
    pub fn devices(&self) -> Arc<Vec<Arc<Device>>> {
        self.inner.store.snapshot()
    }

    /// Subscribe to the full-store snapshot stream (bulk consumers).
    pub fn watch_devices(&self) -> watch::Receiver<Arc<Vec<Arc<Device>>>> {
        self.inner.store.subscribe()
    }

    /// Register a per-device change callback.
    pub fn subscribe(&self, device: DeviceId, subscriber: Subscriber) -> SubscriptionId {
        self.inner.hub.subscribe(device, subscriber)
    }

    /// Remove a registration; unknown ids are a no-op.
    pub fn unsubscribe(&self, device: DeviceId, id: SubscriptionId) {
        self.inner.hub.unsubscribe(device, id)
    }

    /// Commands still awaiting cloud confirmation.
    pub fn pending_commands(&self) -> Vec<Command> {
        self.inner.queue.pending()
    }
}

/// A zone is required exactly when writing the per-zone ATW setpoint,
/// and it must name one of the device's known zones.
fn check_zone(device: &Device, field: Field, zone: Option<ZoneId>) -> Result<(), CoreError> {
    let zone_scoped = device.family == DeviceFamily::Atw && field == Field::TargetTemperature;
    match zone {
        Some(z) => {
            let in_range = z.0 >= 1 && z.0 <= device.capabilities.zone_count;
            if zone_scoped && in_range {
                Ok(())
            } else {
                Err(CoreError::UnsupportedField {
                    device: device.id,
                    field,
                })
            }
        }
        None if zone_scoped => Err(CoreError::UnsupportedField {
            device: device.id,
            field,
        }),
        None => Ok(()),
    }
}

// ── Background tasks ────────────────────────────────────────────────

/// Periodic refresh loop. The delay restarts after each completed cycle
/// (cadence from cycle end), doubling up to the backoff ceiling while
/// cycles fail and resetting to the configured interval after a success.
async fn periodic_refresh_task(coordinator: Coordinator, cancel: CancellationToken) {
    let base = coordinator.inner.config.refresh_interval();
    let ceiling = coordinator.inner.config.backoff_ceiling;
    let mut delay = base;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = sleep(delay) => {}
        }

        match coordinator.request_refresh().await {
            Ok(()) => delay = base,
            Err(CoreError::Shutdown) => break,
            Err(e) => {
                let next = (delay * 2).min(ceiling);
                warn!(
                    error = %e,
                    retry_in_secs = next.as_secs(),
                    "periodic refresh failed — backing off"
                );
                delay = next;
            }
        }
    }
}
