// ── Pending-write buffer ──
//
// Tracks user-issued intents not yet confirmed by the cloud. At most one
// pending command exists per (device, zone, field) tuple: a newer command
// supersedes an older unconfirmed one. Per tuple, at most one transport
// write is in flight at a time — supersession while a write is out only
// replaces the stored target; the writer re-issues after the in-flight
// call returns. This keeps writes for the same tuple ordered at the
// service.

use dashmap::DashMap;
use tokio::sync::oneshot;
use tokio::time::{Duration, Instant};

use crate::error::CoreError;
use crate::model::{ControlState, DeviceId, Field, SettingValue, ZoneId};

// ── Public command types ────────────────────────────────────────────

/// Key of a pending write: one command may exist per tuple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandKey {
    pub device: DeviceId,
    pub zone: Option<ZoneId>,
    pub field: Field,
}

/// A pending write as visible to consumers.
#[derive(Debug, Clone)]
pub struct Command {
    pub device: DeviceId,
    pub zone: Option<ZoneId>,
    pub field: Field,
    pub value: SettingValue,
    pub issued_at: Instant,
}

/// Terminal state of a command that didn't time out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// A fetched snapshot carried the commanded value.
    Confirmed,
    /// A newer command for the same tuple replaced this one.
    Superseded,
}

/// Handle returned by `enqueue` — await it to learn the command's fate.
///
/// Dropping the receipt is fine; the command proceeds regardless.
#[derive(Debug)]
pub struct CommandReceipt {
    rx: oneshot::Receiver<Result<CommandOutcome, CoreError>>,
}

impl CommandReceipt {
    /// Wait for confirmation, supersession, or expiry.
    ///
    /// Expiry surfaces as [`CoreError::ReconciliationTimeout`]; the
    /// optimistic value has already been reverted when it resolves.
    pub async fn outcome(self) -> Result<CommandOutcome, CoreError> {
        self.rx.await.unwrap_or(Err(CoreError::Shutdown))
    }
}

// ── Queue internals ─────────────────────────────────────────────────

type ReceiptSender = oneshot::Sender<Result<CommandOutcome, CoreError>>;

#[derive(Debug, Clone, Copy, PartialEq)]
enum WriteState {
    /// No transport write out for this tuple.
    Idle,
    /// A write carrying `written` is awaiting its response.
    InFlight { written: SettingValue },
}

struct PendingCommand {
    target: SettingValue,
    issued_at: Instant,
    receipt: Option<ReceiptSender>,
    write: WriteState,
}

/// What one reconcile pass did for one device.
#[derive(Debug, Default)]
pub(crate) struct ReconcileOutcome {
    pub confirmed: Vec<CommandKey>,
    pub expired: Vec<CommandKey>,
}

/// Per-device pending-write buffer.
pub(crate) struct CommandQueue {
    pending: DashMap<CommandKey, PendingCommand>,
}

impl CommandQueue {
    pub(crate) fn new() -> Self {
        Self {
            pending: DashMap::new(),
        }
    }

    /// Insert or supersede the pending command for `key`.
    ///
    /// Returns the consumer receipt and whether the caller must spawn a
    /// writer for this tuple (no write currently in flight).
    pub(crate) fn insert(&self, key: CommandKey, value: SettingValue) -> (CommandReceipt, bool) {
        let (tx, rx) = oneshot::channel();
        let mut spawn_writer = true;

        match self.pending.entry(key) {
            dashmap::Entry::Occupied(mut entry) => {
                let pending = entry.get_mut();
                if let Some(old) = pending.receipt.take() {
                    let _ = old.send(Ok(CommandOutcome::Superseded));
                }
                pending.target = value;
                pending.issued_at = Instant::now();
                pending.receipt = Some(tx);
                spawn_writer = pending.write == WriteState::Idle;
            }
            dashmap::Entry::Vacant(entry) => {
                entry.insert(PendingCommand {
                    target: value,
                    issued_at: Instant::now(),
                    receipt: Some(tx),
                    write: WriteState::Idle,
                });
            }
        }

        (CommandReceipt { rx }, spawn_writer)
    }

    /// Claim the tuple's write slot. Returns the target to send, or
    /// `None` when the command is gone (confirmed or expired meanwhile).
    pub(crate) fn begin_write(&self, key: &CommandKey) -> Option<SettingValue> {
        let mut entry = self.pending.get_mut(key)?;
        match entry.write {
            WriteState::Idle => {
                let target = entry.target;
                entry.write = WriteState::InFlight { written: target };
                Some(target)
            }
            WriteState::InFlight { .. } => None,
        }
    }

    /// Release the write slot after the transport call returned. Returns
    /// `true` when the target was superseded mid-flight and the writer
    /// must issue another write.
    pub(crate) fn finish_write(&self, key: &CommandKey) -> bool {
        let Some(mut entry) = self.pending.get_mut(key) else {
            return false;
        };
        let WriteState::InFlight { written } = entry.write else {
            return false;
        };
        entry.write = WriteState::Idle;
        !entry.target.matches(&written)
    }

    /// Reconcile this device's pending commands against a freshly
    /// confirmed state: confirm matches, expire overaged entries.
    ///
    /// Pure over (pending, confirmed, clock): reconciling the same state
    /// twice is a no-op the second time.
    pub(crate) fn reconcile(
        &self,
        device: DeviceId,
        confirmed: &ControlState,
        timeout: Duration,
    ) -> ReconcileOutcome {
        let keys: Vec<CommandKey> = self
            .pending
            .iter()
            .filter(|e| e.key().device == device)
            .map(|e| *e.key())
            .collect();

        let mut outcome = ReconcileOutcome::default();
        let now = Instant::now();

        for key in keys {
            let Some(entry) = self.pending.get(&key) else {
                continue;
            };
            let target = entry.target;
            let issued_at = entry.issued_at;
            drop(entry);

            let cloud_value = confirmed.value_of(key.field, key.zone);
            if cloud_value.is_some_and(|v| v.matches(&target)) {
                if let Some((_, pending)) = self.pending.remove(&key) {
                    if let Some(tx) = pending.receipt {
                        let _ = tx.send(Ok(CommandOutcome::Confirmed));
                    }
                }
                outcome.confirmed.push(key);
            } else if now.duration_since(issued_at) >= timeout {
                if let Some((_, pending)) = self.pending.remove(&key) {
                    if let Some(tx) = pending.receipt {
                        let _ = tx.send(Err(CoreError::ReconciliationTimeout {
                            device: key.device,
                            field: key.field,
                            timeout_secs: timeout.as_secs(),
                        }));
                    }
                }
                outcome.expired.push(key);
            }
        }

        outcome
    }

    /// Re-apply every remaining optimistic target for `device` on top of
    /// a confirmed state, producing the displayed state.
    pub(crate) fn overlay(&self, device: DeviceId, state: &mut ControlState) {
        for entry in self.pending.iter().filter(|e| e.key().device == device) {
            let key = entry.key();
            state.apply(key.field, key.zone, entry.target);
        }
    }

    /// Pending commands, for introspection.
    pub(crate) fn pending(&self) -> Vec<Command> {
        self.pending
            .iter()
            .map(|e| Command {
                device: e.key().device,
                zone: e.key().zone,
                field: e.key().field,
                value: e.target,
                issued_at: e.issued_at,
            })
            .collect()
    }

    /// Fail every outstanding receipt with `Shutdown` and clear the queue.
    pub(crate) fn shutdown(&self) {
        let keys: Vec<CommandKey> = self.pending.iter().map(|e| *e.key()).collect();
        for key in keys {
            if let Some((_, pending)) = self.pending.remove(&key) {
                if let Some(tx) = pending.receipt {
                    let _ = tx.send(Err(CoreError::Shutdown));
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::AtaState;

    fn key(field: Field) -> CommandKey {
        CommandKey {
            device: DeviceId(1),
            zone: None,
            field,
        }
    }

    fn confirmed(target: f64) -> ControlState {
        ControlState::Ata(AtaState {
            target_temperature: Some(target),
            ..AtaState::default()
        })
    }

    #[tokio::test]
    async fn supersession_resolves_old_receipt() {
        let queue = CommandQueue::new();
        let (first, spawn) = queue.insert(
            key(Field::TargetTemperature),
            SettingValue::Temperature(21.0),
        );
        assert!(spawn);

        let (_second, spawn) = queue.insert(
            key(Field::TargetTemperature),
            SettingValue::Temperature(22.0),
        );
        // Writer not yet claimed the slot — but one was already requested.
        assert!(spawn);

        assert_eq!(first.outcome().await.unwrap(), CommandOutcome::Superseded);
    }

    #[tokio::test]
    async fn write_slot_serializes_and_requests_reissue() {
        let queue = CommandQueue::new();
        let k = key(Field::TargetTemperature);
        queue.insert(k, SettingValue::Temperature(21.0));

        assert_eq!(queue.begin_write(&k), Some(SettingValue::Temperature(21.0)));
        // Slot taken: a second claim is refused.
        assert_eq!(queue.begin_write(&k), None);

        // Superseded mid-flight: finish requests a re-issue with the
        // newer target.
        queue.insert(k, SettingValue::Temperature(23.0));
        assert!(queue.finish_write(&k));
        assert_eq!(queue.begin_write(&k), Some(SettingValue::Temperature(23.0)));
        assert!(!queue.finish_write(&k));
    }

    #[tokio::test]
    async fn reconcile_confirms_matching_values() {
        let queue = CommandQueue::new();
        let k = key(Field::TargetTemperature);
        let (receipt, _) = queue.insert(k, SettingValue::Temperature(21.0));

        let outcome = queue.reconcile(DeviceId(1), &confirmed(21.0), Duration::from_secs(60));
        assert_eq!(outcome.confirmed, vec![k]);
        assert!(outcome.expired.is_empty());
        assert_eq!(receipt.outcome().await.unwrap(), CommandOutcome::Confirmed);

        // Idempotent: a second pass over the same state changes nothing.
        let outcome = queue.reconcile(DeviceId(1), &confirmed(21.0), Duration::from_secs(60));
        assert!(outcome.confirmed.is_empty() && outcome.expired.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reconcile_expires_overaged_commands() {
        let queue = CommandQueue::new();
        let k = key(Field::TargetTemperature);
        let (receipt, _) = queue.insert(k, SettingValue::Temperature(21.0));

        tokio::time::advance(Duration::from_secs(120)).await;

        let outcome = queue.reconcile(DeviceId(1), &confirmed(19.0), Duration::from_secs(60));
        assert_eq!(outcome.expired, vec![k]);
        assert!(matches!(
            receipt.outcome().await,
            Err(CoreError::ReconciliationTimeout { .. })
        ));
    }

    #[tokio::test]
    async fn overlay_applies_remaining_targets() {
        let queue = CommandQueue::new();
        queue.insert(
            key(Field::TargetTemperature),
            SettingValue::Temperature(25.0),
        );

        let mut displayed = confirmed(20.0);
        queue.overlay(DeviceId(1), &mut displayed);
        assert_eq!(
            displayed.value_of(Field::TargetTemperature, None),
            Some(SettingValue::Temperature(25.0))
        );
    }

    #[tokio::test]
    async fn shutdown_fails_outstanding_receipts() {
        let queue = CommandQueue::new();
        let (receipt, _) = queue.insert(key(Field::Power), SettingValue::Bool(true));
        queue.shutdown();
        assert!(matches!(receipt.outcome().await, Err(CoreError::Shutdown)));
    }
}
