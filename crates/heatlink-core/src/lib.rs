//! Cloud-polling coordinator and device model for heat-pump devices.
//!
//! This crate sits between `heatlink-api` and consumer entities (CLI,
//! host integrations). It presents cloud-controlled devices as local
//! controllable entities while minimizing calls to the rate-limited
//! service and keeping every consumer's view consistent under concurrent
//! reads and writes:
//!
//! - **[`Coordinator`]** — the scheduling core. One fetch cycle at a
//!   time (single-flight: overlapping [`request_refresh()`]
//!   [Coordinator::request_refresh] calls share one outcome), periodic
//!   cadence measured from cycle end, exponential backoff on failure,
//!   staleness marking, cancellable teardown.
//! - **Device model** ([`model`]) — family-tagged normalization of
//!   heterogeneous payloads: flat controls for air-to-air units, tank +
//!   independently addressable zones for air-to-water units. Confirmed
//!   and displayed (optimistic) state are explicit separate fields.
//! - **Command queue** ([`command`]) — per-(device, zone, field) pending
//!   writes with supersession, serialized transport writes, and
//!   [`CommandReceipt`]s resolving to confirmed / superseded / timed out.
//! - **[`SubscriptionHub`]** — per-device consumer callbacks with
//!   isolated failures; plus a `watch`-based store snapshot stream for
//!   bulk consumers.
//!
//! Consumers read through [`Device`] accessors and write through
//! [`Coordinator::enqueue`]; they never touch the transport directly.

pub mod command;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod model;
pub mod store;
pub mod subscription;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandOutcome, CommandReceipt};
pub use config::CoordinatorConfig;
pub use coordinator::{Coordinator, RefreshSnapshot};
pub use error::CoreError;
pub use store::DeviceStore;
pub use subscription::{Subscriber, SubscriberError, SubscriptionHub, SubscriptionId};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    AtaState, AtwState, Availability, BuildingId, Capabilities, ControlState, Device,
    DeviceFamily, DeviceId, Field, HvacMode, SettingValue, VanePosition, Zone, ZoneId,
};
