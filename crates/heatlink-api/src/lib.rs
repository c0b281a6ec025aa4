//! Async client for the MELCloud heat-pump cloud service.
//!
//! This crate is the transport layer of the heatlink workspace: it knows
//! the service's endpoints, payload shapes, and failure modes, and
//! nothing about device modeling or refresh scheduling (that lives in
//! `heatlink-core`).
//!
//! - **[`CloudClient`]** — reqwest-based client: credential login,
//!   device listing (with building/area/floor flattening), per-device
//!   state fetch, and single-field writes.
//! - **[`CloudTransport`]** — the object-safe trait the core consumes;
//!   `CloudClient` is the production implementation.
//! - **[`Error`]** — classified failures: `AuthFailed`, `RateLimited`,
//!   `Network`, `MalformedResponse`, `Api`.

pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use client::{CloudClient, DEFAULT_BASE_URL};
pub use error::Error;
pub use models::{DeviceTypeCode, ListedDevice, RawState, RawZone, StateWrite};
pub use transport::CloudTransport;
