// ── Transport contract ──
//
// Object-safe seam between the cloud client and heatlink-core. The
// coordinator only ever talks to `dyn CloudTransport`, which lets tests
// substitute a scripted in-memory transport for the real HTTP client.

use async_trait::async_trait;

use crate::error::Error;
use crate::models::{ListedDevice, RawState, StateWrite};

/// The three operations the coordinator needs from the cloud service.
///
/// Implemented by [`CloudClient`](crate::CloudClient) for production use.
#[async_trait]
pub trait CloudTransport: Send + Sync {
    /// List every device registered to the account.
    async fn list_devices(&self) -> Result<Vec<ListedDevice>, Error>;

    /// Fetch the authoritative state of one device.
    async fn get_state(&self, device_id: u32, building_id: u32) -> Result<RawState, Error>;

    /// Write a single field. Confirmation comes from a later
    /// [`get_state`](Self::get_state), not from this call.
    async fn set_state(
        &self,
        device_id: u32,
        building_id: u32,
        write: &StateWrite,
    ) -> Result<(), Error>;
}
