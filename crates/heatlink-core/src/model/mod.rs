//! Normalized domain model: identities, device shapes, writable fields.

pub mod device;
pub mod ids;
pub mod setting;

pub use device::{
    AtaState, AtwState, Availability, Capabilities, ControlState, Device, DeviceFamily,
    MergeReport, Zone,
};
pub use ids::{BuildingId, DeviceId, ZoneId};
pub use setting::{Field, HvacMode, SettingValue, VanePosition};
