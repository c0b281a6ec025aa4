// Wire payload types for the MELCloud application API.
//
// The service speaks PascalCase JSON with a handful of all-caps suffixes
// (`DeviceID`, `BuildingID`) that need explicit renames. Every state value
// is optional: a missing field must never fail a whole fetch.

use serde::{Deserialize, Serialize};

// ── Device family discriminant ──────────────────────────────────────

/// `Device.DeviceType` discriminant from the listing payload.
///
/// 0 = air-to-air, 1 = air-to-water. Anything else is preserved as
/// `Unknown` so a new family in the service doesn't break listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceTypeCode {
    AirToAir,
    AirToWater,
    Unknown(u8),
}

impl From<u8> for DeviceTypeCode {
    fn from(code: u8) -> Self {
        match code {
            0 => Self::AirToAir,
            1 => Self::AirToWater,
            other => Self::Unknown(other),
        }
    }
}

// ── Login ───────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub language: u8,
    pub app_version: &'a str,
    pub persist: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct LoginResponse {
    pub error_id: Option<i32>,
    pub error_message: Option<String>,
    pub login_data: Option<LoginData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct LoginData {
    pub context_key: String,
}

// ── Device listing ──────────────────────────────────────────────────
//
// `User/ListDevices` returns a list of buildings. Device entries hide in
// four places inside `Structure`: directly, under areas, under floors,
// and under areas within floors. `flatten_devices` collects them all.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListedBuilding {
    pub name: Option<String>,
    pub structure: BuildingStructure,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuildingStructure {
    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
    #[serde(default)]
    pub areas: Vec<BuildingArea>,
    #[serde(default)]
    pub floors: Vec<BuildingFloor>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuildingFloor {
    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
    #[serde(default)]
    pub areas: Vec<BuildingArea>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BuildingArea {
    #[serde(default)]
    pub devices: Vec<DeviceEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceEntry {
    #[serde(rename = "DeviceID")]
    pub device_id: u32,
    #[serde(rename = "BuildingID")]
    pub building_id: u32,
    pub device_name: Option<String>,
    pub device: Option<DeviceUnitInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DeviceUnitInfo {
    pub device_type: Option<u8>,
    pub mac_address: Option<String>,
    pub serial_number: Option<String>,
    #[serde(default)]
    pub units: Vec<UnitVersion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UnitVersion {
    pub model: Option<String>,
}

/// One device from the flattened listing — what the transport contract
/// hands to consumers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListedDevice {
    pub device_id: u32,
    pub building_id: u32,
    pub name: Option<String>,
    pub device_type: DeviceTypeCode,
    pub mac: Option<String>,
    pub serial: Option<String>,
    pub unit_models: Vec<String>,
}

impl ListedBuilding {
    /// Collect device entries from all four nesting locations, in
    /// payload order.
    pub fn flatten_devices(self) -> Vec<ListedDevice> {
        let mut entries = self.structure.devices;
        for area in self.structure.areas {
            entries.extend(area.devices);
        }
        for floor in self.structure.floors {
            entries.extend(floor.devices);
            for area in floor.areas {
                entries.extend(area.devices);
            }
        }
        entries.into_iter().map(ListedDevice::from).collect()
    }
}

impl From<DeviceEntry> for ListedDevice {
    fn from(entry: DeviceEntry) -> Self {
        let (device_type, mac, serial, unit_models) = match entry.device {
            Some(info) => (
                info.device_type.map_or(DeviceTypeCode::Unknown(u8::MAX), DeviceTypeCode::from),
                info.mac_address,
                info.serial_number,
                info.units.into_iter().filter_map(|u| u.model).collect(),
            ),
            None => (DeviceTypeCode::Unknown(u8::MAX), None, None, Vec::new()),
        };
        Self {
            device_id: entry.device_id,
            building_id: entry.building_id,
            name: entry.device_name,
            device_type,
            mac,
            serial,
            unit_models,
        }
    }
}

// ── Device state ────────────────────────────────────────────────────

/// Raw state payload from `Device/Get`.
///
/// Family-heterogeneous: ATA devices populate the flat control fields,
/// ATW devices populate the tank fields and `zones`. Consumers decide
/// which fields apply; this type just carries whatever the service sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawState {
    #[serde(rename = "DeviceID")]
    pub device_id: Option<u32>,
    pub device_type: Option<u8>,

    // Common
    pub power: Option<bool>,
    pub offline: Option<bool>,
    pub has_pending_command: Option<bool>,
    /// Naive local timestamp, e.g. `"2024-06-15T10:30:00.123"`.
    pub last_communication: Option<String>,

    // ATA controls
    pub operation_mode: Option<i32>,
    pub room_temperature: Option<f64>,
    pub set_temperature: Option<f64>,
    pub set_fan_speed: Option<u8>,
    pub number_of_fan_speeds: Option<u8>,
    pub vane_horizontal: Option<u8>,
    pub vane_vertical: Option<u8>,

    // ATW tank + zones
    pub tank_water_temperature: Option<f64>,
    pub set_tank_water_temperature: Option<f64>,
    pub outdoor_temperature: Option<f64>,
    #[serde(default)]
    pub zones: Vec<RawZone>,
}

/// One heating zone inside an ATW state payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawZone {
    pub zone_index: Option<u8>,
    pub name: Option<String>,
    pub room_temperature: Option<f64>,
    pub set_temperature: Option<f64>,
}

// ── State writes ────────────────────────────────────────────────────

/// A single-field write against `Device/SetAta` or `Device/SetAtw`.
///
/// `field` is the wire field name (zone-suffixed for zone-scoped ATW
/// writes, e.g. `SetTemperatureZone1`), `effective_flags` is the
/// service's bitmask selecting which field the write applies to.
#[derive(Debug, Clone)]
pub struct StateWrite {
    pub family: DeviceTypeCode,
    pub field: String,
    pub value: serde_json::Value,
    pub effective_flags: u64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flatten_collects_all_nesting_levels() {
        let building: ListedBuilding = serde_json::from_value(json!({
            "Name": "Home",
            "Structure": {
                "Devices": [{"DeviceID": 1, "BuildingID": 10, "DeviceName": "Hall"}],
                "Areas": [{"Devices": [{"DeviceID": 2, "BuildingID": 10, "DeviceName": "Kitchen"}]}],
                "Floors": [{
                    "Devices": [{"DeviceID": 3, "BuildingID": 10, "DeviceName": "Loft"}],
                    "Areas": [{"Devices": [{"DeviceID": 4, "BuildingID": 10, "DeviceName": "Bedroom"}]}]
                }]
            }
        }))
        .unwrap();

        let devices = building.flatten_devices();
        let ids: Vec<u32> = devices.iter().map(|d| d.device_id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }

    #[test]
    fn listed_device_carries_unit_metadata() {
        let entry: DeviceEntry = serde_json::from_value(json!({
            "DeviceID": 7,
            "BuildingID": 10,
            "DeviceName": "Lounge",
            "Device": {
                "DeviceType": 0,
                "MacAddress": "aa:bb:cc:dd:ee:ff",
                "SerialNumber": "1234567890",
                "Units": [{"Model": "MSZ-AP25VG"}, {"Model": null}]
            }
        }))
        .unwrap();

        let device = ListedDevice::from(entry);
        assert_eq!(device.device_type, DeviceTypeCode::AirToAir);
        assert_eq!(device.mac.as_deref(), Some("aa:bb:cc:dd:ee:ff"));
        assert_eq!(device.unit_models, vec!["MSZ-AP25VG"]);
    }

    #[test]
    fn raw_state_tolerates_missing_fields() {
        let state: RawState =
            serde_json::from_value(json!({"DeviceID": 7, "RoomTemperature": 21.5})).unwrap();
        assert_eq!(state.room_temperature, Some(21.5));
        assert!(state.set_temperature.is_none());
        assert!(state.zones.is_empty());
    }
}
