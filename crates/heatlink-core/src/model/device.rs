// ── Device domain types ──
//
// Normalized view of one physical device. The two families share one
// `Device` shape; a family tag selects which control group is populated
// (flat ATA controls vs tank + zone list) — a data-shape difference, not
// a behavioral one, so no trait dispatch.
//
// `confirmed` is the last state the cloud accepted; `displayed` is
// `confirmed` plus any optimistic overlays from pending commands. They
// are separate fields so reconciliation and expiry are pure functions
// over (pending commands, latest snapshot).

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use heatlink_api::{DeviceTypeCode, ListedDevice, RawState};

use crate::model::ids::{BuildingId, DeviceId, ZoneId};
use crate::model::setting::{Field, HvacMode, SettingValue, VanePosition};

// ── Family ──────────────────────────────────────────────────────────

/// Device family tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceFamily {
    /// Air-to-air: single thermal circuit, no zones.
    Ata,
    /// Air-to-water: tank heating plus independently controlled zones.
    Atw,
}

impl DeviceFamily {
    /// Map the listing discriminant. Unknown codes yield `None` and the
    /// device is skipped (logged by the coordinator).
    pub fn from_code(code: DeviceTypeCode) -> Option<Self> {
        match code {
            DeviceTypeCode::AirToAir => Some(Self::Ata),
            DeviceTypeCode::AirToWater => Some(Self::Atw),
            DeviceTypeCode::Unknown(_) => None,
        }
    }
}

// ── Capabilities ────────────────────────────────────────────────────

/// Which controls apply to a device.
///
/// Derived once from the family and the first successful fetch, then
/// immutable for the device's lifetime; only state values change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    pub has_mode: bool,
    pub has_target_temperature: bool,
    pub fan_speed_steps: Option<u8>,
    pub has_vane_horizontal: bool,
    pub has_vane_vertical: bool,
    pub has_tank: bool,
    pub zone_count: u8,
}

impl Capabilities {
    fn from_first_fetch(family: DeviceFamily, raw: &RawState) -> Self {
        match family {
            DeviceFamily::Ata => Self {
                has_mode: true,
                has_target_temperature: true,
                fan_speed_steps: raw.number_of_fan_speeds,
                has_vane_horizontal: raw.vane_horizontal.is_some(),
                has_vane_vertical: raw.vane_vertical.is_some(),
                has_tank: false,
                zone_count: 0,
            },
            DeviceFamily::Atw => Self {
                has_mode: false,
                has_target_temperature: !raw.zones.is_empty(),
                fan_speed_steps: None,
                has_vane_horizontal: false,
                has_vane_vertical: false,
                has_tank: raw.tank_water_temperature.is_some()
                    || raw.set_tank_water_temperature.is_some(),
                #[allow(clippy::cast_possible_truncation)]
                zone_count: raw.zones.len() as u8,
            },
        }
    }

    /// Whether `field` can be written on a device with these capabilities.
    pub fn supports(&self, field: Field) -> bool {
        match field {
            Field::Power => true,
            Field::Mode => self.has_mode,
            Field::TargetTemperature => self.has_target_temperature,
            Field::FanSpeed => self.fan_speed_steps.is_some(),
            Field::VaneHorizontal => self.has_vane_horizontal,
            Field::VaneVertical => self.has_vane_vertical,
            Field::TankTargetTemperature => self.has_tank,
        }
    }
}

// ── Control state ───────────────────────────────────────────────────

/// Flat controls of an air-to-air unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AtaState {
    pub power: Option<bool>,
    pub mode: Option<HvacMode>,
    pub room_temperature: Option<f64>,
    pub target_temperature: Option<f64>,
    pub fan_speed: Option<u8>,
    pub vane_horizontal: Option<VanePosition>,
    pub vane_vertical: Option<VanePosition>,
}

/// One independently addressable heating zone of an ATW device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub name: Option<String>,
    pub room_temperature: Option<f64>,
    pub target_temperature: Option<f64>,
}

/// Tank circuit plus ordered zones of an air-to-water unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AtwState {
    pub power: Option<bool>,
    pub tank_temperature: Option<f64>,
    pub tank_target_temperature: Option<f64>,
    pub outdoor_temperature: Option<f64>,
    pub zones: Vec<Zone>,
}

/// Family-tagged control state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlState {
    Ata(AtaState),
    Atw(AtwState),
}

/// What a merge pass observed: which normalized fields changed, and
/// which payload fields were absent so the previous value was carried.
#[derive(Debug, Default)]
pub struct MergeReport {
    pub changed: Vec<String>,
    pub missing: Vec<String>,
}

impl MergeReport {
    pub fn is_partial(&self) -> bool {
        !self.missing.is_empty()
    }
}

/// Merge `src` into `dst`: a present value replaces (recording a change
/// when it differs); an absent value carries the previous one, recorded
/// as missing only if there was a previous value to carry.
fn take<T: Copy + PartialEq>(
    dst: &mut Option<T>,
    src: Option<T>,
    name: &str,
    report: &mut MergeReport,
) {
    match src {
        Some(value) => {
            if *dst != Some(value) {
                report.changed.push(name.to_owned());
            }
            *dst = Some(value);
        }
        None => {
            if dst.is_some() {
                report.missing.push(name.to_owned());
            }
        }
    }
}

impl ControlState {
    pub fn family(&self) -> DeviceFamily {
        match self {
            Self::Ata(_) => DeviceFamily::Ata,
            Self::Atw(_) => DeviceFamily::Atw,
        }
    }

    /// Normalize a raw payload against the previous confirmed state.
    pub(crate) fn merge_raw(
        prev: Option<&Self>,
        family: DeviceFamily,
        raw: &RawState,
    ) -> (Self, MergeReport) {
        let mut report = MergeReport::default();
        let state = match family {
            DeviceFamily::Ata => {
                let prev = match prev {
                    Some(Self::Ata(s)) => Some(s),
                    _ => None,
                };
                Self::Ata(merge_ata(prev, raw, &mut report))
            }
            DeviceFamily::Atw => {
                let prev = match prev {
                    Some(Self::Atw(s)) => Some(s),
                    _ => None,
                };
                Self::Atw(merge_atw(prev, raw, &mut report))
            }
        };
        (state, report)
    }

    /// Read one field as a [`SettingValue`], for command confirmation
    /// and consumer accessors.
    pub fn value_of(&self, field: Field, zone: Option<ZoneId>) -> Option<SettingValue> {
        match (self, field) {
            (Self::Ata(s), Field::Power) => s.power.map(SettingValue::Bool),
            (Self::Ata(s), Field::Mode) => s.mode.map(SettingValue::Mode),
            (Self::Ata(s), Field::TargetTemperature) => {
                s.target_temperature.map(SettingValue::Temperature)
            }
            (Self::Ata(s), Field::FanSpeed) => s.fan_speed.map(SettingValue::Step),
            (Self::Ata(s), Field::VaneHorizontal) => s.vane_horizontal.map(SettingValue::Vane),
            (Self::Ata(s), Field::VaneVertical) => s.vane_vertical.map(SettingValue::Vane),
            (Self::Atw(s), Field::Power) => s.power.map(SettingValue::Bool),
            (Self::Atw(s), Field::TankTargetTemperature) => {
                s.tank_target_temperature.map(SettingValue::Temperature)
            }
            (Self::Atw(s), Field::TargetTemperature) => {
                let zone = zone?;
                s.zones
                    .iter()
                    .find(|z| z.id == zone)
                    .and_then(|z| z.target_temperature.map(SettingValue::Temperature))
            }
            _ => None,
        }
    }

    /// Apply an optimistic value in place. Returns `false` when the
    /// field/zone does not exist on this state shape.
    pub(crate) fn apply(&mut self, field: Field, zone: Option<ZoneId>, value: SettingValue) -> bool {
        match (self, field, value) {
            (Self::Ata(s), Field::Power, SettingValue::Bool(v)) => {
                s.power = Some(v);
                true
            }
            (Self::Ata(s), Field::Mode, SettingValue::Mode(v)) => {
                s.mode = Some(v);
                true
            }
            (Self::Ata(s), Field::TargetTemperature, SettingValue::Temperature(v)) => {
                s.target_temperature = Some(v);
                true
            }
            (Self::Ata(s), Field::FanSpeed, SettingValue::Step(v)) => {
                s.fan_speed = Some(v);
                true
            }
            (Self::Ata(s), Field::VaneHorizontal, SettingValue::Vane(v)) => {
                s.vane_horizontal = Some(v);
                true
            }
            (Self::Ata(s), Field::VaneVertical, SettingValue::Vane(v)) => {
                s.vane_vertical = Some(v);
                true
            }
            (Self::Atw(s), Field::Power, SettingValue::Bool(v)) => {
                s.power = Some(v);
                true
            }
            (Self::Atw(s), Field::TankTargetTemperature, SettingValue::Temperature(v)) => {
                s.tank_target_temperature = Some(v);
                true
            }
            (Self::Atw(s), Field::TargetTemperature, SettingValue::Temperature(v)) => {
                let Some(zone) = zone else { return false };
                match s.zones.iter_mut().find(|z| z.id == zone) {
                    Some(z) => {
                        z.target_temperature = Some(v);
                        true
                    }
                    None => false,
                }
            }
            _ => false,
        }
    }
}

fn merge_ata(prev: Option<&AtaState>, raw: &RawState, report: &mut MergeReport) -> AtaState {
    let mut next = prev.cloned().unwrap_or_default();
    take(&mut next.power, raw.power, "Power", report);
    take(
        &mut next.mode,
        raw.operation_mode.and_then(HvacMode::from_code),
        "OperationMode",
        report,
    );
    take(
        &mut next.room_temperature,
        raw.room_temperature,
        "RoomTemperature",
        report,
    );
    take(
        &mut next.target_temperature,
        raw.set_temperature,
        "SetTemperature",
        report,
    );
    take(&mut next.fan_speed, raw.set_fan_speed, "SetFanSpeed", report);
    take(
        &mut next.vane_horizontal,
        raw.vane_horizontal.and_then(VanePosition::from_code),
        "VaneHorizontal",
        report,
    );
    take(
        &mut next.vane_vertical,
        raw.vane_vertical.and_then(VanePosition::from_code),
        "VaneVertical",
        report,
    );
    next
}

fn merge_atw(prev: Option<&AtwState>, raw: &RawState, report: &mut MergeReport) -> AtwState {
    let mut next = prev.cloned().unwrap_or_default();
    take(&mut next.power, raw.power, "Power", report);
    take(
        &mut next.tank_temperature,
        raw.tank_water_temperature,
        "TankWaterTemperature",
        report,
    );
    take(
        &mut next.tank_target_temperature,
        raw.set_tank_water_temperature,
        "SetTankWaterTemperature",
        report,
    );
    take(
        &mut next.outdoor_temperature,
        raw.outdoor_temperature,
        "OutdoorTemperature",
        report,
    );

    // Zones follow the payload: exactly one normalized Zone per entry,
    // matched to previous zones by index for carry-over.
    let mut zones = Vec::with_capacity(raw.zones.len());
    for (position, raw_zone) in raw.zones.iter().enumerate() {
        #[allow(clippy::cast_possible_truncation)]
        let id = ZoneId(raw_zone.zone_index.unwrap_or(position as u8 + 1));
        let previous = next.zones.iter().find(|z| z.id == id);
        let mut zone = previous.cloned().unwrap_or(Zone {
            id,
            name: None,
            room_temperature: None,
            target_temperature: None,
        });

        if let Some(ref name) = raw_zone.name {
            if zone.name.as_deref() != Some(name) {
                report.changed.push(format!("Zone{}.Name", id.0));
            }
            zone.name = Some(name.clone());
        }
        take(
            &mut zone.room_temperature,
            raw_zone.room_temperature,
            &format!("Zone{}.RoomTemperature", id.0),
            report,
        );
        take(
            &mut zone.target_temperature,
            raw_zone.set_temperature,
            &format!("Zone{}.SetTemperature", id.0),
            report,
        );
        zones.push(zone);
    }
    if next.zones.len() != zones.len() {
        report.changed.push("Zones".to_owned());
    }
    next.zones = zones;
    next
}

// ── Availability ────────────────────────────────────────────────────

/// Whether the normalized state can be trusted as live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    /// Recently confirmed by a successful fetch.
    Live,
    /// No successful fetch within the staleness threshold; values are
    /// last-known, not live.
    Stale,
    /// Stopped appearing in fetched snapshots. Kept (never deleted) so
    /// bound consumers don't dangle.
    Missing,
}

// ── Device ──────────────────────────────────────────────────────────

/// One physical device as seen by consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub building: BuildingId,
    pub family: DeviceFamily,
    pub name: Option<String>,
    pub mac: Option<String>,
    pub serial: Option<String>,
    pub unit_models: Vec<String>,
    pub capabilities: Capabilities,
    /// Last state the cloud accepted.
    pub confirmed: ControlState,
    /// Confirmed state plus optimistic overlays from pending commands.
    pub displayed: ControlState,
    pub availability: Availability,
    /// The cloud's own device-offline indicator from the last payload.
    pub reported_offline: bool,
    pub last_communication: Option<NaiveDateTime>,
}

impl Device {
    /// Build a device from its first successful fetch. This is the only
    /// place capabilities are derived.
    pub(crate) fn first_seen(
        listed: &ListedDevice,
        family: DeviceFamily,
        raw: &RawState,
    ) -> (Self, MergeReport) {
        let capabilities = Capabilities::from_first_fetch(family, raw);
        let (confirmed, report) = ControlState::merge_raw(None, family, raw);
        let device = Self {
            id: DeviceId(listed.device_id),
            building: BuildingId(listed.building_id),
            family,
            name: listed.name.clone(),
            mac: listed.mac.clone(),
            serial: listed.serial.clone(),
            unit_models: listed.unit_models.clone(),
            capabilities,
            displayed: confirmed.clone(),
            confirmed,
            availability: Availability::Live,
            reported_offline: raw.offline.unwrap_or(false),
            last_communication: raw
                .last_communication
                .as_deref()
                .and_then(parse_last_communication),
        };
        (device, report)
    }

    /// A device reads as unavailable when stale, missing, or reported
    /// offline by the cloud — never as frozen values presented as live.
    pub fn is_available(&self) -> bool {
        self.availability == Availability::Live && !self.reported_offline
    }

    /// Read one displayed field — what a consumer should show. Reflects
    /// optimistic values before the confirming fetch lands.
    pub fn reading(&self, field: Field, zone: Option<ZoneId>) -> Option<SettingValue> {
        self.displayed.value_of(field, zone)
    }

    /// The ordered zones of an ATW device; empty for ATA.
    pub fn zones(&self) -> &[Zone] {
        match &self.displayed {
            ControlState::Atw(s) => &s.zones,
            ControlState::Ata(_) => &[],
        }
    }
}

/// The service reports naive local timestamps like
/// `2024-06-15T10:30:00.123`.
pub(crate) fn parse_last_communication(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok()
}
