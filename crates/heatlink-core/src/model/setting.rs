// ── Writable fields and their values ──
//
// `Field` names every control a consumer can write; `SettingValue` is
// the typed value for one write. The wire mapping (field names and
// `EffectiveFlags` bitmasks) lives here too, so the coordinator and the
// command queue never touch service-specific constants.

use serde::{Deserialize, Serialize};
use serde_json::json;
use strum::{Display, EnumString};

use heatlink_api::{DeviceTypeCode, StateWrite};

use crate::error::CoreError;
use crate::model::device::DeviceFamily;
use crate::model::ids::{DeviceId, ZoneId};

// ── Operating mode ──────────────────────────────────────────────────

/// HVAC operating mode of an air-to-air unit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum HvacMode {
    Heat,
    Dry,
    Cool,
    Fan,
    Auto,
}

impl HvacMode {
    /// Service wire code for `OperationMode`.
    pub fn to_code(self) -> i32 {
        match self {
            Self::Heat => 1,
            Self::Dry => 2,
            Self::Cool => 3,
            Self::Fan => 7,
            Self::Auto => 8,
        }
    }

    /// Decode a wire code. Unknown codes yield `None` so a payload with
    /// a new mode degrades to a missing field instead of an error.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Self::Heat),
            2 => Some(Self::Dry),
            3 => Some(Self::Cool),
            7 => Some(Self::Fan),
            8 => Some(Self::Auto),
            _ => None,
        }
    }
}

// ── Vane position ───────────────────────────────────────────────────

/// Position of a vane axis on an air-to-air unit.
///
/// The two axes use different wire codes for swing (12 horizontal,
/// 7 vertical); [`to_code`](Self::to_code) takes the field to pick.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum VanePosition {
    Auto,
    #[strum(serialize = "1")]
    #[serde(rename = "1")]
    Pos1,
    #[strum(serialize = "2")]
    #[serde(rename = "2")]
    Pos2,
    #[strum(serialize = "3")]
    #[serde(rename = "3")]
    Pos3,
    #[strum(serialize = "4")]
    #[serde(rename = "4")]
    Pos4,
    #[strum(serialize = "5")]
    #[serde(rename = "5")]
    Pos5,
    Swing,
}

impl VanePosition {
    pub fn to_code(self, field: Field) -> u8 {
        match self {
            Self::Auto => 0,
            Self::Pos1 => 1,
            Self::Pos2 => 2,
            Self::Pos3 => 3,
            Self::Pos4 => 4,
            Self::Pos5 => 5,
            Self::Swing => {
                if field == Field::VaneHorizontal {
                    12
                } else {
                    7
                }
            }
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Auto),
            1 => Some(Self::Pos1),
            2 => Some(Self::Pos2),
            3 => Some(Self::Pos3),
            4 => Some(Self::Pos4),
            5 => Some(Self::Pos5),
            7 | 12 => Some(Self::Swing),
            _ => None,
        }
    }
}

// ── Fields ──────────────────────────────────────────────────────────

/// A writable control field.
///
/// `TargetTemperature` is the flat ATA setpoint when written without a
/// zone, and the per-zone setpoint of an ATW device when written with
/// one.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
#[serde(rename_all = "kebab-case")]
pub enum Field {
    Power,
    Mode,
    TargetTemperature,
    FanSpeed,
    VaneHorizontal,
    VaneVertical,
    TankTargetTemperature,
}

// ATA `EffectiveFlags` bits.
const ATA_FLAG_POWER: u64 = 0x01;
const ATA_FLAG_MODE: u64 = 0x02;
const ATA_FLAG_TEMPERATURE: u64 = 0x04;
const ATA_FLAG_FAN_SPEED: u64 = 0x08;
const ATA_FLAG_VANE_VERTICAL: u64 = 0x10;
const ATA_FLAG_VANE_HORIZONTAL: u64 = 0x100;

// ATW `EffectiveFlags` bits.
const ATW_FLAG_POWER: u64 = 0x01;
const ATW_FLAG_TANK_TEMPERATURE: u64 = 0x1000_0000_0020;
const ATW_FLAG_ZONE1_TEMPERATURE: u64 = 0x2_0000_0080;
const ATW_FLAG_ZONE2_TEMPERATURE: u64 = 0x8_0000_0200;

impl Field {
    /// Check that `value` is the right kind for this field.
    pub fn validate(self, value: &SettingValue) -> Result<(), CoreError> {
        let ok = matches!(
            (self, value),
            (Self::Power, SettingValue::Bool(_))
                | (Self::Mode, SettingValue::Mode(_))
                | (
                    Self::TargetTemperature | Self::TankTargetTemperature,
                    SettingValue::Temperature(_)
                )
                | (Self::FanSpeed, SettingValue::Step(_))
                | (
                    Self::VaneHorizontal | Self::VaneVertical,
                    SettingValue::Vane(_)
                )
        );
        if ok {
            Ok(())
        } else {
            Err(CoreError::InvalidValue {
                field: self,
                reason: format!("{value} is not a valid value for this field"),
            })
        }
    }

    /// Translate to a transport-level write.
    ///
    /// Fails when the field/zone combination cannot be expressed for the
    /// device family (e.g. a zone beyond the two the service supports).
    pub(crate) fn wire_write(
        self,
        device: DeviceId,
        family: DeviceFamily,
        zone: Option<ZoneId>,
        value: &SettingValue,
    ) -> Result<StateWrite, CoreError> {
        let unsupported = || CoreError::UnsupportedField {
            device,
            field: self,
        };

        let (field, wire_value, effective_flags) = match family {
            DeviceFamily::Ata => match self {
                Self::Power => ("Power".to_owned(), value.to_wire(self), ATA_FLAG_POWER),
                Self::Mode => (
                    "OperationMode".to_owned(),
                    value.to_wire(self),
                    ATA_FLAG_MODE,
                ),
                Self::TargetTemperature => (
                    "SetTemperature".to_owned(),
                    value.to_wire(self),
                    ATA_FLAG_TEMPERATURE,
                ),
                Self::FanSpeed => (
                    "SetFanSpeed".to_owned(),
                    value.to_wire(self),
                    ATA_FLAG_FAN_SPEED,
                ),
                Self::VaneHorizontal => (
                    "VaneHorizontal".to_owned(),
                    value.to_wire(self),
                    ATA_FLAG_VANE_HORIZONTAL,
                ),
                Self::VaneVertical => (
                    "VaneVertical".to_owned(),
                    value.to_wire(self),
                    ATA_FLAG_VANE_VERTICAL,
                ),
                Self::TankTargetTemperature => return Err(unsupported()),
            },
            DeviceFamily::Atw => match self {
                Self::Power => ("Power".to_owned(), value.to_wire(self), ATW_FLAG_POWER),
                Self::TankTargetTemperature => (
                    "SetTankWaterTemperature".to_owned(),
                    value.to_wire(self),
                    ATW_FLAG_TANK_TEMPERATURE,
                ),
                Self::TargetTemperature => {
                    let zone = zone.ok_or_else(|| unsupported())?;
                    let flags = match zone.0 {
                        1 => ATW_FLAG_ZONE1_TEMPERATURE,
                        2 => ATW_FLAG_ZONE2_TEMPERATURE,
                        _ => return Err(unsupported()),
                    };
                    (
                        format!("SetTemperatureZone{}", zone.0),
                        value.to_wire(self),
                        flags,
                    )
                }
                _ => return Err(unsupported()),
            },
        };

        Ok(StateWrite {
            family: match family {
                DeviceFamily::Ata => DeviceTypeCode::AirToAir,
                DeviceFamily::Atw => DeviceTypeCode::AirToWater,
            },
            field,
            value: wire_value,
            effective_flags,
        })
    }
}

// ── Values ──────────────────────────────────────────────────────────

/// A typed value for one [`Field`] write.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingValue {
    Bool(bool),
    Temperature(f64),
    Mode(HvacMode),
    Step(u8),
    Vane(VanePosition),
}

/// Setpoints confirm at the service's 0.5° granularity; anything closer
/// than this counts as equal.
const TEMPERATURE_TOLERANCE: f64 = 0.05;

impl SettingValue {
    /// Equality with temperature tolerance — the comparison used to
    /// decide whether a fetched value confirms a pending command.
    pub fn matches(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Temperature(a), Self::Temperature(b)) => {
                (a - b).abs() < TEMPERATURE_TOLERANCE
            }
            _ => self == other,
        }
    }

    pub(crate) fn to_wire(self, field: Field) -> serde_json::Value {
        match self {
            Self::Bool(v) => json!(v),
            Self::Temperature(v) => json!(v),
            Self::Mode(m) => json!(m.to_code()),
            Self::Step(v) => json!(v),
            Self::Vane(v) => json!(v.to_code(field)),
        }
    }
}

impl std::fmt::Display for SettingValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(true) => write!(f, "on"),
            Self::Bool(false) => write!(f, "off"),
            Self::Temperature(v) => write!(f, "{v:.1}°C"),
            Self::Mode(m) => write!(f, "{m}"),
            Self::Step(v) => write!(f, "{v}"),
            Self::Vane(v) => write!(f, "{v}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn mode_codes_round_trip() {
        for mode in [
            HvacMode::Heat,
            HvacMode::Dry,
            HvacMode::Cool,
            HvacMode::Fan,
            HvacMode::Auto,
        ] {
            assert_eq!(HvacMode::from_code(mode.to_code()), Some(mode));
        }
        assert_eq!(HvacMode::from_code(99), None);
    }

    #[test]
    fn vane_swing_code_depends_on_axis() {
        assert_eq!(VanePosition::Swing.to_code(Field::VaneHorizontal), 12);
        assert_eq!(VanePosition::Swing.to_code(Field::VaneVertical), 7);
        assert_eq!(VanePosition::from_code(12), Some(VanePosition::Swing));
    }

    #[test]
    fn field_parses_from_kebab_case() {
        let field: Field = "target-temperature".parse().unwrap();
        assert_eq!(field, Field::TargetTemperature);
    }

    #[test]
    fn validate_rejects_mismatched_value_kind() {
        let err = Field::Power
            .validate(&SettingValue::Temperature(21.0))
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidValue { .. }));
        Field::Power.validate(&SettingValue::Bool(true)).unwrap();
    }

    #[test]
    fn temperature_matching_uses_tolerance() {
        let a = SettingValue::Temperature(21.0);
        assert!(a.matches(&SettingValue::Temperature(21.04)));
        assert!(!a.matches(&SettingValue::Temperature(21.5)));
    }

    #[test]
    fn ata_write_uses_flat_field_names() {
        let write = Field::TargetTemperature
            .wire_write(
                DeviceId(1),
                DeviceFamily::Ata,
                None,
                &SettingValue::Temperature(21.0),
            )
            .unwrap();
        assert_eq!(write.field, "SetTemperature");
        assert_eq!(write.effective_flags, 0x04);
    }

    #[test]
    fn atw_zone_write_is_zone_suffixed() {
        let write = Field::TargetTemperature
            .wire_write(
                DeviceId(1),
                DeviceFamily::Atw,
                Some(ZoneId(2)),
                &SettingValue::Temperature(22.0),
            )
            .unwrap();
        assert_eq!(write.field, "SetTemperatureZone2");
    }

    #[test]
    fn tank_write_on_ata_is_rejected() {
        let err = Field::TankTargetTemperature
            .wire_write(
                DeviceId(1),
                DeviceFamily::Ata,
                None,
                &SettingValue::Temperature(50.0),
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::UnsupportedField { .. }));
    }
}
