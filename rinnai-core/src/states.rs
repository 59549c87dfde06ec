//! Typed state-path registry
//!
//! The protocol is data-driven: most wire paths depend on the active
//! operating mode, the zone being addressed and whether the system is
//! configured with per-zone set points. This module maps the finite
//! set of logical states onto concrete [`CommandPath`]s via template
//! substitution, so callers never assemble dotted paths by hand.
//!
//! Template placeholders:
//! - `{mode}`: the active mode's group-1 key (`HGOM`/`CGOM`/`ECOM`)
//! - `{m}`: the first letter of that key
//! - `{gz}`: `Z{zone}` with multi set point, `GS` (group shared) without
//! - `{zone}`: the zone letter (`U`, `A`..`D`)

use crate::path::CommandPath;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Every zone the controller can address. `U` is the common zone.
pub const ZONES: [char; 5] = ['U', 'A', 'B', 'C', 'D'];

/// Which top-level subsystem is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatingMode {
    Heating,
    Cooling,
    Evaporative,
}

impl OperatingMode {
    /// Group-1 key of this mode's status group.
    pub fn group_key(&self) -> &'static str {
        match self {
            OperatingMode::Heating => "HGOM",
            OperatingMode::Cooling => "CGOM",
            OperatingMode::Evaporative => "ECOM",
        }
    }

    /// Mode letter as carried by `SYST.OSS.MD`.
    pub fn letter(&self) -> char {
        match self {
            OperatingMode::Heating => 'H',
            OperatingMode::Cooling => 'C',
            OperatingMode::Evaporative => 'E',
        }
    }

    pub fn from_group_key(key: &str) -> Option<Self> {
        match key {
            "HGOM" => Some(OperatingMode::Heating),
            "CGOM" => Some(OperatingMode::Cooling),
            "ECOM" => Some(OperatingMode::Evaporative),
            _ => None,
        }
    }

    pub fn from_letter(letter: &str) -> Option<Self> {
        match letter {
            "H" => Some(OperatingMode::Heating),
            "C" => Some(OperatingMode::Cooling),
            "E" => Some(OperatingMode::Evaporative),
            _ => None,
        }
    }
}

/// Controller operating state as carried by `SYST.OSS.ST`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingState {
    Normal,
    ClockSetting,
    ParameterSetting,
    UserSetting,
    PinEntry,
}

impl OperatingState {
    pub fn from_letter(letter: &str) -> OperatingState {
        match letter {
            "N" => OperatingState::Normal,
            "C" => OperatingState::ClockSetting,
            "P" => OperatingState::ParameterSetting,
            "U" => OperatingState::UserSetting,
            _ => OperatingState::PinEntry,
        }
    }
}

/// Logical state slots the engine and its collaborators address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatePath {
    // System group (mode-independent)
    MultiSetPoint,
    TemperatureUnits,
    ZoneName,
    HasHeater,
    HasCooler,
    HasEvaporative,
    OperatingMode,
    OperatingState,
    // Mode group
    Power,
    FanState,
    FanSpeed,
    ControlMode,
    SetPoint,
    ScheduleOverride,
    SystemActive,
    SchedulePeriod,
    MeasuredTemperature,
    AutoEnabled,
    UserEnabled,
    ZoneInstalled,
    Pump,
}

static SYSTEM_PATHS: Lazy<HashMap<StatePath, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (StatePath::MultiSetPoint, "SYST.CFG.MTSP"),
        (StatePath::TemperatureUnits, "SYST.CFG.TU"),
        (StatePath::ZoneName, "SYST.CFG.Z{zone}"),
        (StatePath::HasHeater, "SYST.AVM.HG"),
        (StatePath::HasCooler, "SYST.AVM.CG"),
        (StatePath::HasEvaporative, "SYST.AVM.EC"),
        (StatePath::OperatingMode, "SYST.OSS.MD"),
        (StatePath::OperatingState, "SYST.OSS.ST"),
    ])
});

static HEAT_COOL_PATHS: Lazy<HashMap<StatePath, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (StatePath::Power, "{mode}.OOP.ST"),
        (StatePath::FanState, "{mode}.OOP.ST"),
        (StatePath::FanSpeed, "{mode}.OOP.FL"),
        (StatePath::ControlMode, "{mode}.{gz}O.OP"),
        (StatePath::SetPoint, "{mode}.{gz}O.SP"),
        (StatePath::ScheduleOverride, "{mode}.{gz}O.AO"),
        (StatePath::SystemActive, "{mode}.GSS.{m}C"),
        (StatePath::SchedulePeriod, "{mode}.{gz}S.AT"),
        (StatePath::MeasuredTemperature, "{mode}.Z{zone}S.MT"),
        (StatePath::AutoEnabled, "{mode}.Z{zone}S.AE"),
        (StatePath::UserEnabled, "{mode}.Z{zone}O.UE"),
        (StatePath::ZoneInstalled, "{mode}.CFG.Z{zone}IS"),
    ])
});

// The pump slot is ECOM.GSO.PS on both the read and the write side.
static EVAPORATIVE_PATHS: Lazy<HashMap<StatePath, &'static str>> = Lazy::new(|| {
    HashMap::from([
        (StatePath::Power, "ECOM.GSO.SW"),
        (StatePath::FanState, "ECOM.GSO.FS"),
        (StatePath::FanSpeed, "ECOM.GSO.FL"),
        (StatePath::ControlMode, "ECOM.GSO.OP"),
        (StatePath::SetPoint, "ECOM.GSO.SP"),
        (StatePath::SystemActive, "ECOM.GSS.BY"),
        (StatePath::MeasuredTemperature, "ECOM.GSS.MT"),
        (StatePath::AutoEnabled, "ECOM.GSS.Z{zone}AE"),
        (StatePath::UserEnabled, "ECOM.GSO.Z{zone}UE"),
        (StatePath::ZoneInstalled, "ECOM.CFG.Z{zone}IS"),
        (StatePath::Pump, "ECOM.GSO.PS"),
    ])
});

impl StatePath {
    /// Resolve this logical state to a concrete wire path.
    ///
    /// Returns `None` when the state does not exist in the given mode
    /// (e.g. the pump outside evaporative cooling) or when a mode-group
    /// state is requested while no mode is active.
    pub fn resolve(
        &self,
        mode: Option<OperatingMode>,
        zone: char,
        multi_set_point: bool,
    ) -> Option<CommandPath> {
        let template = match SYSTEM_PATHS.get(self) {
            Some(template) => *template,
            None => {
                let mode = mode?;
                let table = if mode == OperatingMode::Evaporative {
                    &EVAPORATIVE_PATHS
                } else {
                    &HEAT_COOL_PATHS
                };
                *table.get(self)?
            }
        };

        let mode_key = mode.map(|m| m.group_key()).unwrap_or("");
        let resolved = template
            .replace("{mode}", mode_key)
            .replace("{m}", &mode_key.chars().next().map(String::from).unwrap_or_default())
            .replace("{gz}", if multi_set_point { "Z{zone}" } else { "GS" })
            .replace("{zone}", &zone.to_string());

        CommandPath::from_string(&resolved).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_paths_ignore_mode() {
        let path = StatePath::MultiSetPoint.resolve(None, 'U', false).unwrap();
        assert_eq!(path.to_string(), "SYST.CFG.MTSP");
    }

    #[test]
    fn test_zone_name_substitution() {
        let path = StatePath::ZoneName.resolve(None, 'B', false).unwrap();
        assert_eq!(path.to_string(), "SYST.CFG.ZB");
    }

    #[test]
    fn test_shared_set_point_path() {
        let path = StatePath::SetPoint
            .resolve(Some(OperatingMode::Heating), 'U', false)
            .unwrap();
        assert_eq!(path.to_string(), "HGOM.GSO.SP");
    }

    #[test]
    fn test_multi_set_point_path_is_per_zone() {
        let path = StatePath::SetPoint
            .resolve(Some(OperatingMode::Cooling), 'A', true)
            .unwrap();
        assert_eq!(path.to_string(), "CGOM.ZAO.SP");
    }

    #[test]
    fn test_system_active_uses_mode_letter() {
        let path = StatePath::SystemActive
            .resolve(Some(OperatingMode::Heating), 'U', false)
            .unwrap();
        assert_eq!(path.to_string(), "HGOM.GSS.HC");
    }

    #[test]
    fn test_evaporative_paths() {
        let fan = StatePath::FanState
            .resolve(Some(OperatingMode::Evaporative), 'U', false)
            .unwrap();
        assert_eq!(fan.to_string(), "ECOM.GSO.FS");

        let pump = StatePath::Pump
            .resolve(Some(OperatingMode::Evaporative), 'U', false)
            .unwrap();
        assert_eq!(pump.to_string(), "ECOM.GSO.PS");
    }

    #[test]
    fn test_pump_is_absent_outside_evaporative() {
        assert!(StatePath::Pump.resolve(Some(OperatingMode::Heating), 'U', false).is_none());
    }

    #[test]
    fn test_mode_group_states_need_a_mode() {
        assert!(StatePath::Power.resolve(None, 'U', false).is_none());
    }
}
