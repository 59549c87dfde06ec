//! Typed controller service
//!
//! A convenience layer over [`Session`] that resolves logical states
//! through the path registry and converts between wire values and
//! useful types. The evaporative subsystem represents its target
//! temperature as an inverted/scaled "comfort level"; the conversion
//! lives here so collaborators only ever see degrees.

use crate::session::Session;
use log::debug;
use rinnai_core::{
    OperatingMode, OperatingState, RinnaiError, RinnaiResult, StatePath, StatusTree, ZONES,
};

/// The always-present common zone.
pub const COMMON_ZONE: char = 'U';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMode {
    Manual,
    Auto,
}

impl ControlMode {
    fn letter(&self) -> &'static str {
        match self {
            ControlMode::Manual => "M",
            ControlMode::Auto => "A",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleOverrideMode {
    None,
    Advance,
    Operation,
}

impl ScheduleOverrideMode {
    fn letter(&self) -> &'static str {
        match self {
            ScheduleOverrideMode::None => "N",
            ScheduleOverrideMode::Advance => "A",
            ScheduleOverrideMode::Operation => "O",
        }
    }
}

/// Typed getters and setters over a running session.
#[derive(Clone)]
pub struct ControllerService {
    session: Session,
    invert_comfort_level: bool,
}

impl ControllerService {
    pub fn new(session: Session) -> Self {
        Self {
            session,
            invert_comfort_level: true,
        }
    }

    /// Some controller firmwares report the comfort level on an
    /// inverted scale; this flag selects the direction.
    pub fn with_inverted_comfort_level(mut self, invert: bool) -> Self {
        self.invert_comfort_level = invert;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn status(&self) -> Option<StatusTree> {
        self.session.status()
    }

    fn get(&self, state: StatePath, zone: char) -> Option<String> {
        let status = self.status()?;
        let mode = status.mode().and_then(OperatingMode::from_group_key);
        let path = state.resolve(mode, zone, status.has_multi_set_point())?;
        status.get_state(&path).map(str::to_string)
    }

    async fn set(&self, state: StatePath, zone: char, value: String) -> RinnaiResult<()> {
        let status = self.status().ok_or_else(|| {
            RinnaiError::InvalidRequest("No status has been received from the module".to_string())
        })?;
        let mode = status.mode().and_then(OperatingMode::from_group_key);
        let path = state
            .resolve(mode, zone, status.has_multi_set_point())
            .ok_or_else(|| {
                RinnaiError::InvalidRequest(format!(
                    "{state:?} is not available in the current operating mode"
                ))
            })?;
        self.session.set_state(path, value).await
    }

    fn in_evaporative(&self) -> bool {
        self.status()
            .as_ref()
            .and_then(StatusTree::mode)
            .and_then(OperatingMode::from_group_key)
            == Some(OperatingMode::Evaporative)
    }

    //
    // Getters
    //

    pub fn has_multi_set_point(&self) -> bool {
        self.status()
            .map(|status| status.has_multi_set_point())
            .unwrap_or(false)
    }

    pub fn temperature_units(&self) -> String {
        self.get(StatePath::TemperatureUnits, COMMON_ZONE)
            .unwrap_or_else(|| "C".to_string())
    }

    pub fn zone_name(&self, zone: char) -> String {
        if zone == COMMON_ZONE {
            return "Common".to_string();
        }
        let name = self
            .get(StatePath::ZoneName, zone)
            .map(|name| name.trim().to_string())
            .unwrap_or_default();
        if name.is_empty() {
            format!("Zone {zone}")
        } else {
            name
        }
    }

    pub fn operating_mode(&self) -> Option<OperatingMode> {
        self.get(StatePath::OperatingMode, COMMON_ZONE)
            .and_then(|letter| OperatingMode::from_letter(&letter))
    }

    pub fn operating_state(&self) -> Option<OperatingState> {
        self.get(StatePath::OperatingState, COMMON_ZONE)
            .map(|letter| OperatingState::from_letter(&letter))
    }

    pub fn power_state(&self) -> bool {
        self.get(StatePath::Power, COMMON_ZONE).as_deref() == Some("N")
    }

    pub fn fan_state(&self) -> bool {
        let expected = if self.in_evaporative() { "N" } else { "Z" };
        self.get(StatePath::FanState, COMMON_ZONE).as_deref() == Some(expected)
    }

    pub fn fan_speed(&self) -> u8 {
        self.get(StatePath::FanSpeed, COMMON_ZONE)
            .and_then(|speed| speed.parse().ok())
            .unwrap_or(0)
    }

    pub fn pump_state(&self) -> bool {
        self.get(StatePath::Pump, COMMON_ZONE).as_deref() == Some("N")
    }

    pub fn control_mode(&self, zone: char) -> ControlMode {
        match self.get(StatePath::ControlMode, zone).as_deref() {
            Some("M") => ControlMode::Manual,
            _ => ControlMode::Auto,
        }
    }

    pub fn set_point_temperature(&self, zone: char) -> Option<i32> {
        let value: i32 = self.get(StatePath::SetPoint, zone)?.parse().ok()?;
        if self.in_evaporative() {
            Some(temperature_from_comfort_level(value, self.invert_comfort_level))
        } else {
            Some(value)
        }
    }

    pub fn measured_temperature(&self, zone: char) -> Option<f64> {
        let raw = self.get(StatePath::MeasuredTemperature, zone)?;
        if raw == "999" {
            return None; // sensor not reporting
        }
        let value: f64 = raw.parse().ok()?;
        Some(value / 10.0)
    }

    pub fn user_enabled(&self, zone: char) -> bool {
        self.get(StatePath::UserEnabled, zone).as_deref() == Some("Y")
    }

    pub fn auto_enabled(&self, zone: char) -> bool {
        self.get(StatePath::AutoEnabled, zone).as_deref() == Some("Y")
    }

    pub fn zone_installed(&self, zone: char) -> bool {
        self.get(StatePath::ZoneInstalled, zone).as_deref() == Some("Y")
    }

    pub fn zones_installed(&self) -> Vec<char> {
        ZONES
            .iter()
            .copied()
            .filter(|zone| self.zone_installed(*zone))
            .collect()
    }

    //
    // Setters
    //

    pub async fn set_operating_mode(&self, mode: OperatingMode) -> RinnaiResult<()> {
        debug!("service: set_operating_mode {mode:?}");
        self.set(StatePath::OperatingMode, COMMON_ZONE, mode.letter().to_string())
            .await
    }

    pub async fn set_power_state(&self, on: bool) -> RinnaiResult<()> {
        debug!("service: set_power_state {on}");

        // Turning power off while the fan runs would kill the fan too.
        if !on && self.fan_state() && !self.in_evaporative() {
            return Ok(());
        }
        let state = if on { "N" } else { "F" };
        self.set(StatePath::Power, COMMON_ZONE, state.to_string()).await
    }

    pub async fn set_fan_state(&self, on: bool) -> RinnaiResult<()> {
        debug!("service: set_fan_state {on}");

        // Turning the fan off while power is on would kill power too.
        if !on && self.power_state() && !self.in_evaporative() {
            return Ok(());
        }
        let state = if on {
            if self.in_evaporative() { "N" } else { "Z" }
        } else {
            "F"
        };
        self.set(StatePath::FanState, COMMON_ZONE, state.to_string()).await
    }

    pub async fn set_fan_speed(&self, speed: u8) -> RinnaiResult<()> {
        debug!("service: set_fan_speed {speed}");
        self.set(StatePath::FanSpeed, COMMON_ZONE, format!("{speed:02}"))
            .await
    }

    pub async fn set_set_point_temperature(&self, temperature: i32, zone: char) -> RinnaiResult<()> {
        debug!("service: set_set_point_temperature {temperature} zone {zone}");

        let value = if self.in_evaporative() {
            comfort_level_from_temperature(temperature, self.invert_comfort_level)
        } else {
            clamp_set_point(temperature)
        };
        self.set(StatePath::SetPoint, zone, format!("{value:02}")).await
    }

    pub async fn set_user_enabled(&self, enabled: bool, zone: char) -> RinnaiResult<()> {
        debug!("service: set_user_enabled {enabled} zone {zone}");
        let state = if enabled { "Y" } else { "N" };
        self.set(StatePath::UserEnabled, zone, state.to_string()).await
    }

    pub async fn set_control_mode(&self, mode: ControlMode, zone: char) -> RinnaiResult<()> {
        debug!("service: set_control_mode {mode:?} zone {zone}");
        self.set(StatePath::ControlMode, zone, mode.letter().to_string())
            .await
    }

    pub async fn set_schedule_override(
        &self,
        mode: ScheduleOverrideMode,
        zone: char,
    ) -> RinnaiResult<()> {
        debug!("service: set_schedule_override {mode:?} zone {zone}");
        self.set(StatePath::ScheduleOverride, zone, mode.letter().to_string())
            .await
    }

    pub async fn set_pump_state(&self, on: bool) -> RinnaiResult<()> {
        debug!("service: set_pump_state {on}");
        let state = if on { "N" } else { "F" };
        self.set(StatePath::Pump, COMMON_ZONE, state.to_string()).await
    }
}

/// Map degrees to the evaporative comfort level (19..=34).
fn comfort_level_from_temperature(temperature: i32, invert: bool) -> i32 {
    let temperature = temperature.clamp(8, 30);
    let mut ratio = f64::from(temperature - 8) / 22.0;
    if invert {
        ratio = 1.0 - ratio;
    }
    (ratio * 15.0 + 19.0).round() as i32
}

/// Map the evaporative comfort level back to degrees.
fn temperature_from_comfort_level(comfort_level: i32, invert: bool) -> i32 {
    let mut ratio = f64::from(comfort_level - 19) / 15.0;
    if invert {
        ratio = 1.0 - ratio;
    }
    (ratio * 22.0 + 8.0).round() as i32
}

/// Heat/cool set points: capped at 30, anything below 8 means "off".
fn clamp_set_point(temperature: i32) -> i32 {
    let temperature = temperature.min(30);
    if temperature < 8 { 0 } else { temperature }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comfort_level_bounds() {
        assert_eq!(comfort_level_from_temperature(8, false), 19);
        assert_eq!(comfort_level_from_temperature(30, false), 34);
        assert_eq!(comfort_level_from_temperature(8, true), 34);
        assert_eq!(comfort_level_from_temperature(30, true), 19);
        // out-of-range input is clamped first
        assert_eq!(comfort_level_from_temperature(50, false), 34);
    }

    #[test]
    fn test_temperature_from_comfort_level_inverts() {
        assert_eq!(temperature_from_comfort_level(19, true), 30);
        assert_eq!(temperature_from_comfort_level(34, true), 8);
        assert_eq!(temperature_from_comfort_level(19, false), 8);
        assert_eq!(temperature_from_comfort_level(34, false), 30);
    }

    #[test]
    fn test_comfort_round_trip() {
        for temperature in 8..=30 {
            let comfort = comfort_level_from_temperature(temperature, true);
            let back = temperature_from_comfort_level(comfort, true);
            assert!((back - temperature).abs() <= 1, "{temperature} -> {comfort} -> {back}");
        }
    }

    #[test]
    fn test_clamp_set_point() {
        assert_eq!(clamp_set_point(35), 30);
        assert_eq!(clamp_set_point(20), 20);
        assert_eq!(clamp_set_point(7), 0);
    }
}
