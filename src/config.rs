//! TOML-based scenario configuration and preset definitions.

use std::fs;
use std::path::Path;

use chrono::{NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::planner::{OpportunisticTier, charging_power_kw};
use crate::prices::{MINUTES_PER_DAY, PriceAdjustment};
use crate::session::RefreshPolicy;

/// Format of `simulation.start` and calendar event times.
pub const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M";
/// Format of daily times such as `settings.departure_time`.
pub const TIME_FORMAT: &str = "%H:%M";

/// Top-level scenario configuration parsed from TOML.
///
/// All fields have defaults matching the baseline scenario. Load from
/// TOML with [`ScenarioConfig::from_toml_file`] or use
/// [`ScenarioConfig::baseline`] for the built-in default.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    /// Charger hardware and battery parameters.
    #[serde(default)]
    pub charger: ChargerConfig,
    /// User settings consumed by the planner.
    #[serde(default)]
    pub settings: SettingsConfig,
    /// Synthetic day-ahead price feed.
    #[serde(default)]
    pub prices: PriceFeedConfig,
    /// Simulated car behaviour.
    #[serde(default)]
    pub car: CarConfig,
    /// Household load on the main fuse.
    #[serde(default)]
    pub house: HouseConfig,
    /// Simulation timing and seed.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Calendar events visible to the planner.
    #[serde(default)]
    pub calendar: Vec<CalendarEventConfig>,
}

/// Charger hardware and battery parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChargerConfig {
    /// Usable battery capacity (kWh).
    pub battery_capacity_kwh: f64,
    /// Energy lost between grid and battery (percent).
    pub charger_loss_pct: f64,
    /// Fuse limit per phase (A).
    pub max_fuse_amps: f64,
    /// Number of phases (1 or 3).
    pub phases: u8,
    /// Phase voltage (V).
    pub voltage: f64,
}

impl Default for ChargerConfig {
    fn default() -> Self {
        Self {
            battery_capacity_kwh: 64.0,
            charger_loss_pct: 10.0,
            max_fuse_amps: 16.0,
            phases: 3,
            voltage: 230.0,
        }
    }
}

impl ChargerConfig {
    /// Fraction of grid energy that reaches the battery.
    pub fn efficiency(&self) -> f64 {
        1.0 - self.charger_loss_pct / 100.0
    }

    /// Maximum charging power allowed by the fuse (kW).
    pub fn max_power_kw(&self) -> f64 {
        charging_power_kw(self.phases, self.voltage, self.max_fuse_amps)
    }
}

/// User settings consumed by the planner.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsConfig {
    /// Master switch for smart charging.
    pub smart_switch: bool,
    /// Standard target SOC (percent).
    pub base_target_soc: u8,
    /// Standard daily departure (`"HH:MM"`).
    pub departure_time: String,
    /// Fixed fee added to spot prices before VAT.
    pub price_extra_fee: f64,
    /// VAT in percent.
    pub price_vat_pct: f64,
    /// Opportunistic tiers in ascending ceiling order.
    pub tiers: Vec<OpportunisticTier>,
    /// Manual override active at simulation start.
    pub manual_override: Option<ManualOverrideConfig>,
    /// Hysteresis window around scheduled slots (minutes).
    pub buffer_minutes: u32,
    /// When to force a car SOC refresh while plugged in.
    pub car_refresh: RefreshPolicy,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            smart_switch: true,
            base_target_soc: 80,
            departure_time: "07:00".to_string(),
            price_extra_fee: 0.0,
            price_vat_pct: 0.0,
            tiers: Vec::new(),
            manual_override: None,
            buffer_minutes: 15,
            car_refresh: RefreshPolicy::Never,
        }
    }
}

impl SettingsConfig {
    pub fn price_adjustment(&self) -> PriceAdjustment {
        PriceAdjustment {
            extra_fee: self.price_extra_fee,
            vat_pct: self.price_vat_pct,
        }
    }
}

/// Manual override as written in a scenario file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ManualOverrideConfig {
    /// Target SOC for the current session (percent).
    pub target_soc: Option<u8>,
    /// Departure for the current session (`"HH:MM"`, next occurrence).
    pub departure: Option<String>,
}

/// Synthetic day-ahead price feed.
///
/// Prices follow a daily cosine with its minimum at 03:00, plus Gaussian
/// noise. Tomorrow's prices become visible at `publish_hour`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PriceFeedConfig {
    /// Slot length (minutes, must divide a day).
    pub slot_minutes: u32,
    /// Mean spot price per kWh.
    pub base_price: f64,
    /// Daily swing around the mean.
    pub amplitude: f64,
    /// Noise standard deviation.
    pub noise_std: f64,
    /// Hour at which tomorrow's prices are published (0–23).
    pub publish_hour: u32,
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self {
            slot_minutes: 15,
            base_price: 1.0,
            amplitude: 0.4,
            noise_std: 0.05,
            publish_hour: 13,
        }
    }
}

/// Simulated car behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CarConfig {
    /// SOC at simulation start (percent).
    pub initial_soc: f64,
    /// Whether the car is plugged in at simulation start.
    pub plugged_at_start: bool,
    /// Earliest arrival hour after a trip.
    pub arrival_hour_min: u32,
    /// Latest arrival hour after a trip.
    pub arrival_hour_max: u32,
    /// Minimum SOC consumed by a daily trip (percent).
    pub trip_soc_min: f64,
    /// Maximum SOC consumed by a daily trip (percent).
    pub trip_soc_max: f64,
    /// Interval between car SOC sensor reports (minutes).
    pub sensor_refresh_minutes: u32,
}

impl Default for CarConfig {
    fn default() -> Self {
        Self {
            initial_soc: 47.0,
            plugged_at_start: true,
            arrival_hour_min: 16,
            arrival_hour_max: 19,
            trip_soc_min: 15.0,
            trip_soc_max: 35.0,
            sensor_refresh_minutes: 60,
        }
    }
}

/// Household load on the main fuse.
///
/// When enabled, the main meter is read every tick and the charger current
/// is limited to what `charger.max_fuse_amps` leaves on the busiest phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HouseConfig {
    /// Whether a main meter is installed.
    pub enabled: bool,
    /// Mean current on the busiest phase (A).
    pub base_amps: f64,
    /// Daily swing around the mean (A).
    pub swing_amps: f64,
    /// Hour of the daily peak (0–23).
    pub peak_hour: u32,
    /// Noise standard deviation (A).
    pub noise_std: f64,
}

impl Default for HouseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_amps: 4.0,
            swing_amps: 3.0,
            peak_hour: 19,
            noise_std: 0.3,
        }
    }
}

/// Simulation timing and seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationConfig {
    /// Start time (`"YYYY-MM-DDTHH:MM"`, local).
    pub start: String,
    /// Number of days to simulate (must be > 0).
    pub days: usize,
    /// Evaluation interval (minutes, must be > 0).
    pub tick_minutes: u32,
    /// Master random seed.
    pub seed: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start: "2026-02-01T13:30".to_string(),
            days: 2,
            tick_minutes: 15,
            seed: 42,
        }
    }
}

impl SimulationConfig {
    /// Parses `start`.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if `start` is not `YYYY-MM-DDTHH:MM`.
    pub fn start_time(&self) -> Result<NaiveDateTime, ConfigError> {
        NaiveDateTime::parse_from_str(&self.start, DATETIME_FORMAT).map_err(|e| ConfigError {
            field: "simulation.start".into(),
            message: format!("\"{}\" is not YYYY-MM-DDTHH:MM: {e}", self.start),
        })
    }
}

/// Calendar event as written in a scenario file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CalendarEventConfig {
    /// Event start (`"YYYY-MM-DDTHH:MM"`), used as departure.
    pub start: String,
    /// Event summary; a percentage such as `"Trip 90%"` sets the target.
    pub summary: String,
}

/// Configuration error with field path and constraint description.
#[derive(Debug, Clone, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"charger.phases"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl ScenarioConfig {
    /// Returns the baseline scenario: quarter-hour prices, standard target,
    /// car plugged in on a weekday afternoon.
    pub fn baseline() -> Self {
        Self {
            charger: ChargerConfig::default(),
            settings: SettingsConfig::default(),
            prices: PriceFeedConfig::default(),
            car: CarConfig::default(),
            house: HouseConfig::default(),
            simulation: SimulationConfig::default(),
            calendar: Vec::new(),
        }
    }

    /// Returns the cheap-night preset: deep night valley that triggers the
    /// opportunistic tiers.
    pub fn cheap_night() -> Self {
        Self {
            settings: SettingsConfig {
                tiers: vec![
                    OpportunisticTier {
                        price_ceiling: 0.5,
                        target_soc: 100,
                    },
                    OpportunisticTier {
                        price_ceiling: 0.8,
                        target_soc: 90,
                    },
                ],
                ..SettingsConfig::default()
            },
            prices: PriceFeedConfig {
                amplitude: 0.8,
                ..PriceFeedConfig::default()
            },
            ..Self::baseline()
        }
    }

    /// Returns the late-prices preset: tomorrow's prices arrive late in the
    /// evening and the car is nearly empty, so the horizon policy matters.
    pub fn late_prices() -> Self {
        Self {
            prices: PriceFeedConfig {
                publish_hour: 23,
                slot_minutes: 60,
                ..PriceFeedConfig::default()
            },
            car: CarConfig {
                initial_soc: 12.0,
                ..CarConfig::default()
            },
            charger: ChargerConfig {
                max_fuse_amps: 10.0,
                ..ChargerConfig::default()
            },
            settings: SettingsConfig {
                base_target_soc: 90,
                ..SettingsConfig::default()
            },
            ..Self::baseline()
        }
    }

    /// Returns the smart-off preset: charging starts as soon as the car is
    /// plugged in.
    pub fn smart_off() -> Self {
        Self {
            settings: SettingsConfig {
                smart_switch: false,
                ..SettingsConfig::default()
            },
            ..Self::baseline()
        }
    }

    /// Returns the evening-peak preset: smart charging off, a household
    /// whose evening peak leaves too little fuse for the charger, and the
    /// car SOC confirmed once the estimate reaches the target.
    pub fn evening_peak() -> Self {
        Self {
            settings: SettingsConfig {
                smart_switch: false,
                car_refresh: RefreshPolicy::AtTarget,
                ..SettingsConfig::default()
            },
            house: HouseConfig {
                enabled: true,
                base_amps: 9.0,
                swing_amps: 6.0,
                ..HouseConfig::default()
            },
            car: CarConfig {
                initial_soc: 20.0,
                ..CarConfig::default()
            },
            ..Self::baseline()
        }
    }

    /// Available preset names.
    pub const PRESETS: &[&str] = &[
        "baseline",
        "cheap_night",
        "evening_peak",
        "late_prices",
        "smart_off",
    ];

    /// Loads a scenario from a named preset.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the preset name is unknown.
    pub fn from_preset(name: &str) -> Result<Self, ConfigError> {
        match name {
            "baseline" => Ok(Self::baseline()),
            "cheap_night" => Ok(Self::cheap_night()),
            "evening_peak" => Ok(Self::evening_peak()),
            "late_prices" => Ok(Self::late_prices()),
            "smart_off" => Ok(Self::smart_off()),
            _ => Err(ConfigError::new(
                "preset",
                format!(
                    "unknown preset \"{name}\", available: {}",
                    Self::PRESETS.join(", ")
                ),
            )),
        }
    }

    /// Parses a scenario from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or the TOML is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::new("scenario", format!("cannot read \"{}\": {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a scenario from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or contains unknown fields.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        toml::from_str(s).map_err(|e| ConfigError::new("toml", e.to_string()))
    }

    /// Validates all fields and returns a list of errors.
    ///
    /// Returns an empty vector if configuration is valid.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        let c = &self.charger;
        if !(c.battery_capacity_kwh > 0.0) {
            errors.push(ConfigError::new("charger.battery_capacity_kwh", "must be > 0"));
        }
        if !(0.0..100.0).contains(&c.charger_loss_pct) {
            errors.push(ConfigError::new("charger.charger_loss_pct", "must be in [0, 100)"));
        }
        if !(c.max_fuse_amps > 0.0) {
            errors.push(ConfigError::new("charger.max_fuse_amps", "must be > 0"));
        }
        if c.phases != 1 && c.phases != 3 {
            errors.push(ConfigError::new(
                "charger.phases",
                format!("must be 1 or 3, got {}", c.phases),
            ));
        }
        if !(c.voltage > 0.0) {
            errors.push(ConfigError::new("charger.voltage", "must be > 0"));
        }

        let s = &self.settings;
        if s.base_target_soc > 100 {
            errors.push(ConfigError::new("settings.base_target_soc", "must be <= 100"));
        }
        if NaiveTime::parse_from_str(&s.departure_time, TIME_FORMAT).is_err() {
            errors.push(ConfigError::new(
                "settings.departure_time",
                format!("\"{}\" is not HH:MM", s.departure_time),
            ));
        }
        if !(s.price_vat_pct >= 0.0) {
            errors.push(ConfigError::new("settings.price_vat_pct", "must be >= 0"));
        }
        for (i, tier) in s.tiers.iter().enumerate() {
            if tier.target_soc > 100 {
                errors.push(ConfigError::new(
                    format!("settings.tiers[{i}].target_soc"),
                    "must be <= 100",
                ));
            }
            if !tier.price_ceiling.is_finite() {
                errors.push(ConfigError::new(
                    format!("settings.tiers[{i}].price_ceiling"),
                    "must be finite",
                ));
            }
        }
        if s
            .tiers
            .windows(2)
            .any(|w| w[0].price_ceiling >= w[1].price_ceiling)
        {
            errors.push(ConfigError::new(
                "settings.tiers",
                "price ceilings must be strictly ascending",
            ));
        }
        if let Some(o) = &s.manual_override {
            if o.target_soc.is_some_and(|t| t > 100) {
                errors.push(ConfigError::new(
                    "settings.manual_override.target_soc",
                    "must be <= 100",
                ));
            }
            if let Some(d) = &o.departure {
                if NaiveTime::parse_from_str(d, TIME_FORMAT).is_err() {
                    errors.push(ConfigError::new(
                        "settings.manual_override.departure",
                        format!("\"{d}\" is not HH:MM"),
                    ));
                }
            }
        }

        let p = &self.prices;
        if p.slot_minutes == 0 || MINUTES_PER_DAY % p.slot_minutes != 0 {
            errors.push(ConfigError::new(
                "prices.slot_minutes",
                "must be > 0 and divide 1440",
            ));
        }
        if p.publish_hour > 23 {
            errors.push(ConfigError::new("prices.publish_hour", "must be in 0..=23"));
        }
        if !(p.noise_std >= 0.0) {
            errors.push(ConfigError::new("prices.noise_std", "must be >= 0"));
        }

        let car = &self.car;
        if !(0.0..=100.0).contains(&car.initial_soc) {
            errors.push(ConfigError::new("car.initial_soc", "must be in [0, 100]"));
        }
        if car.arrival_hour_min > car.arrival_hour_max {
            errors.push(ConfigError::new(
                "car.arrival_hour_min",
                "must be <= car.arrival_hour_max",
            ));
        }
        if car.arrival_hour_max > 23 {
            errors.push(ConfigError::new("car.arrival_hour_max", "must be in 0..=23"));
        }
        if !(0.0 <= car.trip_soc_min && car.trip_soc_min <= car.trip_soc_max && car.trip_soc_max <= 100.0)
        {
            errors.push(ConfigError::new(
                "car.trip_soc_min",
                "must satisfy 0 <= trip_soc_min <= trip_soc_max <= 100",
            ));
        }

        if car.sensor_refresh_minutes == 0 {
            errors.push(ConfigError::new("car.sensor_refresh_minutes", "must be > 0"));
        }

        let h = &self.house;
        if !(h.base_amps >= 0.0 && h.swing_amps >= 0.0) {
            errors.push(ConfigError::new(
                "house.base_amps",
                "base_amps and swing_amps must be >= 0",
            ));
        }
        if h.peak_hour > 23 {
            errors.push(ConfigError::new("house.peak_hour", "must be in 0..=23"));
        }
        if !(h.noise_std >= 0.0) {
            errors.push(ConfigError::new("house.noise_std", "must be >= 0"));
        }

        let sim = &self.simulation;
        if let Err(e) = sim.start_time() {
            errors.push(e);
        }
        if sim.days == 0 {
            errors.push(ConfigError::new("simulation.days", "must be > 0"));
        }
        if sim.tick_minutes == 0 {
            errors.push(ConfigError::new("simulation.tick_minutes", "must be > 0"));
        }

        for (i, ev) in self.calendar.iter().enumerate() {
            if NaiveDateTime::parse_from_str(&ev.start, DATETIME_FORMAT).is_err() {
                errors.push(ConfigError::new(
                    format!("calendar[{i}].start"),
                    format!("\"{}\" is not YYYY-MM-DDTHH:MM", ev.start),
                ));
            }
        }

        errors
    }
}
