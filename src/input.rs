//! Assembly of [`PlanningInput`] snapshots from settings, sensors, calendar
//! events, and raw price data.

use chrono::{Duration, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::{DATETIME_FORMAT, ScenarioConfig, TIME_FORMAT};
use crate::error::{Error, Result};
use crate::planner::{CalendarTarget, ManualOverride, OpportunisticTier, PlanningInput};
use crate::prices::{PriceAdjustment, PriceData};
use crate::session::PhaseCurrents;

/// Calendar events further ahead than this are ignored.
const CALENDAR_LOOKAHEAD_HOURS: i64 = 48;
/// After a forced refresh, a changed sensor reading is trusted even when lower.
const REFRESH_TRUST_MINUTES: i64 = 5;

/// Fixed charger and battery parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChargerProfile {
    pub battery_capacity_kwh: f64,
    pub charger_efficiency: f64,
    pub max_charging_power_kw: f64,
}

/// Manual override as entered by the user, with a daily departure time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverrideSetting {
    pub target_soc: Option<u8>,
    pub departure_time: Option<NaiveTime>,
}

/// User-adjustable planner settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    pub smart_switch: bool,
    pub base_target_soc: u8,
    pub departure_time: NaiveTime,
    pub tiers: Vec<OpportunisticTier>,
    pub price_adjustment: PriceAdjustment,
    pub manual_override: Option<OverrideSetting>,
}

/// Calendar entry visible to the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub start: NaiveDateTime,
    pub summary: String,
}

/// Raw sensor readings for one evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReadings {
    pub now: NaiveDateTime,
    pub car_plugged: bool,
    /// Last reported SOC, `None` when the car has not reported.
    pub car_soc: Option<f64>,
    /// Main meter current per phase, when a meter is installed.
    #[serde(default)]
    pub grid_current: Option<PhaseCurrents>,
    /// Charger's own current per phase, when it reports one.
    #[serde(default)]
    pub charger_current: Option<PhaseCurrents>,
}

impl SensorReadings {
    /// Readings without meter data.
    pub fn new(now: NaiveDateTime, car_plugged: bool, car_soc: Option<f64>) -> Self {
        Self {
            now,
            car_plugged,
            car_soc,
            grid_current: None,
            charger_current: None,
        }
    }
}

/// Forced sensor refresh awaiting a fresh reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct RefreshMark {
    at: NaiveDateTime,
    sensor_before: Option<f64>,
}

/// Estimated SOC between car sensor updates.
///
/// Car SOC sensors refresh slowly. While charging, the estimate integrates
/// delivered energy up to the car's charge limit; a sensor reading replaces
/// the estimate only when it is higher, the estimate is uninitialized, or
/// the reading changed shortly after a forced refresh.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SocEstimator {
    estimate: f64,
    last_update: Option<NaiveDateTime>,
    charge_limit: Option<u8>,
    refresh: Option<RefreshMark>,
}

impl SocEstimator {
    /// Restarts the estimate from a fresh reading (used on plug-in).
    pub fn reset(&mut self, now: NaiveDateTime, sensor: Option<f64>) {
        self.estimate = sensor.unwrap_or(0.0).clamp(0.0, 100.0);
        self.last_update = Some(now);
    }

    /// Advances the estimate to `now` and returns it.
    ///
    /// # Arguments
    ///
    /// * `now` - Evaluation time
    /// * `sensor` - Latest sensor reading, if any
    /// * `charging_kw` - Grid power drawn since the last update (0 when idle)
    /// * `profile` - Battery capacity and charger efficiency
    pub fn update(
        &mut self,
        now: NaiveDateTime,
        sensor: Option<f64>,
        charging_kw: f64,
        profile: &ChargerProfile,
    ) -> f64 {
        let trusted = self.refresh.as_ref().is_some_and(|mark| {
            now - mark.at < Duration::minutes(REFRESH_TRUST_MINUTES)
                && sensor.is_some()
                && sensor != mark.sensor_before
        });
        if let Some(soc) = sensor.filter(|s| s.is_finite()) {
            if soc > self.estimate || self.estimate == 0.0 || trusted {
                self.estimate = soc;
            }
        }

        if let Some(prev) = self.last_update {
            let hours = (now - prev).num_seconds().max(0) as f64 / 3600.0;
            if charging_kw > 0.0 && profile.battery_capacity_kwh > 0.0 {
                let added_kwh = charging_kw * hours * profile.charger_efficiency;
                self.estimate += added_kwh / profile.battery_capacity_kwh * 100.0;
                if let Some(limit) = self.charge_limit {
                    self.estimate = self.estimate.min(f64::from(limit));
                }
            }
        }
        self.estimate = self.estimate.clamp(0.0, 100.0);
        self.last_update = Some(now);
        self.estimate
    }

    pub fn estimate(&self) -> f64 {
        self.estimate
    }

    /// Records a forced refresh; `sensor_before` is the reading at that time.
    pub fn note_refresh(&mut self, now: NaiveDateTime, sensor_before: Option<f64>) {
        self.refresh = Some(RefreshMark {
            at: now,
            sensor_before,
        });
    }

    /// Sets the charge limit the car accepted.
    pub fn set_charge_limit(&mut self, limit: Option<u8>) {
        self.charge_limit = limit;
    }
}

/// Builds planner snapshots and owns the per-charger user state.
#[derive(Debug, Clone)]
pub struct InputAssembler {
    charger: ChargerProfile,
    settings: UserSettings,
    calendar: Vec<CalendarEvent>,
    soc: SocEstimator,
    previous_plugged: bool,
}

impl InputAssembler {
    pub fn new(charger: ChargerProfile, settings: UserSettings, calendar: Vec<CalendarEvent>) -> Self {
        Self {
            charger,
            settings,
            calendar,
            soc: SocEstimator::default(),
            previous_plugged: false,
        }
    }

    /// Builds an assembler from a validated scenario.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TimeOfDay`] or [`Error::Config`] if a time field
    /// cannot be parsed.
    pub fn from_config(cfg: &ScenarioConfig) -> Result<Self> {
        let charger = ChargerProfile {
            battery_capacity_kwh: cfg.charger.battery_capacity_kwh,
            charger_efficiency: cfg.charger.efficiency(),
            max_charging_power_kw: cfg.charger.max_power_kw(),
        };

        let s = &cfg.settings;
        let manual_override = match &s.manual_override {
            Some(o) => Some(OverrideSetting {
                target_soc: o.target_soc,
                departure_time: o.departure.as_deref().map(parse_time_of_day).transpose()?,
            }),
            None => None,
        };
        let settings = UserSettings {
            smart_switch: s.smart_switch,
            base_target_soc: s.base_target_soc,
            departure_time: parse_time_of_day(&s.departure_time)?,
            tiers: s.tiers.clone(),
            price_adjustment: s.price_adjustment(),
            manual_override,
        };

        let calendar = cfg
            .calendar
            .iter()
            .map(|e| {
                NaiveDateTime::parse_from_str(&e.start, DATETIME_FORMAT)
                    .map(|start| CalendarEvent {
                        start,
                        summary: e.summary.clone(),
                    })
                    .map_err(|_| Error::TimeOfDay {
                        value: e.start.clone(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::new(charger, settings, calendar))
    }

    /// Builds the snapshot for one evaluation.
    ///
    /// On the unplug edge the manual override is cleared so the next session
    /// starts from the standard settings. On the plug-in edge the SOC
    /// estimate restarts from the sensor.
    ///
    /// # Arguments
    ///
    /// * `sensors` - Current sensor readings
    /// * `prices` - Raw price data for the current day
    /// * `charging` - Whether the charger was on since the previous evaluation
    pub fn assemble(
        &mut self,
        sensors: &SensorReadings,
        prices: &PriceData,
        charging: bool,
    ) -> PlanningInput {
        let now = sensors.now;

        if sensors.car_plugged && !self.previous_plugged {
            self.soc.reset(now, sensors.car_soc);
        }
        if !sensors.car_plugged && self.previous_plugged && self.settings.manual_override.is_some() {
            info!("car unplugged, resetting manual override");
            self.settings.manual_override = None;
        }
        self.previous_plugged = sensors.car_plugged;

        let charging_kw = if charging {
            self.charger.max_charging_power_kw
        } else {
            0.0
        };
        let car_soc = self
            .soc
            .update(now, sensors.car_soc, charging_kw, &self.charger);

        let slots = match prices.horizon(now.date(), self.settings.price_adjustment) {
            Ok(slots) => slots,
            Err(e) => {
                warn!(error = %e, "discarding unusable price data");
                Vec::new()
            }
        };

        let manual_override = self.settings.manual_override.as_ref().map(|o| ManualOverride {
            target_soc: o.target_soc,
            departure: o.departure_time.map(|t| next_occurrence(now, t)),
        });

        PlanningInput {
            now,
            car_plugged: sensors.car_plugged,
            car_soc,
            smart_switch: self.settings.smart_switch,
            manual_override,
            calendar_event: upcoming_calendar_target(&self.calendar, now),
            opportunistic_tiers: self.settings.tiers.clone(),
            base_target_soc: self.settings.base_target_soc,
            standard_departure: Some(next_occurrence(now, self.settings.departure_time)),
            battery_capacity_kwh: self.charger.battery_capacity_kwh,
            charger_efficiency: self.charger.charger_efficiency,
            max_charging_power_kw: self.charger.max_charging_power_kw,
            prices: slots,
            tomorrow_valid: prices.tomorrow_valid,
        }
    }

    pub fn set_manual_override(&mut self, setting: Option<OverrideSetting>) {
        self.settings.manual_override = setting;
    }

    pub fn set_smart_switch(&mut self, on: bool) {
        self.settings.smart_switch = on;
    }

    pub fn settings(&self) -> &UserSettings {
        &self.settings
    }

    pub fn charger(&self) -> &ChargerProfile {
        &self.charger
    }

    pub fn soc_estimate(&self) -> f64 {
        self.soc.estimate()
    }

    /// Caps further SOC integration at the limit the car accepted.
    pub fn set_charge_limit(&mut self, limit: u8) {
        self.soc.set_charge_limit(Some(limit));
    }

    /// Records a forced car refresh and folds in the reading that followed
    /// it. A reading that differs from `sensor_before` is trusted for a few
    /// minutes even when it is lower than the estimate.
    ///
    /// Returns the updated estimate.
    pub fn note_refresh(
        &mut self,
        now: NaiveDateTime,
        sensor_before: Option<f64>,
        sensor_after: Option<f64>,
    ) -> f64 {
        self.soc.note_refresh(now, sensor_before);
        self.soc.update(now, sensor_after, 0.0, &self.charger)
    }
}

/// Parses `"HH:MM"`.
///
/// # Errors
///
/// Returns [`Error::TimeOfDay`] for anything else.
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), TIME_FORMAT).map_err(|_| Error::TimeOfDay {
        value: value.to_string(),
    })
}

/// First occurrence of `time` strictly after `now`.
pub fn next_occurrence(now: NaiveDateTime, time: NaiveTime) -> NaiveDateTime {
    let candidate = now.date().and_time(time);
    if candidate > now {
        candidate
    } else {
        candidate + Duration::days(1)
    }
}

/// Extracts a percentage such as `"90%"` from free text.
pub fn parse_target_percentage(summary: &str) -> Option<u8> {
    let bytes = summary.as_bytes();
    summary.match_indices('%').find_map(|(idx, _)| {
        let digits_start = bytes[..idx]
            .iter()
            .rposition(|b| !b.is_ascii_digit())
            .map_or(0, |p| p + 1);
        let digits = &summary[digits_start..idx];
        if digits.is_empty() || digits.len() > 3 {
            return None;
        }
        digits.parse::<u8>().ok().filter(|&v| v <= 100)
    })
}

/// Earliest upcoming event within the lookahead whose summary names a target.
pub fn upcoming_calendar_target(
    events: &[CalendarEvent],
    now: NaiveDateTime,
) -> Option<CalendarTarget> {
    let horizon = now + Duration::hours(CALENDAR_LOOKAHEAD_HOURS);
    events
        .iter()
        .filter(|e| e.start > now && e.start <= horizon)
        .filter_map(|e| {
            parse_target_percentage(&e.summary).map(|soc| CalendarTarget {
                target_soc: Some(soc),
                departure: e.start,
            })
        })
        .min_by_key(|t| t.departure)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, day)
            .and_then(|d| d.and_hms_opt(h, m, 0))
            .unwrap()
    }

    fn seven() -> NaiveTime {
        NaiveTime::from_hms_opt(7, 0, 0).unwrap()
    }

    fn assembler() -> InputAssembler {
        let cfg = ScenarioConfig::baseline();
        InputAssembler::from_config(&cfg).unwrap()
    }

    #[test]
    fn next_occurrence_rolls_over() {
        assert_eq!(next_occurrence(at(1, 13, 28), seven()), at(2, 7, 0));
        assert_eq!(next_occurrence(at(2, 6, 0), seven()), at(2, 7, 0));
        assert_eq!(next_occurrence(at(2, 7, 0), seven()), at(3, 7, 0));
    }

    #[test]
    fn percentage_parsing() {
        assert_eq!(parse_target_percentage("Trip to Oslo 90%"), Some(90));
        assert_eq!(parse_target_percentage("100% airport"), Some(100));
        assert_eq!(parse_target_percentage("dentist"), None);
        assert_eq!(parse_target_percentage("150% nonsense"), None);
        assert_eq!(parse_target_percentage("a % b 85%"), Some(85));
    }

    #[test]
    fn calendar_picks_earliest_with_target() {
        let events = vec![
            CalendarEvent {
                start: at(2, 9, 0),
                summary: "Trip 95%".into(),
            },
            CalendarEvent {
                start: at(2, 6, 0),
                summary: "Meeting".into(),
            },
            CalendarEvent {
                start: at(5, 6, 0),
                summary: "Far away 100%".into(),
            },
        ];
        let t = upcoming_calendar_target(&events, at(1, 20, 0));
        assert_eq!(
            t,
            Some(CalendarTarget {
                target_soc: Some(95),
                departure: at(2, 9, 0)
            })
        );
    }

    #[test]
    fn unplug_clears_manual_override() {
        let mut a = assembler();
        a.set_manual_override(Some(OverrideSetting {
            target_soc: Some(100),
            departure_time: None,
        }));
        let prices = PriceData::default();
        let plugged = SensorReadings::new(at(1, 18, 0), true, Some(40.0));
        let input = a.assemble(&plugged, &prices, false);
        assert_eq!(input.manual_override.and_then(|o| o.target_soc), Some(100));

        let unplugged = SensorReadings {
            car_plugged: false,
            now: at(1, 19, 0),
            ..plugged
        };
        let input = a.assemble(&unplugged, &prices, false);
        assert!(input.manual_override.is_none());
        assert!(a.settings().manual_override.is_none());
    }

    #[test]
    fn soc_estimate_integrates_while_charging() {
        let profile = ChargerProfile {
            battery_capacity_kwh: 50.0,
            charger_efficiency: 0.9,
            max_charging_power_kw: 10.0,
        };
        let mut est = SocEstimator::default();
        est.reset(at(1, 0, 0), Some(40.0));
        // 10 kW for 1 h at 90% = 9 kWh = 18% of 50 kWh.
        let soc = est.update(at(1, 1, 0), Some(40.0), 10.0, &profile);
        assert!((soc - 58.0).abs() < 1e-9);
        // A stale lower reading does not pull the estimate down.
        let soc = est.update(at(1, 1, 15), Some(41.0), 0.0, &profile);
        assert!((soc - 58.0).abs() < 1e-9);
        // A higher reading wins.
        let soc = est.update(at(1, 1, 30), Some(60.0), 0.0, &profile);
        assert!((soc - 60.0).abs() < 1e-9);
    }

    fn profile() -> ChargerProfile {
        ChargerProfile {
            battery_capacity_kwh: 50.0,
            charger_efficiency: 1.0,
            max_charging_power_kw: 10.0,
        }
    }

    #[test]
    fn changed_reading_after_refresh_is_trusted() {
        let mut est = SocEstimator::default();
        est.reset(at(1, 0, 0), Some(60.0));
        // Two hours at 10 kW assumed, but the car took less.
        est.update(at(1, 2, 0), Some(60.0), 10.0, &profile());
        assert!((est.estimate() - 100.0).abs() < 1e-9);

        est.note_refresh(at(1, 2, 0), Some(60.0));
        // Unchanged reading inside the window: still stale.
        assert!((est.update(at(1, 2, 1), Some(60.0), 0.0, &profile()) - 100.0).abs() < 1e-9);
        // Fresh lower reading inside the window wins.
        assert!((est.update(at(1, 2, 3), Some(88.0), 0.0, &profile()) - 88.0).abs() < 1e-9);
        // After the window a lower reading is ignored again.
        assert!((est.update(at(1, 2, 10), Some(70.0), 0.0, &profile()) - 88.0).abs() < 1e-9);
    }

    #[test]
    fn estimate_stops_at_car_charge_limit() {
        let mut est = SocEstimator::default();
        est.reset(at(1, 0, 0), Some(70.0));
        est.set_charge_limit(Some(80));
        // 10 kWh would be +20%, the car stops at 80%.
        let soc = est.update(at(1, 1, 0), None, 10.0, &profile());
        assert!((soc - 80.0).abs() < 1e-9);
        // A reading above the limit is still accepted.
        let soc = est.update(at(1, 1, 15), Some(81.0), 0.0, &profile());
        assert!((soc - 81.0).abs() < 1e-9);
    }

    #[test]
    fn assembler_takes_lower_reading_after_refresh() {
        let mut a = assembler();
        let prices = PriceData::default();
        a.assemble(&SensorReadings::new(at(1, 0, 0), true, Some(60.0)), &prices, false);
        let charged = a.assemble(&SensorReadings::new(at(1, 1, 0), true, Some(60.0)), &prices, true);
        assert!(charged.car_soc > 60.0);

        // Stale reading alone never lowers the estimate.
        let stale = a.assemble(&SensorReadings::new(at(1, 1, 15), true, Some(60.0)), &prices, false);
        assert!((stale.car_soc - charged.car_soc).abs() < 1e-9);

        let soc = a.note_refresh(at(1, 1, 15), Some(60.0), Some(63.0));
        assert!((soc - 63.0).abs() < 1e-9);
        assert!((a.soc_estimate() - 63.0).abs() < 1e-9);
    }

    #[test]
    fn bad_price_data_becomes_empty_horizon() {
        let mut a = assembler();
        let prices = PriceData {
            today: vec![1.0; 7],
            ..PriceData::default()
        };
        let sensors = SensorReadings::new(at(1, 12, 0), true, Some(50.0));
        let input = a.assemble(&sensors, &prices, false);
        assert!(input.prices.is_empty());
    }
}
