use chrono::{Duration, NaiveDateTime, NaiveTime};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::config::CarConfig;
use crate::input::next_occurrence;
use crate::session::{ActuatorError, CarLink};

/// Plug transitions reported by [`SimCar::advance`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CarEvent {
    /// The car left for its daily trip with this SOC.
    Departed { soc: f64 },
    /// The car came back and was plugged in with this SOC.
    Arrived { soc: f64 },
}

/// A commuter car with one trip per day.
///
/// While plugged in, the car leaves at the daily departure time, consumes a
/// random share of its battery on the trip, and is plugged in again at a
/// random time between `arrival_hour_min` and `arrival_hour_max`.
///
/// The SOC sensor is slow: it reports on plug-in and then only every
/// `sensor_refresh` while plugged in, keeping the previous value in
/// between. A remote refresh makes it report at once. The car stops
/// accepting energy at its charge limit.
#[derive(Debug, Clone)]
pub struct SimCar {
    /// Usable battery capacity (kWh).
    pub battery_capacity_kwh: f64,
    /// Fraction of grid energy that reaches the battery.
    pub charger_efficiency: f64,
    /// Daily departure time.
    pub departure_time: NaiveTime,
    pub arrival_hour_min: u32,
    pub arrival_hour_max: u32,
    pub trip_soc_min: f64,
    pub trip_soc_max: f64,
    pub sensor_refresh: Duration,
    soc: f64,
    plugged: bool,
    charge_limit: Option<u8>,
    reported_soc: Option<f64>,
    last_report: Option<NaiveDateTime>,
    next_departure: Option<NaiveDateTime>,
    next_arrival: Option<NaiveDateTime>,
    rng: StdRng,
}

impl SimCar {
    /// Creates a car in the state described by `cfg` at `start`.
    ///
    /// # Arguments
    ///
    /// * `cfg` - Car behaviour (initial SOC, trips, arrival window, sensor)
    /// * `battery_capacity_kwh` - Usable capacity (must be > 0)
    /// * `charger_efficiency` - Grid-to-battery efficiency (0, 1]
    /// * `departure_time` - Daily departure time
    /// * `start` - Simulation start
    /// * `seed` - Random seed for reproducible trips
    ///
    /// # Panics
    ///
    /// Panics if capacity or efficiency are not positive.
    pub fn new(
        cfg: &CarConfig,
        battery_capacity_kwh: f64,
        charger_efficiency: f64,
        departure_time: NaiveTime,
        start: NaiveDateTime,
        seed: u64,
    ) -> Self {
        assert!(battery_capacity_kwh > 0.0);
        assert!(charger_efficiency > 0.0);

        let mut car = Self {
            battery_capacity_kwh,
            charger_efficiency,
            departure_time,
            arrival_hour_min: cfg.arrival_hour_min,
            arrival_hour_max: cfg.arrival_hour_max,
            trip_soc_min: cfg.trip_soc_min,
            trip_soc_max: cfg.trip_soc_max,
            sensor_refresh: Duration::minutes(i64::from(cfg.sensor_refresh_minutes.max(1))),
            soc: cfg.initial_soc.clamp(0.0, 100.0),
            plugged: false,
            charge_limit: None,
            reported_soc: None,
            last_report: None,
            next_departure: None,
            next_arrival: None,
            rng: StdRng::seed_from_u64(seed),
        };
        if cfg.plugged_at_start {
            car.plug_in(start);
        } else {
            car.next_arrival = Some(car.sample_arrival(start));
        }
        car
    }

    fn plug_in(&mut self, now: NaiveDateTime) {
        self.plugged = true;
        self.next_arrival = None;
        self.next_departure = Some(next_occurrence(now, self.departure_time));
        self.report(now);
    }

    fn report(&mut self, now: NaiveDateTime) {
        self.reported_soc = Some(self.soc);
        self.last_report = Some(now);
    }

    fn sample_arrival(&mut self, after: NaiveDateTime) -> NaiveDateTime {
        let hour = self
            .rng
            .random_range(self.arrival_hour_min..=self.arrival_hour_max);
        let minute = self.rng.random_range(0..60);
        let time = NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN);
        next_occurrence(after, time)
    }

    /// Moves the car to `now`, departing or arriving when due.
    ///
    /// # Returns
    ///
    /// The plug transition that happened, if any.
    pub fn advance(&mut self, now: NaiveDateTime) -> Option<CarEvent> {
        if self.plugged {
            if self.next_departure.is_some_and(|d| now >= d) {
                let soc = self.soc;
                self.plugged = false;
                self.next_departure = None;
                let trip = self.rng.random_range(self.trip_soc_min..=self.trip_soc_max);
                self.soc = (self.soc - trip).max(0.0);
                self.next_arrival = Some(self.sample_arrival(now));
                return Some(CarEvent::Departed { soc });
            }
        } else if self.next_arrival.is_some_and(|a| now >= a) {
            self.plug_in(now);
            return Some(CarEvent::Arrived { soc: self.soc });
        }
        None
    }

    /// Returns the sensor value at `now`, refreshing it when due.
    pub fn sensor_soc(&mut self, now: NaiveDateTime) -> Option<f64> {
        let due = self
            .last_report
            .is_none_or(|last| now - last >= self.sensor_refresh);
        if self.plugged && due {
            self.report(now);
        }
        self.reported_soc
    }

    fn ceiling(&self) -> f64 {
        self.charge_limit.map_or(100.0, |l| f64::from(l.min(100)))
    }

    /// Grid power the car can accept for a tick of `dt_hours` before it
    /// reaches its charge limit.
    pub fn acceptance_kw(&self, dt_hours: f64) -> f64 {
        if !self.plugged || dt_hours <= 0.0 {
            return 0.0;
        }
        let missing_kwh = (self.ceiling() - self.soc) / 100.0 * self.battery_capacity_kwh;
        (missing_kwh / self.charger_efficiency / dt_hours).max(0.0)
    }

    /// Stores energy drawn at `power_kw` for `dt_hours`.
    pub fn absorb(&mut self, power_kw: f64, dt_hours: f64) {
        if power_kw <= 0.0 {
            return;
        }
        let stored_kwh = power_kw * dt_hours * self.charger_efficiency;
        let charged = self.soc + stored_kwh / self.battery_capacity_kwh * 100.0;
        self.soc = charged.min(self.ceiling().max(self.soc));
    }

    pub fn charge_limit(&self) -> Option<u8> {
        self.charge_limit
    }

    pub fn soc(&self) -> f64 {
        self.soc
    }

    pub fn is_plugged(&self) -> bool {
        self.plugged
    }

    pub fn next_departure(&self) -> Option<NaiveDateTime> {
        self.next_departure
    }

    pub fn next_arrival(&self) -> Option<NaiveDateTime> {
        self.next_arrival
    }
}

impl CarLink for SimCar {
    fn set_charge_limit(&mut self, soc: u8) -> Result<(), ActuatorError> {
        self.charge_limit = Some(soc.min(100));
        Ok(())
    }

    fn request_refresh(&mut self, now: NaiveDateTime) -> Result<(), ActuatorError> {
        if !self.plugged {
            return Err(ActuatorError::Unavailable("car is away".to_string()));
        }
        self.report(now);
        Ok(())
    }
}
