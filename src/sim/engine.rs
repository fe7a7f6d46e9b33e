//! Simulation engine that stands in for the host automation platform.

use chrono::{Duration, NaiveDateTime};
use tracing::{debug, info};

use crate::config::ScenarioConfig;
use crate::devices::{CarEvent, Device, DeviceContext, HouseLoad, SimCar, SimCharger};
use crate::diagnostics::DiagnosticSnapshot;
use crate::error::Result;
use crate::input::{InputAssembler, SensorReadings, parse_time_of_day};
use crate::planner::{PlanOutcome, PlanningInput};
use crate::prices::PriceData;
use crate::session::{
    ActuatorCommand, CarController, PhaseCurrents, SessionReport, SessionTracker,
    available_current,
};

use super::clock::Clock;
use super::price_feed::PriceFeed;
use super::types::{DepartureRecord, StepResult};

/// Inputs of the most recent evaluation, kept for diagnostic capture.
#[derive(Debug, Clone)]
struct Evaluation {
    sensors: SensorReadings,
    prices: PriceData,
    input: PlanningInput,
}

/// Simulation engine owning the price feed, the car, the charger, the house
/// load, and the planner-side state (input assembler, session tracker and
/// car controller).
///
/// Each tick follows the host's order of events: the car moves, sensors,
/// meter and prices are read, a snapshot is assembled, the tracker re-plans
/// and drives the charger, the car gets its limit and refreshes, and the
/// charger delivers energy for the tick.
pub struct Engine {
    start: NaiveDateTime,
    tick: Duration,
    total_ticks: usize,
    feed: PriceFeed,
    assembler: InputAssembler,
    tracker: SessionTracker,
    car: SimCar,
    charger: SimCharger,
    car_control: CarController,
    house: Option<HouseLoad>,
    fuse_amps: f64,
    single_phase: bool,
    last_power_kw: f64,
    last_target: Option<u8>,
    last_evaluation: Option<Evaluation>,
    reports: Vec<SessionReport>,
}

impl Engine {
    /// Builds an engine from a scenario.
    ///
    /// # Errors
    ///
    /// Returns an error if a time field in the scenario cannot be parsed.
    /// The scenario is expected to have passed
    /// [`ScenarioConfig::validate`].
    pub fn from_config(cfg: &ScenarioConfig) -> Result<Self> {
        let start = cfg.simulation.start_time()?;
        let tick = Duration::minutes(i64::from(cfg.simulation.tick_minutes.max(1)));
        let ticks_per_day = (24 * 60 / i64::from(cfg.simulation.tick_minutes.max(1))).max(1);
        let total_ticks = usize::try_from(ticks_per_day).unwrap_or(1) * cfg.simulation.days;

        let assembler = InputAssembler::from_config(cfg)?;
        let departure_time = parse_time_of_day(&cfg.settings.departure_time)?;
        let car = SimCar::new(
            &cfg.car,
            cfg.charger.battery_capacity_kwh,
            cfg.charger.efficiency(),
            departure_time,
            start,
            cfg.simulation.seed.wrapping_add(1),
        );
        let charger = SimCharger::new(cfg.charger.max_power_kw())
            .with_supply(cfg.charger.phases, cfg.charger.voltage);
        let house = cfg.house.enabled.then(|| {
            HouseLoad::new(
                &cfg.house,
                cfg.charger.voltage,
                cfg.simulation.seed.wrapping_add(2),
            )
        });
        let tracker = SessionTracker::new(Duration::minutes(i64::from(
            cfg.settings.buffer_minutes,
        )));

        Ok(Self {
            start,
            tick,
            total_ticks,
            feed: PriceFeed::new(cfg.prices.clone(), cfg.simulation.seed),
            assembler,
            tracker,
            car,
            charger,
            car_control: CarController::new(cfg.settings.car_refresh),
            house,
            fuse_amps: cfg.charger.max_fuse_amps,
            single_phase: cfg.charger.phases == 1,
            last_power_kw: 0.0,
            last_target: None,
            last_evaluation: None,
            reports: Vec::new(),
        })
    }

    /// Charger current per phase while drawing `power_kw`.
    fn charger_currents(&self, power_kw: f64) -> PhaseCurrents {
        let amps = self.charger.phase_current(power_kw);
        if self.single_phase {
            PhaseCurrents([amps, 0.0, 0.0])
        } else {
            PhaseCurrents::balanced(amps)
        }
    }

    fn dt_hours(&self) -> f64 {
        self.tick.num_seconds() as f64 / 3600.0
    }

    /// Executes one tick at `now` and returns its record.
    ///
    /// # Arguments
    ///
    /// * `t` - Tick index
    /// * `now` - Start of the tick
    pub fn step(&mut self, t: usize, now: NaiveDateTime) -> StepResult {
        let dt_hours = self.dt_hours();

        // 1. Car leaves or arrives
        let departure = match self.car.advance(now) {
            Some(CarEvent::Departed { soc }) => {
                let record = DepartureRecord {
                    soc,
                    target_soc: self.last_target.unwrap_or(0),
                };
                info!(%now, soc, target = record.target_soc, met = record.met(), "car departed");
                Some(record)
            }
            Some(CarEvent::Arrived { soc }) => {
                info!(%now, soc, "car arrived");
                None
            }
            None => None,
        };

        // 2. Read sensors, meter and prices, assemble the planner snapshot
        let mut sensors =
            SensorReadings::new(now, self.car.is_plugged(), self.car.sensor_soc(now));
        let own = self.charger_currents(self.last_power_kw);
        if let Some(house) = self.house.as_mut() {
            sensors.grid_current = Some(house.currents(now) + own);
            sensors.charger_current = Some(own);
        }
        let available = sensors
            .grid_current
            .map(|grid| available_current(self.fuse_amps, &grid, sensors.charger_current.as_ref()));
        let prices = self.feed.price_data_at(now);
        let input = self
            .assembler
            .assemble(&sensors, &prices, self.last_power_kw > 0.0);

        // 3. Re-plan and drive the charger
        let was_on = self.charger.is_on();
        self.tracker.sync_actuator(was_on);
        self.tracker.set_available_current(available);
        let plan = self.tracker.drive(&input, &mut self.charger);
        let command = (self.charger.is_on() != was_on)
            .then(|| ActuatorCommand::toward(self.charger.is_on()));

        // 4. Keep the car's limit on the target and refresh its SOC
        let actions = self.car_control.drive(
            now,
            &plan,
            input.car_soc,
            self.charger.is_on(),
            &mut self.car,
        );
        if let Some(limit) = actions.charge_limit {
            self.assembler.set_charge_limit(limit);
        }
        if actions.refreshed {
            let fresh = self.car.sensor_soc(now);
            let soc = self.assembler.note_refresh(now, sensors.car_soc, fresh);
            debug!(soc, "estimate after car refresh");
        }

        if departure.is_some() {
            if let Some(report) = self.tracker.last_report() {
                self.reports.push(report.clone());
            }
        }

        // 5. Deliver energy for the tick
        let context = DeviceContext::with_setpoint(now, dt_hours, self.car.acceptance_kw(dt_hours));
        let power_kw = self.charger.power_kw(&context);
        self.car.absorb(power_kw, dt_hours);
        self.last_power_kw = power_kw;

        if plan.outcome != PlanOutcome::CarNotPlugged {
            self.last_target = Some(plan.target_soc);
        }
        debug!(t, %plan, "tick evaluated");

        let result = StepResult {
            timestep: t,
            time: now,
            plugged: input.car_plugged,
            car_soc: self.car.soc(),
            estimated_soc: input.car_soc,
            charging: self.charger.is_on(),
            power_kw,
            price: input.current_slot().map(|s| s.price),
            target_soc: plan.target_soc,
            outcome: plan.outcome,
            state: self.tracker.state(),
            buffer_active: self.tracker.buffer_active(),
            available_current: available,
            load_limited: self.tracker.load_limited(),
            command,
            departure,
        };

        self.last_evaluation = Some(Evaluation {
            sensors,
            prices,
            input,
        });
        result
    }

    /// Executes all ticks and returns the complete step record vector.
    pub fn run(&mut self) -> Vec<StepResult> {
        let mut clock = Clock::new(self.start, self.tick, self.total_ticks);
        let mut results = Vec::with_capacity(self.total_ticks);
        clock.run(|t, now| results.push(self.step(t, now)));
        results
    }

    /// Captures a diagnostic snapshot of the most recent evaluation.
    ///
    /// Returns `None` before the first tick.
    pub fn snapshot(&self, description: &str) -> Option<DiagnosticSnapshot> {
        let eval = self.last_evaluation.as_ref()?;
        Some(DiagnosticSnapshot::capture(
            description,
            &self.assembler,
            &eval.sensors,
            &eval.prices,
            &self.tracker,
            &eval.input,
        ))
    }

    /// Reports of sessions that ended with a departure.
    pub fn reports(&self) -> &[SessionReport] {
        &self.reports
    }

    pub fn tracker(&self) -> &SessionTracker {
        &self.tracker
    }

    pub fn car(&self) -> &SimCar {
        &self.car
    }

    pub fn car_control(&self) -> &CarController {
        &self.car_control
    }

    /// Mutable access to the charger, e.g. to inject command failures.
    pub fn charger_mut(&mut self) -> &mut SimCharger {
        &mut self.charger
    }

    pub fn assembler_mut(&mut self) -> &mut InputAssembler {
        &mut self.assembler
    }

    /// Tick length in hours.
    pub fn tick_hours(&self) -> f64 {
        self.dt_hours()
    }

    pub fn total_ticks(&self) -> usize {
        self.total_ticks
    }
}
