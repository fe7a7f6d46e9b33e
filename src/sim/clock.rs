use chrono::{Duration, NaiveDateTime};

/// A simulation clock that walks wall-clock time in fixed ticks.
///
/// The `Clock` provides methods to advance time tick-by-tick or run a
/// function at each tick until completion.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, NaiveDate};
/// use ev_charge_planner::sim::clock::Clock;
///
/// let start = NaiveDate::from_ymd_opt(2026, 2, 1)
///     .and_then(|d| d.and_hms_opt(0, 0, 0))
///     .unwrap();
/// let mut clock = Clock::new(start, Duration::minutes(15), 3);
/// let mut times = Vec::new();
///
/// clock.run(|_, now| times.push(now));
/// assert_eq!(times.len(), 3);
/// assert_eq!(times[2] - times[0], Duration::minutes(30));
/// ```
pub struct Clock {
    start: NaiveDateTime,
    tick: Duration,
    /// Current tick of the simulation
    current: usize,
    /// Total ticks to run in the simulation
    total: usize,
}

impl Clock {
    /// Creates a new clock.
    ///
    /// # Arguments
    ///
    /// * `start` - Time of the first tick
    /// * `tick` - Interval between ticks
    /// * `total` - The total number of ticks the clock will run
    pub fn new(start: NaiveDateTime, tick: Duration, total: usize) -> Self {
        Self {
            start,
            tick,
            current: 0,
            total,
        }
    }

    /// Advances the clock by one tick.
    ///
    /// # Returns
    ///
    /// * `Some((index, time))` - The tick index (starting from 0) and its time
    /// * `None` - If the clock has reached its total ticks
    pub fn tick(&mut self) -> Option<(usize, NaiveDateTime)> {
        if self.current < self.total {
            let index = self.current;
            self.current += 1;
            Some((index, self.time_of(index)))
        } else {
            None
        }
    }

    /// Time of tick `index`.
    pub fn time_of(&self, index: usize) -> NaiveDateTime {
        self.start + self.tick * i32::try_from(index).unwrap_or(i32::MAX)
    }

    /// Tick length in hours.
    pub fn dt_hours(&self) -> f64 {
        self.tick.num_seconds() as f64 / 3600.0
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Runs a function for each remaining tick.
    ///
    /// # Arguments
    ///
    /// * `f` - A function that takes the tick index and its time
    pub fn run(&mut self, mut f: impl FnMut(usize, NaiveDateTime)) {
        while let Some((index, now)) = self.tick() {
            f(index, now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 1)
            .and_then(|d| d.and_hms_opt(13, 30, 0))
            .unwrap()
    }

    #[test]
    fn test_new_clock() {
        let clock = Clock::new(start(), Duration::minutes(15), 5);
        assert_eq!(clock.current, 0);
        assert_eq!(clock.total(), 5);
        assert_eq!(clock.dt_hours(), 0.25);
    }

    #[test]
    fn test_tick() {
        let mut clock = Clock::new(start(), Duration::minutes(15), 2);
        assert_eq!(clock.tick(), Some((0, start())));
        assert_eq!(clock.tick(), Some((1, start() + Duration::minutes(15))));
        assert_eq!(clock.tick(), None);
    }

    #[test]
    fn test_run_crosses_midnight() {
        let mut clock = Clock::new(start(), Duration::hours(6), 3);
        let mut times = Vec::new();

        clock.run(|_, now| times.push(now));

        assert_eq!(times[2].date(), start().date().succ_opt().unwrap());
    }

    #[test]
    fn test_empty_clock() {
        let mut clock = Clock::new(start(), Duration::minutes(15), 0);
        assert_eq!(clock.tick(), None);

        let mut was_called = false;
        clock.run(|_, _| was_called = true);
        assert!(!was_called);
    }
}
