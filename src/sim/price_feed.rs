use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use rand::{SeedableRng, rngs::StdRng};

use crate::config::PriceFeedConfig;
use crate::devices::gaussian_noise;
use crate::prices::{MINUTES_PER_DAY, PriceData};

/// Synthetic day-ahead market.
///
/// Each day's spot prices follow a cosine with its minimum at 03:00 and
/// its maximum at 15:00, plus Gaussian noise. A day's list depends only on
/// the seed and the date, so re-publishing a day yields the same prices.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use ev_charge_planner::config::PriceFeedConfig;
/// use ev_charge_planner::sim::price_feed::PriceFeed;
///
/// let feed = PriceFeed::new(PriceFeedConfig::default(), 42);
/// let day = NaiveDate::from_ymd_opt(2026, 2, 1).unwrap();
/// assert_eq!(feed.day_prices(day).len(), 96);
/// ```
#[derive(Debug, Clone)]
pub struct PriceFeed {
    cfg: PriceFeedConfig,
    seed: u64,
}

impl PriceFeed {
    pub fn new(cfg: PriceFeedConfig, seed: u64) -> Self {
        Self { cfg, seed }
    }

    fn slots_per_day(&self) -> u32 {
        (MINUTES_PER_DAY / self.cfg.slot_minutes.max(1)).max(1)
    }

    /// Spot prices for `day`, one per slot starting at midnight.
    pub fn day_prices(&self, day: NaiveDate) -> Vec<f64> {
        let day_seed = self
            .seed
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(day.num_days_from_ce() as u64);
        let mut rng = StdRng::seed_from_u64(day_seed);
        let n = self.slots_per_day();
        let slot_hours = f64::from(self.cfg.slot_minutes) / 60.0;

        (0..n)
            .map(|i| {
                let mid_hour = (f64::from(i) + 0.5) * slot_hours;
                let phase = 2.0 * std::f64::consts::PI * (mid_hour - 3.0) / 24.0;
                let price = self.cfg.base_price - self.cfg.amplitude * phase.cos()
                    + gaussian_noise(&mut rng, self.cfg.noise_std);
                (price * 10_000.0).round() / 10_000.0
            })
            .collect()
    }

    /// Price data visible at `now`: today always, tomorrow once published.
    pub fn price_data_at(&self, now: NaiveDateTime) -> PriceData {
        let today = now.date();
        let published = now.hour() >= self.cfg.publish_hour;
        PriceData {
            today: self.day_prices(today),
            tomorrow: if published {
                self.day_prices(today + Duration::days(1))
            } else {
                Vec::new()
            },
            tomorrow_valid: published,
        }
    }
}
