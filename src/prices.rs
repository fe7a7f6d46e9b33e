//! Day-ahead price data and horizon assembly.
//!
//! Price sources publish one list per day: `today` is always present once
//! published, `tomorrow` stays empty until the next day's auction closes and
//! is only trusted when `tomorrow_valid` is set. The slot length is implied
//! by the list length (24 hourly or 96 quarter-hourly entries).

use chrono::{Duration, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::planner::PriceSlot;

/// Minutes in a (DST-free) day.
pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Raw spot prices for today and tomorrow.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceData {
    pub today: Vec<f64>,
    #[serde(default)]
    pub tomorrow: Vec<f64>,
    #[serde(default)]
    pub tomorrow_valid: bool,
}

/// Grid fee and VAT applied on top of spot prices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceAdjustment {
    /// Fixed fee added per kWh before VAT.
    pub extra_fee: f64,
    /// VAT in percent.
    pub vat_pct: f64,
}

impl PriceAdjustment {
    /// Returns `(spot + extra_fee) × (1 + vat_pct / 100)`.
    pub fn apply(&self, spot: f64) -> f64 {
        (spot + self.extra_fee) * (1.0 + self.vat_pct / 100.0)
    }
}

/// Infers the slot length in minutes from the number of daily entries.
///
/// Returns `None` for empty lists and lengths that do not divide a day.
pub fn slot_minutes_for(len: usize) -> Option<u32> {
    let len = u32::try_from(len).ok()?;
    if len == 0 || MINUTES_PER_DAY % len != 0 {
        return None;
    }
    Some(MINUTES_PER_DAY / len)
}

impl PriceData {
    /// Converts one day's list into slots starting at midnight of `day`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PriceData`] if the list length does not map to a
    /// whole number of minutes per slot.
    pub fn day_slots(
        prices: &[f64],
        day: NaiveDate,
        adjustment: PriceAdjustment,
    ) -> Result<Vec<PriceSlot>> {
        if prices.is_empty() {
            return Ok(Vec::new());
        }
        let minutes = slot_minutes_for(prices.len()).ok_or_else(|| {
            Error::PriceData(format!(
                "{} entries for {day} do not divide a day into whole minutes",
                prices.len()
            ))
        })?;
        let midnight = day.and_time(NaiveTime::MIN);
        Ok(prices
            .iter()
            .enumerate()
            .map(|(i, &spot)| {
                let offset = Duration::minutes(i64::from(minutes) * i as i64);
                PriceSlot::new(midnight + offset, minutes, adjustment.apply(spot))
            })
            .collect())
    }

    /// Builds the visible horizon: today's slots, followed by tomorrow's
    /// when `tomorrow_valid` is set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PriceData`] if either list has an unusable length.
    pub fn horizon(&self, today: NaiveDate, adjustment: PriceAdjustment) -> Result<Vec<PriceSlot>> {
        let mut slots = Self::day_slots(&self.today, today, adjustment)?;
        if self.tomorrow_valid {
            let tomorrow = today + Duration::days(1);
            slots.extend(Self::day_slots(&self.tomorrow, tomorrow, adjustment)?);
        }
        Ok(slots)
    }

    /// Rolls the data over to the next day: tomorrow becomes today.
    pub fn advance_day(&mut self) {
        self.today = std::mem::take(&mut self.tomorrow);
        self.tomorrow_valid = false;
    }
}
