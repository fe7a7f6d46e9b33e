//! Smart charging planner for a single electric-vehicle charger.
//!
//! The core is [`planner::generate_charging_plan`], a pure function from a
//! [`planner::PlanningInput`] snapshot to a [`planner::Plan`]. Around it sit
//! the [`session::SessionTracker`] that turns plans into actuator commands,
//! the [`input::InputAssembler`] that builds snapshots, diagnostic dumps with
//! replay, and a simulator that exercises everything over simulated days.

#[cfg(feature = "api")]
pub mod api;
pub mod cli;
pub mod config;
/// Simulated car and charger.
pub mod devices;
pub mod diagnostics;
pub mod error;
pub mod input;
pub mod io;
pub mod planner;
pub mod prices;
pub mod session;
/// Simulation clock, price feed, engine, and KPIs.
pub mod sim;

pub use error::{Error, Result};
