//! Simulated hardware around the planner.

/// Commuter car with a slow SOC sensor.
pub mod car;
/// Wallbox acting as the charge actuator.
pub mod charger;
/// Household load on the main fuse.
pub mod house;
pub mod types;

pub use car::{CarEvent, SimCar};
pub use charger::SimCharger;
pub use house::HouseLoad;
pub use types::{Device, DeviceContext, gaussian_noise};
