pub mod fuser;
pub mod loop_worker;
pub mod orientation;
pub mod source;

pub use fuser::{FuserConfig, FusionStats, SampleFuser};
pub use source::{simulated_producer, SensorAvailability, SensorKind, SimulatedMotion};
