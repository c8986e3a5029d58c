#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Motion-control and calibration engine for a smart bicycle trainer
//! (hardware-agnostic).
//!
//! Converts pedaling speed into a physical resistance position. All hardware
//! interactions go through `trainer_traits::StepDriver`, `LimitSwitch` and
//! `SettingsStore`.
//!
//! ## Architecture
//!
//! - **Speed acquisition**: hall-edge capture + EMA smoothing (`hall` module)
//! - **Calibration**: three bilinear lookup tables + idle curve (`tables`)
//! - **Target resolution**: IDLE/ERG/SIM state machine + manual hold (`resolver`)
//! - **Motion**: ramped step profile, limit debounce, homing state machine,
//!   enable/disable safety policy (`motion`)
//! - **Context**: a single `Trainer` struct owns all of the above (`trainer`)
//!
//! ## Units
//!
//! Resistance position is an integer **logical** scale 0..=1000, mapped
//! linearly onto the actuator's native microstep count. Speeds are mph,
//! step rates are steps/sec, table values are f64 like the calibration data.

pub mod config;
pub mod error;
pub mod hall;
pub mod hw_error;
pub mod mocks;
pub mod motion;
pub mod resolver;
pub mod status;
pub mod tables;
pub mod trainer;
pub mod units;

mod conversions;

pub use config::{MotionCfg, SensorCfg};
pub use error::{BuildError, TrainerError};
pub use hall::{HallCapture, SpeedSensor};
pub use motion::MotionController;
pub use resolver::{ControlMode, SimParams, TargetResolver};
pub use status::HomingStatus;
pub use tables::{CalTable, CalibrationStore, IdleCurve};
pub use trainer::{Snapshot, Trainer, TrainerBuilder};
