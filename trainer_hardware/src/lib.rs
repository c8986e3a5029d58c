//! Hardware backends for the trainer: a simulated bench rig for
//! development and tests, a file-backed settings store, and (behind the
//! `hardware` feature) Raspberry Pi GPIO implementations.

pub mod error;
pub mod store;

#[cfg(feature = "hardware")]
pub mod gpio;

pub use error::HwError;
pub use store::FileStore;

use std::sync::{Arc, Mutex};

use trainer_traits::{LimitSwitch, StepDriver};

/// Shared state of the simulated carriage rig.
#[derive(Debug)]
struct RigState {
    pos_steps: i64,
    forward: bool,
    enabled: bool,
    pulses: u64,
}

/// Simulated step driver coupled to a simulated limit switch through a
/// shared carriage position: stepping backward far enough presses the
/// switch, exactly like the real rig. Build both halves with [`sim_rig`].
#[derive(Debug, Clone)]
pub struct SimulatedStepDriver {
    state: Arc<Mutex<RigState>>,
}

impl SimulatedStepDriver {
    /// Carriage position in steps relative to the switch trip point.
    pub fn position(&self) -> i64 {
        self.state.lock().map(|s| s.pos_steps).unwrap_or(0)
    }

    pub fn pulses(&self) -> u64 {
        self.state.lock().map(|s| s.pulses).unwrap_or(0)
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().map(|s| s.enabled).unwrap_or(false)
    }
}

impl StepDriver for SimulatedStepDriver {
    fn set_direction(
        &mut self,
        forward: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Ok(mut s) = self.state.lock() {
            s.forward = forward;
        }
        Ok(())
    }

    fn pulse(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Ok(mut s) = self.state.lock() {
            if s.enabled {
                s.pos_steps += if s.forward { 1 } else { -1 };
                s.pulses += 1;
            }
        }
        Ok(())
    }

    fn set_enabled(&mut self, on: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Ok(mut s) = self.state.lock() {
            s.enabled = on;
        }
        Ok(())
    }
}

/// Limit switch half of the simulated rig; pressed while the carriage
/// sits at or below the trip point.
#[derive(Debug, Clone)]
pub struct SimulatedLimitSwitch {
    state: Arc<Mutex<RigState>>,
}

impl LimitSwitch for SimulatedLimitSwitch {
    fn is_pressed(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.state.lock().map(|s| s.pos_steps <= 0).unwrap_or(false))
    }
}

/// Build a coupled driver/switch pair with the carriage parked
/// `start_steps` above the switch.
pub fn sim_rig(start_steps: i64) -> (SimulatedStepDriver, SimulatedLimitSwitch) {
    let state = Arc::new(Mutex::new(RigState {
        pos_steps: start_steps,
        forward: true,
        enabled: false,
        pulses: 0,
    }));
    (
        SimulatedStepDriver {
            state: Arc::clone(&state),
        },
        SimulatedLimitSwitch { state },
    )
}
