//! Mapping of boxed hardware errors into [`TrainerError`].

use crate::error::TrainerError;

/// Convert a boxed error from a hardware trait call into a typed
/// [`TrainerError`] wrapped in an `eyre::Report`.
///
/// With the `hardware-errors` feature the concrete
/// `trainer_hardware::HwError` is recovered by downcast so faults (stuck
/// limit switch, driver alarm) keep their identity; anything else is
/// reported as a generic hardware error.
#[cfg(feature = "hardware-errors")]
pub fn map_hw_error(e: Box<dyn std::error::Error + Send + Sync>) -> eyre::Report {
    match e.downcast::<trainer_hardware::HwError>() {
        Ok(hw) => match *hw {
            trainer_hardware::HwError::Fault(msg) => {
                eyre::Report::new(TrainerError::HardwareFault(msg))
            }
            other => eyre::Report::new(TrainerError::Hardware(other.to_string())),
        },
        Err(e) => eyre::Report::new(TrainerError::Hardware(e.to_string())),
    }
}

#[cfg(not(feature = "hardware-errors"))]
pub fn map_hw_error(e: Box<dyn std::error::Error + Send + Sync>) -> eyre::Report {
    eyre::Report::new(TrainerError::Hardware(e.to_string()))
}
