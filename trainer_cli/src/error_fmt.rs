//! Human-readable error descriptions and structured JSON error formatting.

use trainer_core::{BuildError, TrainerError};

/// Map an eyre::Report to a human-readable explanation with likely causes
/// and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingDriver => {
                "What happened: No step driver was provided to the trainer engine.\nLikely causes: GPIO driver failed to initialize or was not wired into the builder.\nHow to fix: Ensure the driver is created successfully and passed via with_step_driver(...).".to_string()
            }
            BuildError::MissingLimitSwitch => {
                "What happened: No limit switch was provided to the trainer engine.\nLikely causes: GPIO input failed to initialize or was not wired into the builder.\nHow to fix: Ensure the switch is created successfully and passed via with_limit_switch(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun. See README for a sample."
            ),
        };
    }

    if let Some(te) = err.downcast_ref::<TrainerError>() {
        if let TrainerError::HardwareFault(msg) = te {
            return format!(
                "What happened: Hardware fault ({msg}).\nLikely causes: Stuck limit switch, driver alarm, or wiring problem.\nHow to fix: Inspect the actuator and switch, power-cycle the driver, then re-home."
            );
        }
        return format!(
            "What happened: {te}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
        );
    }

    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("gpio") {
        return "What happened: Failed to initialize GPIO pins.\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process has permission to access GPIO.".to_string();
    }

    if lower.contains("homing failed") {
        return "What happened: The homing run did not find the limit switch in time.\nLikely causes: Disconnected switch, jammed carriage, or too small a seek timeout.\nHow to fix: Check the switch wiring and travel, then request homing again.".to_string();
    }

    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: homing failure 3, hardware fault 2, anything else 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if let Some(te) = err.downcast_ref::<TrainerError>() {
        return match te {
            TrainerError::HardwareFault(_) => 2,
            TrainerError::State(msg) if msg.contains("homing") => 3,
            _ => 1,
        };
    }
    1
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    let reason = if let Some(te) = err.downcast_ref::<TrainerError>() {
        match te {
            TrainerError::HardwareFault(_) => "HardwareFault",
            TrainerError::Hardware(_) => "Hardware",
            TrainerError::Config(_) => "Config",
            TrainerError::State(_) => "State",
            TrainerError::Io(_) => "Io",
        }
    } else if err.downcast_ref::<BuildError>().is_some() {
        "Build"
    } else {
        "Error"
    };

    json!({ "reason": reason, "message": humanize(err) }).to_string()
}
