//! Raspberry Pi GPIO backends (behind the `hardware` feature).

use std::thread::sleep;
use std::time::Duration;

use rppal::gpio::{Gpio, InputPin, Level, OutputPin, Trigger};
use trainer_traits::{LimitSwitch, StepDriver};

use crate::error::{HwError, Result};

/// Width of the step pulse high phase. Well above the minimum for the
/// common TMC/A4988-class drivers.
const STEP_PULSE_US: u64 = 3;

fn gpio_err(e: rppal::gpio::Error) -> HwError {
    HwError::Gpio(e.to_string())
}

/// Step/dir/enable driver on three output pins. The enable output is
/// active-low at the driver when `en_active_low` is set.
pub struct GpioStepDriver {
    step: OutputPin,
    dir: OutputPin,
    en: Option<OutputPin>,
    en_active_low: bool,
}

impl GpioStepDriver {
    pub fn new(step_pin: u8, dir_pin: u8, en_pin: Option<u8>, en_active_low: bool) -> Result<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;
        let step = gpio.get(step_pin).map_err(gpio_err)?.into_output_low();
        let dir = gpio.get(dir_pin).map_err(gpio_err)?.into_output();
        let en = match en_pin {
            Some(p) => Some(gpio.get(p).map_err(gpio_err)?.into_output()),
            None => None,
        };
        let mut driver = Self {
            step,
            dir,
            en,
            en_active_low,
        };
        driver.write_enable(false);
        Ok(driver)
    }

    fn write_enable(&mut self, on: bool) {
        if let Some(en) = self.en.as_mut() {
            let high = on != self.en_active_low;
            if high {
                en.set_high();
            } else {
                en.set_low();
            }
        }
    }
}

impl StepDriver for GpioStepDriver {
    fn set_direction(
        &mut self,
        forward: bool,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if forward {
            self.dir.set_high();
        } else {
            self.dir.set_low();
        }
        Ok(())
    }

    fn pulse(&mut self) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.step.set_high();
        sleep(Duration::from_micros(STEP_PULSE_US));
        self.step.set_low();
        Ok(())
    }

    fn set_enabled(
        &mut self,
        on: bool,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.write_enable(on);
        tracing::debug!(on, "driver enable pin set");
        Ok(())
    }
}

/// Limit switch input with internal pull-up; `active_low` matches the
/// usual normally-open switch to ground.
pub struct GpioLimitSwitch {
    pin: InputPin,
    active_low: bool,
}

impl GpioLimitSwitch {
    pub fn new(pin: u8, active_low: bool) -> Result<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;
        let pin = gpio.get(pin).map_err(gpio_err)?.into_input_pullup();
        Ok(Self { pin, active_low })
    }
}

impl LimitSwitch for GpioLimitSwitch {
    fn is_pressed(&mut self) -> std::result::Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let level = self.pin.read();
        Ok((level == Level::Low) == self.active_low)
    }
}

/// Hall-sensor input that fires a callback on each pulse edge. The
/// callback runs on rppal's interrupt thread; keep it short (a timestamped
/// edge record, nothing else).
pub struct HallEdgePin {
    // Held for the lifetime of the interrupt registration.
    _pin: InputPin,
}

impl HallEdgePin {
    pub fn new(
        pin: u8,
        falling_edge: bool,
        mut on_edge: impl FnMut() + Send + 'static,
    ) -> Result<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;
        let mut pin = gpio.get(pin).map_err(gpio_err)?.into_input_pullup();
        let trigger = if falling_edge {
            Trigger::FallingEdge
        } else {
            Trigger::RisingEdge
        };
        pin.set_async_interrupt(trigger, move |_level| on_edge())
            .map_err(gpio_err)?;
        Ok(Self { _pin: pin })
    }
}
