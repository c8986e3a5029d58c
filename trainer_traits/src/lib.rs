pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

/// Stepper driver outputs: one direction line, one step-pulse line, one
/// enable line. Implementations own any pin-level inversion (the enable
/// output is typically active-low at the driver).
pub trait StepDriver {
    /// Latch the travel direction; `forward` increases physical position
    /// (away from the limit switch).
    fn set_direction(
        &mut self,
        forward: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Issue a single step pulse.
    fn pulse(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    /// Energize or release the motor windings.
    fn set_enabled(&mut self, on: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Raw limit-switch level. Debounce lives in the core, not here.
pub trait LimitSwitch {
    /// True when the switch is physically pressed.
    fn is_pressed(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;
}

/// Key→blob non-volatile settings store. Loads return `None` for absent
/// keys; the core treats absent or wrongly-sized blobs as "use defaults".
pub trait SettingsStore {
    fn get_blob(&mut self, key: &str) -> Option<Vec<u8>>;
    fn put_blob(
        &mut self,
        key: &str,
        bytes: &[u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;

    fn get_f32(&mut self, key: &str) -> Option<f32> {
        let b = self.get_blob(key)?;
        let arr: [u8; 4] = b.as_slice().try_into().ok()?;
        Some(f32::from_le_bytes(arr))
    }
    fn put_f32(
        &mut self,
        key: &str,
        v: f32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.put_blob(key, &v.to_le_bytes())
    }
}

// Boxed trait objects forward to the inner implementation so callers can
// hold `Box<dyn ...>` where a generic bound is required.

impl<T: StepDriver + ?Sized> StepDriver for Box<T> {
    fn set_direction(
        &mut self,
        forward: bool,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_direction(forward)
    }

    fn pulse(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).pulse()
    }

    fn set_enabled(&mut self, on: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).set_enabled(on)
    }
}

impl<T: LimitSwitch + ?Sized> LimitSwitch for Box<T> {
    fn is_pressed(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        (**self).is_pressed()
    }
}

impl<T: SettingsStore + ?Sized> SettingsStore for Box<T> {
    fn get_blob(&mut self, key: &str) -> Option<Vec<u8>> {
        (**self).get_blob(key)
    }

    fn put_blob(
        &mut self,
        key: &str,
        bytes: &[u8],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).put_blob(key, bytes)
    }
}
