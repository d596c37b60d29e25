//! ==============================================================================
//! hal.rs - hardware abstraction layer
//! ==============================================================================
//!
//! purpose:
//!     the two-call pin interface the core consumes: four write-only signals
//!     (three threshold colours + one diagnostic) and one read-only button
//!     line. real gpio via `rppal` on the pi, an observable in-memory mock
//!     everywhere else so the crate compiles and tests on any machine.
//!
//! relationships:
//!     - used by: panel.rs (outputs), tasks.rs (button input)
//!     - uses: rppal (feature = "hardware")
//!
//! ==============================================================================

use anyhow::Result;

pub trait HardwareProvider: Send + Sync {
    /// drive an output pin high or low
    fn set_output(&self, pin: u8, level: bool) -> Result<()>;
    /// sample an input pin
    fn read_input(&self, pin: u8) -> Result<bool>;
}

// ==============================================================================
// mock implementation (default build, and what the tests observe)
// ==============================================================================

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// in-memory pin map. cloning shares the underlying pins, so a test can keep
/// a handle, inject button presses and read back what the panel drove.
#[derive(Clone, Default)]
pub struct MockHal {
    outputs: Arc<Mutex<HashMap<u8, bool>>>,
    inputs: Arc<Mutex<HashMap<u8, bool>>>,
}

impl MockHal {
    pub fn new() -> Self {
        Self::default()
    }

    /// test hook: current level of an output pin (false if never driven)
    pub fn output_level(&self, pin: u8) -> bool {
        *self.outputs.lock().unwrap().get(&pin).unwrap_or(&false)
    }

    /// test hook: set what `read_input` will report for a pin
    pub fn set_input(&self, pin: u8, level: bool) {
        self.inputs.lock().unwrap().insert(pin, level);
    }
}

impl HardwareProvider for MockHal {
    fn set_output(&self, pin: u8, level: bool) -> Result<()> {
        tracing::trace!(pin, level, "[MOCK GPIO] write");
        self.outputs.lock().unwrap().insert(pin, level);
        Ok(())
    }

    fn read_input(&self, pin: u8) -> Result<bool> {
        Ok(*self.inputs.lock().unwrap().get(&pin).unwrap_or(&false))
    }
}

// ==============================================================================
// real implementation (raspberry pi, feature = "hardware")
// ==============================================================================

#[cfg(feature = "hardware")]
pub struct RpiHal {
    gpio: rppal::gpio::Gpio,
}

#[cfg(feature = "hardware")]
impl RpiHal {
    pub fn new() -> Result<Self> {
        let gpio = rppal::gpio::Gpio::new()?;
        tracing::info!("using real hardware HAL (rppal)");
        Ok(Self { gpio })
    }
}

#[cfg(feature = "hardware")]
impl HardwareProvider for RpiHal {
    fn set_output(&self, pin: u8, level: bool) -> Result<()> {
        let mut p = self.gpio.get(pin)?.into_output();
        // keep the level when the handle drops, otherwise the led goes dark
        // as soon as this function returns
        p.set_reset_on_drop(false);
        if level {
            p.set_high();
        } else {
            p.set_low();
        }
        Ok(())
    }

    fn read_input(&self, pin: u8) -> Result<bool> {
        let p = self.gpio.get(pin)?.into_input_pulldown();
        Ok(p.is_high())
    }
}

/// build the HAL for this target. on non-pi builds this is always the mock.
#[cfg(feature = "hardware")]
pub fn default_hal() -> Result<Arc<dyn HardwareProvider>> {
    Ok(Arc::new(RpiHal::new()?))
}

#[cfg(not(feature = "hardware"))]
pub fn default_hal() -> Result<Arc<dyn HardwareProvider>> {
    tracing::info!("using mock HAL (no hardware access)");
    Ok(Arc::new(MockHal::new()))
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_pins_round_trip() {
        let hal = MockHal::new();
        hal.set_output(27, true).unwrap();
        assert!(hal.output_level(27));
        hal.set_output(27, false).unwrap();
        assert!(!hal.output_level(27));
        // undriven pins read low
        assert!(!hal.output_level(22));
    }

    #[test]
    fn mock_input_injection() {
        let hal = MockHal::new();
        assert!(!hal.read_input(15).unwrap());
        hal.set_input(15, true);
        assert!(hal.read_input(15).unwrap());
    }

    #[test]
    fn clones_share_pins() {
        let hal = MockHal::new();
        let observer = hal.clone();
        hal.set_output(24, true).unwrap();
        assert!(observer.output_level(24));
    }
}
