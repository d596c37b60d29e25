//! ==============================================================================
//! panel.rs - led indicator panel
//! ==============================================================================
//!
//! purpose:
//!     translates the indicator code onto the three threshold-colour pins and
//!     drives the diagnostic (white) line. the wiring is cumulative: yellow
//!     lights for any reading, red joins it in the mid band, green completes
//!     the set in the high band.
//!
//! relationships:
//!     - used by: tasks.rs (after recompute / sweep / toggle / blink tick)
//!     - uses: hal.rs
//!
//! ==============================================================================

use std::sync::Arc;

use anyhow::Result;

use crate::hal::HardwareProvider;
use crate::state::Indicator;

/// bcm pin assignment of the four output signals
#[derive(Debug, Clone, Copy)]
pub struct PanelPins {
    pub red: u8,
    pub yellow: u8,
    pub green: u8,
    pub white: u8,
}

pub struct IndicatorPanel {
    hal: Arc<dyn HardwareProvider>,
    pins: PanelPins,
}

impl IndicatorPanel {
    pub fn new(hal: Arc<dyn HardwareProvider>, pins: PanelPins) -> Self {
        Self { hal, pins }
    }

    /// drive the colour pins for an indicator code. Off and Armed both blank
    /// the colours; Armed is visible through the diagnostic line instead.
    pub fn apply(&self, indicator: Indicator) -> Result<()> {
        let (red, green, yellow) = match indicator {
            Indicator::Off | Indicator::Armed => (false, false, false),
            Indicator::Low => (false, false, true),
            Indicator::Mid => (true, false, true),
            Indicator::High => (true, true, true),
        };
        self.hal.set_output(self.pins.red, red)?;
        self.hal.set_output(self.pins.green, green)?;
        self.hal.set_output(self.pins.yellow, yellow)?;
        Ok(())
    }

    /// diagnostic line: solid on while a session is armed, blinked by the
    /// blinker while degraded
    pub fn set_diag(&self, level: bool) -> Result<()> {
        self.hal.set_output(self.pins.white, level)
    }

    /// blank every signal (session stop)
    pub fn all_off(&self) -> Result<()> {
        self.apply(Indicator::Off)?;
        self.set_diag(false)
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::hal::MockHal;

    const PINS: PanelPins = PanelPins {
        red: 27,
        yellow: 22,
        green: 23,
        white: 24,
    };

    fn panel() -> (IndicatorPanel, MockHal) {
        let hal = MockHal::new();
        (IndicatorPanel::new(Arc::new(hal.clone()), PINS), hal)
    }

    fn levels(hal: &MockHal) -> (bool, bool, bool) {
        (
            hal.output_level(PINS.red),
            hal.output_level(PINS.green),
            hal.output_level(PINS.yellow),
        )
    }

    #[test]
    fn colour_truth_table() {
        let (panel, hal) = panel();

        panel.apply(Indicator::High).unwrap();
        assert_eq!(levels(&hal), (true, true, true));

        panel.apply(Indicator::Mid).unwrap();
        assert_eq!(levels(&hal), (true, false, true));

        panel.apply(Indicator::Low).unwrap();
        assert_eq!(levels(&hal), (false, false, true));

        panel.apply(Indicator::Armed).unwrap();
        assert_eq!(levels(&hal), (false, false, false));
    }

    #[test]
    fn all_off_blanks_diag_too() {
        let (panel, hal) = panel();
        panel.apply(Indicator::High).unwrap();
        panel.set_diag(true).unwrap();

        panel.all_off().unwrap();
        assert_eq!(levels(&hal), (false, false, false));
        assert!(!hal.output_level(PINS.white));
    }
}
