//! Status LEDs.
//!
//! Two LEDs report everything the operator sees: a green "OK" and a red
//! "DENY". Each has a steady level (last access result, error state) and may
//! be overridden by a short flash (scan accepted, publish acknowledged).
//! Flashes expire on [`IndicatorPanel::update`], never by sleeping, so the
//! control loop keeps reading cards and frames while a LED is lit.
//!
//! # Examples
//!
//! ```
//! use std::time::{Duration, Instant};
//! use doorlink_terminal::indicator::{IndicatorPanel, Led, MockIndicator};
//!
//! let t0 = Instant::now();
//! let mut panel = IndicatorPanel::new(MockIndicator::default());
//!
//! panel.flash(Led::Ok, Duration::from_millis(80), t0);
//! assert!(panel.hardware().is_on(Led::Ok));
//!
//! panel.update(t0 + Duration::from_millis(80));
//! assert!(!panel.hardware().is_on(Led::Ok));
//! ```

use std::fmt;
use std::time::{Duration, Instant};

use doorlink_protocol::Verdict;

/// One of the two status LEDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Led {
    /// Green, access granted.
    Ok,
    /// Red, access denied or link error.
    Deny,
}

impl fmt::Display for Led {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Led::Ok => write!(f, "OK"),
            Led::Deny => write!(f, "DENY"),
        }
    }
}

/// LED driver
pub trait Indicator {
    /// Switch one LED.
    fn set(&mut self, led: Led, on: bool);
}

/// In-memory LED driver recording every change.
#[derive(Debug, Clone, Default)]
pub struct MockIndicator {
    ok: bool,
    deny: bool,
    changes: Vec<(Led, bool)>,
}

impl MockIndicator {
    pub fn is_on(&self, led: Led) -> bool {
        match led {
            Led::Ok => self.ok,
            Led::Deny => self.deny,
        }
    }

    /// Every `set` call so far, oldest first.
    pub fn changes(&self) -> &[(Led, bool)] {
        &self.changes
    }

    /// Number of times `led` was switched on.
    pub fn times_lit(&self, led: Led) -> usize {
        self.changes
            .iter()
            .filter(|(l, on)| *l == led && *on)
            .count()
    }
}

impl Indicator for MockIndicator {
    fn set(&mut self, led: Led, on: bool) {
        match led {
            Led::Ok => self.ok = on,
            Led::Deny => self.deny = on,
        }
        self.changes.push((led, on));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Flash {
    led: Led,
    until: Instant,
}

/// Steady levels plus at most one timed flash, written through to an
/// [`Indicator`] only when the visible level changes.
#[derive(Debug)]
pub struct IndicatorPanel<I> {
    hardware: I,
    steady_ok: bool,
    steady_deny: bool,
    flash: Option<Flash>,
    shown: (bool, bool),
}

impl<I: Indicator> IndicatorPanel<I> {
    /// Panel with both LEDs off.
    pub fn new(mut hardware: I) -> Self {
        hardware.set(Led::Ok, false);
        hardware.set(Led::Deny, false);
        Self {
            hardware,
            steady_ok: false,
            steady_deny: false,
            flash: None,
            shown: (false, false),
        }
    }

    /// Light the LED matching an access result and clear the other.
    pub fn show_verdict(&mut self, verdict: Verdict) {
        self.steady_ok = verdict.is_granted();
        self.steady_deny = !verdict.is_granted();
        self.apply();
    }

    pub fn set_steady(&mut self, led: Led, on: bool) {
        match led {
            Led::Ok => self.steady_ok = on,
            Led::Deny => self.steady_deny = on,
        }
        self.apply();
    }

    /// Light `led` for `duration`, replacing any running flash.
    pub fn flash(&mut self, led: Led, duration: Duration, now: Instant) {
        self.flash = Some(Flash {
            led,
            until: now + duration,
        });
        self.apply();
    }

    /// Expire a finished flash. Returns `true` if one ended.
    pub fn update(&mut self, now: Instant) -> bool {
        match self.flash {
            Some(flash) if now >= flash.until => {
                self.flash = None;
                self.apply();
                true
            }
            _ => false,
        }
    }

    /// Whether `led` is currently lit.
    pub fn is_lit(&self, led: Led) -> bool {
        match led {
            Led::Ok => self.shown.0,
            Led::Deny => self.shown.1,
        }
    }

    pub fn is_flashing(&self) -> bool {
        self.flash.is_some()
    }

    pub fn hardware(&self) -> &I {
        &self.hardware
    }

    pub fn hardware_mut(&mut self) -> &mut I {
        &mut self.hardware
    }

    fn apply(&mut self) {
        let flashing = self.flash.map(|f| f.led);
        let ok = self.steady_ok || flashing == Some(Led::Ok);
        let deny = self.steady_deny || flashing == Some(Led::Deny);

        if ok != self.shown.0 {
            self.hardware.set(Led::Ok, ok);
        }
        if deny != self.shown.1 {
            self.hardware.set(Led::Deny, deny);
        }
        self.shown = (ok, deny);
    }
}
