//! Single-output status indicator
//!
//! The node has one LED. System phase is encoded purely in timing:
//!
//! - startup: solid on for the startup window
//! - heartbeat: one 100 ms flash
//! - error code N: N blinks (200 ms on / 200 ms off) followed by a 1 s break
//!
//! All waits go through `tokio::time` so the patterns double as the visible
//! pacing of the supervisory loop.

use crate::error::ErrorCode;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, trace};

const HEARTBEAT_ON: Duration = Duration::from_millis(100);
const BLINK_ON: Duration = Duration::from_millis(200);
const BLINK_OFF: Duration = Duration::from_millis(200);
const PATTERN_BREAK: Duration = Duration::from_secs(1);

/// The physical (or simulated) output line
pub trait IndicatorPin: Send {
    fn set(&mut self, on: bool);
}

/// What the indicator is asked to show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Startup,
    Heartbeat,
    Error(ErrorCode),
}

/// Drives an [`IndicatorPin`] with the node's visual vocabulary
pub struct StatusIndicator {
    pin: Box<dyn IndicatorPin>,
    startup_display: Duration,
}

impl StatusIndicator {
    pub fn new(pin: Box<dyn IndicatorPin>, startup_display: Duration) -> Self {
        Self {
            pin,
            startup_display,
        }
    }

    /// Fire-and-forget: show a single occurrence of `signal`
    pub async fn show(&mut self, signal: Signal) {
        match signal {
            Signal::Startup => self.startup().await,
            Signal::Heartbeat => self.heartbeat().await,
            Signal::Error(code) => self.error_pattern(code).await,
        }
    }

    /// Solid on for the startup window
    pub async fn startup(&mut self) {
        debug!("Indicator: startup");
        self.pin.set(true);
        sleep(self.startup_display).await;
        self.pin.set(false);
    }

    /// Quick flash
    pub async fn heartbeat(&mut self) {
        self.pin.set(true);
        sleep(HEARTBEAT_ON).await;
        self.pin.set(false);
    }

    /// Show the error pattern once: blinks then the 1 s break
    pub async fn error_pattern(&mut self, code: ErrorCode) {
        self.blinks(code).await;
        sleep(PATTERN_BREAK).await;
    }

    /// Repeat the error pattern for `window`. The break after the last pass
    /// is cut short so the call returns once `window` has elapsed.
    pub async fn continuous_error(&mut self, code: ErrorCode, window: Duration) {
        debug!("Indicator: {} for {:?}", code, window);
        let start = Instant::now();
        while start.elapsed() < window {
            self.blinks(code).await;

            let remaining = window.saturating_sub(start.elapsed());
            if remaining > PATTERN_BREAK {
                sleep(PATTERN_BREAK).await;
            } else {
                if !remaining.is_zero() {
                    sleep(remaining).await;
                }
                break;
            }
        }
    }

    async fn blinks(&mut self, code: ErrorCode) {
        for _ in 0..code.blinks() {
            self.pin.set(true);
            sleep(BLINK_ON).await;
            self.pin.set(false);
            sleep(BLINK_OFF).await;
        }
    }
}

/// Host stand-in for the LED: reports edges through tracing
#[derive(Debug, Default)]
pub struct ConsoleIndicator {
    on: bool,
}

impl IndicatorPin for ConsoleIndicator {
    fn set(&mut self, on: bool) {
        if self.on != on {
            trace!(target: "envmon::led", "LED {}", if on { "on" } else { "off" });
        }
        self.on = on;
    }
}
