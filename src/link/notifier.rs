//! Audible feedback requests
//!
//! The link only asks for beep patterns; driving a buzzer (or anything else)
//! is up to the [`Notifier`] implementation.

use tracing::{debug, info};

/// Base frequency the patterns are built from
pub const BEEP_BASE_HZ: u32 = 440;

/// One beep request: `count` tones of `duration_ms`, separated by `pause_ms`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeepPattern {
    pub freq_hz: u32,
    pub duration_ms: u32,
    pub pause_ms: u32,
    pub count: u32,
}

impl BeepPattern {
    pub const LOW_HZ: u32 = 2 * BEEP_BASE_HZ;
    pub const HIGH_HZ: u32 = 5 * BEEP_BASE_HZ;

    /// Short click for every failed send
    pub const SEND_FAILED: BeepPattern = BeepPattern::new(Self::HIGH_HZ, 5, 5, 1);

    /// First successful send, and the first after a failure; idle periods do not re-arm it
    pub const LINK_UP: BeepPattern = BeepPattern::new(Self::LOW_HZ, 30, 30, 1);

    /// Peer battery below the configured threshold
    pub const BATTERY_LOW: BeepPattern = BeepPattern::new(Self::LOW_HZ, 200, 100, 3);

    /// Link quality dropped below the threshold
    pub const LINK_DEGRADED: BeepPattern = BeepPattern::new(Self::HIGH_HZ, 100, 100, 3);

    /// Link quality came back above the threshold
    pub const LINK_RECOVERED: BeepPattern = BeepPattern::new(Self::LOW_HZ, 100, 0, 1);

    /// Pairing finished
    pub const PAIRED: BeepPattern = BeepPattern::new(Self::LOW_HZ, 500, 0, 1);

    pub const fn new(freq_hz: u32, duration_ms: u32, pause_ms: u32, count: u32) -> Self {
        Self {
            freq_hz,
            duration_ms,
            pause_ms,
            count,
        }
    }
}

/// Sink for beep requests
#[cfg_attr(test, mockall::automock)]
pub trait Notifier: Send {
    fn beep(&mut self, pattern: BeepPattern);
}

/// [`Notifier`] that only logs, for hosts without a buzzer
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn beep(&mut self, pattern: BeepPattern) {
        if pattern.count > 1 {
            info!(
                "Beep {} Hz x{} ({} ms on, {} ms off)",
                pattern.freq_hz, pattern.count, pattern.duration_ms, pattern.pause_ms
            );
        } else {
            debug!("Beep {} Hz for {} ms", pattern.freq_hz, pattern.duration_ms);
        }
    }
}
