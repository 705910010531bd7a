//! Receiver-side failsafe
//!
//! Control frames are forwarded to the outputs as they arrive. When frames
//! stop arriving for longer than the timeout, the stored failsafe frame is
//! applied once and stays in effect until control resumes.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::protocol::types::ControlFrame;

/// Gap after which the link is considered lost
pub const FAILSAFE_TIMEOUT: Duration = Duration::from_millis(1250);

/// Destination for control frames (servo/ESC outputs)
#[cfg_attr(test, mockall::automock)]
pub trait OutputSink: Send {
    fn apply(&mut self, frame: &ControlFrame);
}

/// [`OutputSink`] that drops every frame
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOutput;

impl OutputSink for NullOutput {
    fn apply(&mut self, _frame: &ControlFrame) {}
}

#[derive(Debug, Clone)]
pub struct FailsafeMonitor {
    timeout: Duration,
    failsafe_frame: ControlFrame,
    last_frame: Option<ControlFrame>,
    last_control_time: Option<Instant>,
    is_failsafe: bool,
}

impl FailsafeMonitor {
    pub fn new(failsafe_frame: ControlFrame) -> Self {
        Self {
            timeout: FAILSAFE_TIMEOUT,
            failsafe_frame,
            last_frame: None,
            last_control_time: None,
            is_failsafe: false,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Record a control frame and forward it
    pub fn on_control<O: OutputSink + ?Sized>(&mut self, frame: &ControlFrame, output: &mut O) {
        if self.is_failsafe {
            info!("Control frames resumed, leaving failsafe");
        }
        self.last_control_time = Some(Instant::now());
        self.last_frame = Some(*frame);
        self.is_failsafe = false;
        output.apply(frame);
    }

    /// Store the last received frame as the failsafe frame
    ///
    /// Returns the stored frame, or `None` if no control frame was ever seen.
    pub fn save_failsafe(&mut self) -> Option<ControlFrame> {
        let Some(frame) = self.last_frame else {
            debug!("No control frame yet, failsafe unchanged");
            return None;
        };
        self.failsafe_frame = frame;
        info!("Failsafe frame saved: {:?}", frame.channels);
        Some(frame)
    }

    /// Check the arrival gap; returns true on the tick that enters failsafe
    pub fn tick<O: OutputSink + ?Sized>(&mut self, output: &mut O) -> bool {
        if self.is_failsafe {
            return false;
        }
        let Some(last) = self.last_control_time else {
            return false;
        };
        if last.elapsed() <= self.timeout {
            return false;
        }

        warn!("No control frame for {:?}, entering failsafe", self.timeout);
        self.is_failsafe = true;
        output.apply(&self.failsafe_frame);
        true
    }

    pub fn is_failsafe(&self) -> bool {
        self.is_failsafe
    }

    /// Whether any control frame was received since startup
    pub fn has_control(&self) -> bool {
        self.last_control_time.is_some()
    }

    pub fn failsafe_frame(&self) -> ControlFrame {
        self.failsafe_frame
    }

    pub fn last_frame(&self) -> Option<ControlFrame> {
        self.last_frame
    }
}

impl Default for FailsafeMonitor {
    fn default() -> Self {
        Self::new(ControlFrame::neutral())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;

    fn frame(value: u16) -> ControlFrame {
        ControlFrame::new([value; 8])
    }

    #[tokio::test(start_paused = true)]
    async fn test_enters_failsafe_exactly_once() {
        let saved = frame(1000);
        let mut output = MockOutputSink::new();
        output.expect_apply().with(eq(frame(2000))).times(1).return_const(());
        output.expect_apply().with(eq(saved)).times(1).return_const(());

        let mut monitor = FailsafeMonitor::new(saved);
        monitor.on_control(&frame(2000), &mut output);

        tokio::time::advance(Duration::from_millis(1250)).await;
        assert!(!monitor.tick(&mut output));
        assert!(!monitor.is_failsafe());

        tokio::time::advance(Duration::from_millis(1)).await;
        assert!(monitor.tick(&mut output));
        assert!(monitor.is_failsafe());

        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(!monitor.tick(&mut output));
        assert!(monitor.is_failsafe());
    }

    #[tokio::test(start_paused = true)]
    async fn test_neutral_failsafe_by_default() {
        let mut output = MockOutputSink::new();
        output.expect_apply().with(eq(frame(100))).times(1).return_const(());
        output
            .expect_apply()
            .with(eq(ControlFrame::neutral()))
            .times(1)
            .return_const(());

        let mut monitor = FailsafeMonitor::default();
        monitor.on_control(&frame(100), &mut output);
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(monitor.tick(&mut output));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_failsafe_before_first_control() {
        let mut output = MockOutputSink::new();
        output.expect_apply().never();

        let mut monitor = FailsafeMonitor::default();
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(!monitor.tick(&mut output));
        assert!(!monitor.has_control());
    }

    #[tokio::test(start_paused = true)]
    async fn test_control_resumes_after_failsafe() {
        let mut monitor = FailsafeMonitor::default().with_timeout(Duration::from_millis(100));
        let mut output = NullOutput;

        monitor.on_control(&frame(1200), &mut output);
        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(monitor.tick(&mut output));

        monitor.on_control(&frame(1300), &mut output);
        assert!(!monitor.is_failsafe());

        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(monitor.tick(&mut output), "Second outage enters failsafe again");
    }

    #[tokio::test]
    async fn test_save_failsafe_stores_last_frame() {
        let mut monitor = FailsafeMonitor::default();
        let mut output = NullOutput;

        monitor.on_control(&frame(1100), &mut output);
        monitor.on_control(&frame(1700), &mut output);

        assert_eq!(monitor.save_failsafe(), Some(frame(1700)));
        assert_eq!(monitor.failsafe_frame(), frame(1700));
        assert_eq!(monitor.last_frame(), Some(frame(1700)));
    }

    #[test]
    fn test_save_failsafe_without_control_is_noop() {
        let mut monitor = FailsafeMonitor::new(frame(900));

        assert_eq!(monitor.save_failsafe(), None);
        assert_eq!(monitor.failsafe_frame(), frame(900));
    }
}
