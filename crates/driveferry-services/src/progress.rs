use driveferry_core::models::UploadProgress;

/// Default step between user-visible progress updates.
pub const DEFAULT_STEP_PERCENT: u8 = 20;

/// Decides which progress events are worth an edit of the status message.
///
/// An event passes when it crosses a new multiple of `step` percent. Completion
/// (100%) is never reported: the final result message replaces it.
#[derive(Debug, Clone)]
pub struct ProgressThrottle {
    step: u8,
    last_step: u8,
}

impl ProgressThrottle {
    /// Creates a throttle reporting every `step_percent` percent.
    ///
    /// A step of 0 or above 100 falls back to [`DEFAULT_STEP_PERCENT`].
    pub fn new(step_percent: u8) -> Self {
        let step = match step_percent {
            1..=100 => step_percent,
            _ => DEFAULT_STEP_PERCENT,
        };
        Self { step, last_step: 0 }
    }

    /// Returns the percentage to display, if this event should be shown.
    pub fn observe(&mut self, progress: UploadProgress) -> Option<u8> {
        let percent = progress.percent();
        if percent >= 100 {
            return None;
        }

        let reached = percent / self.step;
        if reached > self.last_step {
            self.last_step = reached;
            Some(reached * self.step)
        } else {
            None
        }
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_STEP_PERCENT)
    }
}
