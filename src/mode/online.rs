use std::sync::Arc;

use crate::feedback::Feedback;
use crate::mode::Mode;

/// Online mode lifecycle. Attaching the actual online backend (remote
/// OCR/guidance) happens outside the core; this mode only owns the
/// start/stop discipline and the spoken announcement.
pub struct OnlineMode {
    feedback: Arc<dyn Feedback>,
    started: bool,
}

impl OnlineMode {
    pub fn new(feedback: Arc<dyn Feedback>) -> Self {
        Self {
            feedback,
            started: false,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started
    }
}

impl Mode for OnlineMode {
    fn name(&self) -> &'static str {
        "online"
    }

    fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        self.feedback.speak("Online mode ready");
    }

    fn stop(&mut self) {
        self.started = false;
    }
}
