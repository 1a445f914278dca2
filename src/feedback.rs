use std::process::{Child, Command, Stdio};
use std::sync::Mutex;

/// Spoken/audible feedback. Best-effort by contract: failures are logged
/// at debug level and never reach the caller.
pub trait Feedback: Send + Sync {
    fn speak(&self, text: &str);
    fn stop(&self);
}

/// Speaks by spawning an external command (espeak-ng, piper, ...) with
/// the text appended as the final argument. A new utterance replaces the
/// previous one.
pub struct SpeechCommand {
    program: String,
    args: Vec<String>,
    child: Mutex<Option<Child>>,
}

impl SpeechCommand {
    /// Build from a whitespace-separated command line, e.g.
    /// `"espeak-ng -v en"`. Returns `None` for an empty command line.
    pub fn new(command_line: &str) -> Option<Self> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
            child: Mutex::new(None),
        })
    }
}

impl Feedback for SpeechCommand {
    fn speak(&self, text: &str) {
        self.stop();
        let spawned = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn();
        match spawned {
            Ok(child) => *self.child.lock().unwrap() = Some(child),
            Err(e) => log::debug!("speech command failed: {e}"),
        }
    }

    fn stop(&self) {
        if let Some(mut child) = self.child.lock().unwrap().take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Silent feedback for headless runs and tests.
pub struct NullFeedback;

impl Feedback for NullFeedback {
    fn speak(&self, _text: &str) {}
    fn stop(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_command_line_is_rejected() {
        assert!(SpeechCommand::new("").is_none());
        assert!(SpeechCommand::new("   ").is_none());
    }

    #[test]
    fn command_line_splits_into_program_and_args() {
        let speech = SpeechCommand::new("espeak-ng -v en -s 140").unwrap();
        assert_eq!(speech.program, "espeak-ng");
        assert_eq!(speech.args, vec!["-v", "en", "-s", "140"]);
    }
}
