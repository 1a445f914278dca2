use std::sync::{Arc, Mutex};

use crate::event::{Bus, EventKind, Payload};
use crate::feedback::Feedback;
use crate::mode::Mode;
use crate::session::{SessionState, SessionStore};

/// Internal states of the offline reading mode. Transitions are guarded;
/// anything not listed for a state is a deliberate no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadingState {
    #[default]
    Idle,
    Capturing,
    ReadingLocal,
    Paused,
}

/// Offline reading: capture, receive OCR lines, read line by line with
/// Next/Prev, pause/resume on long presses. Every index change persists
/// `{mode, lineIndex}` before the handler returns.
pub struct OfflineMode {
    feedback: Arc<dyn Feedback>,
    store: Arc<dyn SessionStore>,
    lines: Vec<String>,
    line_index: usize,
    state: ReadingState,
    started: bool,
}

impl OfflineMode {
    pub fn new(feedback: Arc<dyn Feedback>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            feedback,
            store,
            lines: Vec::new(),
            line_index: 0,
            state: ReadingState::Idle,
            started: false,
        }
    }

    /// Subscribe the mode to its button and OCR events. Handlers are
    /// registered once and no-op while the mode is stopped.
    pub fn attach(mode: &Arc<Mutex<OfflineMode>>, bus: &Bus) {
        let m = mode.clone();
        bus.subscribe(EventKind::BtnCaptureShort, move |_| {
            m.lock().unwrap().on_capture();
        });

        let m = mode.clone();
        bus.subscribe(EventKind::OcrDone, move |payload| {
            if let Some(Payload::Lines(lines)) = payload {
                m.lock().unwrap().on_ocr_done(lines.clone());
            }
        });

        let m = mode.clone();
        bus.subscribe(EventKind::OcrEmpty, move |_| {
            m.lock().unwrap().on_ocr_empty();
        });

        let m = mode.clone();
        bus.subscribe(EventKind::BtnNextShort, move |_| {
            m.lock().unwrap().on_next();
        });

        let m = mode.clone();
        bus.subscribe(EventKind::BtnPrevShort, move |_| {
            m.lock().unwrap().on_prev();
        });

        let m = mode.clone();
        bus.subscribe(EventKind::BtnPrevLong, move |_| {
            m.lock().unwrap().on_pause();
        });

        let m = mode.clone();
        bus.subscribe(EventKind::BtnNextLong, move |_| {
            m.lock().unwrap().on_resume();
        });
    }

    pub fn state(&self) -> ReadingState {
        self.state
    }

    pub fn line_index(&self) -> usize {
        self.line_index
    }

    pub(crate) fn on_capture(&mut self) {
        if !self.started || self.state == ReadingState::Paused {
            return;
        }
        self.state = ReadingState::Capturing;
    }

    pub(crate) fn on_ocr_done(&mut self, lines: Vec<String>) {
        if !self.started || lines.is_empty() {
            return;
        }
        self.lines = lines;
        // resume from the persisted index, clamped to the new text
        self.line_index = self.line_index.min(self.lines.len() - 1);
        self.state = ReadingState::ReadingLocal;
        self.persist();
        self.read_current();
    }

    pub(crate) fn on_ocr_empty(&mut self) {
        if !self.started {
            return;
        }
        self.state = ReadingState::Idle;
        self.feedback.speak("No readable text found");
    }

    pub(crate) fn on_next(&mut self) {
        if !self.movable() {
            return;
        }
        if self.line_index + 1 < self.lines.len() {
            self.line_index += 1;
            self.state = ReadingState::ReadingLocal;
            self.persist();
            self.read_current();
        }
    }

    pub(crate) fn on_prev(&mut self) {
        if !self.movable() {
            return;
        }
        if self.line_index > 0 {
            self.line_index -= 1;
            self.state = ReadingState::ReadingLocal;
            self.persist();
            self.read_current();
        }
    }

    pub(crate) fn on_pause(&mut self) {
        if !self.started {
            return;
        }
        self.state = ReadingState::Paused;
        self.feedback.stop();
    }

    pub(crate) fn on_resume(&mut self) {
        if !self.started || self.state != ReadingState::Paused {
            return;
        }
        self.state = ReadingState::ReadingLocal;
        self.read_current();
    }

    fn movable(&self) -> bool {
        self.started && !self.lines.is_empty() && self.state != ReadingState::Paused
    }

    fn read_current(&self) {
        if let Some(line) = self.lines.get(self.line_index) {
            self.feedback.speak(line);
        }
    }

    fn persist(&self) {
        self.store.save_state(&SessionState {
            mode: "Offline".to_string(),
            line_index: self.line_index,
        });
    }
}

impl Mode for OfflineMode {
    fn name(&self) -> &'static str {
        "offline"
    }

    fn start(&mut self) {
        if self.started {
            return;
        }
        let state = self.store.load_state(SessionState::default());
        self.line_index = state.line_index;
        self.state = ReadingState::Idle;
        self.started = true;
        self.feedback.speak("Reading mode");
    }

    fn stop(&mut self) {
        self.started = false;
        self.state = ReadingState::Idle;
        self.feedback.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use crate::session::{KnownNetwork, NEVER_ATTEMPTED_SECS};

    #[derive(Default)]
    struct MemStore {
        state: Mutex<Option<SessionState>>,
    }

    impl SessionStore for MemStore {
        fn save_state(&self, state: &SessionState) {
            *self.state.lock().unwrap() = Some(state.clone());
        }
        fn load_state(&self, default: SessionState) -> SessionState {
            self.state.lock().unwrap().clone().unwrap_or(default)
        }
        fn known_networks(&self) -> HashMap<String, KnownNetwork> {
            HashMap::new()
        }
        fn set_known_networks(&self, _known: HashMap<String, KnownNetwork>) {}
        fn mark_connect_attempt(&self, _ssid: &str, _ts: Option<i64>) {}
        fn last_attempt_age(&self, _ssid: &str) -> i64 {
            NEVER_ATTEMPTED_SECS
        }
    }

    #[derive(Default)]
    struct Spoken {
        lines: Mutex<Vec<String>>,
        stops: Mutex<usize>,
    }

    impl Feedback for Spoken {
        fn speak(&self, text: &str) {
            self.lines.lock().unwrap().push(text.to_string());
        }
        fn stop(&self) {
            *self.stops.lock().unwrap() += 1;
        }
    }

    fn mode() -> (OfflineMode, Arc<Spoken>, Arc<MemStore>) {
        let spoken = Arc::new(Spoken::default());
        let store = Arc::new(MemStore::default());
        let mut offline = OfflineMode::new(spoken.clone(), store.clone());
        offline.start();
        (offline, spoken, store)
    }

    fn last_spoken(spoken: &Spoken) -> String {
        spoken.lines.lock().unwrap().last().cloned().unwrap_or_default()
    }

    #[test]
    fn ocr_lines_start_reading_from_persisted_index() {
        let (mut offline, spoken, store) = mode();
        store.save_state(&SessionState {
            mode: "Offline".into(),
            line_index: 1,
        });
        offline.stop();
        offline.start();

        offline.on_ocr_done(vec!["first".into(), "second".into()]);
        assert_eq!(offline.state(), ReadingState::ReadingLocal);
        assert_eq!(offline.line_index(), 1);
        assert_eq!(last_spoken(&spoken), "second");
    }

    #[test]
    fn persisted_index_clamps_to_shorter_text() {
        let (mut offline, spoken, store) = mode();
        store.save_state(&SessionState {
            mode: "Offline".into(),
            line_index: 7,
        });
        offline.stop();
        offline.start();

        offline.on_ocr_done(vec!["only".into()]);
        assert_eq!(offline.line_index(), 0);
        assert_eq!(last_spoken(&spoken), "only");
    }

    #[test]
    fn next_clamps_at_the_last_line() {
        let (mut offline, _spoken, store) = mode();
        offline.on_ocr_done(vec!["a".into(), "b".into()]);
        offline.on_next();
        assert_eq!(offline.line_index(), 1);

        offline.on_next();
        assert_eq!(offline.line_index(), 1);
        assert_eq!(
            store.load_state(SessionState::default()).line_index,
            1
        );
    }

    #[test]
    fn prev_clamps_at_the_first_line() {
        let (mut offline, _spoken, _store) = mode();
        offline.on_ocr_done(vec!["a".into(), "b".into()]);
        offline.on_prev();
        assert_eq!(offline.line_index(), 0);
    }

    #[test]
    fn every_index_change_persists_before_returning() {
        let (mut offline, _spoken, store) = mode();
        offline.on_ocr_done(vec!["a".into(), "b".into()]);
        offline.on_next();
        let saved = store.load_state(SessionState::default());
        assert_eq!(saved.mode, "Offline");
        assert_eq!(saved.line_index, 1);
    }

    #[test]
    fn pause_stops_speech_and_blocks_navigation() {
        let (mut offline, spoken, _store) = mode();
        offline.on_ocr_done(vec!["a".into(), "b".into()]);

        offline.on_pause();
        assert_eq!(offline.state(), ReadingState::Paused);
        assert_eq!(*spoken.stops.lock().unwrap(), 1);

        offline.on_next();
        assert_eq!(offline.line_index(), 0);
        offline.on_capture();
        assert_eq!(offline.state(), ReadingState::Paused);
    }

    #[test]
    fn resume_rereads_the_current_line() {
        let (mut offline, spoken, _store) = mode();
        offline.on_ocr_done(vec!["a".into(), "b".into()]);
        offline.on_next();
        offline.on_pause();
        offline.on_resume();
        assert_eq!(offline.state(), ReadingState::ReadingLocal);
        assert_eq!(last_spoken(&spoken), "b");
    }

    #[test]
    fn resume_without_pause_is_a_no_op() {
        let (mut offline, spoken, _store) = mode();
        offline.on_ocr_done(vec!["a".into()]);
        let spoken_before = spoken.lines.lock().unwrap().len();
        offline.on_resume();
        assert_eq!(spoken.lines.lock().unwrap().len(), spoken_before);
    }

    #[test]
    fn empty_ocr_returns_to_idle() {
        let (mut offline, spoken, _store) = mode();
        offline.on_capture();
        assert_eq!(offline.state(), ReadingState::Capturing);
        offline.on_ocr_empty();
        assert_eq!(offline.state(), ReadingState::Idle);
        assert_eq!(last_spoken(&spoken), "No readable text found");
    }

    #[test]
    fn stopped_mode_ignores_events() {
        let (mut offline, _spoken, _store) = mode();
        offline.stop();
        offline.on_ocr_done(vec!["a".into()]);
        assert_eq!(offline.state(), ReadingState::Idle);
        assert_eq!(offline.line_index(), 0);
    }
}
