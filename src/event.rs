use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use strum_macros::{Display, EnumString};

/// Events exchanged between the connectivity watch, the capture path and
/// the mode machine. The serialized names are the wire contract; anything
/// emitting or subscribing by name goes through `Display`/`FromStr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    BtnCaptureShort,
    BtnCaptureDouble,
    BtnNextShort,
    BtnPrevShort,
    BtnNextLong,
    BtnPrevLong,
    OcrDone,
    OcrEmpty,
    NetOnline,
    NetOffline,
    NetScanTick,
    NetConnectOk,
    NetConnectFailed,
    NetStillOffline,
    ModeSwitchRequest,
}

/// Typed event payloads. Subscribers receive `None` when the emitter
/// supplied nothing.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Lines(Vec<String>),
    Online(bool),
    Ssids(Vec<String>),
    Ssid(String),
    Note(String),
}

type Handler = Arc<dyn Fn(Option<&Payload>) + Send + Sync>;

/// Publish/subscribe fabric. Passed explicitly to every component; there
/// is no process-wide instance. Handlers run synchronously on the
/// emitting task, in subscription order.
#[derive(Default)]
pub struct Bus {
    subscribers: Mutex<HashMap<EventKind, Vec<Handler>>>,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, kind: EventKind, handler: F)
    where
        F: Fn(Option<&Payload>) + Send + Sync + 'static,
    {
        self.subscribers
            .lock()
            .unwrap()
            .entry(kind)
            .or_default()
            .push(Arc::new(handler));
    }

    pub fn emit(&self, kind: EventKind, payload: Option<Payload>) {
        log::debug!("event {kind}");

        // Handlers are cloned out so they may emit in turn without
        // deadlocking on the registry lock.
        let handlers: Vec<Handler> = self
            .subscribers
            .lock()
            .unwrap()
            .get(&kind)
            .map(|list| list.to_vec())
            .unwrap_or_default();

        for handler in handlers {
            handler(payload.as_ref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn delivers_payload_to_all_subscribers() {
        let bus = Bus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for _ in 0..2 {
            let seen = seen.clone();
            bus.subscribe(EventKind::OcrDone, move |payload| {
                if let Some(Payload::Lines(lines)) = payload {
                    seen.lock().unwrap().push(lines.len());
                }
            });
        }

        bus.emit(
            EventKind::OcrDone,
            Some(Payload::Lines(vec!["a".into(), "b".into()])),
        );
        assert_eq!(*seen.lock().unwrap(), vec![2, 2]);
    }

    #[test]
    fn missing_payload_arrives_as_none() {
        let bus = Bus::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        bus.subscribe(EventKind::OcrEmpty, move |payload| {
            assert!(payload.is_none());
            counter.fetch_add(1, Ordering::SeqCst);
        });

        bus.emit(EventKind::OcrEmpty, None);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn handlers_may_emit_in_turn() {
        let bus = Arc::new(Bus::new());
        let reached = Arc::new(AtomicUsize::new(0));

        {
            let bus = bus.clone();
            bus.clone().subscribe(EventKind::NetOnline, move |_| {
                bus.emit(EventKind::ModeSwitchRequest, None);
            });
        }
        {
            let reached = reached.clone();
            bus.subscribe(EventKind::ModeSwitchRequest, move |_| {
                reached.fetch_add(1, Ordering::SeqCst);
            });
        }

        bus.emit(EventKind::NetOnline, Some(Payload::Online(true)));
        assert_eq!(reached.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn event_names_round_trip() {
        assert_eq!(EventKind::NetScanTick.to_string(), "NET_SCAN_TICK");
        assert_eq!(
            EventKind::from_str("BTN_CAPTURE_SHORT").unwrap(),
            EventKind::BtnCaptureShort
        );
        assert_eq!(
            EventKind::from_str("MODE_SWITCH_REQUEST").unwrap(),
            EventKind::ModeSwitchRequest
        );
    }
}
