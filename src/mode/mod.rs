use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::event::{Bus, EventKind};

pub mod offline;
pub mod online;

pub use offline::{OfflineMode, ReadingState};
pub use online::OnlineMode;

/// A top-level operating mode. `start`/`stop` default to no-ops, so a
/// mode without one of the capabilities is simply skipped by the manager.
pub trait Mode: Send {
    fn name(&self) -> &'static str;
    fn start(&mut self) {}
    fn stop(&mut self) {}
}

pub type SharedMode = Arc<Mutex<dyn Mode + Send>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModeKind {
    #[default]
    None,
    Offline,
    Online,
}

/// Owns the transition rules: exactly one active mode, stop-before-start,
/// idempotent re-entry. Loss of connectivity always wins; going Online
/// additionally needs an explicit switch request.
pub struct ModeManager {
    offline: SharedMode,
    online: SharedMode,
    active: Mutex<ModeKind>,
    online_seen: AtomicBool,
}

impl ModeManager {
    pub fn new(offline: SharedMode, online: SharedMode) -> Arc<Self> {
        Arc::new(Self {
            offline,
            online,
            active: Mutex::new(ModeKind::None),
            online_seen: AtomicBool::new(false),
        })
    }

    /// Wire the manager to connectivity and switch-request events.
    pub fn attach(self: &Arc<Self>, bus: &Bus) {
        let manager = self.clone();
        bus.subscribe(EventKind::NetOnline, move |_| {
            // a connectivity event alone only proposes the switch
            manager.online_seen.store(true, Ordering::SeqCst);
        });

        let manager = self.clone();
        bus.subscribe(EventKind::NetConnectOk, move |_| {
            // probe-verified by the orchestrator before emission
            manager.online_seen.store(true, Ordering::SeqCst);
        });

        let manager = self.clone();
        bus.subscribe(EventKind::NetOffline, move |_| {
            manager.online_seen.store(false, Ordering::SeqCst);
            manager.switch(ModeKind::Offline);
        });

        let manager = self.clone();
        bus.subscribe(EventKind::ModeSwitchRequest, move |_| {
            if manager.online_seen.load(Ordering::SeqCst) {
                manager.switch(ModeKind::Online);
            } else {
                log::info!("online mode requested while offline, staying put");
            }
        });
    }

    /// Pick the initial mode from the boot probe.
    pub fn start(&self, online_now: bool) {
        self.online_seen.store(online_now, Ordering::SeqCst);
        if online_now {
            self.switch(ModeKind::Online);
        } else {
            self.switch(ModeKind::Offline);
        }
    }

    pub fn active(&self) -> ModeKind {
        *self.active.lock().unwrap()
    }

    fn switch(&self, target: ModeKind) {
        if target == ModeKind::None {
            return;
        }

        let mut active = self.active.lock().unwrap();
        if *active == target {
            return;
        }

        if let Some(outgoing) = self.slot(*active) {
            let mut outgoing = outgoing.lock().unwrap();
            log::info!("stopping {} mode", outgoing.name());
            outgoing.stop();
        }

        *active = target;

        if let Some(incoming) = self.slot(target) {
            let mut incoming = incoming.lock().unwrap();
            log::info!("starting {} mode", incoming.name());
            incoming.start();
        }
    }

    fn slot(&self, kind: ModeKind) -> Option<&SharedMode> {
        match kind {
            ModeKind::Offline => Some(&self.offline),
            ModeKind::Online => Some(&self.online),
            ModeKind::None => None,
        }
    }
}
