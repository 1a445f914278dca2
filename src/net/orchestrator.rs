use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tokio::time::MissedTickBehavior;

use super::{ConnectExecutor, NetworkProbe};
use crate::event::{Bus, EventKind, Payload};
use crate::feedback::Feedback;
use crate::frame::FrameClassification;
use crate::session::SessionStore;
use crate::wifi::WifiCredentials;

/// Last confirmed connectivity. Online is only ever set after a
/// verifying probe; a successful connect command alone is not enough.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectivityState {
    pub online: bool,
    pub ssid: Option<String>,
}

/// Outcome of routing one classified frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QrOutcome {
    /// Connect command succeeded and a probe confirmed reachability.
    Connected,
    /// Connect command succeeded but the wait window elapsed offline.
    StillOffline,
    /// The connect command itself failed.
    ConnectFailed,
    /// Same SSID was just attempted; suppressed.
    Debounced,
    /// Not a Wi-Fi QR; the caller routes it onward (OCR path).
    NotWifi,
}

#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub backoff_secs: i64,
    pub connect_wait: Duration,
    pub verify_poll: Duration,
    pub qr_debounce_secs: i64,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            backoff_secs: 60,
            connect_wait: Duration::from_secs(8),
            verify_poll: Duration::from_millis(600),
            qr_debounce_secs: 6,
        }
    }
}

/// Clears the capture-busy flag on drop.
pub struct BusyGuard {
    busy: Arc<AtomicUsize>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.busy.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Central connectivity coordinator: decides online/offline, scans
/// periodically, autoconnects to known networks under per-SSID backoff,
/// and reacts to captured Wi-Fi QRs out-of-band of that backoff.
pub struct Orchestrator {
    bus: Arc<Bus>,
    probe: Arc<dyn NetworkProbe>,
    connector: Arc<dyn ConnectExecutor>,
    store: Arc<dyn SessionStore>,
    feedback: Arc<dyn Feedback>,
    settings: WatchSettings,
    busy: Arc<AtomicUsize>,
    // serializes connect attempts across the capture path and the tick
    connect_gate: tokio::sync::Mutex<()>,
    state: Mutex<Option<ConnectivityState>>,
    last_qr: Mutex<Option<(String, i64)>>,
}

impl Orchestrator {
    pub fn new(
        bus: Arc<Bus>,
        probe: Arc<dyn NetworkProbe>,
        connector: Arc<dyn ConnectExecutor>,
        store: Arc<dyn SessionStore>,
        feedback: Arc<dyn Feedback>,
        settings: WatchSettings,
    ) -> Self {
        Self {
            bus,
            probe,
            connector,
            store,
            feedback,
            settings,
            busy: Arc::new(AtomicUsize::new(0)),
            connect_gate: tokio::sync::Mutex::new(()),
            state: Mutex::new(None),
            last_qr: Mutex::new(None),
        }
    }

    /// Mark the device as mid-capture for the lifetime of the guard;
    /// watch ticks skip autoconnect while any guard is alive.
    pub fn capture_guard(&self) -> BusyGuard {
        self.busy.fetch_add(1, Ordering::SeqCst);
        BusyGuard {
            busy: self.busy.clone(),
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.state.lock().unwrap().clone().unwrap_or_default()
    }

    /// Initial probe + scan, run once at boot. Emits the starting
    /// connectivity event and the first scan tick, and returns whether
    /// the device came up online.
    pub async fn bootstrap(&self) -> bool {
        let online = self.probe.is_online().await;
        let ssid = if online {
            self.probe.active_ssid().await
        } else {
            None
        };
        *self.state.lock().unwrap() = Some(ConnectivityState { online, ssid });

        self.emit_online(online);
        let ssids = self.probe.scan().await;
        self.bus
            .emit(EventKind::NetScanTick, Some(Payload::Ssids(ssids)));

        online
    }

    /// One periodic watch tick: re-check reachability (emitting
    /// `NET_ONLINE`/`NET_OFFLINE` on change), re-scan (always emitting
    /// `NET_SCAN_TICK`), then try one backoff-eligible autoconnect.
    pub async fn tick(&self) {
        let online = self.probe.is_online().await;

        let changed = {
            let mut guard = self.state.lock().unwrap();
            match guard.as_mut() {
                Some(state) if state.online == online => false,
                Some(state) => {
                    state.online = online;
                    if !online {
                        state.ssid = None;
                    }
                    true
                }
                None => {
                    *guard = Some(ConnectivityState { online, ssid: None });
                    true
                }
            }
        };

        if changed {
            if online {
                let ssid = self.probe.active_ssid().await;
                if let Some(state) = self.state.lock().unwrap().as_mut() {
                    state.ssid = ssid;
                }
            }
            self.emit_online(online);
        }

        let ssids = self.probe.scan().await;
        self.bus
            .emit(EventKind::NetScanTick, Some(Payload::Ssids(ssids.clone())));

        if online {
            return;
        }
        if self.busy.load(Ordering::SeqCst) > 0 {
            log::debug!("capture in progress, skipping autoconnect");
            return;
        }
        self.autoconnect(&ssids).await;
    }

    /// Spawn the background watch loop. It runs until the stop channel
    /// yields (or closes); in-flight OS commands ride out their own
    /// timeouts rather than being cancelled.
    pub fn spawn_watch(
        self: &Arc<Self>,
        interval: Duration,
        stop: async_channel::Receiver<()>,
    ) -> tokio::task::JoinHandle<()> {
        let orchestrator = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first interval tick fires immediately; skip it so the
            // boot sequence owns the initial events
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => orchestrator.tick().await,
                    _ = stop.recv() => break,
                }
            }
            log::info!("connectivity watch stopped");
        })
    }

    /// Route one classified frame. Only `WifiQr` produces connectivity
    /// work; everything else is the caller's to forward (OCR path) and
    /// emits no connectivity event here.
    pub async fn handle_frame(&self, decision: &FrameClassification) -> QrOutcome {
        let FrameClassification::WifiQr {
            creds,
            masked_payload,
        } = decision
        else {
            return QrOutcome::NotWifi;
        };

        log::info!("wifi qr ssid={} payload={masked_payload}", creds.ssid);
        self.connect_via_qr(creds).await
    }

    /// Connect-and-verify for an explicitly captured QR: out-of-band of
    /// the scan backoff, but serialized with it and debounced per SSID.
    async fn connect_via_qr(&self, creds: &WifiCredentials) -> QrOutcome {
        let _busy = self.capture_guard();
        let now = Utc::now().timestamp();

        {
            let mut last = self.last_qr.lock().unwrap();
            if let Some((ssid, ts)) = last.as_ref() {
                if *ssid == creds.ssid && now - ts < self.settings.qr_debounce_secs {
                    log::debug!("debouncing repeat qr for {ssid}");
                    return QrOutcome::Debounced;
                }
            }
            *last = Some((creds.ssid.clone(), now));
        }

        if let Some(active) = self.probe.active_ssid().await {
            if active != creds.ssid {
                log::info!("switching network {active} -> {}", creds.ssid);
                self.feedback.speak("Switching networks");
            }
        }

        let _gate = self.connect_gate.lock().await;
        self.store.mark_connect_attempt(&creds.ssid, None);
        let outcome = self
            .connector
            .connect(&creds.ssid, creds.password.as_deref(), creds.hidden)
            .await;

        if !outcome.ok {
            log::info!(
                "connect failed ssid={} rc={} diag={}",
                creds.ssid,
                outcome.exit_code,
                outcome.diagnostic
            );
            self.bus.emit(
                EventKind::NetConnectFailed,
                Some(Payload::Note(outcome.diagnostic)),
            );
            self.feedback.speak("Connection failed");
            return QrOutcome::ConnectFailed;
        }

        // connect success is necessary but not sufficient: only a probe
        // inside the wait window confirms Online
        let deadline = tokio::time::Instant::now() + self.settings.connect_wait;
        while tokio::time::Instant::now() < deadline {
            if self.probe.is_online().await {
                *self.state.lock().unwrap() = Some(ConnectivityState {
                    online: true,
                    ssid: Some(creds.ssid.clone()),
                });
                log::info!("online after qr ssid={}", creds.ssid);
                self.bus.emit(
                    EventKind::NetConnectOk,
                    Some(Payload::Ssid(creds.ssid.clone())),
                );
                self.feedback.speak("Connected");
                self.bus.emit(EventKind::ModeSwitchRequest, None);
                return QrOutcome::Connected;
            }
            tokio::time::sleep(self.settings.verify_poll).await;
        }

        log::info!("still offline after connect ssid={}", creds.ssid);
        self.bus.emit(EventKind::NetStillOffline, None);
        self.feedback.speak("Still offline");
        QrOutcome::StillOffline
    }

    /// Try the first scanned SSID with stored credentials whose last
    /// attempt is older than the backoff window. One candidate per tick.
    async fn autoconnect(&self, ssids: &[String]) {
        let known = self.store.known_networks();

        for ssid in ssids {
            let Some(network) = known.get(ssid) else {
                continue;
            };
            if self.store.last_attempt_age(ssid) < self.settings.backoff_secs {
                continue;
            }

            let _gate = self.connect_gate.lock().await;
            self.store.mark_connect_attempt(ssid, None);
            log::info!("autoconnect attempt ssid={ssid}");
            let outcome = self
                .connector
                .connect(ssid, network.password.as_deref(), false)
                .await;

            if !outcome.ok {
                self.bus.emit(
                    EventKind::NetConnectFailed,
                    Some(Payload::Note(outcome.diagnostic)),
                );
            }
            return;
        }
    }

    fn emit_online(&self, online: bool) {
        let kind = if online {
            EventKind::NetOnline
        } else {
            EventKind::NetOffline
        };
        self.bus.emit(kind, Some(Payload::Online(online)));
    }
}
