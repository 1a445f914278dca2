use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use clap::ArgMatches;
use log::{info, warn};
use tokio::io::AsyncBufReadExt;

use lector::camera::{Camera, NoCamera, StillCamera};
use lector::cli::cli;
use lector::config::Config;
use lector::event::{Bus, EventKind, Payload};
use lector::feedback::{Feedback, NullFeedback, SpeechCommand};
use lector::frame::{FrameClassification, FrameClassifier};
use lector::mode::{ModeManager, OfflineMode, OnlineMode};
use lector::net::{
    ConnectExecutor, NetworkProbe, NmcliConnector, NmcliProbe, Orchestrator,
};
use lector::ocr::{NullOcr, Ocr};
use lector::session::{JsonSessionStore, SessionStore};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = cli().get_matches();
    let config = Config::load(matches.get_one::<String>("config").map(PathBuf::from))?;

    match matches.subcommand() {
        Some(("status", _)) => status(&config).await,
        Some(("scan", _)) => scan(&config).await,
        Some(("connect", sub)) => connect(&config, sub).await,
        _ => run(config).await,
    }
}

fn probe_for(config: &Config) -> NmcliProbe {
    NmcliProbe::new(
        config.probe_host.clone(),
        config.probe_attempts,
        Duration::from_secs(config.probe_timeout_secs),
    )
}

async fn status(config: &Config) -> Result<()> {
    let probe = probe_for(config);
    let online = probe.is_online().await;
    let ssid = probe.active_ssid().await;
    println!("online: {online}");
    println!("ssid: {}", ssid.as_deref().unwrap_or("-"));
    Ok(())
}

async fn scan(config: &Config) -> Result<()> {
    let probe = probe_for(config);
    for ssid in probe.scan().await {
        println!("{ssid}");
    }
    Ok(())
}

async fn connect(config: &Config, matches: &ArgMatches) -> Result<()> {
    let ssid = matches.get_one::<String>("ssid").expect("required");
    let password = matches.get_one::<String>("password").map(String::as_str);
    let hidden = matches.get_flag("hidden");

    let connector = NmcliConnector::new(Duration::from_secs(config.connect_timeout_secs));
    let outcome = connector.connect(ssid, password, hidden).await;
    println!(
        "ok: {} (rc={}) {}",
        outcome.ok, outcome.exit_code, outcome.diagnostic
    );
    Ok(())
}

async fn run(config: Config) -> Result<()> {
    info!("starting lector");

    let bus = Arc::new(Bus::new());
    let store: Arc<dyn SessionStore> = Arc::new(JsonSessionStore::new(
        config.session_file.clone(),
        config.networks_file.clone(),
    ));

    // config-declared networks win over whatever the sidecar remembers
    if !config.known_networks.is_empty() {
        let mut known = store.known_networks();
        known.extend(config.known_networks.clone());
        store.set_known_networks(known);
    }

    let feedback: Arc<dyn Feedback> = match config.speech_command.as_deref().and_then(SpeechCommand::new)
    {
        Some(speech) => Arc::new(speech),
        None => Arc::new(NullFeedback),
    };

    let probe: Arc<dyn NetworkProbe> = Arc::new(probe_for(&config));
    let connector: Arc<dyn ConnectExecutor> = Arc::new(NmcliConnector::new(Duration::from_secs(
        config.connect_timeout_secs,
    )));
    let orchestrator = Arc::new(Orchestrator::new(
        bus.clone(),
        probe.clone(),
        connector,
        store.clone(),
        feedback.clone(),
        config.watch_settings(),
    ));

    let offline = Arc::new(Mutex::new(OfflineMode::new(feedback.clone(), store.clone())));
    OfflineMode::attach(&offline, &bus);
    let online = Arc::new(Mutex::new(OnlineMode::new(feedback.clone())));
    let manager = ModeManager::new(offline, online);
    manager.attach(&bus);

    let classifier = FrameClassifier::new(config.wifi_prefix.clone());
    let camera: Arc<dyn Camera> = match &config.camera_source {
        Some(path) => Arc::new(StillCamera::new(path.clone())),
        None => Arc::new(NoCamera),
    };
    let ocr: Arc<dyn Ocr> = Arc::new(NullOcr);

    let online_now = orchestrator.bootstrap().await;
    manager.start(online_now);

    // button events arrive on the bus; handlers stay synchronous, so the
    // capture and double-press work is relayed to the async loop
    let (capture_tx, capture_rx) = async_channel::unbounded::<()>();
    {
        let tx = capture_tx.clone();
        bus.subscribe(EventKind::BtnCaptureShort, move |_| {
            let _ = tx.try_send(());
        });
    }
    let (double_tx, double_rx) = async_channel::unbounded::<()>();
    {
        let tx = double_tx.clone();
        bus.subscribe(EventKind::BtnCaptureDouble, move |_| {
            let _ = tx.try_send(());
        });
    }

    let (stop_tx, stop_rx) = async_channel::bounded::<()>(1);
    let watch = orchestrator.spawn_watch(Duration::from_secs(config.scan_interval_secs), stop_rx);

    // the button service is an external collaborator; until it is wired
    // in, event names typed on stdin stand in for it
    let input = tokio::spawn(relay_stdin(bus.clone()));

    info!("ready");
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
            received = capture_rx.recv() => {
                if received.is_err() {
                    break;
                }
                handle_capture(&bus, &camera, &classifier, &orchestrator, &ocr, &feedback).await;
            }
            received = double_rx.recv() => {
                if received.is_err() {
                    break;
                }
                if probe.is_online().await {
                    bus.emit(EventKind::ModeSwitchRequest, None);
                } else {
                    info!("online mode requested but still offline");
                    feedback.speak("Still offline");
                }
            }
        }
    }

    input.abort();
    let _ = stop_tx.send(()).await;
    let _ = watch.await;
    Ok(())
}

/// Emit events by name, one per line of stdin (`BTN_CAPTURE_SHORT`,
/// `BTN_NEXT_LONG`, ...). Returns on EOF.
async fn relay_stdin(bus: Arc<Bus>) {
    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let name = line.trim().to_ascii_uppercase();
        if name.is_empty() {
            continue;
        }
        match name.parse::<EventKind>() {
            Ok(kind) => bus.emit(kind, None),
            Err(_) => warn!("unknown event name: {name}"),
        }
    }
}

/// Capture one frame and route it: a Wi-Fi QR goes to the orchestrator,
/// everything else continues down the OCR path (a non-Wi-Fi QR is
/// announced on the way).
async fn handle_capture(
    bus: &Bus,
    camera: &Arc<dyn Camera>,
    classifier: &FrameClassifier,
    orchestrator: &Arc<Orchestrator>,
    ocr: &Arc<dyn Ocr>,
    feedback: &Arc<dyn Feedback>,
) {
    let _busy = orchestrator.capture_guard();

    let Some(frame) = camera.capture() else {
        warn!("no frame captured");
        feedback.speak("Capture failed");
        return;
    };

    match classifier.classify(&frame) {
        decision @ FrameClassification::WifiQr { .. } => {
            orchestrator.handle_frame(&decision).await;
        }
        decision => {
            if let FrameClassification::OtherQr { note, payload } = &decision {
                info!(
                    "non-wifi qr note={} payload={}",
                    note.as_deref().unwrap_or("-"),
                    payload.as_deref().unwrap_or("-")
                );
                feedback.speak("Unrecognized code");
            }
            let lines = ocr.extract_lines(&frame);
            if lines.is_empty() {
                bus.emit(EventKind::OcrEmpty, None);
            } else {
                bus.emit(EventKind::OcrDone, Some(Payload::Lines(lines)));
            }
        }
    }
}
