//! EnvNode Firmware: Main Entry Point
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SimulatedBus      NvsAdapter     HttpPushTransport            │
//! │  (RegisterReader)  (StoragePort)  (PushTransport)              │
//! │  LogEventSink      SystemClock    CommandDispatcher            │
//! │  (EventSink)       (ClockPort)    (command channel)            │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              NodeService (Arc-shared)                  │    │
//! │  │  Tracker · Sampler · TransmissionEngine · Scheduler    │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  main: tick loop  push-tx: scheduled pushes   cmd-rx: commands │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::prelude::Peripherals;
use esp_idf_svc::sntp::EspSntp;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use log::{error, info, warn};

use envnode::adapters::device_id;
use envnode::adapters::http_push::HttpPushTransport;
use envnode::adapters::log_sink::LogEventSink;
use envnode::adapters::nvs::NvsAdapter;
use envnode::adapters::sensor_bus::SimulatedBus;
use envnode::adapters::system;
use envnode::adapters::time::SystemClock;
use envnode::app::ports::ClockPort;
use envnode::app::service::NodeService;
use envnode::config::NodeSettings;
use envnode::drivers::task_pin::{Core, spawn_on_core};
use envnode::rpc::dispatcher::{CommandDispatcher, PollOutcome};
use envnode::rpc::transport::NullTransport;

/// Build-time network credentials.
const WIFI_SSID: &str = match option_env!("ENVNODE_WIFI_SSID") {
    Some(s) => s,
    None => "",
};
const WIFI_PASS: &str = match option_env!("ENVNODE_WIFI_PASS") {
    Some(s) => s,
    None => "",
};

const WIFI_CONNECT_ATTEMPTS: u32 = 5;

/// Command channel poll period.
const CMD_POLL_MS: u64 = 50;

/// Push worker poll period while nothing is queued.
const PUSH_POLL_MS: u64 = 50;

type Node = NodeService<SimulatedBus, NvsAdapter, HttpPushTransport>;

fn connect_wifi(wifi: &mut BlockingWifi<EspWifi<'static>>) -> Result<()> {
    if WIFI_SSID.is_empty() {
        return Err(anyhow!("no WiFi SSID configured (ENVNODE_WIFI_SSID)"));
    }
    let auth_method = if WIFI_PASS.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPAWPA2Personal
    };
    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: WIFI_SSID.try_into().map_err(|_| anyhow!("wifi ssid too long"))?,
        password: WIFI_PASS
            .try_into()
            .map_err(|_| anyhow!("wifi password too long"))?,
        auth_method,
        ..Default::default()
    }))?;
    wifi.start()?;

    let mut last_err = None;
    for attempt in 1..=WIFI_CONNECT_ATTEMPTS {
        match wifi.connect().and_then(|()| wifi.wait_netif_up()) {
            Ok(()) => {
                info!("WiFi: connected to '{}' (attempt {})", WIFI_SSID, attempt);
                return Ok(());
            }
            Err(e) => {
                warn!("WiFi: attempt {}/{} failed: {:?}", attempt, WIFI_CONNECT_ATTEMPTS, e);
                last_err = Some(e);
            }
        }
    }
    Err(anyhow!("WiFi connect failed: {:?}", last_err))
}

fn run_command_channel(node: Arc<Node>) {
    let clock = SystemClock::new();
    let mut sink = LogEventSink::new();
    let mut dispatcher = CommandDispatcher::new(NullTransport);
    loop {
        match dispatcher.poll(node.as_ref(), &clock, &mut sink) {
            Ok(PollOutcome::Restart) => system::restart(),
            Ok(PollOutcome::Handled(_)) => {}
            Err(e) => warn!("Command channel: transport error {:?}", e),
        }
        std::thread::sleep(Duration::from_millis(CMD_POLL_MS));
    }
}

fn run_push_worker(node: Arc<Node>) {
    let mut sink = LogEventSink::new();
    loop {
        if node.run_pending_push(&mut sink).is_none() {
            std::thread::sleep(Duration::from_millis(PUSH_POLL_MS));
        }
    }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  EnvNode v{}                        ║", envnode::FIRMWARE_VERSION);
    info!("╚══════════════════════════════════════╝");

    let settings = NodeSettings::default();
    settings
        .validate()
        .map_err(|e| anyhow!("invalid node settings: {e}"))?;

    // ── 2. Network + wall clock ───────────────────────────────
    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let mut wifi = BlockingWifi::wrap(
        EspWifi::new(peripherals.modem, sys_loop.clone(), None)?,
        sys_loop,
    )?;
    if let Err(e) = connect_wifi(&mut wifi) {
        // Pushes fail as Unreachable until the link is back.
        error!("{:#}", e);
    }
    let _sntp = EspSntp::new_default().context("failed to start SNTP")?;

    // ── 3. Adapters ───────────────────────────────────────────
    let storage = NvsAdapter::new().unwrap_or_else(|e| {
        warn!("NVS init failed ({}), running without persistence", e);
        NvsAdapter::default()
    });
    let clock = SystemClock::new();
    let identity = device_id::local_identity();
    info!("Device ID: {}", identity.device_id);
    if !clock.is_synced() {
        warn!("Wall clock not synced yet; timestamps start at the epoch");
    }

    // ── 4. Boot the core ──────────────────────────────────────
    let mut sink = LogEventSink::new();
    let bus_unit = settings.channels.first().map_or(1, |c| c.unit_id);
    let node: Arc<Node> = Arc::new(NodeService::boot(
        identity,
        &settings,
        SimulatedBus::new(bus_unit),
        storage,
        HttpPushTransport::new(),
        clock.now(),
        &mut sink,
    ));

    // ── 5. Command channel ────────────────────────────────────
    // NullTransport until the cloud function bridge is wired in.
    let cmd_node = Arc::clone(&node);
    let _cmd_thread = spawn_on_core(Core::Pro, 5, 16, "cmd-rx\0", move || {
        run_command_channel(cmd_node);
    })
    .context("failed to spawn command thread")?;

    // ── 6. Push worker ────────────────────────────────────────
    // Keeps HTTP stalls off the tick loop.
    let push_node = Arc::clone(&node);
    let _push_thread = spawn_on_core(Core::App, 4, 16, "push-tx\0", move || {
        run_push_worker(push_node);
    })
    .context("failed to spawn push worker")?;

    info!("System ready. Entering tick loop.");

    // ── 7. Tick loop ──────────────────────────────────────────
    let tick = Duration::from_millis(u64::from(settings.tick_ms));
    loop {
        node.run_tick(clock.uptime_ms(), clock.now(), &mut sink);
        std::thread::sleep(tick);
    }
}
