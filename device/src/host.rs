use std::{io::ErrorKind, path::PathBuf, time::Duration};

use anyhow::Context;
use chime_common::{
    DeviceAction, DeviceEngine, DeviceEvent, FrameSplitter, Message, RuntimeConfig, Time,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::mpsc::{self, UnboundedSender},
    time::MissedTickBehavior,
};
use tracing::{debug, info, warn};

use crate::{
    clock::{HostClock, MinuteWatch},
    console::{parse_console_command, ConsoleCommand},
    tone::{ToneOutput, TraceSink},
};

const CLOCK_POLL: Duration = Duration::from_secs(1);
const READ_CHUNK_BYTES: usize = 256;

/// Everything that reaches the engine from outside the timer loop.
#[derive(Debug)]
enum HostEvent {
    PeerAttached {
        id: u64,
        outbox: UnboundedSender<String>,
    },
    PeerDetached {
        id: u64,
    },
    Frame {
        id: u64,
        frame: String,
    },
    Console(ConsoleCommand),
}

struct Peer {
    id: u64,
    outbox: UnboundedSender<String>,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut runtime = load_runtime_config().await.unwrap_or_else(|err| {
        warn!("failed to load runtime config: {err:#}");
        RuntimeConfig::default()
    });
    if let Ok(addr) = std::env::var("CHIME_LISTEN_ADDR") {
        runtime.device.listen_addr = addr;
    }
    let config = runtime.device;

    let boot_time = Time::from_chrono(&chrono::Local::now());
    let mut clock = HostClock::new(boot_time);
    let mut minutes = MinuteWatch::default();
    minutes.reset(boot_time);
    let mut engine = DeviceEngine::new(config.clone(), boot_time);

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind device link at {}", config.listen_addr))?;
    info!(
        "device booted at {boot_time}, waiting for controller on {}",
        config.listen_addr
    );

    let (events_tx, mut events) = mpsc::unbounded_channel();
    let tones = ToneOutput::spawn(TraceSink);
    spawn_link_acceptor(listener, events_tx.clone(), config.max_frame_bytes);
    spawn_console(events_tx);

    let mut peer: Option<Peer> = None;
    let mut ticks = tokio::time::interval(Duration::from_millis(config.tick_interval_ms));
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut clock_poll = tokio::time::interval(CLOCK_POLL);

    // Single owner of the engine: each event is applied to completion
    // before the next one is taken.
    loop {
        let event = tokio::select! {
            _ = ticks.tick() => Some(DeviceEvent::Tick),
            _ = clock_poll.tick() => {
                let now = clock.now();
                minutes
                    .observe(now)
                    .then_some(DeviceEvent::MinuteRollover(now))
            }
            event = events.recv() => {
                let Some(event) = event else {
                    break;
                };
                handle_host_event(event, &mut peer, &engine, &clock)
            }
        };

        let Some(event) = event else {
            continue;
        };

        match engine.apply(event) {
            Ok(actions) => {
                execute_device_actions(actions, &mut clock, &mut minutes, peer.as_ref(), &tones)
            }
            Err(err) => debug!("dropping frame: {err}"),
        }
    }

    Ok(())
}

fn handle_host_event(
    event: HostEvent,
    peer: &mut Option<Peer>,
    engine: &DeviceEngine,
    clock: &HostClock,
) -> Option<DeviceEvent> {
    match event {
        HostEvent::PeerAttached { id, outbox } => {
            if let Some(previous) = peer.replace(Peer { id, outbox }) {
                info!("controller link {} replaced by link {id}", previous.id);
            }
            None
        }
        HostEvent::PeerDetached { id } => {
            if peer.as_ref().is_some_and(|current| current.id == id) {
                *peer = None;
                info!("controller link {id} closed, running autonomously");
            }
            None
        }
        HostEvent::Frame { id, frame } => {
            if !peer.as_ref().is_some_and(|current| current.id == id) {
                debug!("ignoring frame from stale link {id}");
                return None;
            }
            match Message::decode(&frame) {
                Ok(message) => Some(DeviceEvent::Received(message)),
                Err(err) => {
                    debug!("dropping frame {frame:?}: {err}");
                    None
                }
            }
        }
        HostEvent::Console(ConsoleCommand::Shake) => Some(DeviceEvent::Stop),
        HostEvent::Console(ConsoleCommand::ButtonA) => Some(DeviceEvent::Resume),
        HostEvent::Console(ConsoleCommand::Status) => {
            let state = engine.state();
            info!(
                clock = %clock.now(),
                alarm = %state.alarm_time,
                calibrated = state.calibrated,
                playing = state.playback.active,
                cursor = state.playback.cursor,
                controller = peer.is_some(),
                "device status"
            );
            None
        }
    }
}

fn execute_device_actions(
    actions: Vec<DeviceAction>,
    clock: &mut HostClock,
    minutes: &mut MinuteWatch,
    peer: Option<&Peer>,
    tones: &ToneOutput,
) {
    for action in actions {
        match action {
            DeviceAction::Play(pluck) => {
                tones.play(pluck);
            }
            DeviceAction::Silence => tones.silence(),
            DeviceAction::SetClock(time) => {
                clock.set(time);
                minutes.reset(time);
                info!("clock calibrated to {time}");
            }
            DeviceAction::Send(message) => {
                if let Message::Playback(playing) = message {
                    info!(playing, "playback changed");
                }
                match peer {
                    Some(peer) => {
                        if peer.outbox.send(message.to_frame()).is_err() {
                            debug!("controller link {} closing, dropping {message}", peer.id);
                        }
                    }
                    None => debug!("no controller attached, dropping {message}"),
                }
            }
        }
    }
}

fn spawn_link_acceptor(
    listener: TcpListener,
    events: UnboundedSender<HostEvent>,
    max_frame_bytes: usize,
) {
    tokio::spawn(async move {
        let mut next_id: u64 = 0;
        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    next_id = next_id.saturating_add(1);
                    info!("controller link {next_id} opened from {addr}");
                    spawn_peer(next_id, stream, events.clone(), max_frame_bytes);
                }
                Err(err) => {
                    warn!("device link accept error: {err}");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    });
}

fn spawn_peer(
    id: u64,
    stream: TcpStream,
    events: UnboundedSender<HostEvent>,
    max_frame_bytes: usize,
) {
    let (mut reader, mut writer) = stream.into_split();
    let (outbox, mut outgoing) = mpsc::unbounded_channel::<String>();
    if events.send(HostEvent::PeerAttached { id, outbox }).is_err() {
        return;
    }

    tokio::spawn(async move {
        while let Some(frame) = outgoing.recv().await {
            if let Err(err) = writer.write_all(frame.as_bytes()).await {
                warn!("controller link {id} write error: {err}");
                break;
            }
        }
    });

    tokio::spawn(async move {
        let mut splitter = FrameSplitter::new(max_frame_bytes);
        let mut chunk = [0u8; READ_CHUNK_BYTES];
        loop {
            let read = match reader.read(&mut chunk).await {
                Ok(0) => break,
                Ok(read) => read,
                Err(err) => {
                    warn!("controller link {id} read error: {err}");
                    break;
                }
            };
            for frame in splitter.push(&chunk[..read]) {
                match frame {
                    Ok(frame) => {
                        if events.send(HostEvent::Frame { id, frame }).is_err() {
                            return;
                        }
                    }
                    Err(err) => debug!("controller link {id} dropping frame: {err}"),
                }
            }
        }
        let _ = events.send(HostEvent::PeerDetached { id });
    });
}

fn spawn_console(events: UnboundedSender<HostEvent>) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => match parse_console_command(&line) {
                    Some(command) => {
                        if events.send(HostEvent::Console(command)).is_err() {
                            break;
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => warn!("unknown console command {line:?} (shake, a, status)"),
                },
                Ok(None) => break,
                Err(err) => {
                    warn!("console read error: {err}");
                    break;
                }
            }
        }
    });
}

async fn load_runtime_config() -> anyhow::Result<RuntimeConfig> {
    let path = std::env::var("CHIME_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("./.chime"))
        .join("runtime.json");

    match tokio::fs::read(&path).await {
        Ok(raw) => RuntimeConfig::from_json_slice(&raw)
            .with_context(|| format!("invalid runtime config at {}", path.display())),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(RuntimeConfig::default()),
        Err(err) => Err(err.into()),
    }
}
