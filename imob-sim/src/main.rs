//! I-Mob immobilizer simulator
//!
//! Runs the firmware core against a host board. Peer actions and sensor
//! inputs come from a script (or stdin), one command per line.

mod board;
mod script;

use anyhow::Context;
use board::{sim_peripherals, SimBoard, SimInputs};
use data_encoding::HEXUPPER;
use imob_core::{
    derive_secrets, Attribute, Config, Immobilizer, LinkEvent, Millis, PeerAddress, RelayPhase,
};
use imob_proto::format_address;
use log::*;
use script::{parse_device_id, parse_line, Command};
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tokio::time::Instant;

#[derive(clap::Parser)]
#[command(name = "imob-sim")]
#[command(about = "I-Mob immobilizer simulator")]
struct Cli {
    /// More logging (-v debug, -vv trace). RUST_LOG wins when set.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run the firmware
    Run {
        /// JSON config file; missing fields use the defaults
        #[arg(long)]
        config: Option<PathBuf>,
        /// Command script; stdin when omitted
        #[arg(long)]
        script: Option<PathBuf>,
        /// Factory device id as 16 hex digits; random when omitted
        #[arg(long)]
        device_id: Option<String>,
        /// Follow the wall clock instead of a virtual one
        #[arg(long)]
        realtime: bool,
    },
    /// Print the pass and key a peer needs for a device id
    Credentials {
        #[arg(long)]
        device_id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli: Cli = clap::Parser::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Credentials { device_id } => {
            let (pass, key) = derive_secrets(parse_device_id(&device_id)?);
            println!("pass {}", HEXUPPER.encode(pass.as_bytes()));
            println!("key  {}", HEXUPPER.encode(key.as_bytes()));
        }
        Commands::Run {
            config,
            script,
            device_id,
            realtime,
        } => {
            let config = match &config {
                Some(path) => Config::load(path)?,
                None => Config::default(),
            };
            let device_id = match device_id {
                Some(id) => parse_device_id(&id)?,
                None => rand::random(),
            };

            let sim = Simulator::new(config, device_id)?;
            if realtime {
                run_realtime(sim, script).await?;
            } else {
                run_virtual(sim, script).await?;
            }
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "info".into()),
        1 => tracing_subscriber::EnvFilter::new("debug"),
        _ => tracing_subscriber::EnvFilter::new("trace"),
    };
    // Also installs the bridge that forwards `log` records
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

struct Simulator {
    imob: Immobilizer<SimBoard>,
    inputs: SimInputs,
    pass: Vec<u8>,
    peer: Option<PeerAddress>,
    now: Millis,
    next_tick: Millis,
    tick_ms: Millis,
}

impl Simulator {
    fn new(config: Config, device_id: [u32; 2]) -> anyhow::Result<Self> {
        let tick_ms = config.tick_ms;
        let (peripherals, inputs) = sim_peripherals(device_id);
        let imob = Immobilizer::new(config, peripherals).context("invalid configuration")?;
        let pass = derive_secrets(device_id).0.as_bytes().to_vec();

        Ok(Self {
            imob,
            inputs,
            pass,
            peer: None,
            now: 0,
            next_tick: tick_ms,
            tick_ms,
        })
    }

    /// Apply a command at the current time. `sleep` is the caller's business.
    fn apply(&mut self, command: Command) {
        match command {
            Command::Connect(peer) => {
                if let Some(current) = self.peer {
                    warn!("Already connected to {}", format_address(&current));
                    return;
                }
                self.peer = Some(peer);
                self.imob.gatt_mut().set_connected(true);
                self.imob.handle(LinkEvent::Connected(peer), self.now);
            }
            Command::Disconnect => self.disconnect(),
            Command::Write { attribute, data } => self.write(attribute, data),
            Command::Auth => {
                self.write(Attribute::Nonce, vec![0; 16]);
                self.write(Attribute::Pass, self.pass.clone());
            }
            Command::Contact(level) => self.inputs.contact.set(level),
            Command::Charger(level) => self.inputs.charger.set(level),
            Command::Battery(level) => self.inputs.battery.set(level),
            Command::Accel(sample) => self.inputs.accel.set(sample),
            Command::Sleep(_) => {}
            Command::Show => self.show(),
        }
    }

    fn write(&mut self, attribute: Attribute, data: Vec<u8>) {
        if self.peer.is_none() {
            warn!("No peer connected, write to {} ignored", attribute);
            return;
        }
        self.imob.handle(LinkEvent::DataWritten { attribute, data }, self.now);
    }

    fn disconnect(&mut self) {
        if self.peer.take().is_none() {
            return;
        }
        self.imob.gatt_mut().set_connected(false);
        self.imob.handle(LinkEvent::Disconnected, self.now);
    }

    fn tick(&mut self) {
        self.imob.tick(self.now);
        if self.imob.gatt_mut().take_disconnect_request() {
            self.disconnect();
        }
    }

    /// Step the virtual clock to `target`, running every tick and relay
    /// transition on the way at its own timestamp
    fn advance_to(&mut self, target: Millis) {
        loop {
            let timer = self.imob.next_deadline().filter(|due| *due < self.next_tick);
            let next = timer.unwrap_or(self.next_tick);
            if next > target {
                break;
            }

            self.now = next;
            if timer.is_some() {
                self.imob.poll_timers(self.now);
            } else {
                self.tick();
                self.next_tick = self.next_tick.saturating_add(self.tick_ms);
            }
        }
        self.now = target;
    }

    fn show(&self) {
        let session = self.imob.session();
        info!(
            "t={}ms authenticated={} activated={} connected={} auth={:?} relay={:?} alarm={}",
            self.now,
            session.is_authenticated(),
            session.is_activated(),
            session.is_user_connected(),
            self.imob.auth_state(),
            self.imob.relay_phase(),
            self.imob.alarm_state(),
        );
        for attribute in Attribute::ALL {
            let value = self.imob.gatt().value(attribute).map(|v| HEXUPPER.encode(v));
            info!("  {:<16} {}", attribute.name(), value.as_deref().unwrap_or("-"));
        }
    }
}

async fn read_source(script: Option<PathBuf>) -> anyhow::Result<String> {
    match script {
        Some(path) => tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("reading {}", path.display())),
        None => {
            let mut text = String::new();
            let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
            while let Some(line) = lines.next_line().await? {
                text.push_str(&line);
                text.push('\n');
            }
            Ok(text)
        }
    }
}

/// Run the whole script against the virtual clock
async fn run_virtual(mut sim: Simulator, script: Option<PathBuf>) -> anyhow::Result<()> {
    let text = read_source(script).await?;

    for (n, line) in text.lines().enumerate() {
        let Some(command) = parse_line(line).with_context(|| format!("line {}", n + 1))? else {
            continue;
        };
        match command {
            Command::Sleep(ms) => sim.advance_to(sim.now + ms),
            other => sim.apply(other),
        }
    }

    // Let a pending relay sequence finish so the final state is settled
    if sim.imob.relay_phase() != RelayPhase::Idle {
        info!("Script done, running relay sequence to completion");
    }
    while let Some(due) = sim.imob.next_deadline() {
        sim.advance_to(due);
        if sim.imob.relay_phase() == RelayPhase::Idle {
            break;
        }
    }
    sim.show();
    Ok(())
}

/// Feed parsed commands to the event loop, honouring `sleep` by waiting
async fn feed_commands(script: Option<PathBuf>, tx: mpsc::Sender<Command>) -> anyhow::Result<()> {
    match script {
        Some(path) => {
            let text = tokio::fs::read_to_string(&path)
                .await
                .with_context(|| format!("reading {}", path.display()))?;
            for (n, line) in text.lines().enumerate() {
                if !feed_line(n + 1, line, &tx).await {
                    break;
                }
            }
        }
        None => {
            let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
            let mut n = 0;
            while let Some(line) = lines.next_line().await? {
                n += 1;
                if !feed_line(n, &line, &tx).await {
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Returns false once the event loop has gone away
async fn feed_line(n: usize, line: &str, tx: &mpsc::Sender<Command>) -> bool {
    match parse_line(line) {
        Ok(Some(Command::Sleep(ms))) => tokio::time::sleep(Duration::from_millis(ms)).await,
        Ok(Some(command)) => return tx.send(command).await.is_ok(),
        Ok(None) => {}
        Err(e) => warn!("line {}: {}", n, e),
    }
    true
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

/// Run against the wall clock until Ctrl-C
async fn run_realtime(sim: Simulator, script: Option<PathBuf>) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::channel(16);
    let feeder = tokio::spawn(feed_commands(script, tx));

    info!("Running in real time, Ctrl-C to stop");
    let sim = drive_realtime(sim, rx, tokio::signal::ctrl_c()).await;

    feeder.abort();
    sim.show();
    Ok(())
}

/// Tick, poll and apply commands as they arrive until `stop` resolves
async fn drive_realtime<F: Future>(
    mut sim: Simulator,
    mut rx: mpsc::Receiver<Command>,
    stop: F,
) -> Simulator {
    let start = Instant::now();
    let elapsed = || start.elapsed().as_millis() as Millis;
    let mut commands_open = true;

    let mut ticker = tokio::time::interval(Duration::from_millis(sim.tick_ms));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    tokio::pin!(stop);

    loop {
        let deadline = sim.imob.next_deadline().map(|due| start + Duration::from_millis(due));

        tokio::select! {
            _ = ticker.tick() => {
                sim.now = elapsed();
                sim.tick();
            }
            _ = wait_until(deadline) => {
                sim.now = elapsed();
                sim.imob.poll_timers(sim.now);
            }
            command = rx.recv(), if commands_open => match command {
                Some(command) => {
                    sim.now = elapsed();
                    sim.apply(command);
                }
                None => {
                    commands_open = false;
                    info!("Input finished, still running");
                }
            },
            _ = &mut stop => break,
        }
    }
    sim
}
