//! brainnetd - spiking network simulation service
//!
//! Owns one `Simulation`, advances it on a wall-clock tick while running,
//! and serves newline-delimited JSON requests over TCP. Clients that send
//! `Subscribe` also receive a `State` line after every tick.

use std::sync::Arc;
use std::time::Duration;

use brainnet::network::NetworkConfig;
use brainnet::observer::{NetworkAdapter, NetworkFrame};
use brainnet::simulation::{Simulation, SimulationSnapshot};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::RwLock;
use tokio::time;
use tracing::{debug, error, info, warn};

mod config;
mod error;

use config::{DaemonConfig, Invocation};
use error::DaemonError;

// ═══════════════════════════════════════════════════════════════════════════
// Protocol Messages
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Request {
    GetState,
    GetFrame,
    Play,
    Pause,
    Step,
    Reset,
    SetSpeed { value: f32 },
    Stimulate { region: String, strength: f32 },
    StimulateHub { strength: f32 },
    Input { values: Vec<f32> },
    Reward { value: f32 },
    SetLearning { algorithm: Option<String> },
    Subscribe,
    Shutdown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
enum Response {
    State(SimulationSnapshot),
    Frame(NetworkFrame),
    Success { message: String },
    Error { message: String },
}

impl Response {
    fn ok(message: impl Into<String>) -> Self {
        Response::Success {
            message: message.into(),
        }
    }

    fn err(message: impl ToString) -> Self {
        Response::Error {
            message: message.to_string(),
        }
    }
}

// Buffered snapshots per subscriber before it starts lagging.
const UPDATE_BUFFER: usize = 64;

// ═══════════════════════════════════════════════════════════════════════════
// Daemon State
// ═══════════════════════════════════════════════════════════════════════════

struct DaemonState {
    sim: Simulation,
    updates: broadcast::Sender<SimulationSnapshot>,
}

impl DaemonState {
    fn new(network: NetworkConfig) -> Result<Self, DaemonError> {
        let sim = Simulation::new(network)?;
        let (updates, _) = broadcast::channel(UPDATE_BUFFER);
        Ok(Self { sim, updates })
    }

    /// One tick of the run loop. No-op while paused.
    fn tick(&mut self) {
        if self.sim.tick() {
            self.publish();
        }
    }

    fn publish(&self) {
        if self.updates.receiver_count() > 0 {
            // Only fails when every receiver has gone away in between.
            let _ = self.updates.send(self.sim.snapshot());
        }
    }

    fn frame(&self) -> NetworkFrame {
        NetworkAdapter::new(self.sim.network()).frame()
    }

    /// Apply a request that only touches the simulation.
    ///
    /// `Subscribe` and `Shutdown` act on the connection or the process and
    /// are answered by `handle_client`.
    fn apply(&mut self, request: Request) -> Response {
        match request {
            Request::GetState => Response::State(self.sim.snapshot()),
            Request::GetFrame => Response::Frame(self.frame()),
            Request::Play => {
                self.sim.play();
                Response::ok("Playing")
            }
            Request::Pause => {
                self.sim.pause();
                Response::ok("Paused")
            }
            Request::Step => {
                self.sim.step();
                self.publish();
                Response::ok(format!("Stepped to tick {}", self.sim.network().tick()))
            }
            Request::Reset => {
                self.sim.reset();
                self.publish();
                info!("Simulation reset");
                Response::ok("Reset")
            }
            Request::SetSpeed { value } => match self.sim.set_speed(value) {
                Ok(()) => {
                    info!("Speed set to {}", value);
                    Response::ok(format!("Speed set to {value}"))
                }
                Err(e) => Response::err(e),
            },
            Request::Stimulate { region, strength } => match self.sim.stimulate(&region, strength) {
                Ok(n) => Response::ok(format!("Stimulated {n} neurons in {region}")),
                Err(e) => Response::err(e),
            },
            Request::StimulateHub { strength } => match self.sim.stimulate_hub(strength) {
                Ok(n) => Response::ok(format!("Stimulated {n} hub neurons")),
                Err(e) => Response::err(e),
            },
            Request::Input { values } => match self.sim.inject_input(&values) {
                Ok(n) => Response::ok(format!("Injected {n} values")),
                Err(e) => Response::err(e),
            },
            Request::Reward { value } => {
                if !value.is_finite() {
                    return Response::err("reward must be finite");
                }
                self.sim.apply_reward(value);
                Response::ok(format!("Reward {value} applied"))
            }
            Request::SetLearning { algorithm } => match self.sim.set_learning(algorithm.as_deref()) {
                Ok(()) => {
                    let name = algorithm.as_deref().unwrap_or("off");
                    info!("Learning set to {}", name);
                    Response::ok(format!("Learning set to {name}"))
                }
                Err(e) => Response::err(e),
            },
            Request::Subscribe | Request::Shutdown => Response::err("not a simulation request"),
        }
    }
}

async fn write_response(writer: &mut OwnedWriteHalf, response: &Response) -> Result<(), DaemonError> {
    writer
        .write_all(serde_json::to_string(response)?.as_bytes())
        .await?;
    writer.write_all(b"\n").await?;
    Ok(())
}

async fn next_update(rx: &mut Option<broadcast::Receiver<SimulationSnapshot>>) -> Result<SimulationSnapshot, RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn handle_client(stream: TcpStream, state: Arc<RwLock<DaemonState>>) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();
    let mut updates: Option<broadcast::Receiver<SimulationSnapshot>> = None;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };

                let request: Request = match serde_json::from_str(&line) {
                    Ok(req) => req,
                    Err(e) => {
                        let resp = Response::err(format!("Invalid request: {}", e));
                        write_response(&mut writer, &resp).await?;
                        continue;
                    }
                };

                let response = match request {
                    Request::GetState => {
                        let s = state.read().await;
                        Response::State(s.sim.snapshot())
                    }
                    Request::GetFrame => {
                        let s = state.read().await;
                        Response::Frame(s.frame())
                    }
                    Request::Subscribe => {
                        let s = state.read().await;
                        updates = Some(s.updates.subscribe());
                        Response::ok("Subscribed")
                    }
                    Request::Shutdown => {
                        info!("Shutdown requested");
                        tokio::spawn(async {
                            // Give the response a moment to flush before exiting.
                            time::sleep(Duration::from_millis(50)).await;
                            std::process::exit(0);
                        });
                        Response::ok("Shutting down")
                    }
                    other => {
                        let mut s = state.write().await;
                        s.apply(other)
                    }
                };

                if let Response::Error { message } = &response {
                    warn!("Request rejected: {}", message);
                }
                write_response(&mut writer, &response).await?;
            }
            update = next_update(&mut updates) => {
                match update {
                    Ok(snapshot) => write_response(&mut writer, &Response::State(snapshot)).await?,
                    Err(RecvError::Lagged(skipped)) => {
                        debug!("Subscriber lagged; skipped {} updates", skipped);
                    }
                    Err(RecvError::Closed) => updates = None,
                }
            }
        }
    }

    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════════
// Main
// ═══════════════════════════════════════════════════════════════════════════

async fn run(cfg: DaemonConfig) -> Result<(), DaemonError> {
    let state = Arc::new(RwLock::new(DaemonState::new(cfg.network)?));
    {
        let s = state.read().await;
        let stats = s.sim.network().stats();
        info!(
            "Network ready: {} neurons, {} connections, hub={}",
            s.sim.network().neuron_count(),
            stats.connection_count,
            s.sim.network().hub().is_some()
        );
    }

    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C: exiting");
            std::process::exit(0);
        }
    });

    let listener = TcpListener::bind(&cfg.addr).await?;
    info!("brainnetd listening on {} (tick every {} ms)", cfg.addr, cfg.tick_ms);

    // Simulation loop task
    let state_clone = Arc::clone(&state);
    let tick_ms = cfg.tick_ms;
    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_millis(tick_ms));
        interval.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let mut s = state_clone.write().await;
            s.tick();
        }
    });

    // Accept client connections
    loop {
        let (stream, addr) = listener.accept().await?;
        info!("Client connected: {}", addr);
        let state_clone = Arc::clone(&state);

        tokio::spawn(async move {
            if let Err(e) = handle_client(stream, state_clone).await {
                error!("Client handler error: {}", e);
            }
        });
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cfg = match config::parse_args(std::env::args().skip(1)) {
        Ok(Invocation::Run(cfg)) => cfg,
        Ok(Invocation::Help) => {
            println!("{}", config::usage());
            return;
        }
        Err(e) => {
            eprintln!("{e}\n\n{}", config::usage());
            std::process::exit(2);
        }
    };

    if let Err(e) = run(cfg).await {
        error!("brainnetd stopped: {}", e);
        std::process::exit(1);
    }
}
