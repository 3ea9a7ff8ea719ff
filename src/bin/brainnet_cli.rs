//! CLI client for the `brainnetd` daemon.
//!
//! Examples:
//!   brainnet-cli status
//!   brainnet-cli play
//!   brainnet-cli stimulate frontal 1.0
//!   brainnet-cli input 0.2 0.9 0.4
//!   brainnet-cli learning hebbian
//!   brainnet-cli watch
//!
//! By default it talks to 127.0.0.1:9877; override with `--addr host:port`.

use brainnet::observer::NetworkFrame;
use brainnet::simulation::SimulationSnapshot;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::process;
use std::time::Duration;

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

fn usage() -> ! {
    eprintln!("brainnet-cli (talks to brainnetd @ 127.0.0.1:9877 by default)");
    eprintln!("Usage: brainnet-cli [--addr host:port] <command> [args]\n");
    eprintln!("Commands:");
    eprintln!("  status                      Show simulation state");
    eprintln!("  frame                       Dump a render frame as JSON");
    eprintln!("  play | pause | step | reset Control the run loop");
    eprintln!("  speed <0-10>                Set the update speed multiplier");
    eprintln!("  stimulate <region> [s]      Drive random neurons in a region");
    eprintln!("  hub [s]                     Drive random hub neurons");
    eprintln!("  input <v1> [v2 ...]         Inject values into the input region");
    eprintln!("  reward <r>                  Apply a reward to the active rule");
    eprintln!("  learning <name|none>        Select or disable the learning rule");
    eprintln!("  watch                       Print state after every tick");
    eprintln!("  shutdown                    Stop the daemon");
    process::exit(1);
}

fn parse_args() -> (String, Vec<String>) {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    if args.is_empty() {
        usage();
    }

    let mut addr = "127.0.0.1:9877".to_string();
    if args.len() >= 2 && args[0] == "--addr" {
        addr = args[1].clone();
        args.drain(0..2);
    }

    if args.is_empty() {
        usage();
    }

    (addr, args)
}

fn connect(addr: &str, timeout: Option<Duration>) -> Result<(TcpStream, BufReader<TcpStream>), String> {
    let stream = TcpStream::connect(addr).map_err(|e| format!("connect: {e}"))?;
    stream
        .set_read_timeout(timeout)
        .map_err(|e| format!("set_read_timeout: {e}"))?;
    let reader = BufReader::new(stream.try_clone().map_err(|e| format!("clone: {e}"))?);
    Ok((stream, reader))
}

fn write_request(stream: &mut TcpStream, req: &Request) -> Result<(), String> {
    let line = serde_json::to_string(req).map_err(|e| format!("serialize: {e}"))?;
    stream
        .write_all(line.as_bytes())
        .and_then(|_| stream.write_all(b"\n"))
        .map_err(|e| format!("send: {e}"))
}

fn read_response(reader: &mut BufReader<TcpStream>) -> Result<Option<Response>, String> {
    let mut resp_line = String::new();
    let n = reader
        .read_line(&mut resp_line)
        .map_err(|e| format!("recv: {e}"))?;
    if n == 0 {
        return Ok(None);
    }
    serde_json::from_str(&resp_line)
        .map(Some)
        .map_err(|e| format!("parse response: {e}"))
}

fn send_request(addr: &str, req: &Request) -> Result<Response, String> {
    let (mut stream, mut reader) = connect(addr, Some(Duration::from_secs(5)))?;
    write_request(&mut stream, req)?;
    read_response(&mut reader)?.ok_or_else(|| "connection closed".to_string())
}

fn watch(addr: &str) -> Result<(), String> {
    let (mut stream, mut reader) = connect(addr, None)?;
    write_request(&mut stream, &Request::Subscribe)?;
    while let Some(resp) = read_response(&mut reader)? {
        match resp {
            Response::State(s) => print_state(s),
            Response::Success { message } => eprintln!("{message}"),
            Response::Error { message } => return Err(message),
            Response::Frame(_) => {}
        }
    }
    Ok(())
}

fn print_state(s: SimulationSnapshot) {
    let stats = s.network.stats;
    println!(
        "running={} speed={:.2} tick={} active={} in_flight={} total_signals={} conns={} learning={}",
        s.running,
        s.speed,
        stats.tick,
        stats.active_neurons,
        stats.signals_in_flight,
        stats.total_signals,
        stats.connection_count,
        s.learning.as_deref().unwrap_or("off"),
    );
    for r in &s.network.regions {
        let weight = s
            .modulation
            .iter()
            .find(|m| m.id == r.id)
            .map(|m| format!(" mod={:.3}", m.weight))
            .unwrap_or_default();
        println!("  {:<10} activity={:.3} neurons={}{}", r.id, r.activity, r.neuron_count, weight);
    }
    if let Some(readout) = &s.readout {
        println!("  readout={readout:.3?}");
    }
}

fn main() {
    let (addr, args) = parse_args();
    let cmd = &args[0];

    let make_error = |msg: &str| -> ! {
        eprintln!("{}", msg);
        process::exit(1);
    };
    let parse_f32 = |s: &str, what: &str| -> f32 {
        s.parse()
            .unwrap_or_else(|_| make_error(&format!("{what} must be a number")))
    };

    let req = match cmd.as_str() {
        "status" => Request::GetState,
        "frame" => Request::GetFrame,
        "play" => Request::Play,
        "pause" => Request::Pause,
        "step" => Request::Step,
        "reset" => Request::Reset,
        "speed" => {
            if args.len() < 2 {
                usage();
            }
            Request::SetSpeed {
                value: parse_f32(&args[1], "speed"),
            }
        }
        "stimulate" => {
            if args.len() < 2 {
                usage();
            }
            let strength = args.get(2).map_or(1.0, |s| parse_f32(s, "strength"));
            Request::Stimulate {
                region: args[1].clone(),
                strength,
            }
        }
        "hub" => {
            let strength = args.get(1).map_or(1.0, |s| parse_f32(s, "strength"));
            Request::StimulateHub { strength }
        }
        "input" => {
            if args.len() < 2 {
                usage();
            }
            let values = args[1..].iter().map(|s| parse_f32(s, "input value")).collect();
            Request::Input { values }
        }
        "reward" => {
            if args.len() < 2 {
                usage();
            }
            Request::Reward {
                value: parse_f32(&args[1], "reward"),
            }
        }
        "learning" => {
            if args.len() < 2 {
                usage();
            }
            let algorithm = match args[1].as_str() {
                "none" | "off" => None,
                name => Some(name.to_string()),
            };
            Request::SetLearning { algorithm }
        }
        "watch" => {
            if let Err(e) = watch(&addr) {
                eprintln!("Failed: {e}");
                process::exit(1);
            }
            process::exit(0);
        }
        "shutdown" => Request::Shutdown,
        _ => usage(),
    };

    match send_request(&addr, &req) {
        Ok(Response::State(s)) => print_state(s),
        Ok(Response::Frame(f)) => match serde_json::to_string_pretty(&f) {
            Ok(json) => println!("{json}"),
            Err(e) => make_error(&format!("serialize frame: {e}")),
        },
        Ok(Response::Success { message }) => println!("{message}"),
        Ok(Response::Error { message }) => {
            eprintln!("Error: {message}");
            process::exit(1);
        }
        Err(e) => {
            eprintln!("Failed: {e}");
            process::exit(1);
        }
    }
}
