//! Command-line and file configuration for the daemon.

use std::path::Path;

use brainnet::network::NetworkConfig;

use crate::error::DaemonError;

pub const DEFAULT_ADDR: &str = "127.0.0.1:9877";
pub const DEFAULT_TICK_MS: u64 = 100;

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub addr: String,
    /// Wall-clock delay between ticks while running.
    pub tick_ms: u64,
    pub network: NetworkConfig,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            tick_ms: DEFAULT_TICK_MS,
            network: NetworkConfig::default(),
        }
    }
}

/// What `parse_args` decided.
#[derive(Debug)]
pub enum Invocation {
    Run(DaemonConfig),
    Help,
}

pub fn usage() -> &'static str {
    "brainnetd (spiking network daemon)\n\
     Usage: brainnetd [--addr host:port] [--tick-ms N] [--config network.json]\n\
     \n\
     Defaults: --addr 127.0.0.1:9877 --tick-ms 100\n\
     The config file holds a JSON NetworkConfig; omitted fields take defaults."
}

pub fn parse_args<I>(args: I) -> Result<Invocation, DaemonError>
where
    I: IntoIterator<Item = String>,
{
    let mut cfg = DaemonConfig::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(Invocation::Help),
            "--addr" => {
                cfg.addr = next_value(&mut args, "--addr")?;
            }
            "--tick-ms" => {
                let raw = next_value(&mut args, "--tick-ms")?;
                cfg.tick_ms = raw
                    .parse()
                    .map_err(|_| DaemonError::Args(format!("--tick-ms expects an integer, got {raw:?}")))?;
                if cfg.tick_ms == 0 {
                    return Err(DaemonError::Args("--tick-ms must be at least 1".to_string()));
                }
            }
            "--config" => {
                let path = next_value(&mut args, "--config")?;
                cfg.network = load_network_config(Path::new(&path))?;
            }
            other => return Err(DaemonError::Args(format!("unknown argument {other:?}"))),
        }
    }

    Ok(Invocation::Run(cfg))
}

fn next_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String, DaemonError> {
    args.next()
        .ok_or_else(|| DaemonError::Args(format!("{flag} needs a value")))
}

pub fn load_network_config(path: &Path) -> Result<NetworkConfig, DaemonError> {
    let text = std::fs::read_to_string(path)?;
    parse_network_config(&text)
}

/// Parse and validate a JSON network configuration.
pub fn parse_network_config(text: &str) -> Result<NetworkConfig, DaemonError> {
    let cfg: NetworkConfig = serde_json::from_str(text)?;
    cfg.validate()?;
    Ok(cfg)
}
