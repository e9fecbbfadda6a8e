use crate::config::{AttributeSpec, PrivacyConfig};
use crate::engine::stream::CastleEngine;
use crate::tuple::StreamTuple;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::io::{BufRead, Write};

/// On-disk configuration shape. Parsed leniently, then pushed through
/// `PrivacyConfig::new` so file contents get the same validation as code.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    k: usize,
    l: usize,
    delta: u64,
    beta: f64,
    mu: usize,
    #[serde(default)]
    seed: u64,
    attributes: Vec<AttributeSpec>,
}

impl ConfigFile {
    fn into_config(self) -> Result<PrivacyConfig, crate::config::ConfigError> {
        Ok(PrivacyConfig::new(self.k, self.l, self.delta, self.beta, self.mu, self.attributes)?
            .with_seed(self.seed))
    }
}

/// Application entrypoint: anonymizes a JSON-lines tuple stream from stdin to
/// stdout. The single argument names the config file; telemetry goes to
/// stderr on shutdown so the output stream stays machine-readable.
pub fn run() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let Some(config_path) = args.next() else {
        bail!("usage: castleguard <config.json>");
    };
    let raw = std::fs::read_to_string(&config_path)
        .with_context(|| format!("reading config file '{config_path}'"))?;
    let config = serde_json::from_str::<ConfigFile>(&raw)
        .with_context(|| format!("parsing config file '{config_path}'"))?
        .into_config()
        .context("invalid privacy parameters")?;

    let mut engine = CastleEngine::new(config);
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    for (number, line) in stdin.lock().lines().enumerate() {
        let line = line.context("reading stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        let tuple: StreamTuple = serde_json::from_str(&line)
            .with_context(|| format!("parsing tuple on line {}", number + 1))?;
        let events = engine
            .push(tuple)
            .with_context(|| format!("processing tuple on line {}", number + 1))?;
        for event in &events {
            serde_json::to_writer(&mut out, event)?;
            out.write_all(b"\n")?;
        }
    }
    for event in &engine.finish() {
        serde_json::to_writer(&mut out, event)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;

    eprintln!("{}", engine.telemetry().to_json_line());
    Ok(())
}
