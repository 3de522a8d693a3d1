use std::path::Path;

use clap::Subcommand;
use serde_json::{Map, Value};
use sidekick_core::config::CONFIG_FILE;
use sidekick_core::SidekickConfig;

// ── CLI Schema ──

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Set a config value in <store_root>/config.json
    Set {
        /// Config key (e.g. interval, threshold, model)
        key: String,
        /// Config value (true/false/number/string)
        value: String,
    },
    /// Get the effective value of a key
    Get {
        /// Config key
        key: String,
    },
    /// List all effective config values
    List,
}

// ── Dispatch ──

pub fn run(cmd: ConfigCmd, store_root: &Path) -> anyhow::Result<()> {
    match cmd {
        ConfigCmd::Set { key, value } => set(store_root, &key, &value),
        ConfigCmd::Get { key } => get(store_root, &key),
        ConfigCmd::List => list(store_root),
    }
}

// ── Command Implementations ──

/// Raw config file contents. Missing file ⇒ empty map.
fn read_config(path: &Path) -> anyhow::Result<Map<String, Value>> {
    if !path.exists() {
        return Ok(Map::new());
    }
    let content = std::fs::read_to_string(path)?;
    match serde_json::from_str(&content)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

fn write_config(path: &Path, config: &Map<String, Value>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    sidekick_store::write_atomic(path, json.as_bytes())
}

/// Parse a string value into an appropriate JSON value (bool/number/string).
fn parse_value(s: &str) -> Value {
    match s {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => {
            if let Ok(n) = s.parse::<i64>() {
                Value::Number(n.into())
            } else if let Ok(f) = s.parse::<f64>() {
                serde_json::json!(f)
            } else {
                Value::String(s.to_string())
            }
        }
    }
}

/// Effective configuration as a JSON object (defaults, file, environment).
fn effective(store_root: &Path) -> anyhow::Result<Map<String, Value>> {
    match serde_json::to_value(SidekickConfig::load(store_root))? {
        Value::Object(map) => Ok(map),
        _ => Ok(Map::new()),
    }
}

/// Insert `key = value` into `config`, refusing unknown keys and values the
/// config type cannot hold.
fn apply(config: &mut Map<String, Value>, key: &str, value: &str) -> anyhow::Result<()> {
    let known = match serde_json::to_value(SidekickConfig::default())? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let Some(default) = known.get(key) else {
        anyhow::bail!("unknown config key: {key}");
    };
    // Strings that happen to look like numbers stay strings.
    let parsed = match (default, parse_value(value)) {
        (Value::String(_), _) => Value::String(value.to_string()),
        (_, v) => v,
    };
    let mut candidate = config.clone();
    candidate.insert(key.to_string(), parsed);
    serde_json::from_value::<SidekickConfig>(Value::Object(candidate.clone()))
        .map_err(|e| anyhow::anyhow!("invalid value for {key}: {e}"))?;
    *config = candidate;
    Ok(())
}

/// `sidekick config set <key> <value>`
pub fn set(store_root: &Path, key: &str, value: &str) -> anyhow::Result<()> {
    let path = store_root.join(CONFIG_FILE);
    let mut config = read_config(&path)?;
    apply(&mut config, key, value)?;
    write_config(&path, &config)?;
    println!("{key} = {value}");
    Ok(())
}

/// `sidekick config get <key>`
pub fn get(store_root: &Path, key: &str) -> anyhow::Result<()> {
    match effective(store_root)?.get(key) {
        Some(val) => println!("{val}"),
        None => println!("(unknown key)"),
    }
    Ok(())
}

/// `sidekick config list`
pub fn list(store_root: &Path) -> anyhow::Result<()> {
    for (k, v) in &effective(store_root)? {
        println!("{k} = {v}");
    }
    Ok(())
}
