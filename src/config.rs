//! Server options loaded from `server_options.properties`.
//!
//! The file lives in the working directory and is created with defaults
//! when absent. Missing keys are appended with their default values so the
//! file always documents the full tunable set. Invalid numeric values fall
//! back to the defaults.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Name of the options file, resolved against the working directory.
pub const PROPERTIES_FILENAME: &str = "server_options.properties";

const KEEP_ALIVE_PROP: &str = "keepAlive";
const TIMEOUT_PROP: &str = "keepAliveTimeoutSeconds";
const BUFFER_POOLS_PROP: &str = "bufferPools";
const THREADS_NUMBER_PROP: &str = "threadsNumber";
const SERVER_NAME_PROP: &str = "server_name";

const DEFAULT_KEEP_ALIVE: bool = true;
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_BUFFER_POOLS: usize = 128;
const DEFAULT_THREADS_NUMBER: usize = 8;
const DEFAULT_SERVER_NAME: &str = "fast-socket-api";

/// Runtime tunables for listeners, pools and pipelines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    /// Enables the per-read inactivity timeout.
    pub keep_alive: bool,
    /// Read timeout applied when `keep_alive` is true.
    pub keep_alive_timeout: Duration,
    /// Number of pooled buffers per size class.
    pub buffer_pools: usize,
    /// Worker-pool size for the application runtime.
    pub threads_number: usize,
    /// Server name, used for the startup banner only.
    pub server_name: String,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            keep_alive: DEFAULT_KEEP_ALIVE,
            keep_alive_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
            buffer_pools: DEFAULT_BUFFER_POOLS,
            threads_number: DEFAULT_THREADS_NUMBER,
            server_name: DEFAULT_SERVER_NAME.to_string(),
        }
    }
}

impl ServerOptions {
    /// Load options from `server_options.properties` in the working
    /// directory, creating or completing the file as needed.
    pub fn load() -> Self {
        Self::load_from(Path::new(PROPERTIES_FILENAME))
    }

    /// Load options from an explicit path. Used directly by tests.
    pub fn load_from(path: &Path) -> Self {
        let existed = path.exists();
        let mut props = if existed {
            match fs::read_to_string(path) {
                Ok(text) => parse_properties(&text),
                Err(e) => {
                    tracing::error!(
                        "could not read '{}': {}. Default values will be used.",
                        path.display(),
                        e
                    );
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };

        let mut needs_update = !existed;
        for (key, default) in default_entries() {
            if !props.contains_key(key) {
                tracing::warn!(
                    "missing property '{}'. Adding default value '{}' to {}.",
                    key,
                    default,
                    path.display()
                );
                props.insert(key.to_string(), default.to_string());
                needs_update = true;
            }
        }

        if needs_update {
            if let Err(e) = write_properties(path, &props) {
                tracing::error!(
                    "could not create or update the properties file '{}': {}",
                    path.display(),
                    e
                );
            }
        }

        Self::from_properties(&props)
    }

    fn from_properties(props: &BTreeMap<String, String>) -> Self {
        let defaults = Self::default();

        let keep_alive = props
            .get(KEEP_ALIVE_PROP)
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(defaults.keep_alive);
        let timeout_seconds = parse_positive(props.get(TIMEOUT_PROP), TIMEOUT_PROP)
            .unwrap_or(DEFAULT_TIMEOUT_SECONDS as usize) as u64;
        let buffer_pools =
            parse_positive(props.get(BUFFER_POOLS_PROP), BUFFER_POOLS_PROP)
                .unwrap_or(DEFAULT_BUFFER_POOLS);
        let threads_number =
            parse_positive(props.get(THREADS_NUMBER_PROP), THREADS_NUMBER_PROP)
                .unwrap_or(DEFAULT_THREADS_NUMBER);
        let server_name = props
            .get(SERVER_NAME_PROP)
            .cloned()
            .unwrap_or(defaults.server_name);

        Self {
            keep_alive,
            keep_alive_timeout: Duration::from_secs(timeout_seconds),
            buffer_pools,
            threads_number,
            server_name,
        }
    }
}

fn default_entries() -> [(&'static str, &'static str); 5] {
    [
        (KEEP_ALIVE_PROP, "true"),
        (TIMEOUT_PROP, "30"),
        (BUFFER_POOLS_PROP, "128"),
        (THREADS_NUMBER_PROP, "8"),
        (SERVER_NAME_PROP, DEFAULT_SERVER_NAME),
    ]
}

/// Parse a strictly positive integer property, falling back on `None`.
fn parse_positive(value: Option<&String>, key: &str) -> Option<usize> {
    let raw = value?.trim();
    match raw.parse::<i64>() {
        Ok(n) if n > 0 => Some(n as usize),
        _ => {
            tracing::error!(
                "invalid value '{}' for '{}'. Fallback default will be used.",
                raw,
                key
            );
            None
        }
    }
}

/// Parse `key=value` lines. Blank lines and `#`/`!` comments are skipped,
/// matching the Java properties format the file was born in.
fn parse_properties(text: &str) -> BTreeMap<String, String> {
    let mut props = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            props.insert(key.trim().to_string(), value.trim().to_string());
        }
    }
    props
}

fn write_properties(path: &Path, props: &BTreeMap<String, String>) -> std::io::Result<()> {
    let mut out = String::from("# Default Server Options\n");
    // Write known keys in a stable order, then any extras the user added.
    for (key, _) in default_entries() {
        if let Some(value) = props.get(key) {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
    }
    for (key, value) in props {
        if !default_entries().iter().any(|(k, _)| *k == key.as_str()) {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
    }
    fs::write(path, out)?;
    tracing::info!("file '{}' has been created or updated.", path.display());
    Ok(())
}
