//! Runtime configuration
//!
//! Everything comes from `GHOST_*` environment variables. Per-site tuning
//! can be overridden with a JSON file named by `GHOST_SITES_FILE`:
//!
//! ```json
//! { "zeph": { "max_wait_ms": 120000, "stability_threshold": 4 } }
//! ```

use crate::channel::sites::{SiteOverride, SiteSpec};
use crate::engine::EngineSettings;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_ROUNDS: u32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("Invalid {var}={value:?}: {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Failed to read sites file {}: {source}", path.display())]
    SitesRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse sites file {}: {source}", path.display())]
    SitesParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// What the binary should do once the browser is ready
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Duo,
    Smart,
    Broadcast,
    /// One message to every listed participant, no replies awaited
    Send,
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "duo" => Ok(Mode::Duo),
            "smart" => Ok(Mode::Smart),
            "broadcast" => Ok(Mode::Broadcast),
            "send" => Ok(Mode::Send),
            other => Err(format!(
                "unknown mode \"{other}\", expected duo, smart, broadcast or send"
            )),
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Duo => "duo",
            Mode::Smart => "smart",
            Mode::Broadcast => "broadcast",
            Mode::Send => "send",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRequest {
    pub mode: Mode,
    /// Lowercased, in speaking order
    pub participants: Vec<String>,
    pub rounds: u32,
    pub prompt: Option<String>,
    pub starter: Option<String>,
    /// Text for [`Mode::Send`]
    pub message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub log_dir: PathBuf,
    pub browser_data: PathBuf,
    pub headless: bool,
    pub engine: EngineSettings,
    pub session: SessionRequest,
    sites: HashMap<String, SiteOverride>,
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let sites = match get("GHOST_SITES_FILE") {
            Some(path) => load_sites(Path::new(&path))?,
            None => HashMap::new(),
        };

        let engine = EngineSettings {
            observer_ack_wait: Duration::from_millis(parse_or(
                "GHOST_OBSERVER_ACK_MS",
                get("GHOST_OBSERVER_ACK_MS"),
                15_000,
            )?),
            send_spacing: Duration::from_millis(parse_or(
                "GHOST_SEND_SPACING_MS",
                get("GHOST_SEND_SPACING_MS"),
                2_000,
            )?),
        };

        let mode: Mode = get("GHOST_MODE")
            .ok_or(ConfigError::Missing("GHOST_MODE"))?
            .parse()
            .map_err(|reason| ConfigError::Invalid {
                var: "GHOST_MODE",
                value: get("GHOST_MODE").unwrap_or_default(),
                reason,
            })?;

        let participants: Vec<String> = get("GHOST_PARTICIPANTS")
            .ok_or(ConfigError::Missing("GHOST_PARTICIPANTS"))?
            .split(',')
            .map(|p| p.trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        if participants.is_empty() {
            return Err(ConfigError::Invalid {
                var: "GHOST_PARTICIPANTS",
                value: get("GHOST_PARTICIPANTS").unwrap_or_default(),
                reason: "no participant names".to_string(),
            });
        }

        let message = get("GHOST_MESSAGE");
        if mode == Mode::Send && message.is_none() {
            return Err(ConfigError::Missing("GHOST_MESSAGE"));
        }

        let session = SessionRequest {
            mode,
            participants,
            rounds: parse_or("GHOST_ROUNDS", get("GHOST_ROUNDS"), DEFAULT_ROUNDS)?,
            prompt: get("GHOST_PROMPT"),
            starter: get("GHOST_STARTER").map(|s| s.trim().to_lowercase()),
            message,
        };

        Ok(Self {
            log_dir: get("GHOST_LOG_DIR").map_or_else(|| PathBuf::from("./logs"), PathBuf::from),
            browser_data: get("GHOST_BROWSER_DATA")
                .map_or_else(|| PathBuf::from("./browser-data"), PathBuf::from),
            headless: parse_flag("GHOST_HEADLESS", get("GHOST_HEADLESS"))?,
            engine,
            session,
            sites,
        })
    }

    /// Site definition for `name`: the built-in one, or a blank one, with
    /// any override from the sites file applied.
    pub fn site(&self, name: &str) -> SiteSpec {
        let name = name.to_lowercase();
        let mut site = SiteSpec::builtin(&name).unwrap_or_else(|| SiteSpec::blank(&name));
        if let Some(over) = self.sites.get(&name) {
            site.apply(over);
        }
        site
    }
}

fn load_sites(path: &Path) -> Result<HashMap<String, SiteOverride>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::SitesRead {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: HashMap<String, SiteOverride> =
        serde_json::from_str(&raw).map_err(|source| ConfigError::SitesParse {
            path: path.to_path_buf(),
            source,
        })?;

    tracing::info!(path = %path.display(), sites = parsed.len(), "Loaded site overrides");
    Ok(parsed
        .into_iter()
        .map(|(name, over)| (name.to_lowercase(), over))
        .collect())
}

fn parse_or<T>(var: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        }),
    }
}

fn parse_flag(var: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    let Some(raw) = value else {
        return Ok(false);
    };
    match raw.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: raw,
            reason: "expected true or false".to_string(),
        }),
    }
}
