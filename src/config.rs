//! # Configuration Management
//!
//! Loads application configuration from multiple sources:
//! - Built-in defaults
//! - TOML configuration file (config.toml)
//! - Environment variables (with APP prefix)
//! - Command line flags (highest priority)
//!
//! ## Configuration Priority (highest to lowest):
//! 1. CLI flags (`--channel`, `--maxvol`, `--server`, positional dirs)
//! 2. Environment variables (APP_SERVER__HOST, APP_MUMBLE__HOST, ...)
//! 3. Configuration file (config.toml)
//! 4. Default values (defined in the Default impl)

use anyhow::{anyhow, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Command line surface of the bot.
///
/// `--maxvol` is taken as a raw string and parsed during config loading so
/// an unparseable value becomes a regular fatal startup error.
#[derive(Parser, Debug)]
#[command(name = "mumble-soundboard")]
#[command(about = "Mumble soundboard bot with an HTTP control surface", long_about = None)]
pub struct Cli {
    /// Channel the bot will join, as a /-separated path
    #[arg(long, default_value = "Root")]
    pub channel: String,

    /// Maximum volume in %; the volume set in the UI is multiplied with it
    #[arg(long, default_value = "100")]
    pub maxvol: String,

    /// Mumble server host to connect to
    #[arg(long)]
    pub server: Option<String>,

    /// Mumble server port
    #[arg(long)]
    pub port: Option<u16>,

    /// Username the bot authenticates with
    #[arg(long)]
    pub username: Option<String>,

    /// Server password, if any
    #[arg(long)]
    pub password: Option<String>,

    /// Accept self-signed server certificates
    #[arg(long)]
    pub insecure: bool,

    /// HTTP bind address (host:port)
    #[arg(long)]
    pub bind: Option<String>,

    /// Directories to scan for sound files
    #[arg(value_name = "DIR")]
    pub sound_dirs: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub mumble: MumbleConfig,
    pub playback: PlaybackConfig,
}

/// HTTP control surface settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory the browser UI is served from
    pub asset_dir: String,
}

/// Voice server connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MumbleConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Accept self-signed certificates (common on private murmur servers)
    pub accept_invalid_certs: bool,
}

/// Playback settings fixed at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// /-separated channel path joined after connecting
    pub channel: String,
    /// Volume ceiling; the UI volume is scaled by this (1-100)
    pub max_volume_percent: u32,
    /// Opus encoder bitrate in bits per second
    pub bitrate: i32,
    /// Directories scanned (non-recursively) for sound files
    // config's serializer drops empty arrays, so the defaults source loses
    // this key when no dirs are set; default it back to empty on deserialize.
    #[serde(default)]
    pub sound_dirs: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                asset_dir: "public".to_string(),
            },
            mumble: MumbleConfig {
                host: "localhost".to_string(),
                port: 64738,
                username: "soundboard".to_string(),
                password: String::new(),
                accept_invalid_certs: false,
            },
            playback: PlaybackConfig {
                channel: "Root".to_string(),
                max_volume_percent: 100,
                bitrate: 64_000,
                sound_dirs: Vec::new(),
            },
        }
    }
}

impl AppConfig {
    /// Load configuration from all sources, with CLI flags winning.
    pub fn load(cli: Cli) -> Result<Self> {
        let mut settings = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?)
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"));

        // HOST/PORT are honored for deployment platforms that set them.
        if let Ok(host) = env::var("HOST") {
            settings = settings.set_override("server.host", host)?;
        }
        if let Ok(port) = env::var("PORT") {
            settings = settings.set_override("server.port", port)?;
        }

        let maxvol: i64 = cli
            .maxvol
            .parse()
            .map_err(|_| anyhow!("invalid --maxvol {:?}: not an integer", cli.maxvol))?;

        settings = settings
            .set_override("playback.channel", cli.channel)?
            .set_override("playback.max_volume_percent", maxvol)?;

        if let Some(server) = cli.server {
            settings = settings.set_override("mumble.host", server)?;
        }
        if let Some(port) = cli.port {
            settings = settings.set_override("mumble.port", port as i64)?;
        }
        if let Some(username) = cli.username {
            settings = settings.set_override("mumble.username", username)?;
        }
        if let Some(password) = cli.password {
            settings = settings.set_override("mumble.password", password)?;
        }
        if cli.insecure {
            settings = settings.set_override("mumble.accept_invalid_certs", true)?;
        }
        if let Some(bind) = cli.bind {
            let (host, port) = bind
                .rsplit_once(':')
                .ok_or_else(|| anyhow!("invalid --bind {:?}: expected host:port", bind))?;
            let port: i64 = port
                .parse()
                .map_err(|_| anyhow!("invalid --bind port {:?}", bind))?;
            settings = settings
                .set_override("server.host", host)?
                .set_override("server.port", port)?;
        }
        if !cli.sound_dirs.is_empty() {
            let dirs: Vec<String> = cli
                .sound_dirs
                .iter()
                .map(|d| d.to_string_lossy().into_owned())
                .collect();
            settings = settings.set_override("playback.sound_dirs", dirs)?;
        }

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate that the configuration values make sense.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(anyhow!("HTTP server port cannot be 0"));
        }

        if self.mumble.username.is_empty() {
            return Err(anyhow!("Mumble username cannot be empty"));
        }

        if self.playback.max_volume_percent == 0 || self.playback.max_volume_percent > 100 {
            return Err(anyhow!(
                "Invalid MaxVolume {}: must be between 1 and 100",
                self.playback.max_volume_percent
            ));
        }

        if self.playback.bitrate <= 0 {
            return Err(anyhow!("Encoder bitrate must be greater than 0"));
        }

        Ok(())
    }

    /// Sound directories as paths.
    pub fn sound_dirs(&self) -> Vec<PathBuf> {
        self.playback.sound_dirs.iter().map(PathBuf::from).collect()
    }
}
