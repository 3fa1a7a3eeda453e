use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::env;
use std::fs::File;
use std::io::Read;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

const DEFAULT_CONFIG_PATH: &str = "/etc/neopixel-tree.conf";

/// Largest payload a single IPv4 UDP datagram can carry.
const MAX_UDP_PAYLOAD: usize = 65_507;

/// Pixel offsets travel as a single byte.
const MAX_PIXEL_COUNT: usize = u8::MAX as usize + 1;

#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub strip: StripConfig,
    #[serde(default)]
    pub animation: AnimationConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Clone, Debug, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "NetworkConfig::default_listen")]
    pub listen: SocketAddr,
    /// Receive buffer of the device, including the command byte.
    #[serde(default = "NetworkConfig::default_max_datagram_size")]
    pub max_datagram_size: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen: Self::default_listen(),
            max_datagram_size: Self::default_max_datagram_size(),
        }
    }
}

impl NetworkConfig {
    pub const DEFAULT_PORT: u16 = 8733;
    pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = 255;

    fn default_listen() -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], Self::DEFAULT_PORT))
    }

    fn default_max_datagram_size() -> usize {
        Self::DEFAULT_MAX_DATAGRAM_SIZE
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct StripConfig {
    #[serde(default = "StripConfig::default_pixel_count")]
    pub pixel_count: usize,
}

impl Default for StripConfig {
    fn default() -> Self {
        Self {
            pixel_count: Self::default_pixel_count(),
        }
    }
}

impl StripConfig {
    fn default_pixel_count() -> usize {
        106
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct AnimationConfig {
    #[serde(default = "AnimationConfig::default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Used when a rainbow command carries no delay of its own.
    #[serde(default = "AnimationConfig::default_rainbow_delay_ms")]
    pub rainbow_delay_ms: u64,
    #[serde(default = "AnimationConfig::default_rainbow_cycle_delay_ms")]
    pub rainbow_cycle_delay_ms: u64,
    #[serde(default = "AnimationConfig::default_theater_chase_delay_ms")]
    pub theater_chase_delay_ms: u64,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: Self::default_tick_interval_ms(),
            rainbow_delay_ms: Self::default_rainbow_delay_ms(),
            rainbow_cycle_delay_ms: Self::default_rainbow_cycle_delay_ms(),
            theater_chase_delay_ms: Self::default_theater_chase_delay_ms(),
        }
    }
}

impl AnimationConfig {
    fn default_tick_interval_ms() -> u64 {
        5
    }

    fn default_rainbow_delay_ms() -> u64 {
        100
    }

    fn default_rainbow_cycle_delay_ms() -> u64 {
        20
    }

    fn default_theater_chase_delay_ms() -> u64 {
        200
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn rainbow_delay(&self) -> Duration {
        Duration::from_millis(self.rainbow_delay_ms)
    }

    pub fn rainbow_cycle_delay(&self) -> Duration {
        Duration::from_millis(self.rainbow_cycle_delay_ms)
    }

    pub fn theater_chase_delay(&self) -> Duration {
        Duration::from_millis(self.theater_chase_delay_ms)
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct EventsConfig {
    #[serde(default = "EventsConfig::default_listen")]
    pub listen: SocketAddr,
    #[serde(default = "EventsConfig::default_publish_interval_ms")]
    pub publish_interval_ms: u64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            listen: Self::default_listen(),
            publish_interval_ms: Self::default_publish_interval_ms(),
        }
    }
}

impl EventsConfig {
    fn default_listen() -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], 3000))
    }

    fn default_publish_interval_ms() -> u64 {
        50
    }

    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_interval_ms.max(1))
    }
}

pub fn config_path() -> PathBuf {
    env::var("NEOPIXEL_TREE_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into())
}

pub fn load_config() -> Result<Config> {
    let path = config_path();

    let mut file = match File::open(&path) {
        Ok(file) => file,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            info!(
                "Config file {} not found, using default config",
                path.display()
            );
            return Ok(Config::default());
        }
        Err(err) => {
            return Err(err).with_context(|| format!("Failed to open {}", path.display()));
        }
    };

    let mut toml_config = String::new();
    file.read_to_string(&mut toml_config)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    parse_config(&toml_config).with_context(|| format!("Failed to parse {}", path.display()))
}

pub fn parse_config(toml_config: &str) -> Result<Config> {
    let config: Config = toml::from_str(toml_config)?;

    let max_datagram_size = config.network.max_datagram_size;
    if !(1..=MAX_UDP_PAYLOAD).contains(&max_datagram_size) {
        bail!("network.max_datagram_size must be between 1 and {MAX_UDP_PAYLOAD}, got {max_datagram_size}");
    }

    let pixel_count = config.strip.pixel_count;
    if !(1..=MAX_PIXEL_COUNT).contains(&pixel_count) {
        bail!("strip.pixel_count must be between 1 and {MAX_PIXEL_COUNT}, got {pixel_count}");
    }

    Ok(config)
}
