use crate::error::ConfigError;
use clap::Parser;
use holdem_types::GameConfig;
use tracing::Level;

/// CLI configuration, overlaying environment variables the way the
/// lightweight single-process binaries in the pack do (as opposed to the
/// file-based config a long-running consensus node needs).
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[arg(long, env = "LISTEN_PORT", default_value_t = 3001)]
    pub listen_port: u16,

    /// Redis URL for the Broadcast Fabric and Store Adapter. Unset or
    /// unreachable at startup falls back to single-node memory mode.
    #[arg(long, env = "BROKER_URL")]
    pub broker_url: Option<String>,

    /// Store URL; defaults to the broker URL if set, otherwise memory.
    #[arg(long, env = "STORE_URL")]
    pub store_url: Option<String>,

    #[arg(long, env = "SMALL_BLIND", default_value_t = 10)]
    pub small_blind: u64,

    #[arg(long, env = "BIG_BLIND", default_value_t = 20)]
    pub big_blind: u64,

    #[arg(long, env = "STARTING_TILES", default_value_t = 1000)]
    pub starting_tiles: u64,

    #[arg(long, env = "TURN_TIMEOUT_MS", default_value_t = 30_000)]
    pub turn_timeout_ms: u64,

    #[arg(long, env = "REVEAL_DELAY_MS", default_value_t = 5_000)]
    pub reveal_delay_ms: u64,

    #[arg(long, env = "DISCONNECT_GRACE_MS", default_value_t = 60_000)]
    pub disconnect_grace_ms: u64,

    /// How long a room may sit with zero connected subscribers before its
    /// actor shuts itself down (spec.md §3's open idle-timeout question).
    #[arg(long, env = "ROOM_IDLE_TIMEOUT_MS", default_value_t = 300_000)]
    pub room_idle_timeout_ms: u64,

    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    pub fn game_config(&self) -> GameConfig {
        GameConfig {
            small_blind: self.small_blind,
            big_blind: self.big_blind,
            starting_tiles: self.starting_tiles,
            turn_timeout_ms: self.turn_timeout_ms,
            reveal_delay_ms: self.reveal_delay_ms,
            disconnect_grace_ms: self.disconnect_grace_ms,
        }
    }

    pub fn log_level(&self) -> Result<Level, ConfigError> {
        self.log_level
            .parse()
            .map_err(|_| ConfigError::InvalidLogLevel {
                value: self.log_level.clone(),
            })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.small_blind == 0 {
            return Err(ConfigError::InvalidNonZero {
                field: "small_blind",
                value: self.small_blind,
            });
        }
        if self.big_blind == 0 {
            return Err(ConfigError::InvalidNonZero {
                field: "big_blind",
                value: self.big_blind,
            });
        }
        if self.starting_tiles == 0 {
            return Err(ConfigError::InvalidNonZero {
                field: "starting_tiles",
                value: self.starting_tiles,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_small_blind() {
        let mut args = Args::parse_from(["holdem-server"]);
        args.small_blind = 0;
        assert!(args.validate().is_err());
    }

    #[test]
    fn default_log_level_parses() {
        let args = Args::parse_from(["holdem-server"]);
        assert!(args.log_level().is_ok());
    }
}
