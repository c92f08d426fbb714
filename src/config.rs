//! Configuration loading: optional TOML file, then `DOORS_*` environment
//! variables, on top of [`DoorServiceConfig::default`].
//!
//! | Key               | Env                       | Default |
//! |-------------------|---------------------------|---------|
//! | `session`         | `DOORS_SESSION`           | `default` |
//! | `tick_rate_hz`    | `DOORS_TICK_RATE_HZ`      | `20`    |
//! | `base_speed`      | `DOORS_BASE_SPEED`        | `4.0`   |
//! | `max_speed`       | `DOORS_MAX_SPEED`         | `20.0`  |
//! | `world_min_y`     | `DOORS_WORLD_MIN_Y`       | `-64`   |
//! | `world_max_y`     | `DOORS_WORLD_MAX_Y`       | `319`   |
//! | `toggle_permission` | `DOORS_TOGGLE_PERMISSION` | `2`   |

use crate::types::DoorServiceConfig;
use config::{Config, ConfigError, Environment, File, FileFormat};
use std::path::Path;

pub const ENV_PREFIX: &str = "DOORS";

/// Load the service configuration. A missing file is not an error.
pub fn load(path: Option<&Path>) -> Result<DoorServiceConfig, ConfigError> {
    let mut builder = Config::builder();
    if let Some(path) = path {
        builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(false));
    }
    builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("blacklist")
                .with_list_parse_key("deferred_blocks"),
        )
        .build()?
        .try_deserialize()
}

/// Parse configuration from a TOML string (no environment overlay).
pub fn from_toml(source: &str) -> Result<DoorServiceConfig, ConfigError> {
    Config::builder()
        .add_source(File::from_str(source, FileFormat::Toml))
        .build()?
        .try_deserialize()
}
