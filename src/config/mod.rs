/// Configuration system
///
/// - `macros`: the `config_struct!` macro (struct + defaults in one place)
/// - `schemas`: every configuration section of the daemon
/// - `utils`: loading from TOML and validation
mod macros;
pub mod schemas;
pub mod utils;

pub use schemas::{
    Config, ConnectionConfig, HubConfig, LoggingConfig, ProducersConfig, SecurityConfig,
    ServerConfig,
};
pub use utils::{load_config_from_path, parse_config, validate, CONFIG_FILE_PATH};
