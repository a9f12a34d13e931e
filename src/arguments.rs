/// Command-line argument handling for the streamhub daemon
///
/// Parses the process arguments once into `Arguments`, which then produces
/// the logger configuration and the config file path.
use std::ffi::OsString;
use std::path::PathBuf;

use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::config::CONFIG_FILE_PATH;
use crate::logger::{LogLevel, LogTag, LoggerConfig};

/// Per-subsystem debug flags: (tag, flag, help)
const DEBUG_FLAGS: [(LogTag, &str, &str); 4] = [
    (LogTag::Hub, "debug-hub", "Debug output for registration and dispatch"),
    (LogTag::Client, "debug-client", "Debug output for client reader/writer tasks"),
    (LogTag::Producer, "debug-producer", "Debug output for event producers"),
    (LogTag::Webserver, "debug-webserver", "Debug output for HTTP routes and admission"),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Arguments {
    pub config_path: PathBuf,
    pub debug_tags: Vec<LogTag>,
    pub verbose: bool,
    pub quiet: bool,
}

pub fn command() -> Command {
    let mut command = Command::new("streamhub")
        .about("Real-time event broadcast hub")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .default_value(CONFIG_FILE_PATH)
                .help("Path to the TOML configuration file"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .action(ArgAction::SetTrue)
                .conflicts_with("quiet")
                .help("Enable verbose output (implies debug output for every tag)"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Only show warnings and errors"),
        );

    for (_, flag, help) in DEBUG_FLAGS {
        command = command.arg(
            Arg::new(flag)
                .long(flag)
                .action(ArgAction::SetTrue)
                .help(help),
        );
    }

    command
}

impl Arguments {
    /// Parse the process arguments (exits on --help or invalid input)
    pub fn parse() -> Self {
        Self::from_matches(&command().get_matches())
    }

    /// Parse an explicit argument list
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = command().try_get_matches_from(args)?;
        Ok(Self::from_matches(&matches))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        let config_path = matches
            .get_one::<String>("config")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_PATH));

        let debug_tags = DEBUG_FLAGS
            .iter()
            .filter(|(_, flag, _)| matches.get_flag(flag))
            .map(|(tag, _, _)| *tag)
            .collect();

        Self {
            config_path,
            debug_tags,
            verbose: matches.get_flag("verbose"),
            quiet: matches.get_flag("quiet"),
        }
    }

    /// Logger configuration derived from the flags
    pub fn logger_config(&self, file_path: Option<PathBuf>) -> LoggerConfig {
        let mut config = LoggerConfig {
            file_path,
            ..LoggerConfig::default()
        };

        for tag in &self.debug_tags {
            config = config.with_debug(*tag);
        }

        if self.verbose {
            config.min_level = LogLevel::Verbose;
        } else if self.quiet {
            config.min_level = LogLevel::Warning;
        }

        config
    }
}
