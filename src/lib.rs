pub mod arguments;
pub mod config;
pub mod errors;
pub mod jobs;
pub mod logger;
pub mod webserver;
