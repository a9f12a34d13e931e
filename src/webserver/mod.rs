/// HTTP surface of the daemon
///
/// - `server`: bind + serve with graceful shutdown
/// - `routes`: upgrade endpoint and /api routes
/// - `ws`: the broadcast hub and its client tasks
mod server;

pub mod middleware;
pub mod routes;
pub mod state;
pub mod utils;
pub mod ws;

pub use server::start_server;
