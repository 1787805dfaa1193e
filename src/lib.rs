pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod password;
pub mod secret;
pub mod server;
pub mod services;
pub mod store;
pub mod token;
