// handlers/mod.rs - HTTP handlers for both services
//
// public/    reachable without a token (login, password change, liveness)
// protected/ mounted behind the token gate in middleware::auth

pub mod protected;
pub mod public;
