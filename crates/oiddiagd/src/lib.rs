//! OpenID handshake diagnostician daemon library - exposes modules for testing.

pub mod catalog;
pub mod config;
pub mod diagnostician;
pub mod negotiator;
pub mod router;
pub mod routes;
pub mod server;
pub mod test_case;
