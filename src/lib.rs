//! Zephra live-update server
//!
//! Watches a project directory, decides per changed file whether the browser
//! can take the update in place (stylesheet swap, module update, component
//! refresh) or needs a full reload, and fans that decision out to every
//! connected client over a websocket.

pub mod analysis;
pub mod client;
pub mod config;
pub mod error;
pub mod hash;
pub mod hub;
pub mod models;
pub mod registry;
pub mod server;
pub mod strategy;
pub mod utils;
pub mod watcher;

pub use config::HmrConfig;
pub use error::{HmrError, HmrResult};
pub use server::{HmrServer, ServerState};
