pub mod config;
pub mod logging;

pub mod banlist;
pub mod fetch;
pub mod host;
pub mod peer;
