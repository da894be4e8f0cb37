pub mod api;
pub mod broker;
pub mod config;
pub mod host;
pub mod provider;
pub mod shell;
pub mod task;
pub mod util;
