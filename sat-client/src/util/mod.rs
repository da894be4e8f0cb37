pub mod logging;
pub mod polling;
