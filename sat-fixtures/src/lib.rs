pub mod fixtures;
pub mod helpers;
pub mod scope;

#[cfg(test)]
mod testing;

pub use helpers::{FixtureError, FixtureResult};
pub use scope::{FixtureContext, ScopeLevel};
