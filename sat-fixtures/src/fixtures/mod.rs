//! Fixtures for provisioning tests.
//!
//! Every fixture takes the [`FixtureContext`](crate::scope::FixtureContext),
//! resolves its upstreams through it, memoizes its result in the scope it
//! lives in and registers its teardown there.

mod content;
mod discovery;
mod hosts;
mod network;
mod target;
mod taxonomy;
mod vmware;

pub use content::*;
pub use discovery::*;
pub use hosts::*;
pub use network::*;
pub use target::*;
pub use taxonomy::*;
pub use vmware::*;
