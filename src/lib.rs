mod builder;
mod cache;
mod error;
mod flight;
mod metrics;
mod store;
mod waitlist;
pub mod loader;
pub mod scavenger;

pub use builder::CacheBuilder;
pub use cache::{Cache, Outcome};
pub use error::Error;
pub use metrics::stats::Metrics;
