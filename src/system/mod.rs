pub mod command;
pub mod gpu;
pub mod host;
pub mod platform;
pub mod sampler;
pub mod snapshot;
pub mod streak;
