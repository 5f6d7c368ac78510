//! Worker-to-presentation plumbing: the periodic sampling loop and the
//! snapshot hand-off. Nothing here touches render state.

pub mod dispatch;
pub mod sampling;

pub use dispatch::{Dispatcher, Renderer, SnapshotReceiver, channel, deliver, in_delivery};
pub use sampling::{LoopState, SAMPLER_THREAD_NAME, SamplingLoop};

/// True when a panic on the current thread is about to be caught and
/// recovered from: a sampling tick or a renderer call inside [`deliver`].
pub fn panic_is_recovered() -> bool {
    in_delivery() || std::thread::current().name() == Some(SAMPLER_THREAD_NAME)
}
