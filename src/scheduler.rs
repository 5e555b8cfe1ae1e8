pub mod daemon;
pub mod jobs;

pub use jobs::{CycleContext, Poller};
