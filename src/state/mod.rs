//! State module for tracking harvest progress
//!
//! - `WorkerState`: lifecycle of a single fetch worker (starting, running,
//!   draining, done, aborted)

mod worker_state;

pub use worker_state::WorkerState;
