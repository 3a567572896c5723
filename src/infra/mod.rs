//! Infrastructure building blocks used by the scheduler.

pub mod queue;
pub use queue::PriorityQueue;
