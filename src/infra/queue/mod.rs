//! Priority queue used for dispatch ordering.

pub mod heap;

pub use heap::{NaturalOrder, PriorityQueue};
