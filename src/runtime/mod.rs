//! Runtime adapters used to launch task executions.

pub mod tokio_spawner;

pub use tokio_spawner::TokioSpawner;
