pub mod gateway;
pub use gateway::*;

pub mod orchestrator;
pub use orchestrator::*;

pub mod scheduler;
pub use scheduler::*;

pub mod sink;
pub use sink::*;

#[cfg(test)]
pub(crate) mod testing;
