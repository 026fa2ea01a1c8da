//! Config Agent
//!
//! Runs on each consumer host: subscribes to published configuration,
//! hands every update to a bounded delivery queue, and lets a single writer
//! persist it to the configured file before running the optional reload hook.

pub mod agent;
pub mod config;
pub mod hook;
pub mod queue;
pub mod registry;
pub mod transport;
pub mod writer;

pub use agent::Agent;
pub use config::{AgentConfig, Subscription};
pub use queue::{delivery_queue, DeliveryEvent, DeliveryQueue, QueueError, DELIVERY_QUEUE_CAPACITY};
pub use writer::{WriterOptions, WriterWorker};
