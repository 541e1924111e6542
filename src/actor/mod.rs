//! Actor-based request serialization
//!
//! Requests for one project are processed one at a time by that project's
//! processor, while different projects proceed in parallel.

pub mod manager;
pub mod message;
pub mod processor;
pub mod system;

pub use manager::*;
pub use message::*;
pub use processor::*;
pub use system::*;
