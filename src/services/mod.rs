pub mod executor;
pub mod inbox;
pub mod queue;
pub mod resolver;
pub mod store;
pub mod worker;
