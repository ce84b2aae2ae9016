pub mod coordinator;
pub mod endpoint;
