pub mod builder;
pub mod context;
#[allow(clippy::module_inception)]
pub mod pipeline;
