// Library crate exposing modules for integration tests

pub mod cli;
pub mod model;
pub mod pipeline;
pub mod query;
pub mod server;
pub mod store;
pub mod util;
