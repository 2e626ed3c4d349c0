// Library exports for open-letters
// This allows integration tests and external code to use the modules

pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod feed;
pub mod replies;
pub mod routes;
pub mod session;
pub mod state;
pub mod store;
