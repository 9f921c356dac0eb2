pub mod assist;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod errors;
pub mod history;
pub mod registry;
pub mod server;
pub mod store;
pub mod transcript;
pub mod validation;
