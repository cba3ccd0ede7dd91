pub mod api_client;
pub mod chain;
pub mod config;
pub mod history;
pub mod orchestrator;
pub mod wallet;
