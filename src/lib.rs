pub mod config;
pub mod credential;
pub mod mqtt;
pub mod ui;
