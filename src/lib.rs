pub mod config;
pub mod database;
pub mod http;
pub mod memory;
pub mod models;
pub mod repositories;
