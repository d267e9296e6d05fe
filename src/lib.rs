pub mod auth;
pub mod cli;
pub mod client;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod map;
pub mod middleware;
pub mod poi;
pub mod server;
pub mod shell;
