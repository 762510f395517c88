pub mod cli;
pub mod config;
pub mod database;
pub mod metrics;
pub mod schema;
pub mod services;

#[cfg(test)]
pub mod testing;
