pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod state;
pub mod verification;

#[cfg(test)]
mod test_support;
