pub mod admin_bootstrap;
pub mod connection;
