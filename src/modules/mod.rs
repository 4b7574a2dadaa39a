pub mod api_server;
pub mod config;
pub mod logger;
pub mod qr;
pub mod session;
pub mod whatsapp;

pub use config::*;
