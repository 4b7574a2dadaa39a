pub mod http;
pub mod truncate;
