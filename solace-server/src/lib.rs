pub mod handler;
pub mod http;
