#[macro_use]
extern crate tracing;

pub mod config;
pub mod discovery;
pub mod error;
pub mod http;
pub mod services;
