#![forbid(unsafe_code)]

pub mod address;
pub mod cli;
pub mod client;
pub mod config;
pub mod event;
pub mod ident;
pub mod logging;
pub mod manifest;
pub mod publish;
pub mod reader;
pub mod relay;
pub mod scan;
