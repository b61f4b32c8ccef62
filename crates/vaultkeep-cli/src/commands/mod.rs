//! CLI command implementations.

pub mod audit;
pub mod config;
pub mod doctor;
pub mod init;
pub mod items;
pub mod transfer;
