//! remlink library
//!
//! This crate provides the core of the remlink remote-control link:
//! - Framed transport (sentinel-terminated payloads, length-prefixed frames)
//! - Command vocabulary and the capability executor
//! - Session endpoints for the agent and console roles
//! - Stream channel for continuous frame delivery with per-frame acks
//! - Bounded-retry reconnection policy

pub mod agent;
pub mod capability;
pub mod command;
pub mod config;
pub mod console;
pub mod errors;
pub mod reconnect;
pub mod stream;
pub mod transport;
