//! Music Bot Library
//!
//! A Discord bot that plays YouTube audio in voice channels through a
//! Lavalink node.
//!
//! This crate provides the core functionality for:
//! - Loading configuration from the environment
//! - Per-guild queues with automatic advancement and idle disconnect
//! - Slash command handling
//! - Talking to Lavalink over REST and WebSocket

pub mod commands;
pub mod config;
pub mod discord;
pub mod lavalink;
pub mod player;
