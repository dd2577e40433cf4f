//! Gator - a command-line RSS feed aggregator
//!
//! Users register, follow feeds, and `agg` polls the least recently fetched
//! feed on a fixed interval, printing the items it finds.

pub mod auth;
pub mod command;
pub mod config;
pub mod db;
pub mod error;
pub mod fetcher;
pub mod handlers;
pub mod processor;
pub mod scheduler;
