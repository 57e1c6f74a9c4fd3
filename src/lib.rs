pub mod abort;
pub mod accumulator;
pub mod aggregate;
pub mod cache;
pub mod channel_map;
pub mod config;
pub mod convert;
pub mod decoder;
pub mod error;
pub mod format;
pub mod models;
pub mod playlist;
pub mod replaygain;
pub mod scanner;
pub mod tags;
pub mod tui;
pub mod worker;
