pub mod app;
pub mod chart;
pub mod chat;
pub mod config;
pub mod data;
pub mod debug_hooks;
pub mod error;
pub mod replay;
pub mod series;
