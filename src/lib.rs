//! Terminal control panel for the fail2bancontrol REST API, plus the
//! `release` automation used to publish it.

pub mod app;
pub mod config;
pub mod models;
pub mod release;
pub mod services;
pub mod utils;
