pub mod activity;
pub mod config;
pub mod notify;
pub mod permission;
