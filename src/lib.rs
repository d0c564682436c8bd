pub mod config;
pub mod models;
pub mod statistics;
pub mod storage;
