pub mod access;
pub mod catalog;
pub mod config;
pub mod database;
pub mod storage;
