pub mod config;
pub mod spool;
