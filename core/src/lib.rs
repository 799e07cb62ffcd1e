pub mod db;
pub mod export;
pub mod import;
pub mod mapping;
pub mod models;
pub mod nutrients;
pub mod stats;
