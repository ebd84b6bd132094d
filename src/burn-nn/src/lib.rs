pub mod common;
pub mod config;
pub mod data;
pub mod model;
pub mod utils;
pub mod viewer;
