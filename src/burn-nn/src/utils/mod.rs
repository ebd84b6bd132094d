pub mod app_paths;
pub mod csv_log;
pub mod metrics;
