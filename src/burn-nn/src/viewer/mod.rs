//! Terminal viewer for learning-curve CSV logs.

pub mod app;
pub mod export;
pub mod logs;
pub mod plot;
pub mod ui;
