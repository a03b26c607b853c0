pub mod commands;
pub mod constants;
pub mod display;
pub mod executor;
pub mod ids;
pub mod paths;
pub mod storage;
pub mod trust;
pub mod ui;
