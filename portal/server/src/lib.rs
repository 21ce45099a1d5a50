pub mod app_config;
pub mod app_env;
pub mod dashboard;
pub mod service;
