pub mod app_config;
pub mod demo_scene;
pub mod window_runner;
