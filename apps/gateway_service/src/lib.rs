pub mod app_config;
pub mod app_module;
pub mod app_router;
pub mod core;
pub mod health;
pub mod proxy_handler;
pub mod routing;
pub mod security;
pub mod shared;
