pub mod api;
pub mod bitrix;
pub mod config;
pub mod error;
pub mod rollup;
pub mod types;
