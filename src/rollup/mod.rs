pub mod aggregator;
pub mod cache;
pub mod service;
pub mod types;

pub use cache::ExpiringCache;
pub use service::RollupService;
