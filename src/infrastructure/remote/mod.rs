//! Remote service infrastructure module

mod http_service;

pub use http_service::HttpSessionService;
