pub mod catalog;
pub mod classifier;
pub mod client;
pub mod config;
pub mod demo;
pub mod engine;
pub mod host;
pub mod locale;
pub mod reporting;
pub mod search_providers;

pub use classifier::PageClassifier;
pub use client::Client;
pub use config::{EngineFlags, Settings};
pub use engine::AdsEngine;
pub use host::{
    AdInfo, AdsClient, FetchResult, NotificationInfo, NotificationResult, TimerId, UrlComponents,
};
