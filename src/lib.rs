pub mod config;
pub mod decision_policy;
pub mod error;
pub mod image_classifier;
pub mod image_source;
pub mod library;
pub mod normalizer;
pub mod pipeline;
pub mod session;
