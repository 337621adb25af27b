pub mod bracket;
pub mod calibration;
pub mod cli;
pub mod error;
pub mod export;
pub mod fixtures;
pub mod goal_model;
pub mod group;
pub mod http_client;
pub mod knockout;
pub mod market;
pub mod overrides;
pub mod ratings;
pub mod report;
pub mod scoring;
pub mod simulation;
pub mod third_place;
pub mod wc2026;
