// src/config/mod.rs
pub mod analysis;

pub use analysis::AnalysisConfig;
