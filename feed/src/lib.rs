pub mod analytics;
pub mod benchmark;
pub mod metrics;
pub mod report;
pub mod tick_generator;
