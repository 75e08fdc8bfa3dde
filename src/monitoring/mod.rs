//! Monitoring and observability
//!
//! This module provides the counters and gauges exported on `/metrics`.

mod metrics;

pub use metrics::{MetricType, MetricsCollector};
