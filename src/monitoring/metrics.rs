//! Metrics collection and export
//!
//! This module provides Prometheus-style counters and gauges for allocation
//! and config delivery.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

/// Metric type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetricType {
    /// Tunnels given a block
    TunnelsAllocated,
    /// Tunnels deleted and their blocks released
    TunnelsReleased,
    /// Allocation requests that found no free block
    AllocationExhausted,
    /// Configs rendered or topologies served
    ConfigsRendered,
    /// Blocks currently occupied
    BlocksInUse,
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TunnelsAllocated => write!(f, "mesh_control_tunnels_allocated_total"),
            Self::TunnelsReleased => write!(f, "mesh_control_tunnels_released_total"),
            Self::AllocationExhausted => write!(f, "mesh_control_allocation_exhausted_total"),
            Self::ConfigsRendered => write!(f, "mesh_control_configs_rendered_total"),
            Self::BlocksInUse => write!(f, "mesh_control_blocks_in_use"),
        }
    }
}

impl MetricType {
    /// Get metric help text
    pub fn help_text(&self) -> &'static str {
        match self {
            Self::TunnelsAllocated => "Total tunnels allocated an address block",
            Self::TunnelsReleased => "Total tunnels deleted and their blocks released",
            Self::AllocationExhausted => "Total allocation requests rejected for lack of free blocks",
            Self::ConfigsRendered => "Total node configurations served",
            Self::BlocksInUse => "Address blocks currently occupied",
        }
    }

    /// Get metric type (counter, gauge)
    pub fn metric_kind(&self) -> &'static str {
        match self {
            Self::TunnelsAllocated
            | Self::TunnelsReleased
            | Self::AllocationExhausted
            | Self::ConfigsRendered => "counter",
            Self::BlocksInUse => "gauge",
        }
    }
}

/// Metrics collector with thread-safe access
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    values: Arc<RwLock<BTreeMap<MetricType, f64>>>,
}

impl MetricsCollector {
    /// Create new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a gauge
    pub fn record(&self, metric_type: MetricType, value: f64) {
        if let Ok(mut values) = self.values.write() {
            values.insert(metric_type, value);
        }
    }

    /// Add one to a counter
    pub fn increment(&self, metric_type: MetricType) {
        if let Ok(mut values) = self.values.write() {
            *values.entry(metric_type).or_insert(0.0) += 1.0;
        }
    }

    /// Get a metric value
    pub fn get(&self, metric_type: MetricType) -> Option<f64> {
        self.values.read().ok()?.get(&metric_type).copied()
    }

    /// Export metrics in Prometheus text format
    pub fn export_prometheus(&self) -> String {
        let Ok(values) = self.values.read() else {
            return String::new();
        };

        let mut output = String::new();
        for (metric_type, value) in values.iter() {
            output.push_str(&format!(
                "# HELP {} {}\n",
                metric_type,
                metric_type.help_text()
            ));
            output.push_str(&format!(
                "# TYPE {} {}\n",
                metric_type,
                metric_type.metric_kind()
            ));
            output.push_str(&format!("{} {}\n", metric_type, value));
        }

        output
    }

    /// Get all metrics as JSON
    pub fn export_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        if let Ok(values) = self.values.read() {
            for (metric_type, value) in values.iter() {
                map.insert(metric_type.to_string(), serde_json::json!(value));
            }
        }
        serde_json::Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_type_display() {
        assert_eq!(
            MetricType::TunnelsAllocated.to_string(),
            "mesh_control_tunnels_allocated_total"
        );
    }

    #[test]
    fn test_increment() {
        let collector = MetricsCollector::new();
        assert_eq!(collector.get(MetricType::ConfigsRendered), None);

        collector.increment(MetricType::ConfigsRendered);
        collector.increment(MetricType::ConfigsRendered);
        assert_eq!(collector.get(MetricType::ConfigsRendered), Some(2.0));
    }

    #[test]
    fn test_record_gauge() {
        let collector = MetricsCollector::new();
        collector.record(MetricType::BlocksInUse, 5.0);
        collector.record(MetricType::BlocksInUse, 3.0);
        assert_eq!(collector.get(MetricType::BlocksInUse), Some(3.0));
    }

    #[test]
    fn test_clones_share_values() {
        let collector = MetricsCollector::new();
        let clone = collector.clone();
        clone.increment(MetricType::TunnelsAllocated);
        assert_eq!(collector.get(MetricType::TunnelsAllocated), Some(1.0));
    }

    #[test]
    fn test_prometheus_export() {
        let collector = MetricsCollector::new();
        collector.record(MetricType::BlocksInUse, 3.0);

        let output = collector.export_prometheus();
        assert!(output.contains("# HELP mesh_control_blocks_in_use"));
        assert!(output.contains("# TYPE mesh_control_blocks_in_use gauge"));
        assert!(output.contains("mesh_control_blocks_in_use 3\n"));
    }

    #[test]
    fn test_json_export() {
        let collector = MetricsCollector::new();
        collector.increment(MetricType::TunnelsReleased);

        let json = collector.export_json();
        assert_eq!(json["mesh_control_tunnels_released_total"], 1.0);
    }
}
