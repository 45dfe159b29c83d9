//! Observability module for correlation and tracing

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Correlation ID for tracking a checkout attempt across components
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for CorrelationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for CorrelationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Per-confirmation flow context attached to every log line of a flow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowContext {
    /// Unique flow identifier
    pub flow_id: String,

    /// Correlation ID shared with the storefront request
    pub correlation_id: CorrelationId,

    /// Operation name
    pub operation: String,

    /// Creation timestamp (Unix epoch seconds)
    pub timestamp: u64,
}

impl FlowContext {
    pub fn new(operation: &str) -> Self {
        Self {
            flow_id: Uuid::new_v4().to_string(),
            correlation_id: CorrelationId::new(),
            operation: operation.to_string(),
            timestamp: unix_now(),
        }
    }

    /// Child context sharing the correlation ID
    pub fn child(&self, operation: &str) -> Self {
        Self {
            flow_id: Uuid::new_v4().to_string(),
            correlation_id: self.correlation_id.clone(),
            operation: operation.to_string(),
            timestamp: unix_now(),
        }
    }
}

impl Default for FlowContext {
    fn default() -> Self {
        Self::new("default")
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
