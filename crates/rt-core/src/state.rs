//! Table instance state and configuration

use serde::{Deserialize, Serialize};

use crate::prefs::DEFAULT_KEY_PREFIX;
use crate::viewport::ViewportWindow;

/// Correlation identifier of a decode request. Issued in increasing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle of a table instance
///
/// `Idle → Decoding → Ready`, `Ready | Error → Decoding` on each new payload,
/// `Decoding → Error` when the latest payload fails to decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableStatus {
    Idle,
    Decoding { request: RequestId },
    Ready,
    Error { request: RequestId, reason: String },
}

impl TableStatus {
    pub fn is_decoding(&self) -> bool {
        matches!(self, TableStatus::Decoding { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            TableStatus::Idle => "Idle",
            TableStatus::Decoding { .. } => "Decoding",
            TableStatus::Ready => "Ready",
            TableStatus::Error { .. } => "Error",
        }
    }
}

/// Configuration of a table instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Estimated height of one row
    pub row_extent: f64,

    /// Body height assumed until the host reports the real one
    pub container_extent: f64,

    /// Extra rows rendered above and below the visible window
    pub overscan: usize,

    /// Row count from which filtering and sorting run on the rayon pool
    pub parallel_threshold: usize,

    /// Prefix of the preference keys holding range bounds
    pub preference_prefix: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            row_extent: 28.0,
            container_extent: 600.0,
            overscan: 3,
            parallel_threshold: 50_000,
            preference_prefix: DEFAULT_KEY_PREFIX.to_string(),
        }
    }
}

impl TableConfig {
    /// Default viewport for this configuration
    pub fn viewport(&self) -> ViewportWindow {
        ViewportWindow::new(self.container_extent, self.row_extent, self.overscan)
    }
}
