//! Isolate configuration.

use crate::error::ConfigError;

/// Number of isolate data slots available by default.
pub const DEFAULT_DATA_SLOTS: usize = 4;

/// Data slot holding the per-isolate descriptor directory by default.
pub const DEFAULT_DIRECTORY_SLOT: usize = 0;

/// Settings an [`Isolate`](crate::Isolate) is created with.
///
/// ```ignore
/// let config = IsolateConfig::new()
///     .with_data_slots(8)
///     .with_directory_slot(3)
///     .with_gc_threshold(10_000);
/// let isolate = Isolate::with_config(config)?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsolateConfig {
    /// Number of embedder data slots.
    pub data_slots: usize,
    /// Data slot reserved for the class registry.
    pub directory_slot: usize,
    /// Allocations between automatic collections at call safepoints.
    /// `None` disables automatic collection.
    pub gc_threshold: Option<usize>,
}

impl Default for IsolateConfig {
    fn default() -> Self {
        Self {
            data_slots: DEFAULT_DATA_SLOTS,
            directory_slot: DEFAULT_DIRECTORY_SLOT,
            gc_threshold: None,
        }
    }
}

impl IsolateConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of embedder data slots.
    pub fn with_data_slots(mut self, count: usize) -> Self {
        self.data_slots = count;
        self
    }

    /// Set the data slot used by the class registry.
    pub fn with_directory_slot(mut self, slot: usize) -> Self {
        self.directory_slot = slot;
        self
    }

    /// Collect garbage automatically after `allocations` allocations.
    pub fn with_gc_threshold(mut self, allocations: usize) -> Self {
        self.gc_threshold = Some(allocations);
        self
    }

    /// Check that the settings are consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.directory_slot >= self.data_slots {
            return Err(ConfigError::SlotOutOfRange {
                slot: self.directory_slot,
                count: self.data_slots,
            });
        }
        if self.gc_threshold == Some(0) {
            return Err(ConfigError::ZeroGcThreshold);
        }
        Ok(())
    }
}
