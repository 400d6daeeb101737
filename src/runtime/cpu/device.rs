//! CPU device implementation

use crate::runtime::{Device, DeviceProperties};

/// The host CPU viewed as a SIMT device
///
/// Each hardware thread counts as one multiprocessor; the remaining limits
/// mirror a typical discrete GPU so that grid sizing behaves the same way on
/// both backends.
#[derive(Clone, Debug)]
pub struct CpuDevice {
    id: usize,
    properties: DeviceProperties,
}

impl CpuDevice {
    /// Create a new CPU device
    pub fn new() -> Self {
        let sm_count = std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(1);
        Self::with_properties(DeviceProperties {
            sm_count,
            ..DeviceProperties::default()
        })
    }

    /// Create a CPU device reporting fixed properties
    pub fn with_properties(properties: DeviceProperties) -> Self {
        Self { id: 0, properties }
    }

    /// Execution limits of this device
    pub fn properties(&self) -> &DeviceProperties {
        &self.properties
    }
}

impl Default for CpuDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl Device for CpuDevice {
    fn id(&self) -> usize {
        self.id
    }

    fn name(&self) -> String {
        "cpu".to_string()
    }
}
