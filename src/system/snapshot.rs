use chrono::{DateTime, Local};
use serde::Serialize;

/// One immutable bundle of every metric measured during a single tick.
#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Local>,
    pub cpu_percent: f32,
    pub memory: MemoryReading,
    pub gpu: Option<GpuReading>,
    pub battery: Option<BatteryReading>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct MemoryReading {
    pub used_bytes: u64,
    pub total_bytes: u64,
    pub percent: f32,
}

impl MemoryReading {
    pub fn new(used_bytes: u64, total_bytes: u64) -> Self {
        let percent = if total_bytes == 0 {
            0.0
        } else {
            clamp_percent((used_bytes as f64 / total_bytes as f64 * 100.0) as f32)
        };
        Self {
            used_bytes,
            total_bytes,
            percent,
        }
    }

    /// A zeroed reading means the memory source failed for this tick.
    pub fn is_known(&self) -> bool {
        self.total_bytes > 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum GpuSource {
    Discrete,
    Integrated,
    Estimated,
    None,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GpuReading {
    pub percent: f32,
    pub label: String,
    pub source: GpuSource,
}

pub const NO_GPU_LABEL: &str = "No GPU detected";

impl GpuReading {
    pub fn new(percent: f32, label: impl Into<String>, source: GpuSource) -> Self {
        Self {
            percent: clamp_percent(percent),
            label: label.into(),
            source,
        }
    }

    pub fn none() -> Self {
        Self::new(0.0, NO_GPU_LABEL, GpuSource::None)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct BatteryReading {
    pub percent: f32,
    pub charging: bool,
}

impl BatteryReading {
    pub fn new(percent: f32, charging: bool) -> Self {
        Self {
            percent: clamp_percent(percent),
            charging,
        }
    }
}

/// Clamp into `[0, 100]`; NaN collapses to zero.
pub fn clamp_percent(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 100.0)
    }
}
