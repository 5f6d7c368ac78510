use std::thread;
use std::time::Duration;

use sysinfo::System;

use crate::error::ReadError;
use crate::system::platform;
use crate::system::snapshot::{BatteryReading, MemoryReading, clamp_percent};

/// Window over which CPU usage is averaged. The call blocks for this long.
pub const CPU_MEASUREMENT_WINDOW: Duration = Duration::from_secs(1);

/// OS-level accessors for the host metrics. Each call may fail on its own.
pub trait HostMetrics: Send {
    /// Blocks for the measurement window and returns the interval average.
    fn cpu_percent(&mut self) -> Result<f32, ReadError>;
    fn memory(&mut self) -> Result<MemoryReading, ReadError>;
    /// Probed once at sampler construction.
    fn battery_present(&mut self) -> bool;
    fn battery(&mut self) -> Result<BatteryReading, ReadError>;
}

pub struct SysinfoHost {
    sys: System,
    window: Duration,
}

impl Default for SysinfoHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SysinfoHost {
    pub fn new() -> Self {
        Self::with_window(CPU_MEASUREMENT_WINDOW)
    }

    pub fn with_window(window: Duration) -> Self {
        let mut sys = System::new();
        sys.refresh_cpu_usage();
        sys.refresh_memory();
        SysinfoHost { sys, window }
    }
}

impl HostMetrics for SysinfoHost {
    fn cpu_percent(&mut self) -> Result<f32, ReadError> {
        self.sys.refresh_cpu_usage();
        thread::sleep(self.window.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL));
        self.sys.refresh_cpu_usage();

        if self.sys.cpus().is_empty() {
            return Err(ReadError::Sensor("no CPUs reported".to_string()));
        }
        Ok(clamp_percent(self.sys.global_cpu_usage()))
    }

    fn memory(&mut self) -> Result<MemoryReading, ReadError> {
        self.sys.refresh_memory();
        let total = self.sys.total_memory();
        if total == 0 {
            return Err(ReadError::Sensor("total memory reported as zero".to_string()));
        }
        Ok(MemoryReading::new(self.sys.used_memory(), total))
    }

    fn battery_present(&mut self) -> bool {
        matches!(platform::battery(), Ok(Some(_)))
    }

    fn battery(&mut self) -> Result<BatteryReading, ReadError> {
        platform::battery()?.ok_or(ReadError::Unavailable)
    }
}

/// `"<OS name> <version> • <arch>"`, shown in the dashboard footer.
pub fn platform_label() -> String {
    let name = System::name().unwrap_or_else(|| std::env::consts::OS.to_string());
    let version = System::os_version().unwrap_or_default();
    let os = format!("{name} {version}");
    format!("{} \u{2022} {}", os.trim(), std::env::consts::ARCH)
}
