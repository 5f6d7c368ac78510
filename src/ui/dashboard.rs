use chrono::{DateTime, Local};

use crate::pipeline::dispatch::Renderer;
use crate::system::snapshot::{BatteryReading, GpuReading, MemoryReading, Snapshot};

/// Presentation-side state. Lives on the presentation context only and is
/// updated exclusively through [`Renderer::on_snapshot`].
#[derive(Debug)]
pub struct Dashboard {
    pub running: bool,
    pub show_gpu: bool,
    pub show_battery: bool,
    pub platform_label: String,
    pub cpu_percent: f32,
    pub memory: Option<MemoryReading>,
    pub gpu: Option<GpuReading>,
    pub battery: Option<BatteryReading>,
    pub last_sample: Option<DateTime<Local>>,
    pub snapshots_seen: u64,
}

impl Dashboard {
    pub fn new(show_gpu: bool, show_battery: bool, platform_label: String) -> Self {
        Dashboard {
            running: true,
            show_gpu,
            show_battery,
            platform_label,
            cpu_percent: 0.0,
            memory: None,
            gpu: None,
            battery: None,
            last_sample: None,
            snapshots_seen: 0,
        }
    }

    pub fn quit(&mut self) {
        self.running = false;
    }
}

impl Renderer for Dashboard {
    /// Fields whose source failed this tick keep their previous value.
    fn on_snapshot(&mut self, snapshot: Snapshot) {
        self.cpu_percent = snapshot.cpu_percent;
        if snapshot.memory.is_known() {
            self.memory = Some(snapshot.memory);
        }
        if let Some(gpu) = snapshot.gpu {
            self.gpu = Some(gpu);
        }
        if let Some(battery) = snapshot.battery {
            self.battery = Some(battery);
        }
        self.last_sample = Some(snapshot.timestamp);
        self.snapshots_seen += 1;
    }
}
