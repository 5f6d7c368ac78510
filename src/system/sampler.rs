use chrono::Local;
use tracing::{debug, info};

use crate::system::gpu::{GpuBackends, GpuProbe, GpuSettings, GpuStrategy};
use crate::system::host::{HostMetrics, SysinfoHost};
use crate::system::snapshot::{MemoryReading, Snapshot, clamp_percent};
use crate::system::streak::FailureStreak;

/// Anything that can produce one snapshot per tick.
pub trait SnapshotSource: Send {
    fn sample(&mut self) -> Snapshot;
}

/// Composes the individually fallible metric sources into one [`Snapshot`].
/// A failing source only blanks its own field.
pub struct MetricsSampler {
    host: Box<dyn HostMetrics>,
    gpu: GpuProbe,
    battery_present: bool,
    cpu_failures: FailureStreak,
    memory_failures: FailureStreak,
    battery_failures: FailureStreak,
}

impl MetricsSampler {
    /// Probes battery presence once; absence holds for the rest of the run.
    pub fn new(mut host: Box<dyn HostMetrics>, gpu: GpuProbe) -> Self {
        let battery_present = host.battery_present();
        if battery_present {
            debug!("battery sensor found");
        } else {
            info!("no battery sensor, battery gauge disabled");
        }

        MetricsSampler {
            host,
            gpu,
            battery_present,
            cpu_failures: FailureStreak::new("cpu"),
            memory_failures: FailureStreak::new("memory"),
            battery_failures: FailureStreak::new("battery"),
        }
    }

    /// Wire the real host sensors and GPU backends. Runs the GPU detection,
    /// which may block on subprocess queries for a few seconds.
    pub fn for_host(settings: GpuSettings) -> Self {
        let gpu = GpuProbe::detect(GpuBackends::for_host(&settings), settings);
        Self::new(Box::new(SysinfoHost::new()), gpu)
    }

    pub fn gpu_strategy(&self) -> GpuStrategy {
        self.gpu.strategy()
    }

    pub fn battery_present(&self) -> bool {
        self.battery_present
    }

    pub fn sample(&mut self) -> Snapshot {
        let _span = tracing::debug_span!("sampler.sample").entered();

        let cpu_percent = match self.host.cpu_percent() {
            Ok(cpu) => {
                self.cpu_failures.succeeded();
                let cpu = clamp_percent(cpu);
                self.gpu.observe_cpu(cpu);
                cpu
            }
            Err(err) => {
                self.cpu_failures.failed(&err);
                0.0
            }
        };

        let memory = match self.host.memory() {
            Ok(memory) => {
                self.memory_failures.succeeded();
                memory
            }
            Err(err) => {
                self.memory_failures.failed(&err);
                MemoryReading::default()
            }
        };

        let gpu = match self.gpu.strategy() {
            GpuStrategy::None => None,
            _ => Some(self.gpu.read()),
        };

        let battery = if self.battery_present {
            match self.host.battery() {
                Ok(reading) => {
                    self.battery_failures.succeeded();
                    Some(reading)
                }
                Err(err) => {
                    self.battery_failures.failed(&err);
                    None
                }
            }
        } else {
            None
        };

        Snapshot {
            timestamp: Local::now(),
            cpu_percent,
            memory,
            gpu,
            battery,
        }
    }
}

impl SnapshotSource for MetricsSampler {
    fn sample(&mut self) -> Snapshot {
        MetricsSampler::sample(self)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::error::ReadError;
    use crate::system::gpu::{GpuBackends, GpuSettings};
    use crate::system::snapshot::{BatteryReading, GpuSource};

    #[derive(Default)]
    struct Calls {
        battery_present: AtomicU32,
        battery: AtomicU32,
    }

    struct ScriptedHost {
        cpu: Option<f32>,
        memory: Option<MemoryReading>,
        battery: Option<BatteryReading>,
        calls: Arc<Calls>,
    }

    impl HostMetrics for ScriptedHost {
        fn cpu_percent(&mut self) -> Result<f32, ReadError> {
            self.cpu.ok_or(ReadError::Sensor("cpu".to_string()))
        }

        fn memory(&mut self) -> Result<MemoryReading, ReadError> {
            self.memory.ok_or(ReadError::Sensor("memory".to_string()))
        }

        fn battery_present(&mut self) -> bool {
            self.calls.battery_present.fetch_add(1, Ordering::SeqCst);
            self.battery.is_some()
        }

        fn battery(&mut self) -> Result<BatteryReading, ReadError> {
            self.calls.battery.fetch_add(1, Ordering::SeqCst);
            self.battery.ok_or(ReadError::Unavailable)
        }
    }

    fn estimate_probe() -> GpuProbe {
        GpuProbe::detect(
            GpuBackends {
                integrated_by_convention: true,
                ..GpuBackends::none()
            },
            GpuSettings::default(),
        )
    }

    #[test]
    fn healthy_sources_fill_every_field() {
        let host = ScriptedHost {
            cpu: Some(50.0),
            memory: Some(MemoryReading::new(4, 16)),
            battery: Some(BatteryReading::new(60.0, false)),
            calls: Arc::default(),
        };
        let mut sampler = MetricsSampler::new(Box::new(host), estimate_probe());
        let snap = sampler.sample();

        assert_eq!(snap.cpu_percent, 50.0);
        assert_eq!(snap.memory.percent, 25.0);
        assert_eq!(snap.battery, Some(BatteryReading::new(60.0, false)));
        let gpu = snap.gpu.unwrap();
        assert_eq!(gpu.percent, 35.0);
        assert_eq!(gpu.source, GpuSource::Estimated);
    }

    #[test]
    fn no_gpu_strategy_leaves_gpu_absent() {
        let host = ScriptedHost {
            cpu: Some(10.0),
            memory: Some(MemoryReading::new(1, 2)),
            battery: None,
            calls: Arc::default(),
        };
        let probe = GpuProbe::detect(GpuBackends::none(), GpuSettings::default());
        let mut sampler = MetricsSampler::new(Box::new(host), probe);
        assert!(sampler.sample().gpu.is_none());
    }

    #[test]
    fn cpu_failure_zeroes_only_cpu() {
        let host = ScriptedHost {
            cpu: None,
            memory: Some(MemoryReading::new(8, 16)),
            battery: None,
            calls: Arc::default(),
        };
        let mut sampler = MetricsSampler::new(Box::new(host), estimate_probe());
        let snap = sampler.sample();
        assert_eq!(snap.cpu_percent, 0.0);
        assert_eq!(snap.memory.percent, 50.0);
        assert_eq!(sampler.cpu_failures.count(), 1);
    }

    #[test]
    fn absent_battery_is_checked_once_and_never_read() {
        let calls = Arc::new(Calls::default());
        let host = ScriptedHost {
            cpu: Some(10.0),
            memory: Some(MemoryReading::new(1, 2)),
            battery: None,
            calls: Arc::clone(&calls),
        };
        let mut sampler = MetricsSampler::new(Box::new(host), estimate_probe());
        assert!(!sampler.battery_present());
        for _ in 0..10 {
            assert!(sampler.sample().battery.is_none());
        }
        assert_eq!(calls.battery_present.load(Ordering::SeqCst), 1);
        assert_eq!(calls.battery.load(Ordering::SeqCst), 0);
        assert_eq!(sampler.battery_failures.count(), 0);
    }
}
