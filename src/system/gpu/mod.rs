//! GPU utilization with a strategy chosen once per process.
//!
//! Detection order:
//! 1. a discrete backend (NVML when built with `nvml`, then `nvidia-smi`)
//!    that reports at least one device
//! 2. the platform's GPU usage counter, queried through a bounded subprocess
//! 3. an estimate derived from CPU load on hosts that carry an integrated GPU
//! 4. nothing
//!
//! Reads never fail. A failing discrete read yields the zero reading, a
//! failing counter read falls back to the estimate, and neither touches the
//! selected strategy.

pub mod discrete;

use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::ReadError;
use crate::system::command::{CommandRunner, ProcessRunner, ShellQuery, parse_percent};
use crate::system::platform;
use crate::system::snapshot::{GpuReading, GpuSource, clamp_percent};
use crate::system::streak::FailureStreak;

/// Heuristic ratio of integrated GPU load to CPU load. Not a measured law;
/// overridable through `gpu.estimate_damping`.
pub const ESTIMATE_DAMPING: f32 = 0.7;
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(2);
pub const INTEGRATED_FALLBACK_NAME: &str = "Integrated GPU";
pub const ESTIMATED_SUFFIX: &str = " (estimated)";

const NAME_QUERY_ATTEMPTS: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum GpuStrategy {
    Discrete,
    IntegratedCounter,
    IntegratedEstimate,
    None,
}

#[derive(Clone, Copy, Debug)]
pub struct GpuSettings {
    pub estimate_damping: f32,
    pub query_timeout: Duration,
    pub allow_discrete: bool,
}

impl Default for GpuSettings {
    fn default() -> Self {
        GpuSettings {
            estimate_damping: ESTIMATE_DAMPING,
            query_timeout: QUERY_TIMEOUT,
            allow_discrete: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GpuDevice {
    pub name: String,
    /// Percent, already in `[0, 100]`.
    pub utilization: f32,
}

pub trait DiscreteGpu: Send {
    fn backend(&self) -> &'static str;
    fn devices(&mut self) -> Result<Vec<GpuDevice>, ReadError>;
}

pub trait GpuCounter: Send {
    fn available(&self) -> bool;
    fn utilization(&mut self, timeout: Duration) -> Result<f32, ReadError>;
    fn device_name(&mut self, timeout: Duration) -> Result<String, ReadError>;
}

/// Counter and device name read from the platform's shell queries.
pub struct ShellCounter {
    runner: Box<dyn CommandRunner>,
    counter: ShellQuery,
    name: ShellQuery,
    available: bool,
}

impl ShellCounter {
    pub fn new(
        runner: Box<dyn CommandRunner>,
        counter: ShellQuery,
        name: ShellQuery,
        available: bool,
    ) -> Self {
        Self {
            runner,
            counter,
            name,
            available,
        }
    }

    pub fn for_host() -> Option<Self> {
        let counter = platform::gpu_counter_query()?;
        let name = platform::gpu_name_query()?;
        Some(Self::new(
            Box::new(ProcessRunner::default()),
            counter,
            name,
            platform::counter_subsystem_available(),
        ))
    }
}

impl GpuCounter for ShellCounter {
    fn available(&self) -> bool {
        self.available
    }

    fn utilization(&mut self, timeout: Duration) -> Result<f32, ReadError> {
        let output = self.runner.run(&self.counter, timeout)?;
        parse_percent(&output)
    }

    fn device_name(&mut self, timeout: Duration) -> Result<String, ReadError> {
        let output = self.runner.run(&self.name, timeout)?;
        let name = output.lines().next().unwrap_or_default().trim();
        if name.is_empty() {
            return Err(ReadError::Sensor("device name query printed nothing".to_string()));
        }
        Ok(name.to_string())
    }
}

/// Everything the probe may choose from. Built once and consumed by
/// [`GpuProbe::detect`].
pub struct GpuBackends {
    pub discrete: Vec<Box<dyn DiscreteGpu>>,
    pub counter: Option<Box<dyn GpuCounter>>,
    pub integrated_by_convention: bool,
}

impl GpuBackends {
    pub fn none() -> Self {
        GpuBackends {
            discrete: Vec::new(),
            counter: None,
            integrated_by_convention: false,
        }
    }

    pub fn for_host(settings: &GpuSettings) -> Self {
        let mut discrete_backends: Vec<Box<dyn DiscreteGpu>> = Vec::new();
        if settings.allow_discrete {
            #[cfg(feature = "nvml")]
            {
                match discrete::Nvml::init() {
                    Ok(nvml) => discrete_backends.push(Box::new(nvml)),
                    Err(err) => debug!(error = %err, "NVML unavailable"),
                }
            }
            discrete_backends.push(Box::new(discrete::NvidiaSmi::with_timeout(
                settings.query_timeout,
            )));
        }

        GpuBackends {
            discrete: discrete_backends,
            counter: ShellCounter::for_host().map(|c| Box::new(c) as Box<dyn GpuCounter>),
            integrated_by_convention: platform::hosts_integrated_gpu(),
        }
    }
}

pub struct GpuProbe {
    strategy: GpuStrategy,
    settings: GpuSettings,
    discrete: Option<Box<dyn DiscreteGpu>>,
    counter: Option<Box<dyn GpuCounter>>,
    last_cpu_percent: f32,
    device_name: Option<String>,
    name_attempts: u32,
    discrete_failures: FailureStreak,
    counter_failures: FailureStreak,
}

impl GpuProbe {
    /// Pick the strategy for the rest of the run. Backend errors only mean
    /// "unavailable"; detection itself cannot fail.
    pub fn detect(backends: GpuBackends, settings: GpuSettings) -> Self {
        let GpuBackends {
            discrete,
            counter,
            integrated_by_convention,
        } = backends;

        let mut chosen = None;
        if settings.allow_discrete {
            for mut backend in discrete {
                match backend.devices() {
                    Ok(devices) if !devices.is_empty() => {
                        info!(
                            backend = backend.backend(),
                            device = %devices[0].name,
                            count = devices.len(),
                            "discrete GPU found"
                        );
                        chosen = Some(backend);
                        break;
                    }
                    Ok(_) => debug!(backend = backend.backend(), "no discrete devices reported"),
                    Err(err) => {
                        debug!(backend = backend.backend(), error = %err, "discrete backend unavailable")
                    }
                }
            }
        }

        let counter_available = counter.as_ref().is_some_and(|c| c.available());
        let strategy = if chosen.is_some() {
            GpuStrategy::Discrete
        } else if counter_available {
            GpuStrategy::IntegratedCounter
        } else if integrated_by_convention {
            GpuStrategy::IntegratedEstimate
        } else {
            GpuStrategy::None
        };
        info!(?strategy, "GPU strategy selected");

        GpuProbe {
            strategy,
            settings,
            discrete: chosen,
            // The estimate path still asks the counter for the adapter name.
            counter: match strategy {
                GpuStrategy::IntegratedCounter | GpuStrategy::IntegratedEstimate => counter,
                GpuStrategy::Discrete | GpuStrategy::None => None,
            },
            last_cpu_percent: 0.0,
            device_name: None,
            name_attempts: 0,
            discrete_failures: FailureStreak::new("gpu.discrete"),
            counter_failures: FailureStreak::new("gpu.counter"),
        }
    }

    pub fn strategy(&self) -> GpuStrategy {
        self.strategy
    }

    /// Feed the latest CPU measurement used by the estimate path.
    pub fn observe_cpu(&mut self, percent: f32) {
        self.last_cpu_percent = clamp_percent(percent);
    }

    pub fn read(&mut self) -> GpuReading {
        match self.strategy {
            GpuStrategy::Discrete => self.read_discrete(),
            GpuStrategy::IntegratedCounter => match self.read_counter() {
                Ok(reading) => {
                    self.counter_failures.succeeded();
                    reading
                }
                Err(err) => {
                    self.counter_failures.failed(&err);
                    self.estimate()
                }
            },
            GpuStrategy::IntegratedEstimate => self.estimate(),
            GpuStrategy::None => GpuReading::none(),
        }
    }

    fn read_discrete(&mut self) -> GpuReading {
        let Some(backend) = self.discrete.as_mut() else {
            return GpuReading::none();
        };
        let first = backend
            .devices()
            .and_then(|devices| devices.into_iter().next().ok_or(ReadError::Unavailable));
        match first {
            Ok(device) => {
                self.discrete_failures.succeeded();
                GpuReading::new(device.utilization, device.name, GpuSource::Discrete)
            }
            Err(err) => {
                self.discrete_failures.failed(&err);
                GpuReading::none()
            }
        }
    }

    fn read_counter(&mut self) -> Result<GpuReading, ReadError> {
        let timeout = self.settings.query_timeout;
        let counter = self.counter.as_mut().ok_or(ReadError::Unavailable)?;
        let percent = counter.utilization(timeout)?;
        let name = self.device_name();
        Ok(GpuReading::new(percent, name, GpuSource::Integrated))
    }

    fn estimate(&mut self) -> GpuReading {
        let percent = self.last_cpu_percent * self.settings.estimate_damping;
        let label = format!("{}{ESTIMATED_SUFFIX}", self.device_name());
        GpuReading::new(percent, label, GpuSource::Estimated)
    }

    /// Cached after the first successful query; gives up querying after a few
    /// failures and settles on the generic name.
    fn device_name(&mut self) -> String {
        if let Some(name) = &self.device_name {
            return name.clone();
        }
        let Some(counter) = self.counter.as_mut() else {
            return INTEGRATED_FALLBACK_NAME.to_string();
        };
        if self.name_attempts >= NAME_QUERY_ATTEMPTS {
            return INTEGRATED_FALLBACK_NAME.to_string();
        }

        self.name_attempts += 1;
        match counter.device_name(self.settings.query_timeout) {
            Ok(name) => {
                debug!(device = %name, "integrated GPU name resolved");
                self.device_name = Some(name.clone());
                name
            }
            Err(err) => {
                debug!(error = %err, attempt = self.name_attempts, "GPU name query failed");
                INTEGRATED_FALLBACK_NAME.to_string()
            }
        }
    }
}
