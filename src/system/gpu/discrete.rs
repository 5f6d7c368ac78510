use std::time::Duration;

use super::{DiscreteGpu, GpuDevice};
use crate::error::ReadError;
use crate::system::command::{CommandRunner, ProcessRunner, ShellQuery};
use crate::system::snapshot::clamp_percent;

/// Discrete NVIDIA GPUs through the `nvidia-smi` CLI.
pub struct NvidiaSmi {
    runner: Box<dyn CommandRunner>,
    timeout: Duration,
}

impl NvidiaSmi {
    pub fn new(runner: Box<dyn CommandRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(Box::new(ProcessRunner::default()), timeout)
    }

    fn query() -> ShellQuery {
        ShellQuery::new(
            "nvidia-smi",
            &[
                "--query-gpu=name,utilization.gpu",
                "--format=csv,noheader,nounits",
            ],
        )
    }
}

impl DiscreteGpu for NvidiaSmi {
    fn backend(&self) -> &'static str {
        "nvidia-smi"
    }

    fn devices(&mut self) -> Result<Vec<GpuDevice>, ReadError> {
        let output = self.runner.run(&Self::query(), self.timeout)?;
        parse_nvidia_smi(&output)
    }
}

/// Parse `name, utilization` CSV rows. Rows whose utilization is not a number
/// (`[N/A]` on some boards) are skipped.
pub fn parse_nvidia_smi(output: &str) -> Result<Vec<GpuDevice>, ReadError> {
    let devices: Vec<GpuDevice> = output
        .lines()
        .filter_map(|line| {
            let (name, util) = line.rsplit_once(',')?;
            let utilization: f32 = util.trim().parse().ok()?;
            Some(GpuDevice {
                name: name.trim().to_string(),
                utilization: clamp_percent(utilization),
            })
        })
        .collect();

    if devices.is_empty() && !output.trim().is_empty() {
        return Err(ReadError::Parse {
            input: output.trim().to_string(),
        });
    }
    Ok(devices)
}

#[cfg(feature = "nvml")]
pub struct Nvml {
    nvml: nvml_wrapper::Nvml,
}

#[cfg(feature = "nvml")]
impl Nvml {
    pub fn init() -> Result<Self, ReadError> {
        nvml_wrapper::Nvml::init()
            .map(|nvml| Self { nvml })
            .map_err(nvml_error)
    }
}

#[cfg(feature = "nvml")]
impl DiscreteGpu for Nvml {
    fn backend(&self) -> &'static str {
        "nvml"
    }

    fn devices(&mut self) -> Result<Vec<GpuDevice>, ReadError> {
        let count = self.nvml.device_count().map_err(nvml_error)?;
        let mut devices = Vec::with_capacity(count as usize);
        for i in 0..count {
            let device = self.nvml.device_by_index(i).map_err(nvml_error)?;
            let name = device.name().unwrap_or_else(|_| format!("GPU {i}"));
            let utilization = device.utilization_rates().map_err(nvml_error)?.gpu;
            devices.push(GpuDevice {
                name,
                utilization: clamp_percent(utilization as f32),
            });
        }
        Ok(devices)
    }
}

#[cfg(feature = "nvml")]
fn nvml_error(err: nvml_wrapper::error::NvmlError) -> ReadError {
    ReadError::Sensor(format!("NVML: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_device() {
        let devices = parse_nvidia_smi("NVIDIA GeForce RTX 3080, 42\n").unwrap();
        assert_eq!(
            devices,
            vec![GpuDevice {
                name: "NVIDIA GeForce RTX 3080".to_string(),
                utilization: 42.0,
            }]
        );
    }

    #[test]
    fn skips_unavailable_rows() {
        let devices = parse_nvidia_smi("Tesla K80, [N/A]\nTesla T4, 7\n").unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "Tesla T4");
    }

    #[test]
    fn empty_output_means_no_devices() {
        assert!(parse_nvidia_smi("").unwrap().is_empty());
    }

    #[test]
    fn unparseable_output_is_an_error() {
        assert!(matches!(
            parse_nvidia_smi("NVIDIA-SMI has failed"),
            Err(ReadError::Parse { .. })
        ));
    }
}
