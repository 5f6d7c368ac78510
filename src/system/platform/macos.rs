use std::path::Path;
use std::process::Command;
use std::time::Duration;

use super::PlatformExtensions;
use crate::error::ReadError;
use crate::system::command::{CommandRunner, ProcessRunner, ShellQuery};
use crate::system::snapshot::BatteryReading;

const IOREG: &str = "/usr/sbin/ioreg";
const PMSET_TIMEOUT: Duration = Duration::from_secs(2);

pub struct Platform;

impl PlatformExtensions for Platform {
    fn gpu_counter_query() -> Option<ShellQuery> {
        Some(ShellQuery::new(
            "sh",
            &[
                "-c",
                "ioreg -r -d 1 -w 0 -c IOAccelerator | grep -o '\"Device Utilization %\"=[0-9]*' | head -n 1 | cut -d= -f2",
            ],
        ))
    }

    fn gpu_name_query() -> Option<ShellQuery> {
        Some(ShellQuery::new(
            "sh",
            &[
                "-c",
                "system_profiler SPDisplaysDataType 2>/dev/null | awk -F': ' '/Chipset Model/ {print $2; exit}'",
            ],
        ))
    }

    fn counter_subsystem_available() -> bool {
        Path::new(IOREG).is_file()
    }

    fn hosts_integrated_gpu() -> bool {
        // Apple Silicon always carries an on-die GPU
        cfg!(target_arch = "aarch64")
    }

    fn battery() -> Result<Option<BatteryReading>, ReadError> {
        let output = ProcessRunner::default().run(
            &ShellQuery::new("pmset", &["-g", "batt"]),
            PMSET_TIMEOUT,
        )?;
        Ok(parse_pmset(&output))
    }

    fn hide_console_window(_cmd: &mut Command) {}
}

/// Parse `pmset -g batt`, e.g.
/// `Now drawing from 'AC Power'` / ` -InternalBattery-0 (id=1)	85%; charging; ...`.
fn parse_pmset(output: &str) -> Option<BatteryReading> {
    let line = output.lines().find(|l| l.contains("InternalBattery"))?;
    let percent_end = line.find('%')?;
    let percent_start = line[..percent_end]
        .rfind(|c: char| !c.is_ascii_digit())
        .map_or(0, |idx| idx + 1);
    let percent: f32 = line[percent_start..percent_end].parse().ok()?;
    let on_ac = output.contains("'AC Power'");
    Some(BatteryReading::new(percent, on_ac))
}
