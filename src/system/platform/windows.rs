use std::os::windows::process::CommandExt;
use std::process::Command;

use windows_sys::Win32::System::Power::{GetSystemPowerStatus, SYSTEM_POWER_STATUS};
use windows_sys::Win32::System::Threading::CREATE_NO_WINDOW;

use super::{PlatformExtensions, find_on_path};
use crate::error::ReadError;
use crate::system::command::ShellQuery;
use crate::system::snapshot::BatteryReading;

const POWERSHELL: &str = "powershell";

const GPU_COUNTER_SCRIPT: &str = r#"(Get-Counter "\GPU Engine(*engtype_3D)\Utilization Percentage").CounterSamples | Measure-Object -Property CookedValue -Sum | Select-Object -ExpandProperty Sum"#;

const GPU_NAME_SCRIPT: &str =
    "Get-CimInstance Win32_VideoController | Select-Object -ExpandProperty Name -First 1";

// SYSTEM_POWER_STATUS sentinels
const BATTERY_FLAG_NO_BATTERY: u8 = 128;
const BATTERY_FLAG_UNKNOWN: u8 = 255;
const BATTERY_PERCENT_UNKNOWN: u8 = 255;
const AC_LINE_ONLINE: u8 = 1;

pub struct Platform;

impl PlatformExtensions for Platform {
    fn gpu_counter_query() -> Option<ShellQuery> {
        Some(powershell(GPU_COUNTER_SCRIPT))
    }

    fn gpu_name_query() -> Option<ShellQuery> {
        Some(powershell(GPU_NAME_SCRIPT))
    }

    fn counter_subsystem_available() -> bool {
        find_on_path(POWERSHELL)
    }

    fn hosts_integrated_gpu() -> bool {
        true
    }

    fn battery() -> Result<Option<BatteryReading>, ReadError> {
        let mut status = unsafe { std::mem::zeroed::<SYSTEM_POWER_STATUS>() };
        let ok = unsafe { GetSystemPowerStatus(&mut status) };
        if ok == 0 {
            return Err(ReadError::Sensor("GetSystemPowerStatus failed".to_string()));
        }
        if status.BatteryFlag & BATTERY_FLAG_NO_BATTERY != 0
            || status.BatteryFlag == BATTERY_FLAG_UNKNOWN
        {
            return Ok(None);
        }
        if status.BatteryLifePercent == BATTERY_PERCENT_UNKNOWN {
            return Err(ReadError::Sensor("battery level unknown".to_string()));
        }
        Ok(Some(BatteryReading::new(
            f32::from(status.BatteryLifePercent),
            status.ACLineStatus == AC_LINE_ONLINE,
        )))
    }

    fn hide_console_window(cmd: &mut Command) {
        cmd.creation_flags(CREATE_NO_WINDOW);
    }
}

fn powershell(script: &str) -> ShellQuery {
    ShellQuery::new(
        POWERSHELL,
        &["-NoProfile", "-NonInteractive", "-Command", script],
    )
}
