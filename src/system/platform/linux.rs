use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use super::PlatformExtensions;
use crate::error::ReadError;
use crate::system::command::ShellQuery;
use crate::system::snapshot::BatteryReading;

const DRM_ROOT: &str = "/sys/class/drm";
const POWER_SUPPLY_ROOT: &str = "/sys/class/power_supply";

pub struct Platform;

impl PlatformExtensions for Platform {
    fn gpu_counter_query() -> Option<ShellQuery> {
        // Only amdgpu exposes a busy percentage per card. i915/xe hosts have no
        // such file and land on the estimate, named through `lspci`.
        Some(ShellQuery::new(
            "sh",
            &[
                "-c",
                "cat /sys/class/drm/card[0-9]*/device/gpu_busy_percent 2>/dev/null | head -n 1",
            ],
        ))
    }

    fn gpu_name_query() -> Option<ShellQuery> {
        // `lspci -mm` quotes each field; the sixth `"`-separated field is the device
        Some(ShellQuery::new(
            "sh",
            &[
                "-c",
                "lspci -mm 2>/dev/null | grep -m 1 -E 'VGA|3D|Display' | cut -d '\"' -f 6",
            ],
        ))
    }

    fn counter_subsystem_available() -> bool {
        drm_cards()
            .iter()
            .any(|card| card.join("device").join("gpu_busy_percent").is_file())
    }

    fn hosts_integrated_gpu() -> bool {
        !drm_cards().is_empty()
    }

    fn battery() -> Result<Option<BatteryReading>, ReadError> {
        let Some(dir) = first_battery_dir(Path::new(POWER_SUPPLY_ROOT)) else {
            return Ok(None);
        };
        read_battery_dir(&dir).map(Some)
    }

    fn hide_console_window(_cmd: &mut Command) {}
}

fn drm_cards() -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(DRM_ROOT) else {
        return Vec::new();
    };
    entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| n.strip_prefix("card"))
                .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
        })
        .collect()
}

fn first_battery_dir(root: &Path) -> Option<PathBuf> {
    let mut batteries: Vec<PathBuf> = fs::read_dir(root)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            let is_bat_name = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("BAT"));
            let is_battery_type = fs::read_to_string(path.join("type"))
                .map(|t| t.trim() == "Battery")
                .unwrap_or(false);
            is_bat_name || is_battery_type
        })
        .collect();
    batteries.sort();
    batteries.into_iter().next()
}

fn read_battery_dir(dir: &Path) -> Result<BatteryReading, ReadError> {
    let capacity = fs::read_to_string(dir.join("capacity"))
        .map_err(|err| ReadError::Sensor(format!("{}: {err}", dir.display())))?;
    let percent: f32 = capacity.trim().parse().map_err(|_| ReadError::Parse {
        input: capacity.trim().to_string(),
    })?;
    let status = fs::read_to_string(dir.join("status")).unwrap_or_default();
    Ok(BatteryReading::new(percent, is_on_external_power(status.trim())))
}

/// `Charging`, `Full` and `Not charging` all mean the adapter is plugged in.
fn is_on_external_power(status: &str) -> bool {
    !matches!(status, "Discharging" | "Unknown" | "")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_supply(name: &str, capacity: &str, status: &str) -> PathBuf {
        let root = std::env::temp_dir().join(format!(
            "statwidget_power_{}_{}",
            name,
            std::process::id()
        ));
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("capacity"), capacity).unwrap();
        fs::write(dir.join("status"), status).unwrap();
        root
    }

    #[test]
    fn reads_capacity_and_status() {
        let root = fake_supply("BAT0", "87\n", "Charging\n");
        let dir = first_battery_dir(&root).unwrap();
        let reading = read_battery_dir(&dir).unwrap();
        assert_eq!(reading, BatteryReading::new(87.0, true));
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn discharging_is_not_external_power() {
        assert!(!is_on_external_power("Discharging"));
        assert!(is_on_external_power("Full"));
        assert!(is_on_external_power("Not charging"));
    }

    #[test]
    fn garbage_capacity_is_a_parse_error() {
        let root = fake_supply("BAT1", "lots", "Discharging");
        let dir = first_battery_dir(&root).unwrap();
        assert!(matches!(
            read_battery_dir(&dir),
            Err(ReadError::Parse { .. })
        ));
        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn empty_supply_dir_has_no_battery() {
        let root = std::env::temp_dir().join(format!("statwidget_power_empty_{}", std::process::id()));
        fs::create_dir_all(&root).unwrap();
        assert!(first_battery_dir(&root).is_none());
        let _ = fs::remove_dir_all(&root);
    }
}
