use std::path::Path;
use std::process::Command;

use crate::error::ReadError;
use crate::system::command::ShellQuery;
use crate::system::snapshot::BatteryReading;

/// Per-OS facts the sampler needs. Everything behind this trait is allowed
/// to be platform specific; nothing outside `system::platform` is.
pub trait PlatformExtensions {
    /// Query printing the current integrated GPU utilization as one number.
    fn gpu_counter_query() -> Option<ShellQuery>;
    /// Query printing the primary display adapter's name.
    fn gpu_name_query() -> Option<ShellQuery>;
    fn counter_subsystem_available() -> bool;
    /// Whether this kind of host ships an integrated GPU by convention.
    fn hosts_integrated_gpu() -> bool;
    /// `Ok(None)` means no battery sensor exists.
    fn battery() -> Result<Option<BatteryReading>, ReadError>;
    fn hide_console_window(cmd: &mut Command);
}

#[cfg(target_os = "linux")]
mod linux;
#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "windows")]
mod windows;

#[cfg(target_os = "linux")]
use linux as platform_impl;
#[cfg(target_os = "macos")]
use macos as platform_impl;
#[cfg(target_os = "windows")]
use windows as platform_impl;

pub fn gpu_counter_query() -> Option<ShellQuery> {
    platform_impl::Platform::gpu_counter_query()
}

pub fn gpu_name_query() -> Option<ShellQuery> {
    platform_impl::Platform::gpu_name_query()
}

pub fn counter_subsystem_available() -> bool {
    platform_impl::Platform::counter_subsystem_available()
}

pub fn hosts_integrated_gpu() -> bool {
    platform_impl::Platform::hosts_integrated_gpu()
}

pub fn battery() -> Result<Option<BatteryReading>, ReadError> {
    platform_impl::Platform::battery()
}

pub fn hide_console_window(cmd: &mut Command) {
    platform_impl::Platform::hide_console_window(cmd);
}

/// True when `program` resolves to a file in one of the `PATH` directories.
pub fn find_on_path(program: &str) -> bool {
    let Some(paths) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&paths).any(|dir| {
        let candidate = dir.join(program);
        candidate.is_file() || has_exe_variant(&candidate)
    })
}

fn has_exe_variant(candidate: &Path) -> bool {
    if cfg!(windows) {
        candidate.with_extension("exe").is_file()
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrappers_do_not_panic_on_this_host() {
        let _ = gpu_counter_query();
        let _ = gpu_name_query();
        let _ = counter_subsystem_available();
        let _ = hosts_integrated_gpu();
        let _ = battery();
    }

    #[test]
    fn counter_and_name_queries_come_together() {
        assert_eq!(gpu_counter_query().is_some(), gpu_name_query().is_some());
    }

    #[test]
    fn unknown_program_is_not_on_path() {
        assert!(!find_on_path("statwidget-no-such-binary-xyz"));
    }
}
