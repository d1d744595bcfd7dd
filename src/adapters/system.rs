//! Device restart.

/// Restart the chip. Never returns.
#[cfg(target_os = "espidf")]
pub fn restart() -> ! {
    log::warn!("System: restarting");
    unsafe { esp_idf_svc::sys::esp_restart() }
}

/// Simulation: end the process with a distinct exit code so a supervisor
/// can start it again.
#[cfg(not(target_os = "espidf"))]
pub fn restart() -> ! {
    log::warn!("System: restart requested (sim), exiting");
    std::process::exit(RESTART_EXIT_CODE)
}

/// Exit code used by the simulated restart.
#[cfg(not(target_os = "espidf"))]
pub const RESTART_EXIT_CODE: i32 = 75;
