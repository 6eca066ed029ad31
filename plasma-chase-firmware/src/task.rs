//! FreeRTOS task plumbing
//!
//! `std::thread::Builder::name()` only renames the pthread after ESP-IDF has
//! already created the FreeRTOS task, so names and core pinning go through
//! `ThreadSpawnConfiguration` instead. Each spawned task gets its own Task
//! Watchdog Timer (TWDT) user, fed through [`Heartbeat`].

use anyhow::{Context, Result};
use esp_idf_hal::cpu::Core;
use esp_idf_hal::task::thread::ThreadSpawnConfiguration;
use esp_idf_svc::sys::{
    esp_task_wdt_add_user, esp_task_wdt_delete_user, esp_task_wdt_reset_user,
    esp_task_wdt_user_handle_t, EspError,
};
use log::{debug, error, warn};
use plasma_chase_lib::Heartbeat;
use std::ffi::CStr;
use std::thread::JoinHandle;

/// TWDT user owned by one task, removed again on drop.
///
/// A task whose registration failed still runs, just unwatched.
pub struct TaskWatchdog {
    handle: Option<esp_task_wdt_user_handle_t>,
    name: &'static CStr,
}

impl TaskWatchdog {
    pub fn register(name: &'static CStr) -> Result<Self, EspError> {
        let mut handle: esp_task_wdt_user_handle_t = std::ptr::null_mut();
        EspError::convert(unsafe { esp_task_wdt_add_user(name.as_ptr(), &mut handle) })?;
        debug!("Watchdog: watching {name:?}");
        Ok(Self {
            handle: Some(handle),
            name,
        })
    }

    /// Register `name`, or fall back to an unwatched task.
    pub fn register_or_unwatched(name: &'static CStr) -> Self {
        Self::register(name).unwrap_or_else(|e| {
            warn!("Watchdog: {name:?} runs unwatched: {e}");
            Self { handle: None, name }
        })
    }
}

impl Heartbeat for TaskWatchdog {
    fn beat(&self) {
        let Some(handle) = self.handle else { return };
        if let Err(e) = EspError::convert(unsafe { esp_task_wdt_reset_user(handle) }) {
            error!("Watchdog: failed to feed {:?}: {e}", self.name);
        }
    }
}

impl Drop for TaskWatchdog {
    fn drop(&mut self) {
        let Some(handle) = self.handle.take() else { return };
        if let Err(e) = EspError::convert(unsafe { esp_task_wdt_delete_user(handle) }) {
            error!("Watchdog: failed to release {:?}: {e}", self.name);
        }
    }
}

/// Spawn `f` as a FreeRTOS task called `name`, optionally pinned to `core`.
///
/// The closure runs with the task's watchdog, registered on the new thread.
/// Task names are limited to 16 bytes including the terminator.
pub fn spawn_task<F, T>(name: &'static CStr, core: Option<Core>, f: F) -> Result<JoinHandle<T>>
where
    F: FnOnce(&TaskWatchdog) -> T + Send + 'static,
    T: Send + 'static,
{
    let previous = ThreadSpawnConfiguration::get();

    ThreadSpawnConfiguration {
        name: Some(name.to_bytes_with_nul()),
        pin_to_core: core,
        ..Default::default()
    }
    .set()
    .with_context(|| format!("Failed to configure task {name:?}"))?;

    let spawned = std::thread::Builder::new().spawn(move || {
        let watchdog = TaskWatchdog::register_or_unwatched(name);
        f(&watchdog)
    });

    // Restore before reporting, so later spawns are not left pinned
    if let Some(previous) = previous {
        if let Err(e) = previous.set() {
            warn!("Failed to restore thread spawn configuration: {e}");
        }
    }

    spawned.with_context(|| format!("Failed to spawn task {name:?}"))
}
