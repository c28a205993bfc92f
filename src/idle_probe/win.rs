use anyhow::{anyhow, Result};
use tracing::error;
use windows::Win32::{
    Foundation::BOOL,
    System::SystemInformation::GetTickCount64,
    UI::{
        Input::KeyboardAndMouse::{GetLastInputInfo, LASTINPUTINFO},
        WindowsAndMessaging::{
            SystemParametersInfoW, SPI_GETSCREENSAVERRUNNING, SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS,
        },
    },
};

use super::IdleProbe;

/// Asks the system whether a screensaver is currently running. This also covers the
/// secure desktop shown while the session is locked with a screensaver configured.
pub fn get_screensaver_running() -> Result<bool> {
    let mut running = BOOL::from(false);
    unsafe {
        SystemParametersInfoW(
            SPI_GETSCREENSAVERRUNNING,
            0,
            Some(&mut running as *mut BOOL as *mut _),
            SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS(0),
        )?;
    }
    Ok(running.as_bool())
}

pub fn get_idle_time() -> Result<u32> {
    let mut last: LASTINPUTINFO = LASTINPUTINFO {
        cbSize: size_of::<LASTINPUTINFO>() as u32,
        dwTime: 0,
    };
    let is_success = unsafe { GetLastInputInfo(&mut last) };
    if !is_success.as_bool() {
        error!("Failed to retrieve user idle time");
        return Err(anyhow!("Failed to retrieve user idle time"));
    }

    let tick_count = unsafe { GetTickCount64() };
    let duration = tick_count - last.dwTime as u64;
    if duration > u32::MAX as u64 {
        Ok(u32::MAX)
    } else {
        Ok(duration as u32)
    }
}

pub struct WindowsIdleProbe {}

impl WindowsIdleProbe {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for WindowsIdleProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl IdleProbe for WindowsIdleProbe {
    fn screensaver_active(&mut self) -> Result<bool> {
        get_screensaver_running().inspect_err(|e| error!("Failed to query screensaver {e:?}"))
    }

    fn idle_time(&mut self) -> Result<u32> {
        get_idle_time().inspect_err(|e| error!("Failed to get idle time {e:?}"))
    }
}
