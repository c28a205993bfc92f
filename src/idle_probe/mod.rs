//! Contains logic for asking different environments whether the user is away.
//! [GenericIdleProbe] is the main artifact of this module that abstracts
//! the operations.

#[cfg(feature = "win")]
pub mod win;
#[cfg(feature = "x11")]
pub mod x11;

#[cfg(feature = "win")]
extern crate windows;

#[cfg(feature = "x11")]
extern crate xcb;

use anyhow::Result;

#[cfg(test)]
use mockall::automock;

/// Intended to serve as a contract windows and linux systems must implement.
///
/// The probe only exposes raw signals. Folding them into a single idle flag is the
/// job of [IdleEvaluator](crate::daemon::collection::evaluator::IdleEvaluator), so the
/// accounting core never touches a platform API.
#[cfg_attr(test, automock)]
pub trait IdleProbe {
    /// Reports whether a screensaver or lock screen currently covers the session.
    fn screensaver_active(&mut self) -> Result<bool>;

    /// Retrieve amount of time user has been inactive in milliseconds.
    fn idle_time(&mut self) -> Result<u32>;
}

/// Serves as a cross-compatible IdleProbe implementation.
pub struct GenericIdleProbe {
    inner: Box<dyn IdleProbe>,
}

impl GenericIdleProbe {
    pub fn new() -> Result<Self> {
        cfg_if::cfg_if! {
            if #[cfg(feature = "win")] {
                use win::WindowsIdleProbe;
                Ok(Self {
                    inner: Box::new(WindowsIdleProbe::new()),
                })
            }
            else if #[cfg(feature = "x11")] {
                use x11::X11IdleProbe;
                Ok(Self {
                    inner: Box::new(X11IdleProbe::new()?),
                })
            }
            else {
                // This runtime error is needed to allow the project to be compiled for during testing.
                unimplemented!("No idle probe was specified")
            }
        }
    }
}

impl IdleProbe for GenericIdleProbe {
    fn screensaver_active(&mut self) -> Result<bool> {
        self.inner.screensaver_active()
    }

    fn idle_time(&mut self) -> Result<u32> {
        self.inner.idle_time()
    }
}
