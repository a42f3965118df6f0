//! OS signal flags polled by the reactor loop. SIGINT/SIGTERM request a
//! clean shutdown; SIGUSR2 requests shutdown followed by re-exec.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use cfg_if::cfg_if;

pub(crate) struct Signals {
    terminate: Arc<AtomicBool>,
    restart: Arc<AtomicBool>,
}

impl Signals {
    /// Install the flag handlers. On non-unix targets the flags exist but
    /// never fire; shutdown happens through [`Node::stop`](crate::Node).
    pub fn install() -> std::io::Result<Self> {
        let terminate = Arc::new(AtomicBool::new(false));
        let restart = Arc::new(AtomicBool::new(false));
        cfg_if! {
            if #[cfg(unix)] {
                signal_hook::flag::register(signal_hook::consts::SIGINT, terminate.clone())?;
                signal_hook::flag::register(signal_hook::consts::SIGTERM, terminate.clone())?;
                signal_hook::flag::register(signal_hook::consts::SIGUSR2, restart.clone())?;
            }
        }
        Ok(Self { terminate, restart })
    }

    /// Consume the terminate flag; true at most once per delivery
    pub fn take_terminate(&self) -> bool {
        self.terminate.swap(false, Ordering::Relaxed)
    }

    pub fn take_restart(&self) -> bool {
        self.restart.swap(false, Ordering::Relaxed)
    }

    #[cfg(test)]
    pub fn raise_terminate(&self) {
        self.terminate.store(true, Ordering::Relaxed);
    }

    #[cfg(test)]
    pub fn raise_restart(&self) {
        self.restart.store(true, Ordering::Relaxed);
    }
}
