use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Binary semaphore: at most one pending release.
#[derive(Debug)]
pub struct HandshakeSignal {
    permits: Semaphore,
    gate: Mutex<()>,
}

impl HandshakeSignal {
    pub fn new() -> Self {
        HandshakeSignal {
            permits: Semaphore::new(0),
            gate: Mutex::new(()),
        }
    }

    pub fn release(&self) {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        if self.permits.available_permits() == 0 {
            self.permits.add_permits(1);
        }
    }

    /// `true` if the signal was released before `timeout` elapsed.
    pub async fn wait(&self, timeout: Duration) -> bool {
        match tokio::time::timeout(timeout, self.permits.acquire()).await {
            Ok(Ok(permit)) => {
                permit.forget();
                true
            }
            Ok(Err(_closed)) => false,
            Err(_elapsed) => false,
        }
    }
}

impl Default for HandshakeSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Startup rendezvous for one session.
///
/// Each loop releases its partner's signal once at its first frame and then
/// waits on its own.
#[derive(Debug, Default)]
pub struct Handshake {
    /// Waited on by the thermal loop, released by the visible loop.
    pub thermal: HandshakeSignal,
    /// Waited on by the visible loop, released by the thermal loop.
    pub visible: HandshakeSignal,
}

impl Handshake {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unblocks both waiters; used only on full shutdown.
    pub fn force_release(&self) {
        self.thermal.release();
        self.visible.release();
    }
}
