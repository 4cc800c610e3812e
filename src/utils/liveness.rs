use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Tracks whether the party waiting on some in-flight work is still there.
///
/// Work started on behalf of a caller runs to completion regardless; the
/// flag only decides whether its result is still delivered.
#[derive(Debug, Clone)]
pub struct Liveness {
    alive: Arc<AtomicBool>,
}

impl Liveness {
    pub fn new() -> Self {
        Self { alive: Arc::new(AtomicBool::new(true)) }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    pub fn dispose(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    /// A guard that disposes this flag when dropped.
    pub fn guard(&self) -> LivenessGuard {
        LivenessGuard { liveness: self.clone() }
    }

    /// Awaits `work` and yields its output only if still alive afterwards.
    pub async fn deliver<F, T>(&self, work: F) -> Option<T>
    where
        F: Future<Output = T>,
    {
        let output = work.await;
        if self.is_alive() {
            Some(output)
        } else {
            None
        }
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct LivenessGuard {
    liveness: Liveness,
}

impl Drop for LivenessGuard {
    fn drop(&mut self) {
        self.liveness.dispose();
    }
}
