use std::time::{Duration, Instant};

use crate::error::CodecError;

/// Wall-clock budget for the decode/encode part of a request.
///
/// Engines call [`check`](TimeoutGuard::check) between units of work (frames,
/// resize passes, encoder calls). Work already in progress is not
/// interrupted; the next check fails.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutGuard {
    seconds: u64,
    deadline: Option<Instant>,
}

impl TimeoutGuard {
    /// Start the clock. `0` seconds disables the guard.
    pub fn new(seconds: u64) -> Self {
        let deadline = (seconds > 0).then(|| Instant::now() + Duration::from_secs(seconds));
        Self { seconds, deadline }
    }

    /// A guard that never expires.
    pub fn unlimited() -> Self {
        Self::new(0)
    }

    #[cfg(test)]
    pub(crate) fn expired(seconds: u64) -> Self {
        Self {
            seconds,
            deadline: Some(Instant::now()),
        }
    }

    pub fn seconds(&self) -> u64 {
        self.seconds
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn check(&self) -> Result<(), CodecError> {
        if self.is_expired() {
            Err(CodecError::Timeout {
                seconds: self.seconds,
            })
        } else {
            Ok(())
        }
    }
}
