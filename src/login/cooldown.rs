//! OTP resend cooldown.
//!
//! The countdown value is a plain struct so the rules can be exercised
//! tick by tick; [`spawn_countdown`] drives it from a tokio task.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResendCooldown {
    remaining: u32,
}

impl ResendCooldown {
    /// A cooldown that has already elapsed.
    #[must_use]
    pub const fn idle() -> Self {
        Self { remaining: 0 }
    }

    #[must_use]
    pub const fn start(secs: u32) -> Self {
        Self { remaining: secs }
    }

    #[must_use]
    pub const fn remaining(self) -> u32 {
        self.remaining
    }

    /// Advance one second. Returns whether the countdown is still running.
    pub fn tick(&mut self) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining > 0
    }

    #[must_use]
    pub const fn can_resend(self) -> bool {
        self.remaining == 0
    }
}

/// Tick `cooldown` once per `period` until it reaches zero.
pub fn spawn_countdown(cooldown: Arc<watch::Sender<ResendCooldown>>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        loop {
            interval.tick().await;
            let mut running = false;
            cooldown.send_modify(|c| running = c.tick());
            if !running {
                tracing::debug!("otp resend cooldown elapsed");
                break;
            }
        }
    })
}
