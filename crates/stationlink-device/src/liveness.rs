use std::future::pending;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{sleep, Instant, Sleep};

/// Single rearmable inactivity timer.
///
/// Armed by the first frame, pushed back by every later frame, and disarmed
/// when the session ends. [`Liveness::expired`] resolves once the deadline
/// passes without a rearm.
pub struct Liveness {
    deadline: Duration,
    timer: Pin<Box<Sleep>>,
    armed: bool,
}

impl Liveness {
    pub fn new(deadline: Duration) -> Self {
        Self {
            deadline,
            timer: Box::pin(sleep(deadline)),
            armed: false,
        }
    }

    pub fn rearm(&mut self) {
        self.timer.as_mut().reset(Instant::now() + self.deadline);
        self.armed = true;
    }

    pub fn disarm(&mut self) {
        self.armed = false;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Wait for the deadline. Pending forever while disarmed.
    ///
    /// Cancel safe: dropping the future leaves the timer as it was.
    pub async fn expired(&mut self) {
        if !self.armed {
            pending::<()>().await;
        }
        self.timer.as_mut().await;
        self.armed = false;
    }
}
