//! Bounded polling for identifiers that materialize after creation.
//!
//! # Invariants
//! - At most `max_attempts` polls; the first present value wins.
//! - No sleep after the final poll.
//! - A poll error counts as a failed attempt.

use crate::host::{HostResult, NoteHost};
use crate::model::record::Record;
use log::debug;
use std::thread;
use std::time::Duration;

/// Attempts used when resolving a freshly created record.
pub const DEFAULT_RESOLVE_ATTEMPTS: u32 = 20;
/// Delay between resolve attempts.
pub const DEFAULT_RESOLVE_DELAY: Duration = Duration::from_millis(150);

/// Blocking wait between polls.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Sleeps the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

impl<S: Sleeper + ?Sized> Sleeper for &S {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration);
    }
}

/// Value found by a poller together with the attempt that found it.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution<T> {
    pub value: T,
    /// One-based.
    pub attempts: u32,
}

/// Polls a lookup until it yields a value or attempts run out.
#[derive(Debug, Clone)]
pub struct RetryPoller<S = ThreadSleeper> {
    max_attempts: u32,
    delay: Duration,
    sleeper: S,
}

impl RetryPoller<ThreadSleeper> {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self::with_sleeper(max_attempts, delay, ThreadSleeper)
    }
}

impl Default for RetryPoller<ThreadSleeper> {
    fn default() -> Self {
        Self::new(DEFAULT_RESOLVE_ATTEMPTS, DEFAULT_RESOLVE_DELAY)
    }
}

impl<S: Sleeper> RetryPoller<S> {
    pub fn with_sleeper(max_attempts: u32, delay: Duration, sleeper: S) -> Self {
        Self {
            max_attempts,
            delay,
            sleeper,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Runs `lookup` with the one-based attempt number until it returns a value.
    ///
    /// Returns `None` once `max_attempts` polls came back empty or failed.
    pub fn poll<T, F>(&self, mut lookup: F) -> Option<Resolution<T>>
    where
        F: FnMut(u32) -> HostResult<Option<T>>,
    {
        for attempt in 1..=self.max_attempts {
            match lookup(attempt) {
                Ok(Some(value)) => {
                    return Some(Resolution {
                        value,
                        attempts: attempt,
                    })
                }
                Ok(None) => {}
                Err(err) => {
                    debug!("event=resolve_poll module=migrate status=error attempt={attempt} error={err}");
                }
            }
            if attempt < self.max_attempts {
                self.sleeper.sleep(self.delay);
            }
        }
        None
    }

    /// Resolves a record id through `NoteHost::resolve_record`.
    pub fn resolve_record<H: NoteHost + ?Sized>(
        &self,
        host: &H,
        record_guid: &str,
    ) -> Option<Resolution<Record>> {
        let resolution = self.poll(|_| host.resolve_record(record_guid));
        match &resolution {
            Some(found) => debug!(
                "event=resolve_record module=migrate status=ok attempts={}",
                found.attempts
            ),
            None => debug!(
                "event=resolve_record module=migrate status=error attempts={} reason=timeout",
                self.max_attempts
            ),
        }
        resolution
    }
}
