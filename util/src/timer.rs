use std::time::{Duration, SystemTime, SystemTimeError};

/// Keeps track of the time it took to perform some stage of planning.
pub struct Timer {
    start_time: SystemTime,
}

impl Timer {
    pub fn now() -> Self {
        Self {
            start_time: SystemTime::now(),
        }
    }

    /// Reset internal timer to now.
    pub fn reset(&mut self) {
        self.start_time = SystemTime::now();
    }

    pub fn elapsed(&self) -> Result<Duration, SystemTimeError> {
        self.start_time.elapsed()
    }

    /// Print a message with the elapsed time since the timer was last reset.
    pub fn print_elapsed(&self, stage: &str) -> Result<(), SystemTimeError> {
        let elapsed = self.elapsed()?;
        log::debug!("{stage} took {elapsed:?}");
        eprintln!("{stage} took {elapsed:?}");
        Ok(())
    }
}
