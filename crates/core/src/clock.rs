//! Wall-clock abstraction so expiry math can be driven deterministically.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

pub trait Clock: Send + Sync {
	fn now(&self) -> SystemTime;

	/// Milliseconds since the Unix epoch; clamps pre-epoch clocks to zero.
	fn now_millis(&self) -> u64 {
		self.now()
			.duration_since(UNIX_EPOCH)
			.map(|d| d.as_millis() as u64)
			.unwrap_or(0)
	}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
	fn now(&self) -> SystemTime {
		SystemTime::now()
	}
}

/// Manually advanced clock for tests.
#[derive(Debug, Clone)]
pub struct ManualClock {
	now: Arc<Mutex<SystemTime>>,
}

impl ManualClock {
	pub fn new(start: SystemTime) -> Self {
		Self {
			now: Arc::new(Mutex::new(start)),
		}
	}

	/// Clock starting at `millis` after the Unix epoch.
	pub fn at_millis(millis: u64) -> Self {
		Self::new(UNIX_EPOCH + Duration::from_millis(millis))
	}

	pub fn advance(&self, by: Duration) {
		*self.now.lock() += by;
	}
}

impl Clock for ManualClock {
	fn now(&self) -> SystemTime {
		*self.now.lock()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn manual_clock_advances_shared_state() {
		let clock = ManualClock::at_millis(1_000);
		let other = clock.clone();
		other.advance(Duration::from_millis(500));
		assert_eq!(clock.now_millis(), 1_500);
	}
}
