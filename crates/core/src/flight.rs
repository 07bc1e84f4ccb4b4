//! Run-slot primitives shared by the coordinator and the bridge.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use serde::Serialize;

/// Externally observable coordinator status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
	Idle,
	Running,
	Complete,
}

impl RunStatus {
	fn bits(self) -> u64 {
		match self {
			RunStatus::Idle => 0,
			RunStatus::Running => 1,
			RunStatus::Complete => 2,
		}
	}

	fn from_bits(bits: u64) -> Self {
		match bits & 0b11 {
			1 => RunStatus::Running,
			2 => RunStatus::Complete,
			_ => RunStatus::Idle,
		}
	}
}

/// Single-slot state machine: status and run generation packed in one word.
///
/// Every transition is a compare-and-set on the whole word, so a transition
/// made for generation `g` can never land on a slot that has since moved to
/// another generation.
#[derive(Debug, Default)]
pub struct RunSlot {
	word: AtomicU64,
}

impl RunSlot {
	pub fn new() -> Self {
		Self::default()
	}

	fn pack(generation: u64, status: RunStatus) -> u64 {
		(generation << 2) | status.bits()
	}

	fn unpack(word: u64) -> (u64, RunStatus) {
		(word >> 2, RunStatus::from_bits(word))
	}

	pub fn status(&self) -> RunStatus {
		Self::unpack(self.word.load(Ordering::Acquire)).1
	}

	pub fn generation(&self) -> u64 {
		Self::unpack(self.word.load(Ordering::Acquire)).0
	}

	/// Moves to `Running` under a fresh generation if the slot is in one of `from`.
	pub fn try_begin(&self, from: &[RunStatus]) -> Option<u64> {
		let mut current = self.word.load(Ordering::Acquire);
		loop {
			let (generation, status) = Self::unpack(current);
			if !from.contains(&status) {
				return None;
			}
			let next_generation = generation + 1;
			let next = Self::pack(next_generation, RunStatus::Running);
			match self.word.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
				Ok(_) => return Some(next_generation),
				Err(actual) => current = actual,
			}
		}
	}

	/// `Running(g) → Complete(g)`; false if the slot moved on.
	pub fn complete(&self, generation: u64) -> bool {
		self.word
			.compare_exchange(
				Self::pack(generation, RunStatus::Running),
				Self::pack(generation, RunStatus::Complete),
				Ordering::AcqRel,
				Ordering::Acquire,
			)
			.is_ok()
	}

	/// True while generation `g` still owns the running slot.
	pub fn is_current(&self, generation: u64) -> bool {
		self.word.load(Ordering::Acquire) == Self::pack(generation, RunStatus::Running)
	}

	/// Back to `Idle` under a fresh generation, invalidating any in-flight run.
	pub fn reset(&self) -> u64 {
		let mut current = self.word.load(Ordering::Acquire);
		loop {
			let (generation, _) = Self::unpack(current);
			let next = Self::pack(generation + 1, RunStatus::Idle);
			match self.word.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
				Ok(_) => return generation + 1,
				Err(actual) => current = actual,
			}
		}
	}
}

/// Boolean in-flight flag with an RAII guard, for work that must not overlap.
#[derive(Debug, Default)]
pub struct SingleFlight {
	busy: AtomicBool,
}

impl SingleFlight {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn is_busy(&self) -> bool {
		self.busy.load(Ordering::SeqCst)
	}

	/// Claims the flag; `None` if someone else holds it.
	pub fn try_acquire(self: &Arc<Self>) -> Option<FlightGuard> {
		self.busy
			.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
			.ok()
			.map(|_| FlightGuard { flight: Arc::clone(self) })
	}
}

/// Releases its [`SingleFlight`] on drop.
#[derive(Debug)]
pub struct FlightGuard {
	flight: Arc<SingleFlight>,
}

impl Drop for FlightGuard {
	fn drop(&mut self) {
		self.flight.busy.store(false, Ordering::SeqCst);
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn begin_is_exclusive() {
		let slot = RunSlot::new();
		let generation = slot.try_begin(&[RunStatus::Idle]).unwrap();
		assert_eq!(slot.status(), RunStatus::Running);
		assert!(slot.try_begin(&[RunStatus::Idle]).is_none());
		assert!(slot.try_begin(&[RunStatus::Idle, RunStatus::Complete]).is_none());

		assert!(slot.complete(generation));
		assert!(!slot.complete(generation), "completing twice is a no-op");
		assert!(slot.try_begin(&[RunStatus::Idle]).is_none(), "complete is terminal for a page load");
	}

	#[test]
	fn reset_invalidates_in_flight_generation() {
		let slot = RunSlot::new();
		let stale = slot.try_begin(&[RunStatus::Idle]).unwrap();
		slot.reset();
		assert_eq!(slot.status(), RunStatus::Idle);
		assert!(!slot.is_current(stale));

		let fresh = slot.try_begin(&[RunStatus::Idle]).unwrap();
		assert!(!slot.complete(stale), "stale run must not complete the fresh one");
		assert!(slot.is_current(fresh));
		assert!(slot.complete(fresh));
	}

	#[test]
	fn rerun_from_complete_gets_new_generation() {
		let slot = RunSlot::new();
		let first = slot.try_begin(&[RunStatus::Idle]).unwrap();
		slot.complete(first);
		let second = slot.try_begin(&[RunStatus::Complete]).unwrap();
		assert!(second > first);
	}

	#[test]
	fn flight_guard_releases_on_drop() {
		let flight = SingleFlight::new();
		let guard = flight.try_acquire().unwrap();
		assert!(flight.is_busy());
		assert!(flight.try_acquire().is_none());
		drop(guard);
		assert!(!flight.is_busy());
		assert!(flight.try_acquire().is_some());
	}
}
