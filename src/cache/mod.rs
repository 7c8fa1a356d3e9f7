//! TTL response cache
//!
//! This module provides a cache store that serves a stored `{data, timestamp}`
//! envelope while it is younger than the slot's TTL, and otherwise refreshes it
//! through a caller-supplied fetcher. A failed refresh never overwrites the
//! stored envelope; the caller's fallback value is returned instead.

mod clock;
mod envelope;
mod single_flight;
mod slot;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use envelope::CacheEnvelope;
pub use single_flight::{FetchError, SingleFlight};
pub use slot::{is_slot_char, SlotKey, SlotKeyError};
pub use store::TtlCacheStore;
