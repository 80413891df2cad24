//! Lock-free latest-value store
//!
//! Every channel owns one slot guarded by a generation counter. The writer
//! bumps the counter to an odd value, stores the payload fields, then bumps
//! it to the next even value. A reader copies the payload between two loads
//! of the counter and accepts the copy only if both loads returned the same
//! even value; otherwise it retries. Readers never block the writer and the
//! writer never waits for readers.
//!
//! The protocol is only sound with one writer per slot. That is enforced by
//! [`SignalWriter`]: it is the only way to mutate the store and at most one
//! can be claimed at a time.

use core::sync::atomic::{fence, Ordering};

use portable_atomic::{AtomicBool, AtomicU32, AtomicU8};

use super::id::SignalId;
use crate::time::{self, Millis};

/// Maximum read attempts before a read gives up and reports contention
pub const MAX_READ_RETRIES: usize = 16;

/// Sample flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SignalFlags(u8);

impl SignalFlags {
    /// No flags
    pub const NONE: SignalFlags = SignalFlags(0);
    /// Older than the staleness threshold; value still usable
    pub const STALE: SignalFlags = SignalFlags(1 << 0);
    /// Inside an invalidity hold after an implausible decode
    pub const INVALID_HOLD: SignalFlags = SignalFlags(1 << 1);
    /// Older than the expiry threshold
    pub const EXPIRED: SignalFlags = SignalFlags(1 << 2);
    /// Channel has never been written
    pub const NEVER_WRITTEN: SignalFlags = SignalFlags(1 << 3);
    /// Written by the simulated data source
    pub const SIMULATED: SignalFlags = SignalFlags(1 << 4);
    /// Read gave up after repeated concurrent writes
    pub const CONTENDED: SignalFlags = SignalFlags(1 << 5);

    /// Raw bits
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Build from raw bits
    pub const fn from_bits(bits: u8) -> Self {
        SignalFlags(bits)
    }

    /// Check if all flags in `other` are set
    pub const fn contains(self, other: SignalFlags) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    /// Union of two flag sets
    pub const fn union(self, other: SignalFlags) -> SignalFlags {
        SignalFlags(self.0 | other.0)
    }
}

/// Snapshot of one channel handed to readers
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SignalRead {
    /// Last recorded physical value
    pub value: f32,
    /// Whether the value may be displayed
    pub valid: bool,
    /// Milliseconds since the value was recorded
    pub age_ms: u32,
    /// Status flags
    pub flags: SignalFlags,
}

impl SignalRead {
    /// Read returned for unknown or never-written channels
    pub const INVALID: SignalRead = SignalRead {
        value: 0.0,
        valid: false,
        age_ms: u32::MAX,
        flags: SignalFlags::NEVER_WRITTEN,
    };

    /// Check if the staleness threshold was exceeded
    pub fn is_stale(&self) -> bool {
        self.flags.contains(SignalFlags::STALE)
    }
}

/// Per-channel slot
struct Slot {
    generation: AtomicU32,
    // Payload, only consistent when copied under a stable even generation
    value_bits: AtomicU32,
    timestamp: AtomicU32,
    flags: AtomicU8,
    written: AtomicBool,
    invalid_active: AtomicBool,
    invalid_since: AtomicU32,
    invalid_hold_ms: AtomicU32,
    // Configuration, off the hot path
    stale_ms: AtomicU32,
    expire_ms: AtomicU32,
}

/// Payload copied out of a slot
#[derive(Clone, Copy)]
struct SlotCopy {
    value: f32,
    timestamp: Millis,
    flags: u8,
    written: bool,
    invalid_active: bool,
    invalid_since: Millis,
    invalid_hold_ms: u32,
}

impl Slot {
    fn new(stale_ms: u32, expire_ms: u32) -> Self {
        Self {
            generation: AtomicU32::new(0),
            value_bits: AtomicU32::new(0),
            timestamp: AtomicU32::new(0),
            flags: AtomicU8::new(0),
            written: AtomicBool::new(false),
            invalid_active: AtomicBool::new(false),
            invalid_since: AtomicU32::new(0),
            invalid_hold_ms: AtomicU32::new(0),
            stale_ms: AtomicU32::new(stale_ms),
            expire_ms: AtomicU32::new(expire_ms),
        }
    }

    /// Enter a write section, returning the even generation it started from
    fn begin_write(&self) -> u32 {
        let gen = self.generation.load(Ordering::Relaxed);
        self.generation.store(gen.wrapping_add(1), Ordering::Relaxed);
        fence(Ordering::Release);
        gen
    }

    fn end_write(&self, gen: u32) {
        self.generation.store(gen.wrapping_add(2), Ordering::Release);
    }

    /// Copy the payload, retrying while a write is in flight
    fn snapshot(&self) -> Option<SlotCopy> {
        for _ in 0..MAX_READ_RETRIES {
            let before = self.generation.load(Ordering::Acquire);
            if before & 1 == 1 {
                core::hint::spin_loop();
                continue;
            }

            let copy = SlotCopy {
                value: f32::from_bits(self.value_bits.load(Ordering::Relaxed)),
                timestamp: self.timestamp.load(Ordering::Relaxed),
                flags: self.flags.load(Ordering::Relaxed),
                written: self.written.load(Ordering::Relaxed),
                invalid_active: self.invalid_active.load(Ordering::Relaxed),
                invalid_since: self.invalid_since.load(Ordering::Relaxed),
                invalid_hold_ms: self.invalid_hold_ms.load(Ordering::Relaxed),
            };

            fence(Ordering::Acquire);
            let after = self.generation.load(Ordering::Relaxed);
            if before == after {
                return Some(copy);
            }
            core::hint::spin_loop();
        }
        None
    }
}

/// Latest value of every telemetry channel
pub struct SignalStore {
    slots: [Slot; SignalId::COUNT],
    writer_claimed: AtomicBool,
}

impl Default for SignalStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalStore {
    /// Create a store with every channel unwritten and default thresholds
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|i| {
                let (stale, expire) = SignalId::ALL[i].default_thresholds();
                Slot::new(stale, expire)
            }),
            writer_claimed: AtomicBool::new(false),
        }
    }

    /// Claim the single writer handle
    ///
    /// Returns `None` while another writer is alive.
    pub fn claim_writer(&self) -> Option<SignalWriter<'_>> {
        self.writer_claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SignalWriter { store: self })
    }

    /// Check whether a writer handle is currently claimed
    pub fn writer_claimed(&self) -> bool {
        self.writer_claimed.load(Ordering::Acquire)
    }

    /// Read a channel
    pub fn read(&self, id: SignalId, now: Millis) -> SignalRead {
        self.read_index(id.index(), now)
    }

    /// Read a channel by store index
    ///
    /// An index outside the channel table yields a permanently invalid read.
    pub fn read_index(&self, index: usize, now: Millis) -> SignalRead {
        let Some(slot) = self.slots.get(index) else {
            return SignalRead::INVALID;
        };

        let Some(copy) = slot.snapshot() else {
            return SignalRead {
                value: 0.0,
                valid: false,
                age_ms: u32::MAX,
                flags: SignalFlags::CONTENDED,
            };
        };

        if !copy.written {
            return SignalRead::INVALID;
        }

        let age_ms = time::age(now, copy.timestamp);
        let mut flags = SignalFlags::from_bits(copy.flags);
        let mut valid = true;

        // Measured from the mark so a hold that ran out stays out
        if copy.invalid_active && time::age(now, copy.invalid_since) < copy.invalid_hold_ms {
            valid = false;
            flags = flags.union(SignalFlags::INVALID_HOLD);
        }

        let stale_ms = slot.stale_ms.load(Ordering::Relaxed);
        let expire_ms = slot.expire_ms.load(Ordering::Relaxed);
        if age_ms > expire_ms {
            valid = false;
            flags = flags.union(SignalFlags::EXPIRED).union(SignalFlags::STALE);
        } else if age_ms > stale_ms {
            flags = flags.union(SignalFlags::STALE);
        }

        SignalRead {
            value: copy.value,
            valid,
            age_ms,
            flags,
        }
    }

    /// Set staleness and expiry thresholds for one channel
    pub fn set_staleness(&self, id: SignalId, stale_ms: u32, expire_ms: u32) {
        let slot = &self.slots[id.index()];
        slot.stale_ms.store(stale_ms, Ordering::Relaxed);
        slot.expire_ms.store(expire_ms.max(stale_ms), Ordering::Relaxed);
    }

    /// Set staleness and expiry thresholds for every channel
    pub fn set_all_staleness(&self, stale_ms: u32, expire_ms: u32) {
        for id in SignalId::ALL {
            self.set_staleness(id, stale_ms, expire_ms);
        }
    }

    /// Current thresholds for a channel
    pub fn staleness(&self, id: SignalId) -> (u32, u32) {
        let slot = &self.slots[id.index()];
        (
            slot.stale_ms.load(Ordering::Relaxed),
            slot.expire_ms.load(Ordering::Relaxed),
        )
    }
}

/// Exclusive write handle for a [`SignalStore`]
///
/// Dropping the handle releases the claim so another source (for example
/// the simulator) can take over.
pub struct SignalWriter<'a> {
    store: &'a SignalStore,
}

impl SignalWriter<'_> {
    /// Record a new value, clearing any invalidity hold
    pub fn record(&mut self, id: SignalId, value: f32, timestamp: Millis, flags: SignalFlags) {
        self.record_index(id.index(), value, timestamp, flags);
    }

    /// Record by store index; unknown indices are ignored
    pub fn record_index(&mut self, index: usize, value: f32, timestamp: Millis, flags: SignalFlags) {
        let Some(slot) = self.store.slots.get(index) else {
            return;
        };
        let gen = slot.begin_write();
        slot.value_bits.store(value.to_bits(), Ordering::Relaxed);
        slot.timestamp.store(timestamp, Ordering::Relaxed);
        slot.flags.store(flags.bits(), Ordering::Relaxed);
        slot.written.store(true, Ordering::Relaxed);
        slot.invalid_active.store(false, Ordering::Relaxed);
        slot.end_write(gen);
    }

    /// Hold a channel invalid until `timestamp + hold_ms`
    pub fn mark_invalid(&mut self, id: SignalId, timestamp: Millis, hold_ms: u32) {
        let slot = &self.store.slots[id.index()];
        let gen = slot.begin_write();
        slot.invalid_since.store(timestamp, Ordering::Relaxed);
        slot.invalid_hold_ms.store(hold_ms, Ordering::Relaxed);
        slot.invalid_active.store(true, Ordering::Relaxed);
        slot.end_write(gen);
    }

    /// Forget every recorded value
    ///
    /// Used when switching between the live link and the simulator.
    pub fn reset_all(&mut self) {
        for slot in &self.store.slots {
            let gen = slot.begin_write();
            slot.value_bits.store(0, Ordering::Relaxed);
            slot.timestamp.store(0, Ordering::Relaxed);
            slot.flags.store(0, Ordering::Relaxed);
            slot.written.store(false, Ordering::Relaxed);
            slot.invalid_active.store(false, Ordering::Relaxed);
            slot.end_write(gen);
        }
    }

    /// The store this handle writes to
    pub fn store(&self) -> &SignalStore {
        self.store
    }
}

impl Drop for SignalWriter<'_> {
    fn drop(&mut self) {
        self.store.writer_claimed.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::time::CLOCK_SKEW_TOLERANCE_MS;
    use std::sync::atomic::AtomicBool as StdAtomicBool;

    #[test]
    fn test_unwritten_channel_is_invalid() {
        let store = SignalStore::new();
        let read = store.read(SignalId::EngineSpeed, 100);
        assert!(!read.valid);
        assert!(read.flags.contains(SignalFlags::NEVER_WRITTEN));
    }

    #[test]
    fn test_out_of_range_index() {
        let store = SignalStore::new();
        let mut writer = store.claim_writer().unwrap();
        writer.record_index(SignalId::COUNT + 3, 1.0, 0, SignalFlags::NONE);
        assert_eq!(store.read_index(SignalId::COUNT + 3, 0), SignalRead::INVALID);
    }

    #[test]
    fn test_record_then_read() {
        let store = SignalStore::new();
        let mut writer = store.claim_writer().unwrap();
        writer.record(SignalId::EngineSpeed, 3500.0, 1000, SignalFlags::NONE);

        let read = store.read(SignalId::EngineSpeed, 1000);
        assert!(read.valid);
        assert_eq!(read.value, 3500.0);
        assert_eq!(read.age_ms, 0);
        assert_eq!(read.flags, SignalFlags::NONE);
    }

    #[test]
    fn test_age_with_small_skew_is_zero() {
        let store = SignalStore::new();
        let mut writer = store.claim_writer().unwrap();
        writer.record(SignalId::EngineSpeed, 1.0, 1000 + CLOCK_SKEW_TOLERANCE_MS, SignalFlags::NONE);
        let read = store.read(SignalId::EngineSpeed, 1000);
        assert_eq!(read.age_ms, 0);
        assert!(read.valid);
    }

    #[test]
    fn test_age_across_wraparound() {
        let store = SignalStore::new();
        let mut writer = store.claim_writer().unwrap();
        writer.record(SignalId::EngineSpeed, 1.0, u32::MAX - 19, SignalFlags::NONE);
        let read = store.read(SignalId::EngineSpeed, 20);
        assert_eq!(read.age_ms, 40);
        assert!(read.valid);
    }

    #[test]
    fn test_staleness_and_expiry() {
        let store = SignalStore::new();
        store.set_staleness(SignalId::EngineSpeed, 100, 500);
        let mut writer = store.claim_writer().unwrap();
        writer.record(SignalId::EngineSpeed, 1.0, 0, SignalFlags::NONE);

        let fresh = store.read(SignalId::EngineSpeed, 100);
        assert!(fresh.valid && !fresh.is_stale());

        let stale = store.read(SignalId::EngineSpeed, 101);
        assert!(stale.valid && stale.is_stale());

        let expired = store.read(SignalId::EngineSpeed, 501);
        assert!(!expired.valid);
        assert!(expired.flags.contains(SignalFlags::EXPIRED));
        assert_eq!(expired.value, 1.0);
    }

    #[test]
    fn test_bulk_staleness() {
        let store = SignalStore::new();
        store.set_all_staleness(10, 5);
        for id in SignalId::ALL {
            assert_eq!(store.staleness(id), (10, 10));
        }
    }

    #[test]
    fn test_invalid_hold_survives_other_channel_writes() {
        let store = SignalStore::new();
        let mut writer = store.claim_writer().unwrap();
        writer.record(SignalId::CoolantTemp, 90.0, 0, SignalFlags::NONE);
        writer.mark_invalid(SignalId::CoolantTemp, 100, 500);

        writer.record(SignalId::EngineSpeed, 2000.0, 200, SignalFlags::NONE);

        let during = store.read(SignalId::CoolantTemp, 599);
        assert!(!during.valid);
        assert!(during.flags.contains(SignalFlags::INVALID_HOLD));

        let after = store.read(SignalId::CoolantTemp, 600);
        assert!(after.valid);
    }

    #[test]
    fn test_expired_hold_does_not_return_after_wrap() {
        let store = SignalStore::new();
        store.set_staleness(SignalId::CoolantTemp, u32::MAX, u32::MAX);
        let mut writer = store.claim_writer().unwrap();
        writer.record(SignalId::CoolantTemp, 90.0, 0, SignalFlags::NONE);
        writer.mark_invalid(SignalId::CoolantTemp, 100, 500);

        assert!(!store.read(SignalId::CoolantTemp, 599).valid);
        // More than half the clock range past the deadline
        let later = store.read(SignalId::CoolantTemp, 600u32.wrapping_add(1 << 31).wrapping_add(10));
        assert!(later.valid);
        assert!(!later.flags.contains(SignalFlags::INVALID_HOLD));
    }

    #[test]
    fn test_hold_covers_small_reader_skew() {
        let store = SignalStore::new();
        let mut writer = store.claim_writer().unwrap();
        writer.record(SignalId::OilPressure, 300.0, 1000, SignalFlags::NONE);
        writer.mark_invalid(SignalId::OilPressure, 1000, 500);
        // Reader clock slightly behind the writer's
        assert!(!store.read(SignalId::OilPressure, 990).valid);
    }

    #[test]
    fn test_record_clears_invalid_hold() {
        let store = SignalStore::new();
        let mut writer = store.claim_writer().unwrap();
        writer.record(SignalId::CoolantTemp, 90.0, 0, SignalFlags::NONE);
        writer.mark_invalid(SignalId::CoolantTemp, 100, 500);
        assert!(!store.read(SignalId::CoolantTemp, 150).valid);

        writer.record(SignalId::CoolantTemp, 91.0, 160, SignalFlags::NONE);
        let read = store.read(SignalId::CoolantTemp, 170);
        assert!(read.valid);
        assert_eq!(read.value, 91.0);
    }

    #[test]
    fn test_single_writer_claim() {
        let store = SignalStore::new();
        let writer = store.claim_writer();
        assert!(writer.is_some());
        assert!(store.claim_writer().is_none());
        drop(writer);
        assert!(store.claim_writer().is_some());
    }

    #[test]
    fn test_reset_all() {
        let store = SignalStore::new();
        let mut writer = store.claim_writer().unwrap();
        writer.record(SignalId::Lambda, 1.0, 0, SignalFlags::SIMULATED);
        writer.reset_all();
        assert_eq!(store.read(SignalId::Lambda, 0), SignalRead::INVALID);
    }

    #[test]
    fn test_no_torn_reads() {
        // Value and timestamp are written together; a torn read would
        // observe a value that does not match its timestamp.
        let store = SignalStore::new();
        store.set_all_staleness(u32::MAX, u32::MAX);
        let done = StdAtomicBool::new(false);

        std::thread::scope(|scope| {
            let store = &store;
            let done = &done;
            scope.spawn(move || {
                let mut writer = store.claim_writer().unwrap();
                for ts in 1..200_000u32 {
                    writer.record(SignalId::EngineSpeed, ts as f32, ts, SignalFlags::NONE);
                }
                done.store(true, Ordering::Release);
            });

            for _ in 0..3 {
                scope.spawn(move || {
                    while !done.load(Ordering::Acquire) {
                        let read = store.read(SignalId::EngineSpeed, 0);
                        if read.flags.contains(SignalFlags::NEVER_WRITTEN)
                            || read.flags.contains(SignalFlags::CONTENDED)
                        {
                            continue;
                        }
                        // Reader clock is behind every stamp, so age wraps;
                        // only the value/timestamp pairing matters here.
                        let stamp = 0u32.wrapping_sub(read.age_ms);
                        if read.age_ms != 0 {
                            assert_eq!(read.value, stamp as f32);
                        }
                    }
                });
            }
        });
    }
}
