//! Retained sensor-event buffer.
//!
//! A fixed-capacity, append-only FIFO that lives in RTC memory and is
//! therefore plain old data: a backing array of [`MAX_EVENT_CAPACITY`]
//! slots plus a length and an effective capacity.  Appending never
//! allocates and never overwrites; when the buffer is full the caller gets
//! [`BufferFull`] back and must escalate to a full wake.
//!
//! ```text
//!   append ──▶ [e0 e1 e2 .. e(len-1) | free .. ] ──▶ drain (full wake)
//!                                                      │
//!                                 confirm_flush ◀──────┘ (broker ack)
//! ```
//!
//! There is no partial clear: a flush either confirms everything that
//! [`EventBuffer::drain`] returned or nothing at all.

use core::time::Duration;

/// Hard upper bound on the configurable buffer capacity (RTC memory budget).
pub const MAX_EVENT_CAPACITY: usize = 32;

/// Returned by [`EventBuffer::append`] when `len == capacity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferFull;

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Physical sensor that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventSource {
    /// PIR motion sensor.
    Motion,
    /// Magnetic reed switch on the door.
    DoorContact,
}

impl EventSource {
    /// Sensor name used in the broker payload.
    pub const fn sensor_name(self) -> &'static str {
        match self {
            Self::Motion => "PIR",
            Self::DoorContact => "MagneticSwitch",
        }
    }
}

/// Numeric room / device identifier assigned at provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceId(pub u16);

/// A single recorded sensor trigger.
///
/// `timestamp` is wall-clock time since the Unix epoch, derived from the
/// clock anchor.  When no anchor existed at record time the timestamp is
/// zero and `clock_synced` is `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorEvent {
    pub timestamp: Duration,
    pub source: EventSource,
    pub device_id: DeviceId,
    pub clock_synced: bool,
}

impl SensorEvent {
    /// Filler for unused buffer slots.
    const VACANT: Self = Self {
        timestamp: Duration::ZERO,
        source: EventSource::Motion,
        device_id: DeviceId(0),
        clock_synced: false,
    };
}

// ---------------------------------------------------------------------------
// Buffer
// ---------------------------------------------------------------------------

/// Bounded, in-order event store.  Invariant: `len <= capacity <= MAX_EVENT_CAPACITY`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventBuffer {
    slots: [SensorEvent; MAX_EVENT_CAPACITY],
    len: u8,
    capacity: u8,
}

impl EventBuffer {
    /// Empty buffer.  `capacity` is clamped to [`MAX_EVENT_CAPACITY`].
    pub const fn new(capacity: usize) -> Self {
        let capacity = if capacity > MAX_EVENT_CAPACITY {
            MAX_EVENT_CAPACITY
        } else {
            capacity
        };
        Self {
            slots: [SensorEvent::VACANT; MAX_EVENT_CAPACITY],
            len: 0,
            capacity: capacity as u8,
        }
    }

    /// Append in arrival order.  Leaves the buffer untouched when full.
    pub fn append(&mut self, event: SensorEvent) -> Result<(), BufferFull> {
        if self.is_full() {
            return Err(BufferFull);
        }
        self.slots[self.len()] = event;
        self.len += 1;
        Ok(())
    }

    /// Everything buffered, oldest first.  Does not clear.
    pub fn drain(&self) -> &[SensorEvent] {
        &self.slots[..self.len()]
    }

    /// Forget all buffered events.  Only call after the broker has
    /// acknowledged everything returned by the preceding [`drain`](Self::drain).
    pub fn confirm_flush(&mut self) {
        self.slots = [SensorEvent::VACANT; MAX_EVENT_CAPACITY];
        self.len = 0;
    }

    /// Change the effective capacity.  Never drops below the number of
    /// events already held, never exceeds [`MAX_EVENT_CAPACITY`].
    pub fn set_capacity(&mut self, capacity: usize) {
        let capacity = capacity.min(MAX_EVENT_CAPACITY).max(self.len());
        self.capacity = capacity as u8;
    }

    pub fn len(&self) -> usize {
        usize::from(self.len)
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        usize::from(self.capacity)
    }

    /// Whether the length and capacity fields honour the buffer invariant.
    /// A garbled RTC image can break it without touching the magic word.
    pub fn is_consistent(&self) -> bool {
        self.len <= self.capacity && self.capacity() <= MAX_EVENT_CAPACITY
    }

    #[cfg(test)]
    pub(crate) fn with_raw_len(mut self, len: u8) -> Self {
        self.len = len;
        self
    }
}
