//! Status channel shared between the expiry producer and the consumer.
//!
//! The channel is a single read-once slot of `capacity` bytes (one byte is
//! reserved for the terminator, so `capacity - 1` are usable). The cooldown
//! expiry path publishes the settled state into it; a consumer reads it out,
//! which clears the slot, or writes its own payload into the same slot.
//!
//! # Locking
//!
//! The whole buffer is one critical section. Every operation takes the lock
//! for its full duration and releases it before notifying waiters; no
//! operation holds it across an await.
//!
//! # Readiness
//!
//! Every mutation wakes all blocked waiters, which then re-check the
//! condition they wait for. The reported mask depends on the
//! [`ReadinessPolicy`]:
//!
//! | Policy | Buffer empty | Buffer holds data |
//! |--------|--------------|-------------------|
//! | `Consumer` (default) | `WRITABLE` | `READABLE \| WRITABLE` |
//! | `Producer` | `WRITABLE` | *(nothing)* |
//!
//! # Examples
//!
//! ```
//! use kiosk_feedback::channel::{Readiness, StatusChannel};
//! use kiosk_core::FeedbackState;
//!
//! let channel = StatusChannel::default();
//! let consumer = channel.open();
//!
//! channel.publish(FeedbackState::new(1).unwrap());
//! assert!(consumer.poll_readiness().contains(Readiness::READABLE));
//!
//! assert_eq!(&consumer.read(64)[..], b"1\n");
//! assert!(consumer.read(64).is_empty());
//! ```

use bitflags::bitflags;
use bytes::{Bytes, BytesMut};
use kiosk_core::constants::{STATUS_BUFFER_CAPACITY, usable_capacity};
use kiosk_core::{Error, FeedbackState, Result};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, trace};

bitflags! {
    /// Readiness mask, using the POSIX poll event bit values.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Readiness: u16 {
        const IN = 0x0001;
        const OUT = 0x0004;
        const RDNORM = 0x0040;
        const WRNORM = 0x0100;

        const READABLE = Self::IN.bits() | Self::RDNORM.bits();
        const WRITABLE = Self::OUT.bits() | Self::WRNORM.bits();
    }
}

/// Polarity of the readiness mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessPolicy {
    /// Readable while the slot holds unread data; always writable.
    #[default]
    Consumer,

    /// Legacy polarity: writable only while the slot is empty, never readable.
    Producer,
}

impl ReadinessPolicy {
    fn mask(&self, empty: bool) -> Readiness {
        match (self, empty) {
            (Self::Consumer, true) => Readiness::WRITABLE,
            (Self::Consumer, false) => Readiness::READABLE | Readiness::WRITABLE,
            (Self::Producer, true) => Readiness::WRITABLE,
            (Self::Producer, false) => Readiness::empty(),
        }
    }
}

struct Shared {
    buffer: Mutex<BytesMut>,
    capacity: usize,
    policy: ReadinessPolicy,
    ready: Notify,
    endpoints: AtomicUsize,
}

/// Single-slot, read-once status channel.
///
/// Cheap to clone; all clones share the same slot.
#[derive(Clone)]
pub struct StatusChannel {
    shared: Arc<Shared>,
}

impl StatusChannel {
    /// Create a channel of `capacity` bytes including the terminator.
    pub fn new(capacity: usize, policy: ReadinessPolicy) -> Self {
        Self {
            shared: Arc::new(Shared {
                buffer: Mutex::new(BytesMut::new()),
                capacity,
                policy,
                ready: Notify::new(),
                endpoints: AtomicUsize::new(0),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BytesMut> {
        self.shared
            .buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Bytes a single write can store.
    pub fn usable_capacity(&self) -> usize {
        usable_capacity(self.shared.capacity)
    }

    pub fn policy(&self) -> ReadinessPolicy {
        self.shared.policy
    }

    /// Unread bytes currently held.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Open a consumer endpoint.
    pub fn open(&self) -> StatusEndpoint {
        let open = self.shared.endpoints.fetch_add(1, Ordering::Relaxed) + 1;
        debug!("Status channel opened ({} endpoint(s))", open);
        StatusEndpoint {
            channel: self.clone(),
        }
    }

    /// Number of endpoints currently open.
    pub fn open_endpoints(&self) -> usize {
        self.shared.endpoints.load(Ordering::Relaxed)
    }

    /// Producer write: replace the slot with the serialized `state`.
    pub fn publish(&self, state: FeedbackState) -> usize {
        let accepted = self.write(state.status_line().as_bytes());
        debug!("Published feedback state {}", state);
        accepted
    }

    /// Copy out up to `max_len` bytes and clear the slot.
    ///
    /// Bytes beyond `max_len` are discarded with the rest of the slot. A
    /// zero-length read neither returns nor consumes anything.
    pub fn read(&self, max_len: usize) -> Bytes {
        if max_len == 0 {
            return Bytes::new();
        }

        let data = {
            let mut buffer = self.lock();
            if buffer.is_empty() {
                return Bytes::new();
            }
            let n = max_len.min(buffer.len());
            let data = Bytes::copy_from_slice(&buffer[..n]);
            buffer.clear();
            data
        };

        trace!("Read {} byte(s) from status channel", data.len());
        self.shared.ready.notify_waiters();
        data
    }

    /// Replace the slot with `data`, truncated to the usable capacity.
    ///
    /// Returns the number of bytes accepted. Truncation is not an error.
    pub fn write(&self, data: &[u8]) -> usize {
        let accepted = data.len().min(self.usable_capacity());
        {
            let mut buffer = self.lock();
            buffer.clear();
            buffer.extend_from_slice(&data[..accepted]);
        }

        if accepted < data.len() {
            debug!(
                "Truncated status write from {} to {} byte(s)",
                data.len(),
                accepted
            );
        }
        self.shared.ready.notify_waiters();
        accepted
    }

    /// Current readiness mask under the channel's policy.
    pub fn poll_readiness(&self) -> Readiness {
        let empty = self.lock().is_empty();
        self.shared.policy.mask(empty)
    }

    /// Wait until the mask intersects `interest`.
    ///
    /// Returns the intersecting bits. Dropping the future cancels the wait.
    pub async fn wait_ready(&self, interest: Readiness) -> Readiness {
        loop {
            let notified = self.shared.ready.notified();
            tokio::pin!(notified);
            // Register before checking so a mutation in between is not lost.
            notified.as_mut().enable();

            let ready = self.poll_readiness() & interest;
            if !ready.is_empty() {
                return ready;
            }
            notified.await;
        }
    }

    /// [`wait_ready`](Self::wait_ready) bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Timeout` if the channel does not become ready in time.
    pub async fn wait_ready_timeout(
        &self,
        interest: Readiness,
        timeout: Duration,
    ) -> Result<Readiness> {
        tokio::time::timeout(timeout, self.wait_ready(interest))
            .await
            .map_err(|_| timeout_error(timeout))
    }

    /// Block until the slot holds data, then read it.
    ///
    /// Independent of the readiness policy. Returns immediately with an
    /// empty result when `max_len` is zero.
    pub async fn read_when_ready(&self, max_len: usize) -> Bytes {
        if max_len == 0 {
            return Bytes::new();
        }

        loop {
            let notified = self.shared.ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let data = self.read(max_len);
            if !data.is_empty() {
                return data;
            }
            notified.await;
        }
    }

    /// [`read_when_ready`](Self::read_when_ready) bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns `Error::Timeout` if no data arrives in time.
    pub async fn read_timeout(&self, max_len: usize, timeout: Duration) -> Result<Bytes> {
        tokio::time::timeout(timeout, self.read_when_ready(max_len))
            .await
            .map_err(|_| timeout_error(timeout))
    }
}

impl Default for StatusChannel {
    fn default() -> Self {
        Self::new(STATUS_BUFFER_CAPACITY, ReadinessPolicy::default())
    }
}

impl std::fmt::Debug for StatusChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusChannel")
            .field("capacity", &self.shared.capacity)
            .field("policy", &self.shared.policy)
            .field("len", &self.len())
            .finish()
    }
}

fn timeout_error(timeout: Duration) -> Error {
    Error::Timeout {
        duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
    }
}

/// Consumer side of a [`StatusChannel`].
///
/// Endpoints share the channel's single slot and cursor; they do not
/// buffer independently.
#[derive(Debug)]
pub struct StatusEndpoint {
    channel: StatusChannel,
}

impl StatusEndpoint {
    pub fn read(&self, max_len: usize) -> Bytes {
        self.channel.read(max_len)
    }

    pub fn write(&self, data: &[u8]) -> usize {
        self.channel.write(data)
    }

    pub fn poll_readiness(&self) -> Readiness {
        self.channel.poll_readiness()
    }

    pub async fn wait_ready(&self, interest: Readiness) -> Readiness {
        self.channel.wait_ready(interest).await
    }

    pub async fn wait_ready_timeout(
        &self,
        interest: Readiness,
        timeout: Duration,
    ) -> Result<Readiness> {
        self.channel.wait_ready_timeout(interest, timeout).await
    }

    pub async fn read_when_ready(&self, max_len: usize) -> Bytes {
        self.channel.read_when_ready(max_len).await
    }

    pub async fn read_timeout(&self, max_len: usize, timeout: Duration) -> Result<Bytes> {
        self.channel.read_timeout(max_len, timeout).await
    }
}

impl Drop for StatusEndpoint {
    fn drop(&mut self) {
        let remaining = self.channel.shared.endpoints.fetch_sub(1, Ordering::Relaxed) - 1;
        debug!("Status channel closed ({} endpoint(s))", remaining);
    }
}
