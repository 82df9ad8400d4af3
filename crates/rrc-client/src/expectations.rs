//! Bookkeeping that pairs in-band transfer announcements with the bulk
//! transfers the hub later offers.
//!
//! A RESOURCE_ENVELOPE frame announces an upcoming transfer and becomes a
//! pending [`ResourceExpectation`]. When the transport advertises a transfer,
//! it is accepted only if an unexpired expectation of exactly the same size
//! is pending; that expectation moves to the matched table until the
//! transfer concludes.
//!
//! The tracker does no I/O and takes the current time as an argument, so
//! every decision can be tested deterministically.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rrc_core::{DIGEST_LEN, ResourceAnnouncement, ResourceKind};
use tokio::time::Instant;

use crate::client::deadline_after;
use crate::transport::{Transfer, TransferHandle};

/// A pending or matched transfer announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceExpectation {
    pub id: Vec<u8>,
    pub kind: ResourceKind,
    pub size: u64,
    pub digest: Option<[u8; DIGEST_LEN]>,
    pub encoding: Option<String>,
    /// Room named by the announcing envelope.
    pub room: Option<String>,
    /// Sender of the announcing envelope.
    pub src: Vec<u8>,
    pub created_at: Instant,
    pub expires_at: Instant,
    seq: u64,
}

impl ResourceExpectation {
    #[must_use]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Pending announcements, matched transfers and in-flight handles.
pub struct ExpectationTracker {
    max_bytes: u64,
    ttl: Duration,
    capacity: usize,
    next_seq: u64,
    pending: HashMap<Vec<u8>, ResourceExpectation>,
    matched: HashMap<TransferHandle, ResourceExpectation>,
    active: HashMap<TransferHandle, Arc<dyn Transfer>>,
}

impl ExpectationTracker {
    /// `capacity` is clamped to at least one.
    pub fn new(max_bytes: u64, ttl: Duration, capacity: usize) -> Self {
        Self {
            max_bytes,
            ttl,
            capacity: capacity.max(1),
            next_seq: 0,
            pending: HashMap::new(),
            matched: HashMap::new(),
            active: HashMap::new(),
        }
    }

    /// Record an announcement. Returns `false` if it was dropped for
    /// exceeding the size limit.
    ///
    /// Expired entries are purged first. A repeated id replaces the earlier
    /// entry; otherwise the oldest entry is evicted when the table is full.
    pub fn announce_at(
        &mut self,
        announcement: ResourceAnnouncement,
        room: Option<String>,
        src: Vec<u8>,
        now: Instant,
    ) -> bool {
        if announcement.size > self.max_bytes {
            tracing::warn!(
                id = %hex::encode(&announcement.id),
                size = announcement.size,
                max = self.max_bytes,
                "announced transfer exceeds size limit; ignoring"
            );
            return false;
        }

        self.evict_expired_at(now);

        if self.pending.remove(&announcement.id).is_none() {
            while self.pending.len() >= self.capacity {
                let Some(oldest) = self.oldest_pending(|_| true) else {
                    break;
                };
                if let Some(evicted) = self.pending.remove(&oldest) {
                    tracing::debug!(id = %hex::encode(&evicted.id), "evicting oldest expectation");
                }
            }
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        let expectation = ResourceExpectation {
            id: announcement.id,
            kind: announcement.kind,
            size: announcement.size,
            digest: announcement.sha256,
            encoding: announcement.encoding,
            room,
            src,
            created_at: now,
            expires_at: deadline_after(now, self.ttl),
            seq,
        };
        tracing::debug!(
            id = %hex::encode(&expectation.id),
            kind = expectation.kind.as_str(),
            size = expectation.size,
            "expecting transfer"
        );
        self.pending.insert(expectation.id.clone(), expectation);
        true
    }

    /// Drop every pending expectation whose deadline has passed.
    pub fn evict_expired_at(&mut self, now: Instant) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, e| !e.is_expired_at(now));
        before - self.pending.len()
    }

    /// Decide whether to accept an advertised transfer.
    ///
    /// Accepts iff the size is within limits and some unexpired expectation
    /// has exactly that size. Among equal sizes the oldest announcement wins.
    pub fn advertise_at(&mut self, transfer: Arc<dyn Transfer>, now: Instant) -> bool {
        let handle = transfer.handle();
        let size = transfer.size();
        if size > self.max_bytes {
            tracing::warn!(?handle, size, max = self.max_bytes, "rejecting oversized transfer");
            return false;
        }

        self.evict_expired_at(now);

        let Some(id) = self.oldest_pending(|e| e.size == size) else {
            tracing::warn!(?handle, size, "rejecting unexpected transfer");
            return false;
        };
        let Some(expectation) = self.pending.remove(&id) else {
            return false;
        };

        tracing::debug!(?handle, id = %hex::encode(&expectation.id), size, "transfer matched");
        self.matched.insert(handle, expectation);
        self.active.insert(handle, transfer);
        true
    }

    /// Forget a concluded transfer, returning the expectation it matched.
    pub fn conclude(&mut self, handle: TransferHandle) -> Option<ResourceExpectation> {
        self.active.remove(&handle);
        self.matched.remove(&handle)
    }

    /// Empty every table, handing back in-flight transfers for cancellation.
    pub fn clear(&mut self) -> Vec<Arc<dyn Transfer>> {
        self.pending.clear();
        self.matched.clear();
        self.active.drain().map(|(_, t)| t).collect()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn pending(&self) -> impl Iterator<Item = &ResourceExpectation> {
        self.pending.values()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn is_active(&self, handle: TransferHandle) -> bool {
        self.active.contains_key(&handle)
    }

    fn oldest_pending(&self, filter: impl Fn(&ResourceExpectation) -> bool) -> Option<Vec<u8>> {
        self.pending
            .values()
            .filter(|e| filter(e))
            .min_by_key(|e| (e.created_at, e.seq))
            .map(|e| e.id.clone())
    }
}
