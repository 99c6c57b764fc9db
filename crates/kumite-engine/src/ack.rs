//! Tick deadlines for requests that wait on a peer.
//!
//! Frame waits inside the arena always complete. Anything that waits on a
//! collaborator outside it (a rollback peer confirming an input, a server
//! confirming a hit) gets a deadline counted in ticks instead, and fails
//! with [`AckError::TimedOut`] when it passes. An explicit refusal is a
//! different error, [`AckError::Rejected`], so callers can retry one and
//! abort on the other.
//!
//! ```
//! use kumite_engine::ack::{AckError, AckTracker};
//!
//! let mut tracker = AckTracker::new(10);
//! let request = tracker.issue(0, "confirm hit");
//!
//! assert!(tracker.poll_expired(9).is_empty());
//! let expired = tracker.poll_expired(10);
//! assert!(matches!(expired[0], AckError::TimedOut { id, .. } if id == request));
//! assert!(expired[0].is_retryable());
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Identifier of one outstanding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(u64);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "request#{}", self.0)
    }
}

/// A peer's answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AckResponse {
    Accepted,
    Rejected(String),
}

/// Why a request did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AckError {
    #[error("{id} rejected by peer: {reason}")]
    Rejected { id: RequestId, reason: String },

    #[error("{id} timed out after {waited} ticks")]
    TimedOut { id: RequestId, waited: u64 },

    #[error("{0} is not outstanding")]
    Unknown(RequestId),
}

impl AckError {
    /// Only a timeout is worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AckError::TimedOut { .. })
    }

    pub fn id(&self) -> RequestId {
        match self {
            AckError::Rejected { id, .. } | AckError::TimedOut { id, .. } => *id,
            AckError::Unknown(id) => *id,
        }
    }
}

#[derive(Debug, Clone)]
struct Pending {
    issued: u64,
    deadline: u64,
    label: String,
}

/// Outstanding requests and their deadlines.
#[derive(Debug, Clone)]
pub struct AckTracker {
    timeout_ticks: u64,
    pending: BTreeMap<RequestId, Pending>,
    next: u64,
}

impl AckTracker {
    pub fn new(timeout_ticks: u64) -> Self {
        Self {
            timeout_ticks,
            pending: BTreeMap::new(),
            next: 0,
        }
    }

    /// Start waiting on a request issued at tick `now`.
    pub fn issue(&mut self, now: u64, label: impl Into<String>) -> RequestId {
        let id = RequestId(self.next);
        self.next += 1;
        let label = label.into();
        debug!(%id, label = %label, now, deadline = now + self.timeout_ticks, "awaiting ack");
        self.pending.insert(
            id,
            Pending {
                issued: now,
                deadline: now.saturating_add(self.timeout_ticks),
                label,
            },
        );
        id
    }

    /// Settle a request with the peer's response.
    ///
    /// A response that arrives at or after the deadline counts as a timeout.
    pub fn resolve(&mut self, id: RequestId, response: AckResponse, now: u64) -> Result<(), AckError> {
        let pending = self.pending.remove(&id).ok_or(AckError::Unknown(id))?;
        if now >= pending.deadline {
            warn!(%id, label = %pending.label, now, "ack arrived after deadline");
            return Err(AckError::TimedOut {
                id,
                waited: now - pending.issued,
            });
        }
        match response {
            AckResponse::Accepted => Ok(()),
            AckResponse::Rejected(reason) => Err(AckError::Rejected { id, reason }),
        }
    }

    /// Remove and report every request whose deadline is `now` or earlier.
    pub fn poll_expired(&mut self, now: u64) -> Vec<AckError> {
        let expired: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|(_, p)| p.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        expired
            .into_iter()
            .filter_map(|id| {
                let pending = self.pending.remove(&id)?;
                warn!(%id, label = %pending.label, now, "ack timed out");
                Some(AckError::TimedOut {
                    id,
                    waited: now - pending.issued,
                })
            })
            .collect()
    }

    pub fn is_pending(&self, id: RequestId) -> bool {
        self.pending.contains_key(&id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn timeout_ticks(&self) -> u64 {
        self.timeout_ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepted_before_deadline() {
        let mut tracker = AckTracker::new(5);
        let id = tracker.issue(10, "input");
        assert!(tracker.is_pending(id));
        assert_eq!(tracker.resolve(id, AckResponse::Accepted, 14), Ok(()));
        assert_eq!(tracker.pending_count(), 0);
    }

    #[test]
    fn rejection_is_not_retryable() {
        let mut tracker = AckTracker::new(5);
        let id = tracker.issue(0, "hit");
        let err = tracker
            .resolve(id, AckResponse::Rejected("desync".into()), 1)
            .unwrap_err();
        assert_eq!(
            err,
            AckError::Rejected {
                id,
                reason: "desync".into()
            }
        );
        assert!(!err.is_retryable());
    }

    #[test]
    fn late_answer_is_a_timeout() {
        let mut tracker = AckTracker::new(5);
        let id = tracker.issue(0, "hit");
        let err = tracker.resolve(id, AckResponse::Accepted, 5).unwrap_err();
        assert_eq!(err, AckError::TimedOut { id, waited: 5 });
        assert!(err.is_retryable());
    }

    #[test]
    fn unknown_and_double_resolution() {
        let mut tracker = AckTracker::new(5);
        let id = tracker.issue(0, "hit");
        tracker.resolve(id, AckResponse::Accepted, 1).unwrap();
        assert_eq!(
            tracker.resolve(id, AckResponse::Accepted, 2),
            Err(AckError::Unknown(id))
        );
    }

    #[test]
    fn poll_only_reports_due_requests() {
        let mut tracker = AckTracker::new(3);
        let early = tracker.issue(0, "a");
        let late = tracker.issue(2, "b");
        let expired = tracker.poll_expired(3);
        assert_eq!(expired, vec![AckError::TimedOut { id: early, waited: 3 }]);
        assert!(tracker.is_pending(late));
        assert!(tracker.poll_expired(4).is_empty());
        assert_eq!(tracker.poll_expired(5)[0].id(), late);
    }
}
