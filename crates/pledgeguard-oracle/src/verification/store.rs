//! Verification request store
//!
//! Each request sits behind its own mutex so votes on different requests
//! never contend, while two votes on the same request are strictly ordered.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use pledgeguard_common::{NotFoundError, ProtocolError, RequestId, Result, VerificationRequest};

/// request id -> request
#[derive(Default)]
pub struct RequestStore {
    requests: DashMap<RequestId, Arc<Mutex<VerificationRequest>>>,
}

impl RequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new request. An id collision is unrecoverable for the caller.
    pub fn insert(&self, request: VerificationRequest) -> Result<()> {
        use dashmap::mapref::entry::Entry;
        match self.requests.entry(request.id) {
            Entry::Occupied(_) => Err(ProtocolError::Internal(format!(
                "verification request id collision: {}",
                request.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(Arc::new(Mutex::new(request)));
                Ok(())
            }
        }
    }

    fn handle(&self, id: &RequestId) -> Result<Arc<Mutex<VerificationRequest>>> {
        self.requests
            .get(id)
            .map(|r| r.value().clone())
            .ok_or_else(|| NotFoundError::Request(id.to_string()).into())
    }

    /// Run `f` with the request locked. The map shard lock is released first.
    pub fn with_request<R>(
        &self,
        id: &RequestId,
        f: impl FnOnce(&mut VerificationRequest) -> Result<R>,
    ) -> Result<R> {
        let handle = self.handle(id)?;
        let mut request = handle.lock();
        f(&mut request)
    }

    /// Snapshot of a request
    pub fn get(&self, id: &RequestId) -> Option<VerificationRequest> {
        let handle = self.requests.get(id)?.value().clone();
        let snapshot = handle.lock().clone();
        Some(snapshot)
    }

    /// Resolution of a request: `None` while open
    pub fn result(&self, id: &RequestId) -> Option<bool> {
        let handle = self.requests.get(id)?.value().clone();
        let result = handle.lock().result;
        result
    }

    fn handles(&self) -> Vec<(RequestId, Arc<Mutex<VerificationRequest>>)> {
        self.requests
            .iter()
            .map(|e| (*e.key(), e.value().clone()))
            .collect()
    }

    /// Ids of unresolved requests whose voting period has elapsed
    pub fn expired_open(&self, now: i64) -> Vec<RequestId> {
        self.handles()
            .into_iter()
            .filter(|(_, h)| {
                let r = h.lock();
                !r.is_completed && r.is_expired(now)
            })
            .map(|(id, _)| id)
            .collect()
    }

    /// Unresolved requests the node has voted on
    pub fn open_votes_of(&self, node_id: &str) -> usize {
        self.handles()
            .into_iter()
            .filter(|(_, h)| {
                let r = h.lock();
                !r.is_completed && r.has_voted(node_id)
            })
            .count()
    }

    /// (total, completed)
    pub fn counts(&self) -> (usize, usize) {
        let handles = self.handles();
        let completed = handles.iter().filter(|(_, h)| h.lock().is_completed).count();
        (handles.len(), completed)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pledgeguard_common::{ResolutionCause, StateError, VerificationTarget, VoteRecord};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn request(now: i64) -> VerificationRequest {
        VerificationRequest::new(
            VerificationTarget {
                campaign_id: Uuid::now_v7(),
                milestone_index: Some(1),
            },
            [9u8; 32],
            now,
            1_000,
        )
    }

    #[test]
    fn test_insert_and_lookup() {
        let store = RequestStore::new();
        let req = request(0);
        let id = req.id;
        store.insert(req.clone()).unwrap();

        assert!(matches!(
            store.insert(req),
            Err(ProtocolError::Internal(_))
        ));
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(&id).unwrap().id, id);
        assert_eq!(store.result(&id), None);
        assert!(store.get(&Uuid::now_v7()).is_none());
    }

    #[test]
    fn test_with_request_mutates() {
        let store = RequestStore::new();
        let req = request(0);
        let id = req.id;
        store.insert(req).unwrap();

        store
            .with_request(&id, |r| {
                r.record_vote(VoteRecord {
                    node_id: "n1".into(),
                    approve: true,
                    stake: dec!(100),
                    timestamp: 1,
                })?;
                Ok(())
            })
            .unwrap();

        let err = store
            .with_request(&id, |r| {
                r.record_vote(VoteRecord {
                    node_id: "n1".into(),
                    approve: false,
                    stake: dec!(100),
                    timestamp: 2,
                })?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::State(StateError::DuplicateVote { .. })
        ));
        assert_eq!(store.open_votes_of("n1"), 1);
        assert_eq!(store.open_votes_of("n2"), 0);
    }

    #[test]
    fn test_expired_open_and_counts() {
        let store = RequestStore::new();
        let a = request(0);
        let b = request(500);
        let (a_id, b_id) = (a.id, b.id);
        store.insert(a).unwrap();
        store.insert(b).unwrap();

        assert_eq!(store.expired_open(1_200), vec![a_id]);

        store
            .with_request(&a_id, |r| {
                r.resolve(false, ResolutionCause::Deadline, 1_200);
                Ok(())
            })
            .unwrap();
        assert_eq!(store.expired_open(2_000), vec![b_id]);
        assert_eq!(store.counts(), (2, 1));
        assert_eq!(store.result(&a_id), Some(false));
    }
}
