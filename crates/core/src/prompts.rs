//! Prompt queue
//!
//! Serializes permission/question requests so at most one is displayed per
//! process; the rest wait in a FIFO side queue and are promoted strictly in
//! order. Each pending request holds a take-once resolver (a oneshot
//! sender), so "resolved exactly once" is a structural guarantee rather
//! than closure discipline. Resolving an id that is not pending is a no-op,
//! which absorbs duplicate or stale replies from the network.
//!
//! Requests owned by remote-initiated sessions never occupy the local
//! display slot: they are tracked as pending (same idempotence rules) while
//! the relay bridge round-trips the answer.

use std::collections::{HashMap, VecDeque};

use agentdeck_protocol::{PromptRequest, PromptResolution};
use tokio::sync::oneshot;
use tracing::{debug, warn};

struct PendingPrompt {
    request: PromptRequest,
    resolver: Option<oneshot::Sender<PromptResolution>>,
}

/// Outcome of a successful `resolve`/`reject`
pub struct ResolvedPrompt {
    pub request: PromptRequest,
    pub resolution: PromptResolution,
    /// The request promoted into the display slot, if any
    pub next_displayed: Option<PromptRequest>,
}

#[derive(Default)]
pub struct PromptQueue {
    pending: HashMap<String, PendingPrompt>,
    /// Local requests awaiting the display slot, FIFO
    waiting: VecDeque<String>,
    /// Id of the request currently displayed
    active: Option<String>,
}

impl PromptQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a request and return the receiver its resolution will be
    /// delivered on. Local requests are displayed immediately when the slot
    /// is free, otherwise queued; remote requests bypass the display
    /// entirely. The second return value is the request that just became
    /// displayed (always `None` for remote requests).
    pub fn submit(
        &mut self,
        request: PromptRequest,
        remote: bool,
    ) -> (oneshot::Receiver<PromptResolution>, Option<PromptRequest>) {
        let (tx, rx) = oneshot::channel();

        if self.pending.contains_key(&request.id) {
            // Re-delivered tool-start for an already-pending call; keep the
            // first registration, the returned receiver never fires.
            warn!(
                component = "prompts",
                event = "prompt.duplicate_submit",
                request_id = %request.id,
                "Ignoring duplicate prompt submission"
            );
            return (rx, None);
        }

        let id = request.id.clone();
        self.pending.insert(
            id.clone(),
            PendingPrompt {
                request: request.clone(),
                resolver: Some(tx),
            },
        );

        if remote {
            return (rx, None);
        }

        if self.active.is_none() {
            self.active = Some(id);
            (rx, Some(request))
        } else {
            self.waiting.push_back(id);
            (rx, None)
        }
    }

    /// The currently displayed request, if any
    pub fn active(&self) -> Option<&PromptRequest> {
        let id = self.active.as_ref()?;
        self.pending.get(id).map(|p| &p.request)
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    /// Ids of every pending request owned by `session_id`
    pub fn pending_for_session(&self, session_id: &str) -> Vec<String> {
        self.pending
            .values()
            .filter(|p| p.request.session_id == session_id)
            .map(|p| p.request.id.clone())
            .collect()
    }

    /// Deliver a resolution. Returns `None` when the id is not pending
    /// (stale or duplicate reply) — a no-op by contract.
    pub fn resolve(&mut self, id: &str, resolution: PromptResolution) -> Option<ResolvedPrompt> {
        let mut pending = match self.pending.remove(id) {
            Some(pending) => pending,
            None => {
                debug!(
                    component = "prompts",
                    event = "prompt.stale_resolution",
                    request_id = %id,
                    "Ignoring resolution for non-pending request"
                );
                return None;
            }
        };

        if let Some(resolver) = pending.resolver.take() {
            // The consumer may have given up; delivery failure is fine
            let _ = resolver.send(resolution.clone());
        }

        self.waiting.retain(|waiting| waiting != id);
        let next_displayed = if self.active.as_deref() == Some(id) {
            self.active = None;
            self.promote_next()
        } else {
            None
        };

        Some(ResolvedPrompt {
            request: pending.request,
            resolution,
            next_displayed,
        })
    }

    /// Reject a pending request (same semantics as `resolve`)
    pub fn reject(&mut self, id: &str) -> Option<ResolvedPrompt> {
        self.resolve(id, PromptResolution::Rejected)
    }

    fn promote_next(&mut self) -> Option<PromptRequest> {
        while let Some(id) = self.waiting.pop_front() {
            if let Some(pending) = self.pending.get(&id) {
                self.active = Some(id);
                return Some(pending.request.clone());
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentdeck_protocol::PromptKind;

    fn request(id: &str, session_id: &str) -> PromptRequest {
        PromptRequest {
            id: id.into(),
            session_id: session_id.into(),
            kind: PromptKind::Permission,
            header: "Permission needed".into(),
            prompt: "Run the command?".into(),
            options: Vec::new(),
            multi_select: false,
            diff: None,
            pattern: None,
        }
    }

    fn answered(answer: &str) -> PromptResolution {
        PromptResolution::Answered {
            answers: vec![answer.into()],
        }
    }

    #[test]
    fn first_submission_displays_immediately() {
        let mut queue = PromptQueue::new();
        let (_rx, displayed) = queue.submit(request("req-1", "s1"), false);
        assert_eq!(displayed.unwrap().id, "req-1");
        assert_eq!(queue.active().unwrap().id, "req-1");
    }

    #[test]
    fn strict_fifo_promotion_at_depth_two() {
        let mut queue = PromptQueue::new();
        let (_rx1, _) = queue.submit(request("req-1", "s1"), false);
        let (_rx2, displayed) = queue.submit(request("req-2", "s1"), false);
        assert!(displayed.is_none(), "second request waits");
        let (_rx3, displayed) = queue.submit(request("req-3", "s1"), false);
        assert!(displayed.is_none(), "third request waits");

        // Resolving the first promotes exactly the second
        let resolved = queue.resolve("req-1", answered("ok")).unwrap();
        assert_eq!(resolved.next_displayed.unwrap().id, "req-2");
        assert_eq!(queue.active().unwrap().id, "req-2");

        // The third cannot display before the second resolves
        assert_eq!(queue.active().unwrap().id, "req-2");
        let resolved = queue.resolve("req-2", answered("ok")).unwrap();
        assert_eq!(resolved.next_displayed.unwrap().id, "req-3");
    }

    #[tokio::test]
    async fn resolution_is_delivered_exactly_once() {
        let mut queue = PromptQueue::new();
        let (rx, _) = queue.submit(request("req-1", "s1"), false);

        queue.resolve("req-1", answered("Allow Once")).unwrap();
        assert_eq!(rx.await.unwrap(), answered("Allow Once"));

        // Second resolution of the same id has no observable effect
        assert!(queue.resolve("req-1", answered("Always Allow")).is_none());
    }

    #[test]
    fn stale_resolution_is_noop() {
        let mut queue = PromptQueue::new();
        assert!(queue.resolve("ghost", answered("ok")).is_none());
        assert!(queue.reject("ghost").is_none());
    }

    #[test]
    fn remote_requests_bypass_local_display() {
        let mut queue = PromptQueue::new();
        let (_rx1, displayed) = queue.submit(request("remote-1", "s1"), true);
        assert!(displayed.is_none());
        assert!(queue.active().is_none());
        assert!(queue.is_pending("remote-1"));

        // A local request still gets the slot while the remote one waits
        let (_rx2, displayed) = queue.submit(request("local-1", "s2"), false);
        assert_eq!(displayed.unwrap().id, "local-1");

        // The relay's answer resolves the remote request without touching
        // the displayed one
        let resolved = queue.resolve("remote-1", answered("yes")).unwrap();
        assert!(resolved.next_displayed.is_none());
        assert_eq!(queue.active().unwrap().id, "local-1");
    }

    #[test]
    fn pending_for_session_lists_all_owned_requests() {
        let mut queue = PromptQueue::new();
        queue.submit(request("req-1", "s1"), false);
        queue.submit(request("req-2", "s2"), false);
        queue.submit(request("req-3", "s1"), true);

        let mut pending = queue.pending_for_session("s1");
        pending.sort();
        assert_eq!(pending, ["req-1", "req-3"]);
    }

    #[test]
    fn rejection_flows_through_same_path() {
        let mut queue = PromptQueue::new();
        let (_rx1, _) = queue.submit(request("req-1", "s1"), false);
        let (_rx2, _) = queue.submit(request("req-2", "s1"), false);

        let resolved = queue.reject("req-1").unwrap();
        assert_eq!(resolved.resolution, PromptResolution::Rejected);
        assert_eq!(resolved.next_displayed.unwrap().id, "req-2");
    }
}
