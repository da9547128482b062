use crate::base::error::{Error, Result};
use crate::base::message::Frame;
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{trace, warn};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Identifier handed out to every reply-expecting request, increasing in send order.
pub type RequestId = u64;

/// Completion handle of a request waiting for its reply.
#[derive(Debug)]
struct Waiter {
    id: RequestId,
    completion: Sender<Result<Frame>>,
    /// Set when a reply for this opcode was dropped as late while this request waited.
    reply_swallowed: bool,
}

/// A request that gave up waiting; a reply for it may still be on its way.
#[derive(Debug, Clone, Copy)]
struct Abandoned {
    id: RequestId,
    forget_at: Instant,
}

/// Table of requests waiting for a reply, keyed by opcode.
///
/// Replies carry no request id, so every opcode keeps its waiters in send
/// order and a reply resolves the oldest one. A request that timed out is
/// removed at once but leaves a marker until `forget_at`; a reply arriving
/// while an older marker is live belongs to the abandoned request and is dropped.
#[derive(Debug, Default)]
pub struct PendingTable {
    next_id: RequestId,
    waiting: HashMap<u8, VecDeque<Waiter>>,
    abandoned: HashMap<u8, VecDeque<Abandoned>>,
}

impl PendingTable {
    pub fn new() -> PendingTable {
        PendingTable::default()
    }

    /// Registers a request for `opcode` and returns its id and completion receiver.
    pub fn register(&mut self, opcode: u8) -> (RequestId, Receiver<Result<Frame>>) {
        let id = self.next_id;
        self.next_id += 1;
        let (completion, receiver) = bounded(1);
        self.waiting
            .entry(opcode)
            .or_default()
            .push_back(Waiter {
                id,
                completion,
                reply_swallowed: false,
            });
        trace!("Registered request #{} for opcode {:02X}", id, opcode);
        (id, receiver)
    }

    /// Removes a request that stopped waiting.
    ///
    /// When `late_reply_window` is given, a marker swallows a late reply for
    /// that long. No marker is left if a reply was already dropped as late
    /// while the request waited, since that reply may have been its own.
    /// Returns `false` if the request was already resolved.
    pub fn cancel(
        &mut self,
        opcode: u8,
        id: RequestId,
        late_reply_window: Option<Duration>,
    ) -> bool {
        let removed = self
            .waiting
            .get_mut(&opcode)
            .and_then(|queue| {
                let index = queue.iter().position(|w| w.id == id)?;
                queue.remove(index)
            });
        if self.waiting.get(&opcode).map_or(false, |q| q.is_empty()) {
            self.waiting.remove(&opcode);
        }

        let Some(waiter) = removed else {
            return false;
        };
        if waiter.reply_swallowed {
            trace!(
                "Request #{} for opcode {:02X} leaves no marker, a reply was dropped while it waited",
                id,
                opcode
            );
        } else if let Some(window) = late_reply_window {
            let markers = self.abandoned.entry(opcode).or_default();
            let position = markers.iter().position(|m| m.id > id).unwrap_or(markers.len());
            markers.insert(
                position,
                Abandoned {
                    id,
                    forget_at: Instant::now() + window,
                },
            );
        }
        true
    }

    /// Routes a reply frame to the request it answers.
    ///
    /// A non-success status completes the waiter with `Error::Status`.
    /// Returns the id of the resolved request, or `None` if the reply was
    /// unmatched or swallowed by an abandoned marker.
    pub fn dispatch(&mut self, frame: Frame) -> Option<RequestId> {
        let opcode = frame.opcode;
        self.forget_expired(opcode, Instant::now());

        let oldest_waiter = self
            .waiting
            .get(&opcode)
            .and_then(|q| q.front())
            .map(|w| w.id);
        let oldest_marker = self
            .abandoned
            .get(&opcode)
            .and_then(|q| q.front())
            .map(|m| m.id);

        let late_for = match (oldest_waiter, oldest_marker) {
            (Some(waiter), Some(marker)) if marker < waiter => Some(marker),
            (None, Some(marker)) => Some(marker),
            _ => None,
        };

        if let Some(marker) = late_for {
            warn!(
                "Dropping late reply to opcode {:02X} of timed out request #{}",
                opcode, marker
            );
            if let Some(markers) = self.abandoned.get_mut(&opcode) {
                markers.pop_front();
                if markers.is_empty() {
                    self.abandoned.remove(&opcode);
                }
            }
            if let Some(queue) = self.waiting.get_mut(&opcode) {
                queue.iter_mut().for_each(|w| w.reply_swallowed = true);
            }
            return None;
        }

        match oldest_waiter {
            Some(_) => {
                let queue = self.waiting.get_mut(&opcode)?;
                let waiter = queue.pop_front()?;
                if queue.is_empty() {
                    self.waiting.remove(&opcode);
                }
                let outcome = if frame.status.is_success() {
                    Ok(frame)
                } else {
                    Err(Error::Status {
                        opcode,
                        status: frame.status,
                    })
                };
                trace!("Resolving request #{} for opcode {:02X}", waiter.id, opcode);
                // the receiver is gone if the caller timed out concurrently
                let _ = waiter.completion.try_send(outcome);
                Some(waiter.id)
            }
            None => {
                warn!("No pending request for reply to opcode {:02X}", opcode);
                None
            }
        }
    }

    /// Fails every waiting request with a fresh error from `make_error` and clears the table.
    pub fn fail_all(&mut self, make_error: impl Fn() -> Error) -> usize {
        let mut failed = 0;
        for (_, queue) in self.waiting.drain() {
            for waiter in queue {
                let _ = waiter.completion.try_send(Err(make_error()));
                failed += 1;
            }
        }
        self.abandoned.clear();
        failed
    }

    /// Number of requests still waiting for a reply.
    pub fn len(&self) -> usize {
        self.waiting.values().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn forget_expired(&mut self, opcode: u8, now: Instant) {
        if let Some(markers) = self.abandoned.get_mut(&opcode) {
            markers.retain(|m| m.forget_at > now);
            if markers.is_empty() {
                self.abandoned.remove(&opcode);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusCode;

    fn reply(opcode: u8, status: u8, data: &[u8]) -> Frame {
        Frame {
            opcode,
            status: StatusCode(status),
            data: data.to_vec(),
        }
    }

    #[test]
    fn reply_resolves_matching_request() {
        let mut table = PendingTable::new();
        let (id, rx) = table.register(0x0B);
        assert_eq!(table.dispatch(reply(0x0B, 0, &[0x40, 0x1F])), Some(id));
        assert_eq!(rx.try_recv().unwrap().unwrap().data, vec![0x40, 0x1F]);
        assert!(table.is_empty());
    }

    #[test]
    fn status_failure_is_mapped() {
        let mut table = PendingTable::new();
        let (_, rx) = table.register(0x94);
        table.dispatch(reply(0x94, 0x87, &[]));
        match rx.try_recv().unwrap() {
            Err(Error::Status { opcode, status }) => {
                assert_eq!(opcode, 0x94);
                assert_eq!(status.description(), "File not found");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn same_opcode_requests_resolve_in_send_order() {
        let mut table = PendingTable::new();
        let (first, rx1) = table.register(0x07);
        let (second, rx2) = table.register(0x07);
        assert_eq!(table.dispatch(reply(0x07, 0, &[1])), Some(first));
        assert_eq!(table.dispatch(reply(0x07, 0, &[2])), Some(second));
        assert_eq!(rx1.try_recv().unwrap().unwrap().data, vec![1]);
        assert_eq!(rx2.try_recv().unwrap().unwrap().data, vec![2]);
    }

    #[test]
    fn late_reply_is_not_given_to_newer_request() {
        let mut table = PendingTable::new();
        let (stale, _stale_rx) = table.register(0x06);
        assert!(table.cancel(0x06, stale, Some(Duration::from_secs(5))));
        assert!(table.is_empty());

        let (fresh, fresh_rx) = table.register(0x06);
        assert_eq!(table.dispatch(reply(0x06, 0, &[0xAA])), None);
        assert!(fresh_rx.try_recv().is_err());
        assert_eq!(table.dispatch(reply(0x06, 0, &[0xBB])), Some(fresh));
        assert_eq!(fresh_rx.try_recv().unwrap().unwrap().data, vec![0xBB]);
    }

    #[test]
    fn one_lost_reply_does_not_starve_later_requests() {
        let mut table = PendingTable::new();
        let window = Some(Duration::from_secs(1));
        let (lost, _) = table.register(0x06);
        assert!(table.cancel(0x06, lost, window));

        // the first prompt reply is taken for the lost one
        let (first, first_rx) = table.register(0x06);
        assert_eq!(table.dispatch(reply(0x06, 0, &[0])), None);
        assert!(first_rx.try_recv().is_err());
        assert!(table.cancel(0x06, first, window));

        let mut answered = 0;
        for round in 1..=5u8 {
            let (id, rx) = table.register(0x06);
            if table.dispatch(reply(0x06, 0, &[round])) == Some(id) {
                assert_eq!(rx.try_recv().unwrap().unwrap().data, vec![round]);
                answered += 1;
            } else {
                table.cancel(0x06, id, window);
            }
        }
        assert_eq!(answered, 5);
        assert!(table.is_empty());
    }

    #[test]
    fn reply_without_waiter_is_consumed_by_marker() {
        let mut table = PendingTable::new();
        let (stale, _) = table.register(0x0B);
        table.cancel(0x0B, stale, Some(Duration::from_secs(1)));
        assert_eq!(table.dispatch(reply(0x0B, 0, &[])), None);

        let (fresh, _rx) = table.register(0x0B);
        assert_eq!(table.dispatch(reply(0x0B, 0, &[])), Some(fresh));
    }

    #[test]
    fn expired_marker_no_longer_swallows_replies() {
        let mut table = PendingTable::new();
        let (stale, _) = table.register(0x06);
        table.cancel(0x06, stale, Some(Duration::from_millis(0)));
        let (fresh, _rx) = table.register(0x06);
        std::thread::sleep(Duration::from_millis(2));
        assert_eq!(table.dispatch(reply(0x06, 0, &[])), Some(fresh));
    }

    #[test]
    fn cancel_after_resolution_reports_false() {
        let mut table = PendingTable::new();
        let (id, _rx) = table.register(0x0E);
        table.dispatch(reply(0x0E, 0, &[1]));
        assert!(!table.cancel(0x0E, id, Some(Duration::from_secs(1))));
        assert_eq!(table.dispatch(reply(0x0E, 0, &[1])), None);
    }

    #[test]
    fn fail_all_drains_table() {
        let mut table = PendingTable::new();
        let (_, rx1) = table.register(0x0B);
        let (_, rx2) = table.register(0x88);
        let failed = table.fail_all(|| Error::LinkLost {
            description: "closed".to_owned(),
        });
        assert_eq!(failed, 2);
        assert!(table.is_empty());
        assert!(matches!(rx1.try_recv().unwrap(), Err(Error::LinkLost { .. })));
        assert!(matches!(rx2.try_recv().unwrap(), Err(Error::LinkLost { .. })));
    }
}
