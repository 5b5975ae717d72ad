use std::{collections::VecDeque, sync::mpsc};

use tracing::{debug, warn};

use super::message::{Message, Payload, Tag};
use crate::{
    atoms::{AtomBuffer, ForwardBuffer, GhostBuffer, ReverseBuffer},
    output::{Operation, Value},
    Error,
};

/// One rank's endpoint: a sender to every rank (itself included) and its
/// own receiver. Messages that arrive before they are asked for wait in a
/// pending queue until a receive with a matching (source, tag) comes along.
pub struct Communicator {
    rank: usize,
    senders: Vec<mpsc::Sender<Message>>,
    receiver: mpsc::Receiver<Message>,
    pending: VecDeque<Message>,
    finished: Vec<bool>,
    collective_seq: u64,
}
impl Communicator {
    /// Create the connected endpoints of `nranks` ranks
    pub fn create(nranks: usize) -> Vec<Communicator> {
        let (senders, receivers): (Vec<_>, Vec<_>) = (0..nranks).map(|_| mpsc::channel()).unzip();
        receivers
            .into_iter()
            .enumerate()
            .map(|(rank, receiver)| Communicator {
                rank,
                senders: senders.clone(),
                receiver,
                pending: VecDeque::new(),
                finished: vec![false; nranks],
                collective_seq: 0,
            })
            .collect()
    }

    pub fn rank(&self) -> usize {
        self.rank
    }
    pub fn nranks(&self) -> usize {
        self.senders.len()
    }
    pub fn is_root(&self) -> bool {
        self.rank == 0
    }

    // Point to point

    pub fn send(&self, dest: usize, tag: Tag, payload: Payload) -> Result<(), Error> {
        let message = Message {
            source: self.rank,
            tag,
            payload,
        };
        self.senders
            .get(dest)
            .ok_or_else(|| Error::protocol(format!("No rank {} to send to", dest)))?
            .send(message)
            .map_err(|_| Error::Disconnected(dest))
    }

    /// Block until the message from `source` with `tag` arrives
    pub fn recv(&mut self, source: usize, tag: Tag) -> Result<Payload, Error> {
        if let Some(pos) = self
            .pending
            .iter()
            .position(|m| m.source == source && m.tag == tag)
        {
            if let Some(message) = self.pending.remove(pos) {
                return Ok(message.payload);
            }
        }
        loop {
            if self.finished[source] {
                return Err(Error::Disconnected(source));
            }
            let message = self
                .receiver
                .recv()
                .map_err(|_| Error::Disconnected(source))?;
            match (message.tag, message.payload) {
                (Tag::Control, Payload::Abort(reason)) => {
                    return Err(Error::Aborted {
                        rank: message.source,
                        message: reason,
                    })
                }
                (Tag::Control, Payload::Done) => self.finished[message.source] = true,
                (t, payload) if message.source == source && t == tag => return Ok(payload),
                (t, payload) => self.pending.push_back(Message {
                    source: message.source,
                    tag: t,
                    payload,
                }),
            }
        }
    }

    // Typed receives

    pub fn recv_atoms(&mut self, source: usize, tag: Tag) -> Result<AtomBuffer, Error> {
        match self.recv(source, tag)? {
            Payload::Atoms(buf) => Ok(buf),
            other => Err(unexpected(source, tag, &other)),
        }
    }
    pub fn recv_ghosts(&mut self, source: usize, tag: Tag) -> Result<GhostBuffer, Error> {
        match self.recv(source, tag)? {
            Payload::Ghosts(buf) => Ok(buf),
            other => Err(unexpected(source, tag, &other)),
        }
    }
    pub fn recv_forward(&mut self, source: usize, tag: Tag) -> Result<ForwardBuffer, Error> {
        match self.recv(source, tag)? {
            Payload::Forward(buf) => Ok(buf),
            other => Err(unexpected(source, tag, &other)),
        }
    }
    pub fn recv_reverse(&mut self, source: usize, tag: Tag) -> Result<ReverseBuffer, Error> {
        match self.recv(source, tag)? {
            Payload::Reverse(buf) => Ok(buf),
            other => Err(unexpected(source, tag, &other)),
        }
    }

    // Collectives

    /// Reduce each value with its operation across all ranks. Contributions
    /// are combined in rank order, so every rank gets identical results.
    pub fn all_reduce_values(
        &mut self,
        values: Vec<Value>,
        ops: &[Operation],
    ) -> Result<Vec<Value>, Error> {
        if values.len() != ops.len() {
            return Err(Error::protocol(format!(
                "{} values reduced with {} operations",
                values.len(),
                ops.len()
            )));
        }
        let seq = self.collective_seq;
        self.collective_seq += 1;
        let tag = Tag::Collective { seq };
        for dest in (0..self.nranks()).filter(|&r| r != self.rank) {
            self.send(dest, tag, Payload::Values(values.clone()))?;
        }

        let mut result: Option<Vec<Value>> = None;
        for source in 0..self.nranks() {
            let contribution = if source == self.rank {
                values.clone()
            } else {
                match self.recv(source, tag)? {
                    Payload::Values(v) if v.len() == ops.len() => v,
                    other => return Err(unexpected(source, tag, &other)),
                }
            };
            result = Some(match result {
                None => contribution,
                Some(acc) => acc
                    .into_iter()
                    .zip(contribution)
                    .zip(ops)
                    .map(|((a, b), &op)| a.combine(b, op))
                    .collect::<Result<Vec<_>, _>>()?,
            });
        }
        result.ok_or_else(|| Error::protocol("Reduction over zero ranks"))
    }

    pub fn all_reduce(&mut self, value: Value, op: Operation) -> Result<Value, Error> {
        let mut result = self.all_reduce_values(vec![value], &[op])?;
        result
            .pop()
            .ok_or_else(|| Error::protocol("Reduction returned no value"))
    }
    pub fn all_reduce_f64(&mut self, value: f64, op: Operation) -> Result<f64, Error> {
        Ok(self.all_reduce(Value::Float(value), op)?.as_f64())
    }
    pub fn all_reduce_usize(&mut self, value: usize, op: Operation) -> Result<usize, Error> {
        match self.all_reduce(Value::Usize(value), op)? {
            Value::Usize(v) => Ok(v),
            other => Err(Error::protocol(format!(
                "Expected an integer reduction, got {:?}",
                other
            ))),
        }
    }
    /// Whether `flag` is set on any rank
    pub fn any(&mut self, flag: bool) -> Result<bool, Error> {
        Ok(self.all_reduce_usize(flag as usize, Operation::Max)? > 0)
    }
    pub fn barrier(&mut self) -> Result<(), Error> {
        self.all_reduce_usize(0, Operation::Sum).map(|_| ())
    }

    // Shutdown

    /// Tell every other rank to stop waiting
    pub fn abort(&self, reason: &str) {
        warn!(rank = self.rank, "Aborting: {}", reason);
        for dest in (0..self.nranks()).filter(|&r| r != self.rank) {
            let _ = self.send(dest, Tag::Control, Payload::Abort(reason.to_string()));
        }
    }
    /// Announce that this rank will not send anything else
    pub fn finish(&self) {
        if !self.pending.is_empty() {
            debug!(
                rank = self.rank,
                "Finished with {} unconsumed messages",
                self.pending.len()
            );
        }
        for dest in (0..self.nranks()).filter(|&r| r != self.rank) {
            let _ = self.send(dest, Tag::Control, Payload::Done);
        }
    }
}

fn unexpected(source: usize, tag: Tag, payload: &Payload) -> Error {
    Error::protocol(format!(
        "Unexpected {} payload from rank {} for {:?}",
        payload.kind(),
        source,
        tag
    ))
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn out_of_order_messages_wait_in_pending() {
        let mut comms = Communicator::create(2);
        let mut c1 = comms.pop().unwrap();
        let c0 = comms.pop().unwrap();
        c0.send(1, Tag::Border { swap: 1 }, Payload::Values(vec![Value::Usize(1)]))
            .unwrap();
        c0.send(1, Tag::Border { swap: 0 }, Payload::Values(vec![Value::Usize(0)]))
            .unwrap();
        match c1.recv(0, Tag::Border { swap: 0 }).unwrap() {
            Payload::Values(v) => assert_eq!(v, vec![Value::Usize(0)]),
            p => panic!("{:?}", p),
        }
        match c1.recv(0, Tag::Border { swap: 1 }).unwrap() {
            Payload::Values(v) => assert_eq!(v, vec![Value::Usize(1)]),
            p => panic!("{:?}", p),
        }
    }

    #[test]
    fn all_reduce_is_identical_everywhere() {
        let comms = Communicator::create(3);
        let results: Vec<Vec<Value>> = thread::scope(|s| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|mut c| {
                    s.spawn(move || {
                        let r = c.rank();
                        c.all_reduce_values(
                            vec![Value::Float(0.1 * (r + 1) as f64), Value::Usize(r), Value::Usize(r + 7)],
                            &[Operation::Sum, Operation::Max, Operation::First],
                        )
                        .unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert_eq!(results[0], results[1]);
        assert_eq!(results[1], results[2]);
        assert_eq!(results[0][1], Value::Usize(2));
        assert_eq!(results[0][2], Value::Usize(7));
    }

    #[test]
    fn abort_unblocks_receivers() {
        let mut comms = Communicator::create(2);
        let mut c1 = comms.pop().unwrap();
        let c0 = comms.pop().unwrap();
        c0.abort("boom");
        let err = c1.recv(0, Tag::Border { swap: 0 }).unwrap_err();
        assert!(matches!(err, Error::Aborted { rank: 0, .. }));
    }
}
