use crate::{
    atoms::{AtomBuffer, ForwardBuffer, GhostBuffer, ReverseBuffer},
    output::Value,
    utils::Direction,
};

/// Identifies a point-to-point message within one communication round.
/// A receive matches on (source, tag).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Atoms leaving across `direction` during migration pass `pass`
    Migrate { direction: Direction, pass: usize },
    /// Ghost atoms of swap `swap`
    Border { swap: usize },
    Forward { swap: usize },
    Reverse { swap: usize },
    /// Contribution to the `seq`-th collective operation
    Collective { seq: u64 },
    /// Out-of-band notices (abort, finished)
    Control,
}

#[derive(Debug)]
pub enum Payload {
    Atoms(AtomBuffer),
    Ghosts(GhostBuffer),
    Forward(ForwardBuffer),
    Reverse(ReverseBuffer),
    Values(Vec<Value>),
    /// The sender hit a fatal error
    Abort(String),
    /// The sender's rank function returned
    Done,
}
impl Payload {
    pub fn kind(&self) -> &'static str {
        match self {
            Payload::Atoms(_) => "atoms",
            Payload::Ghosts(_) => "ghosts",
            Payload::Forward(_) => "forward",
            Payload::Reverse(_) => "reverse",
            Payload::Values(_) => "values",
            Payload::Abort(_) => "abort",
            Payload::Done => "done",
        }
    }
}

/// Message between ranks
#[derive(Debug)]
pub struct Message {
    pub source: usize,
    pub tag: Tag,
    pub payload: Payload,
}
