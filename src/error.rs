use thiserror::Error as ThisError;

/// Error types
#[derive(ThisError, Debug)]
pub enum Error {
    /// An owned atom left the global box along a non-periodic axis, has a
    /// non-finite position, or vanished during migration.
    #[error("Lost atom {tag} at {position:?}: {reason}")]
    LostAtom {
        tag: u64,
        position: [f64; 3],
        reason: String,
    },

    /// The global number of atoms changed during migration
    #[error("Lost atoms: expected {expected} in total, found {found}")]
    LostAtoms { expected: usize, found: usize },

    #[error(
        "Neighbor list overflow: estimated {estimate:.1} neighbors per atom exceeds limit {limit} \
         (cutoff {cutoff}, density {density:.4})"
    )]
    NeighborOverflow {
        cutoff: f64,
        density: f64,
        estimate: f64,
        limit: usize,
    },

    /// Sub-domain tiling or processor grid is inconsistent with the box
    #[error("Decomposition error: {0}")]
    Decomposition(String),

    /// Two ranks disagree about the shape of a communication round
    #[error("Communication protocol error: {0}")]
    Protocol(String),

    /// Another rank hit a fatal error and requested a collective abort
    #[error("Aborted by rank {rank}: {message}")]
    Aborted { rank: usize, message: String },

    #[error("Rank {0} disconnected")]
    Disconnected(usize),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Duplicate atom tag {0}")]
    DuplicateTag(u64),

    #[error("Invalid atom type {atom_type}, expected 1..={num_types}")]
    InvalidType { atom_type: usize, num_types: usize },

    #[error("Plugin '{id}' failed: {message}")]
    Plugin { id: String, message: String },

    #[error("Rank {rank} panicked: {message}")]
    Panicked { rank: usize, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Config(message.into())
    }
    pub fn decomposition(message: impl Into<String>) -> Self {
        Error::Decomposition(message.into())
    }
    pub fn protocol(message: impl Into<String>) -> Self {
        Error::Protocol(message.into())
    }
    pub fn plugin(id: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Plugin {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Whether this error was received from another rank rather than raised locally
    pub fn is_abort(&self) -> bool {
        matches!(self, Error::Aborted { .. })
    }
}
