/// Failures of lobby membership and registry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LobbyError {
    #[error("no space left in lobby")]
    Full,

    #[error("all lobbies full")]
    AllLobbiesFull,

    #[error("{0} not found")]
    NotFound(&'static str),

    /// Slot bookkeeping disagrees with the client's back-reference
    #[error("client's lobby client id {slot} does not match client list")]
    StateMismatch { slot: usize },

    #[error("lobby already exists with id {0}")]
    DuplicateId(i64),

    #[error("lobby already exists with name {0:?}")]
    DuplicateName(String),

    #[error("lobby size {0} exceeds the slot limit")]
    TooManySlots(usize),
}

impl LobbyError {
    /// True for errors that indicate broken invariants rather than a rejected request
    pub fn is_defect(&self) -> bool {
        matches!(self, LobbyError::StateMismatch { .. } | LobbyError::DuplicateId(_))
    }
}

/// Outcome of vacating a slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// Other clients remain; `leader_id` is the (possibly new) leader slot
    Remaining { leader_id: usize },
    /// The lobby has no occupants left
    Empty,
}

impl Departure {
    pub fn is_empty(&self) -> bool {
        matches!(self, Departure::Empty)
    }
}

/// Outcome of a cross-lobby move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    /// Source and destination were the same lobby
    Unchanged,
    Moved { source: Departure },
}
