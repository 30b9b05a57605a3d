/// Where a client asked to go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LobbyTarget {
    Id(i64),
    Name(String),
}

/// Command parsed from a client control packet
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    // Session
    Hello {
        name: String,
        serial_number: Option<u64>,
    },
    Leave,

    // Membership
    ChangeLobby {
        target: LobbyTarget,
    },
    CreateGame {
        name: String,
        password: String,
        episode: u8,
        difficulty: u8,
    },

    // Status
    SetLoading {
        loading: bool,
    },
}

impl ClientCommand {
    /// Commands that need an existing session
    pub fn requires_session(&self) -> bool {
        !matches!(self, ClientCommand::Hello { .. })
    }
}
