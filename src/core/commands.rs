//! Wire vocabulary shared with the server-side admin mod.
//!
//! Every message is a run of `[command byte][payload]` records. Payload lengths are
//! implied by the command; there is no per-record length prefix.

/// Commands sent by a game server to the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServerCommand {
    Hello = 0,
    Quit = 1,
    Connect = 2,
    Disconnect = 3,
    PlayerList = 4,
    PlayerUpdate = 5,
    Print = 6,
    Command = 7,
    Players = 8,
    Frag = 9,
    Map = 10,
    Ping = 11,
    KeyAck = 12,
}

impl TryFrom<u8> for ServerCommand {
    type Error = u8;

    fn try_from(b: u8) -> Result<Self, Self::Error> {
        Ok(match b {
            0 => Self::Hello,
            1 => Self::Quit,
            2 => Self::Connect,
            3 => Self::Disconnect,
            4 => Self::PlayerList,
            5 => Self::PlayerUpdate,
            6 => Self::Print,
            7 => Self::Command,
            8 => Self::Players,
            9 => Self::Frag,
            10 => Self::Map,
            11 => Self::Ping,
            12 => Self::KeyAck,
            other => return Err(other),
        })
    }
}

/// Commands sent by the daemon to a game server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AdminCommand {
    HelloAck = 0,
    Error = 1,
    Pong = 2,
    Command = 3,
    SayClient = 4,
    SayAll = 5,
    Key = 6,
}

impl TryFrom<u8> for AdminCommand {
    type Error = u8;

    fn try_from(b: u8) -> Result<Self, u8> {
        Ok(match b {
            0 => Self::HelloAck,
            1 => Self::Error,
            2 => Self::Pong,
            3 => Self::Command,
            4 => Self::SayClient,
            5 => Self::SayAll,
            6 => Self::Key,
            other => return Err(other),
        })
    }
}

/// Sub-commands carried by [`ServerCommand::Command`], issued by players.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PlayerCommand {
    Teleport = 0,
    Invite = 1,
}

impl TryFrom<u8> for PlayerCommand {
    type Error = u8;

    fn try_from(b: u8) -> Result<Self, u8> {
        match b {
            0 => Ok(Self::Teleport),
            1 => Ok(Self::Invite),
            other => Err(other),
        }
    }
}

/// Print levels, matching the game's `PRINT_*` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PrintLevel {
    Low = 0,
    Medium = 1,
    High = 2,
    Chat = 3,
}

impl PrintLevel {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Low),
            1 => Some(Self::Medium),
            2 => Some(Self::High),
            3 => Some(Self::Chat),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_command_bytes() {
        for b in 0u8..=12 {
            let cmd = ServerCommand::try_from(b).expect("known command");
            assert_eq!(cmd as u8, b);
        }
        assert_eq!(ServerCommand::try_from(13), Err(13));
        assert_eq!(ServerCommand::try_from(0xFF), Err(0xFF));
    }

    #[test]
    fn test_admin_command_bytes() {
        for b in 0u8..=6 {
            assert_eq!(AdminCommand::try_from(b).map(|c| c as u8), Ok(b));
        }
        assert!(AdminCommand::try_from(7).is_err());
    }

    #[test]
    fn test_print_levels() {
        assert_eq!(PrintLevel::from_byte(3), Some(PrintLevel::Chat));
        assert_eq!(PrintLevel::from_byte(4), None);
    }
}
