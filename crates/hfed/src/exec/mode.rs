// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hfed contributors

//! Execution modes and the mode-transition validity table.

use crate::encoding::{decode_u16, encode_u16, EncodeError, EncodeResult};
use std::fmt;

/// Federation-wide execution mode, published through the execution
/// configuration object and requested through mode-transition-request
/// interactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ExecutionMode {
    Uninitialized = 0,
    Initializing = 1,
    Running = 2,
    Freeze = 3,
    Restart = 4,
    Reconfigure = 5,
    Shutdown = 6,
}

impl ExecutionMode {
    /// Wire value (16-bit unsigned, little-endian in payloads).
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    pub fn from_u16(value: u16) -> Option<ExecutionMode> {
        match value {
            0 => Some(ExecutionMode::Uninitialized),
            1 => Some(ExecutionMode::Initializing),
            2 => Some(ExecutionMode::Running),
            3 => Some(ExecutionMode::Freeze),
            4 => Some(ExecutionMode::Restart),
            5 => Some(ExecutionMode::Reconfigure),
            6 => Some(ExecutionMode::Shutdown),
            _ => None,
        }
    }

    pub fn encode(self) -> Vec<u8> {
        encode_u16(self.as_u16())
    }

    pub fn decode(bytes: &[u8]) -> EncodeResult<ExecutionMode> {
        let raw = decode_u16(bytes)?;
        ExecutionMode::from_u16(raw).ok_or_else(|| EncodeError::InvalidData {
            reason: format!("unknown execution mode {raw}"),
        })
    }

    /// Whether the federation may move from `self` to `requested`.
    ///
    /// `allow_restart` widens the table with the Freeze -> Restart edge,
    /// which only timed-initialization deployments support.
    pub fn transition_valid(self, requested: ExecutionMode, allow_restart: bool) -> bool {
        use ExecutionMode::*;
        matches!(
            (self, requested),
            (Uninitialized, Initializing)
                | (Initializing, Running)
                | (Running, Freeze)
                | (Running, Shutdown)
                | (Freeze, Running)
                | (Freeze, Shutdown)
        ) || (allow_restart && self == Freeze && requested == Restart)
    }

    /// True for modes in which federates advance logical time.
    pub fn is_advancing(self) -> bool {
        self == ExecutionMode::Running
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionMode::Uninitialized => "UNINITIALIZED",
            ExecutionMode::Initializing => "INITIALIZING",
            ExecutionMode::Running => "RUNNING",
            ExecutionMode::Freeze => "FREEZE",
            ExecutionMode::Restart => "RESTART",
            ExecutionMode::Reconfigure => "RECONFIGURE",
            ExecutionMode::Shutdown => "SHUTDOWN",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_round_trip() {
        for mode in [
            ExecutionMode::Uninitialized,
            ExecutionMode::Initializing,
            ExecutionMode::Running,
            ExecutionMode::Freeze,
            ExecutionMode::Restart,
            ExecutionMode::Reconfigure,
            ExecutionMode::Shutdown,
        ] {
            let decoded = ExecutionMode::decode(&mode.encode()).unwrap();
            assert_eq!(decoded, mode);
        }
        assert!(ExecutionMode::decode(&encode_u16(99)).is_err());
    }

    #[test]
    fn test_transition_table() {
        use ExecutionMode::*;
        assert!(Uninitialized.transition_valid(Initializing, false));
        assert!(Initializing.transition_valid(Running, false));
        assert!(Running.transition_valid(Freeze, false));
        assert!(Freeze.transition_valid(Running, false));
        assert!(Running.transition_valid(Shutdown, false));
        assert!(Freeze.transition_valid(Shutdown, false));

        // Restart is only reachable from Freeze, and only when enabled.
        assert!(!Freeze.transition_valid(Restart, false));
        assert!(Freeze.transition_valid(Restart, true));
        assert!(!Running.transition_valid(Restart, true));

        // No resurrection and no skipping initialization.
        assert!(!Shutdown.transition_valid(Running, true));
        assert!(!Uninitialized.transition_valid(Running, false));
        assert!(!Running.transition_valid(Running, false));
    }
}
