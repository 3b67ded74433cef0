//! Shared status-code taxonomy.
//!
//! Every canonical-machine operation returns a [`Status`]. The numeric
//! code and the short token travel to the reporter; the classification
//! predicates drive retry and alarm behavior in the dispatcher.

use serde::{Deserialize, Serialize};

/// Small-integer status code returned by every `cm_*` operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Status {
    /// Success.
    Ok = 0,
    /// Operation still in progress — re-drive on the next dispatcher pass.
    Eagain = 1,
    /// Planner queue full — retry the same block later.
    BufferFull = 2,
    /// Command not legal in the current machine state.
    CommandRejected = 3,
    /// Machine is alarmed; motion commands are refused until cleared.
    MachineAlarmed = 4,
    /// More than one word from a modal group in one block.
    ModalGroupViolation = 10,
    /// G1/G2/G3 with no feed rate set and not in inverse-time mode.
    FeedRateNotSet = 11,
    /// Arc under- or over-specified (radius and center both given, or neither).
    ArcSpecificationError = 12,
    /// Motion requires homed axes and one isn't.
    AxisNotHomed = 13,
    /// P word does not name a coordinate system.
    InvalidCoordinateSystem = 14,
    /// Target beyond the configured maximum travel.
    TravelExceeded = 20,
    /// Input value outside its legal range.
    ValueOutOfRange = 21,
    /// Magic-marker mismatch on the controller or the extended model.
    MemoryFault = 30,
    /// Homing switch never hit within the search travel.
    HomingCycleFailed = 40,
    /// Probe did not trigger within the programmed travel.
    ProbeCycleFailed = 41,
}

impl Status {
    /// Convert from raw `u8`. Returns `None` for invalid values.
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Ok),
            1 => Some(Self::Eagain),
            2 => Some(Self::BufferFull),
            3 => Some(Self::CommandRejected),
            4 => Some(Self::MachineAlarmed),
            10 => Some(Self::ModalGroupViolation),
            11 => Some(Self::FeedRateNotSet),
            12 => Some(Self::ArcSpecificationError),
            13 => Some(Self::AxisNotHomed),
            14 => Some(Self::InvalidCoordinateSystem),
            20 => Some(Self::TravelExceeded),
            21 => Some(Self::ValueOutOfRange),
            30 => Some(Self::MemoryFault),
            40 => Some(Self::HomingCycleFailed),
            41 => Some(Self::ProbeCycleFailed),
            _ => None,
        }
    }

    /// Short token the reporter maps to text.
    pub const fn token(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Eagain => "eagain",
            Self::BufferFull => "full",
            Self::CommandRejected => "reject",
            Self::MachineAlarmed => "alarmed",
            Self::ModalGroupViolation => "modal",
            Self::FeedRateNotSet => "nofeed",
            Self::ArcSpecificationError => "arcerr",
            Self::AxisNotHomed => "unhomed",
            Self::InvalidCoordinateSystem => "badcoor",
            Self::TravelExceeded => "travel",
            Self::ValueOutOfRange => "range",
            Self::MemoryFault => "memfault",
            Self::HomingCycleFailed => "homefail",
            Self::ProbeCycleFailed => "probefail",
        }
    }

    /// Success check.
    #[inline]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Transient conditions — the caller retries the same block.
    #[inline]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Eagain | Self::BufferFull)
    }

    /// Conditions that raise the machine alarm.
    #[inline]
    pub const fn raises_alarm(&self) -> bool {
        matches!(
            self,
            Self::MemoryFault | Self::HomingCycleFailed | Self::ProbeCycleFailed
        )
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Ok => "ok",
            Self::Eagain => "operation in progress",
            Self::BufferFull => "planner queue full",
            Self::CommandRejected => "command rejected in current state",
            Self::MachineAlarmed => "machine alarmed",
            Self::ModalGroupViolation => "modal group violation",
            Self::FeedRateNotSet => "feed rate not set",
            Self::ArcSpecificationError => "arc specification error",
            Self::AxisNotHomed => "axis not homed",
            Self::InvalidCoordinateSystem => "invalid coordinate system",
            Self::TravelExceeded => "target exceeds maximum travel",
            Self::ValueOutOfRange => "value out of range",
            Self::MemoryFault => "memory integrity fault",
            Self::HomingCycleFailed => "homing cycle failed",
            Self::ProbeCycleFailed => "probe cycle failed",
        };
        write!(f, "{} ({})", text, *self as u8)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Status; 15] = [
        Status::Ok,
        Status::Eagain,
        Status::BufferFull,
        Status::CommandRejected,
        Status::MachineAlarmed,
        Status::ModalGroupViolation,
        Status::FeedRateNotSet,
        Status::ArcSpecificationError,
        Status::AxisNotHomed,
        Status::InvalidCoordinateSystem,
        Status::TravelExceeded,
        Status::ValueOutOfRange,
        Status::MemoryFault,
        Status::HomingCycleFailed,
        Status::ProbeCycleFailed,
    ];

    #[test]
    fn roundtrip_all_codes() {
        for status in ALL {
            assert_eq!(Status::from_u8(status as u8), Some(status));
        }
        assert!(Status::from_u8(99).is_none());
    }

    #[test]
    fn tokens_are_unique() {
        for a in ALL {
            for b in ALL {
                if a != b {
                    assert_ne!(a.token(), b.token(), "{a:?} vs {b:?}");
                }
            }
        }
    }

    #[test]
    fn classification() {
        assert!(Status::Ok.is_ok());
        assert!(Status::Eagain.is_transient());
        assert!(Status::BufferFull.is_transient());
        assert!(!Status::ModalGroupViolation.is_transient());
        assert!(Status::MemoryFault.raises_alarm());
        assert!(Status::HomingCycleFailed.raises_alarm());
        assert!(!Status::FeedRateNotSet.raises_alarm());
    }

    #[test]
    fn display_carries_code() {
        assert!(Status::FeedRateNotSet.to_string().contains("11"));
        assert!(Status::Ok.to_string().contains("(0)"));
    }
}
