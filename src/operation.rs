// The atomic liquid-transfer vocabulary handed to the execution engine.

use crate::well::WellRef;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Channel {
    /// Moves an entire column at once.
    Multi,
    /// Moves one well at a time.
    Single,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Multi => write!(f, "multi-channel"),
            Channel::Single => write!(f, "single-channel"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MixSpec {
    pub repetitions: u32,
    pub volume_ul: f64,
}

impl MixSpec {
    pub fn new(repetitions: u32, volume_ul: f64) -> Self {
        Self {
            repetitions,
            volume_ul,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    Aspirate {
        volume_ul: f64,
        from: WellRef,
        rate_ul_s: f64,
    },
    Dispense {
        volume_ul: f64,
        to: WellRef,
        rate_ul_s: f64,
    },
    Mix {
        repetitions: u32,
        volume_ul: f64,
        at: WellRef,
    },
    BlowOut {
        at: WellRef,
    },
    AcquireTip {
        channel: Channel,
    },
    ReleaseTip {
        channel: Channel,
    },
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Aspirate {
                volume_ul,
                from,
                rate_ul_s,
            } => write!(
                f,
                "Aspirating {volume_ul:.1} uL from {from} at {rate_ul_s:.1} uL/sec"
            ),
            Operation::Dispense {
                volume_ul,
                to,
                rate_ul_s,
            } => write!(
                f,
                "Dispensing {volume_ul:.1} uL into {to} at {rate_ul_s:.1} uL/sec"
            ),
            Operation::Mix {
                repetitions,
                volume_ul,
                at,
            } => write!(
                f,
                "Mixing {repetitions} times with a volume of {volume_ul:.1} uL at {at}"
            ),
            Operation::BlowOut { at } => write!(f, "Blowing out at {at}"),
            Operation::AcquireTip { channel } => write!(f, "Picking up tip ({channel})"),
            Operation::ReleaseTip { channel } => write!(f, "Dropping tip ({channel})"),
        }
    }
}
