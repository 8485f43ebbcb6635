// The frozen operation log and the invariants checked over it.

use crate::error::PlanError;
use crate::operation::{Channel, Operation};
use crate::well::WellRef;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Ordered operation sequence, append-only during compilation, frozen at
/// emit time. Plan order IS execution order; the engine never reorders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    ops: Vec<Operation>,
}

impl Plan {
    /// Concatenates the caller-ordered subsequences and validates the
    /// tip-lifetime invariant across the whole log.
    pub fn emit(subsequences: Vec<Vec<Operation>>) -> Result<Self, PlanError> {
        let ops: Vec<Operation> = subsequences.into_iter().flatten().collect();
        validate_tip_lifetimes(&ops)?;
        Ok(Self { ops })
    }

    pub fn operations(&self) -> &[Operation] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn tips_used(&self, channel: Channel) -> usize {
        self.ops
            .iter()
            .filter(|op| matches!(op, Operation::AcquireTip { channel: c } if *c == channel))
            .count()
    }
}

/// Per channel: every AcquireTip is matched by exactly one later ReleaseTip
/// before the next AcquireTip, and no tip is left held at the end. A
/// violation is a compiler bug, not an operator error.
pub fn validate_tip_lifetimes(ops: &[Operation]) -> Result<(), PlanError> {
    let mut held: HashMap<Channel, bool> = HashMap::new();
    for op in ops {
        match op {
            Operation::AcquireTip { channel } => {
                let slot = held.entry(*channel).or_insert(false);
                if *slot {
                    return Err(PlanError::InvalidTipLifetime {
                        channel: *channel,
                        detail: "tip acquired while a tip is already held".to_string(),
                    });
                }
                *slot = true;
            }
            Operation::ReleaseTip { channel } => {
                let slot = held.entry(*channel).or_insert(false);
                if !*slot {
                    return Err(PlanError::InvalidTipLifetime {
                        channel: *channel,
                        detail: "tip released with no tip held".to_string(),
                    });
                }
                *slot = false;
            }
            _ => {}
        }
    }
    for (channel, still_held) in held {
        if still_held {
            return Err(PlanError::InvalidTipLifetime {
                channel,
                detail: "tip left unreleased at end of plan".to_string(),
            });
        }
    }
    Ok(())
}

/// Running per-well dispensed-volume ledger. Fill-to-total steps read this
/// instead of hardcoding volumes a second time for the same well.
#[derive(Debug, Clone, Default)]
pub struct WellLedger {
    dispensed: HashMap<WellRef, f64>,
}

impl WellLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, ops: &[Operation]) {
        for op in ops {
            if let Operation::Dispense { volume_ul, to, .. } = op {
                *self.dispensed.entry(*to).or_insert(0.0) += volume_ul;
            }
        }
    }

    pub fn dispensed_into(&self, well: &WellRef) -> f64 {
        self.dispensed.get(well).copied().unwrap_or(0.0)
    }

    /// Volume still needed to reach `total_vol_ul`. May be negative when the
    /// well is already over target; callers surface that, never clamp it.
    pub fn fill_to(&self, well: &WellRef, total_vol_ul: f64) -> f64 {
        total_vol_ul - self.dispensed_into(well)
    }

    /// Touched wells in deterministic (plate, column, row) order.
    pub fn wells(&self) -> Vec<WellRef> {
        self.dispensed.keys().copied().sorted().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::well::{Plate, WellRef};

    fn aspirate(column: usize) -> Operation {
        Operation::Aspirate {
            volume_ul: 100.0,
            from: WellRef::column_top(Plate::Source, column),
            rate_ul_s: 50.0,
        }
    }

    fn dispense(column: usize, volume_ul: f64) -> Operation {
        Operation::Dispense {
            volume_ul,
            to: WellRef::column_top(Plate::Destination(1), column),
            rate_ul_s: 150.0,
        }
    }

    fn acquire(channel: Channel) -> Operation {
        Operation::AcquireTip { channel }
    }

    fn release(channel: Channel) -> Operation {
        Operation::ReleaseTip { channel }
    }

    #[test]
    fn test_emit_concatenates_in_caller_order() {
        let plan = Plan::emit(vec![
            vec![acquire(Channel::Multi), aspirate(0), release(Channel::Multi)],
            vec![acquire(Channel::Single), aspirate(1), release(Channel::Single)],
        ])
        .unwrap();
        assert_eq!(plan.len(), 6);
        assert_eq!(plan.operations()[1], aspirate(0));
        assert_eq!(plan.tips_used(Channel::Multi), 1);
        assert_eq!(plan.tips_used(Channel::Single), 1);
    }

    #[test]
    fn test_double_acquire_on_one_channel_rejected() {
        let err = Plan::emit(vec![vec![
            acquire(Channel::Multi),
            acquire(Channel::Multi),
            release(Channel::Multi),
            release(Channel::Multi),
        ]])
        .unwrap_err();
        assert!(matches!(
            err,
            PlanError::InvalidTipLifetime {
                channel: Channel::Multi,
                ..
            }
        ));
    }

    #[test]
    fn test_interleaved_channels_are_independent() {
        let plan = Plan::emit(vec![vec![
            acquire(Channel::Multi),
            acquire(Channel::Single),
            aspirate(0),
            release(Channel::Single),
            release(Channel::Multi),
        ]]);
        assert!(plan.is_ok());
    }

    #[test]
    fn test_release_without_acquire_rejected() {
        let err = Plan::emit(vec![vec![release(Channel::Single)]]).unwrap_err();
        assert!(matches!(err, PlanError::InvalidTipLifetime { .. }));
    }

    #[test]
    fn test_unreleased_tip_rejected() {
        let err = Plan::emit(vec![vec![acquire(Channel::Multi), aspirate(0)]]).unwrap_err();
        assert!(matches!(
            err,
            PlanError::InvalidTipLifetime {
                channel: Channel::Multi,
                ..
            }
        ));
    }

    #[test]
    fn test_ledger_accumulates_and_fills_to_total() {
        let well = WellRef::column_top(Plate::Destination(1), 3);
        let mut ledger = WellLedger::new();
        ledger.record(&[dispense(3, 30.0)]);
        ledger.record(&[dispense(3, 30.0), dispense(0, 30.0)]);

        assert_eq!(ledger.dispensed_into(&well), 60.0);
        assert_eq!(ledger.fill_to(&well, 100.0), 40.0);
        assert_eq!(
            ledger.fill_to(&WellRef::column_top(Plate::Destination(1), 0), 100.0),
            70.0
        );

        let wells = ledger.wells();
        assert_eq!(wells.len(), 2);
        assert!(wells[0] < wells[1]);
    }
}
