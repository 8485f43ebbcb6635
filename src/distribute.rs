// Reagent distribution onto destination wells. Every distribution owns its
// tip lifetimes: a tip that has touched one reagent never touches another.

use crate::error::PlanError;
use crate::operation::{Channel, MixSpec, Operation};
use crate::source_pool::SourcePool;
use crate::well::WellRef;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reagent {
    Diluent,
    InducerA,
    InducerB,
    Cells,
}

impl fmt::Display for Reagent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reagent::Diluent => write!(f, "diluent"),
            Reagent::InducerA => write!(f, "inducer A"),
            Reagent::InducerB => write!(f, "inducer B"),
            Reagent::Cells => write!(f, "cell suspension"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NewTipPolicy {
    /// One tip for the entire target list.
    Once,
    /// Fresh tip per target.
    Always,
    /// Fresh tip per group of `group_size` consecutive targets.
    PerGroup,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributeSpec {
    pub reagent: Reagent,
    pub source: WellRef,
    pub targets: Vec<WellRef>,
    pub volume_ul: f64,
    pub new_tip: NewTipPolicy,
    /// Required when `new_tip` is `PerGroup`.
    pub group_size: Option<usize>,
    pub mix: Option<MixSpec>,
    pub channel: Channel,
    pub aspirate_rate_ul_s: f64,
    pub dispense_rate_ul_s: f64,
}

/// Per-target aspirate/dispense(/mix)/blow-out triads, with tip pairs
/// interleaved according to the tip policy.
pub fn plan_distribution(spec: &DistributeSpec) -> Result<Vec<Operation>, PlanError> {
    if spec.targets.is_empty() {
        return Err(PlanError::InvalidConfiguration(format!(
            "distribution of {} needs at least one target well",
            spec.reagent
        )));
    }
    if spec.volume_ul <= 0.0 {
        return Err(PlanError::InvalidConfiguration(format!(
            "distribution volume for {} must be positive, got {} uL",
            spec.reagent, spec.volume_ul
        )));
    }

    let group_size = match spec.new_tip {
        NewTipPolicy::Once => spec.targets.len(),
        NewTipPolicy::Always => 1,
        NewTipPolicy::PerGroup => match spec.group_size {
            Some(size) if size > 0 => size,
            _ => {
                return Err(PlanError::InvalidConfiguration(format!(
                    "per-group tip policy for {} needs a positive group size",
                    spec.reagent
                )));
            }
        },
    };

    let mut ops = Vec::new();
    for group in spec.targets.chunks(group_size) {
        ops.push(Operation::AcquireTip {
            channel: spec.channel,
        });
        for target in group {
            ops.push(Operation::Aspirate {
                volume_ul: spec.volume_ul,
                from: spec.source,
                rate_ul_s: spec.aspirate_rate_ul_s,
            });
            ops.push(Operation::Dispense {
                volume_ul: spec.volume_ul,
                to: *target,
                rate_ul_s: spec.dispense_rate_ul_s,
            });
            if let Some(mix) = spec.mix {
                ops.push(Operation::Mix {
                    repetitions: mix.repetitions,
                    volume_ul: mix.volume_ul,
                    at: *target,
                });
            }
            ops.push(Operation::BlowOut { at: *target });
        }
        ops.push(Operation::ReleaseTip {
            channel: spec.channel,
        });
    }
    Ok(ops)
}

/// Distribution variant drawing from a rotation pool instead of a fixed
/// well: each target's dose is taken from whichever pool well is active at
/// that point. One tip serves the whole pass; the pool handles rotation.
pub fn plan_pool_distribution(
    pool: &mut SourcePool,
    targets: &[WellRef],
    volume_ul: f64,
    channel: Channel,
    aspirate_rate_ul_s: f64,
    dispense_rate_ul_s: f64,
) -> Result<Vec<Operation>, PlanError> {
    if targets.is_empty() {
        return Err(PlanError::InvalidConfiguration(
            "pool distribution needs at least one target well".to_string(),
        ));
    }
    let mut ops = vec![Operation::AcquireTip { channel }];
    for target in targets {
        let source = pool.take(volume_ul)?;
        ops.push(Operation::Aspirate {
            volume_ul,
            from: source,
            rate_ul_s: aspirate_rate_ul_s,
        });
        ops.push(Operation::Dispense {
            volume_ul,
            to: *target,
            rate_ul_s: dispense_rate_ul_s,
        });
        ops.push(Operation::BlowOut { at: *target });
    }
    ops.push(Operation::ReleaseTip { channel });
    Ok(ops)
}

/// Pairwise transfer (distinct source per target), e.g. carrying a prepared
/// gradient from source columns onto destination columns.
pub fn plan_paired_transfer(
    pairs: &[(WellRef, WellRef)],
    volume_ul: f64,
    new_tip: NewTipPolicy,
    mix: Option<MixSpec>,
    channel: Channel,
    aspirate_rate_ul_s: f64,
    dispense_rate_ul_s: f64,
) -> Result<Vec<Operation>, PlanError> {
    if pairs.is_empty() {
        return Err(PlanError::InvalidConfiguration(
            "paired transfer needs at least one source/target pair".to_string(),
        ));
    }
    let group_size = match new_tip {
        NewTipPolicy::Once => pairs.len(),
        NewTipPolicy::Always => 1,
        NewTipPolicy::PerGroup => {
            return Err(PlanError::InvalidConfiguration(
                "paired transfer supports Once or Always tip policies".to_string(),
            ));
        }
    };

    let mut ops = Vec::new();
    for group in pairs.chunks(group_size) {
        ops.push(Operation::AcquireTip { channel });
        for (source, target) in group {
            ops.push(Operation::Aspirate {
                volume_ul,
                from: *source,
                rate_ul_s: aspirate_rate_ul_s,
            });
            ops.push(Operation::Dispense {
                volume_ul,
                to: *target,
                rate_ul_s: dispense_rate_ul_s,
            });
            if let Some(mix) = mix {
                ops.push(Operation::Mix {
                    repetitions: mix.repetitions,
                    volume_ul: mix.volume_ul,
                    at: *target,
                });
            }
            ops.push(Operation::BlowOut { at: *target });
        }
        ops.push(Operation::ReleaseTip { channel });
    }
    Ok(ops)
}
