// Serial dilution cascades: seed the head well from a stock source, then
// carry the working volume down the chain, diluting two-fold (or whatever the
// aspirate/dispense ratio dictates) at every step.

use crate::error::PlanError;
use crate::operation::{Channel, MixSpec, Operation};
use crate::well::WellRef;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainSpec {
    /// Stock well seeding the chain head.
    pub source: WellRef,
    /// Chain order is explicit configuration: the head (first entry) is the
    /// highest concentration. Reversing direction changes the biology, so it
    /// is never inferred.
    pub wells: Vec<WellRef>,
    pub aspirate_vol_ul: f64,
    pub dispense_vol_ul: f64,
    pub mix: Option<MixSpec>,
    pub channel: Channel,
    pub aspirate_rate_ul_s: f64,
    pub dispense_rate_ul_s: f64,
}

/// Plans one cascade under a single tip pair: initial transfer into the head
/// well, one transfer per adjacent pair, then a discard aspirate so the tail
/// well does not retain an extra dose. For `n` wells that is `n + 1`
/// aspirates and `n` dispenses.
pub fn plan_chain(spec: &ChainSpec) -> Result<Vec<Operation>, PlanError> {
    if spec.wells.is_empty() {
        return Err(PlanError::InvalidConfiguration(
            "serial dilution chain needs at least one well".to_string(),
        ));
    }
    if spec.aspirate_vol_ul <= 0.0 || spec.dispense_vol_ul <= 0.0 {
        return Err(PlanError::InvalidConfiguration(format!(
            "chain transfer volumes must be positive, got aspirate {} uL / dispense {} uL",
            spec.aspirate_vol_ul, spec.dispense_vol_ul
        )));
    }

    let mut ops = vec![Operation::AcquireTip {
        channel: spec.channel,
    }];
    transfer(&mut ops, spec, spec.source, spec.wells[0]);
    for pair in spec.wells.windows(2) {
        transfer(&mut ops, spec, pair[0], pair[1]);
    }
    // Drain the trailing dose from the tail well.
    ops.push(Operation::Aspirate {
        volume_ul: spec.aspirate_vol_ul,
        from: *spec.wells.last().expect("chain wells checked non-empty"),
        rate_ul_s: spec.aspirate_rate_ul_s,
    });
    ops.push(Operation::ReleaseTip {
        channel: spec.channel,
    });
    Ok(ops)
}

fn transfer(ops: &mut Vec<Operation>, spec: &ChainSpec, from: WellRef, to: WellRef) {
    ops.push(Operation::Aspirate {
        volume_ul: spec.aspirate_vol_ul,
        from,
        rate_ul_s: spec.aspirate_rate_ul_s,
    });
    ops.push(Operation::Dispense {
        volume_ul: spec.dispense_vol_ul,
        to,
        rate_ul_s: spec.dispense_rate_ul_s,
    });
    if let Some(mix) = spec.mix {
        ops.push(Operation::Mix {
            repetitions: mix.repetitions,
            volume_ul: mix.volume_ul,
            at: to,
        });
    }
    ops.push(Operation::BlowOut { at: to });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::validate_tip_lifetimes;
    use crate::well::Plate;

    fn spec(n: usize) -> ChainSpec {
        ChainSpec {
            source: WellRef::column_top(Plate::Reservoir, 1),
            // Head-to-tail: highest concentration at the highest column.
            wells: (0..n)
                .rev()
                .map(|c| WellRef::column_top(Plate::Source, c))
                .collect(),
            aspirate_vol_ul: 300.0,
            dispense_vol_ul: 300.0,
            mix: Some(MixSpec::new(3, 300.0)),
            channel: Channel::Multi,
            aspirate_rate_ul_s: 50.0,
            dispense_rate_ul_s: 150.0,
        }
    }

    fn aspirates(ops: &[Operation]) -> Vec<WellRef> {
        ops.iter()
            .filter_map(|op| match op {
                Operation::Aspirate { from, .. } => Some(*from),
                _ => None,
            })
            .collect()
    }

    fn dispenses(ops: &[Operation]) -> Vec<WellRef> {
        ops.iter()
            .filter_map(|op| match op {
                Operation::Dispense { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_chain_emits_n_plus_one_aspirates_and_n_dispenses() {
        for n in [1, 2, 8] {
            let ops = plan_chain(&spec(n)).unwrap();
            assert_eq!(aspirates(&ops).len(), n + 1, "n = {n}");
            assert_eq!(dispenses(&ops).len(), n, "n = {n}");
        }
    }

    #[test]
    fn test_chain_descends_from_head_to_tail() {
        let ops = plan_chain(&spec(8)).unwrap();
        let targets = dispenses(&ops);
        // Initial transfer seeds column 8, then the cascade walks down to
        // column 1 in strictly descending order.
        assert_eq!(targets[0].column, 7);
        for pair in targets.windows(2) {
            assert_eq!(pair[1].column + 1, pair[0].column);
        }
        assert_eq!(targets.last().unwrap().column, 0);

        // The discard aspirate drains the tail well.
        assert_eq!(aspirates(&ops).last().unwrap().column, 0);
    }

    #[test]
    fn test_chain_uses_one_tip_pair() {
        let ops = plan_chain(&spec(8)).unwrap();
        assert!(matches!(ops[0], Operation::AcquireTip { .. }));
        assert!(matches!(ops.last(), Some(Operation::ReleaseTip { .. })));
        validate_tip_lifetimes(&ops).unwrap();
    }

    #[test]
    fn test_chain_mix_follows_every_dispense() {
        let ops = plan_chain(&spec(4)).unwrap();
        let mixes = ops
            .iter()
            .filter(|op| matches!(op, Operation::Mix { .. }))
            .count();
        assert_eq!(mixes, 4);

        let no_mix = ChainSpec {
            mix: None,
            ..spec(4)
        };
        let ops = plan_chain(&no_mix).unwrap();
        assert!(!ops.iter().any(|op| matches!(op, Operation::Mix { .. })));
    }

    #[test]
    fn test_empty_chain_rejected() {
        let bad = ChainSpec {
            wells: vec![],
            ..spec(1)
        };
        assert!(plan_chain(&bad).is_err());
    }
}
