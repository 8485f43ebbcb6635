// Replicate count -> deck allocation. The mapping is table-driven and total
// over the valid domain; anything outside 1..=3 is rejected before a single
// operation is planned.

use crate::error::PlanError;
use crate::operation::Channel;
use serde::{Deserialize, Serialize};

pub const MAX_REPLICATES: u32 = 3;

/// Labware the execution engine should load into each slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabwareCatalog {
    pub tip_rack: String,
    pub reservoir: String,
    pub source_plate: String,
    pub destination_plate: String,
}

impl Default for LabwareCatalog {
    fn default() -> Self {
        Self {
            tip_rack: "opentrons_96_tiprack_300ul".to_string(),
            reservoir: "4ti0136_96_wellplate_2200ul".to_string(),
            source_plate: "4ti0136_96_wellplate_2200ul".to_string(),
            destination_plate: "costar3370flatbottomtransparent_96_wellplate_200ul"
                .to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeckLayout {
    pub replicates: u32,
    /// One destination plate slot per replicate.
    pub plate_slots: Vec<u8>,
    /// A destination plate consumes roughly 1.5 tip boxes, hence the
    /// 1/2/3 -> 2/3/5 scaling.
    pub tip_rack_slots: Vec<u8>,
    pub reservoir_slot: u8,
    pub source_slot: u8,
    pub labware: LabwareCatalog,
    /// Column-wide transfers (distributions, the inducer-A cascade).
    pub column_channel: Channel,
    /// Per-well cascades down a single column (the inducer-B chains).
    pub cascade_channel: Channel,
}

pub fn resolve(replicates: u32) -> Result<DeckLayout, PlanError> {
    let (plate_slots, tip_rack_slots) = match replicates {
        1 => (vec![8], vec![4, 7]),
        2 => (vec![8, 9], vec![2, 4, 7, 10]),
        3 => (vec![8, 9, 11], vec![1, 2, 4, 7, 10]),
        other => {
            return Err(PlanError::InvalidConfiguration(format!(
                "replicates must be 1, 2, or 3. Got: {other}"
            )));
        }
    };
    Ok(DeckLayout {
        replicates,
        plate_slots,
        tip_rack_slots,
        reservoir_slot: 5,
        source_slot: 6,
        labware: LabwareCatalog::default(),
        column_channel: Channel::Multi,
        cascade_channel: Channel::Single,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_out_of_range_replicates_fail_fast() {
        assert!(matches!(
            resolve(0),
            Err(PlanError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            resolve(4),
            Err(PlanError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_valid_replicates_give_distinct_non_empty_layouts() {
        let mut seen_plates: Vec<Vec<u8>> = Vec::new();
        for replicates in 1..=3 {
            let layout = resolve(replicates).unwrap();
            assert_eq!(layout.plate_slots.len(), replicates as usize);
            assert!(!layout.tip_rack_slots.is_empty());
            assert!(!seen_plates.contains(&layout.plate_slots));
            seen_plates.push(layout.plate_slots);
        }
    }

    #[test]
    fn test_tip_box_scaling_table() {
        assert_eq!(resolve(1).unwrap().tip_rack_slots.len(), 2);
        assert_eq!(resolve(2).unwrap().tip_rack_slots.len(), 4);
        assert!(resolve(3).unwrap().tip_rack_slots.len() >= 5);
    }

    #[test]
    fn test_slots_never_collide() {
        for replicates in 1..=3 {
            let layout = resolve(replicates).unwrap();
            let mut slots: HashSet<u8> = HashSet::new();
            slots.insert(layout.reservoir_slot);
            slots.insert(layout.source_slot);
            let mut count = 2;
            for slot in layout.plate_slots.iter().chain(&layout.tip_rack_slots) {
                slots.insert(*slot);
                count += 1;
            }
            assert_eq!(slots.len(), count, "replicates = {replicates}");
        }
    }

    #[test]
    fn test_channel_assignment() {
        let layout = resolve(2).unwrap();
        assert_eq!(layout.column_channel, Channel::Multi);
        assert_eq!(layout.cascade_channel, Channel::Single);
    }
}
