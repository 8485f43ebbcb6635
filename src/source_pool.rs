// Rotation pool over interchangeable source wells. The only mutable state in
// the compiler: capacity decreases monotonically within a run and is never
// replenished.

use crate::error::PlanError;
use crate::well::WellRef;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceWell {
    pub well: WellRef,
    pub capacity_ul: f64,
    pub remaining_ul: f64,
}

impl SourceWell {
    pub fn new(well: WellRef, capacity_ul: f64) -> Self {
        Self {
            well,
            capacity_ul,
            remaining_ul: capacity_ul,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourcePool {
    name: String,
    wells: Vec<SourceWell>,
    active: usize,
    drawn_from_active_ul: f64,
    high_water_ul: Option<f64>,
}

impl SourcePool {
    /// `high_water_ul`, when set, caps the cumulative draw against one well
    /// before the pool rotates, even if physical capacity remains. This is
    /// the explicit form of the old hard-coded 1200 uL threshold.
    pub fn new(
        name: &str,
        wells: Vec<SourceWell>,
        high_water_ul: Option<f64>,
    ) -> Result<Self, PlanError> {
        if wells.is_empty() {
            return Err(PlanError::InvalidConfiguration(format!(
                "source pool '{name}' needs at least one well"
            )));
        }
        if let Some(bad) = wells.iter().find(|w| w.capacity_ul <= 0.0) {
            return Err(PlanError::InvalidConfiguration(format!(
                "source pool '{name}' well {} has non-positive capacity {} uL",
                bad.well, bad.capacity_ul
            )));
        }
        if let Some(limit) = high_water_ul {
            if limit <= 0.0 {
                return Err(PlanError::InvalidConfiguration(format!(
                    "source pool '{name}' high-water mark must be positive, got {limit} uL"
                )));
            }
        }
        Ok(Self {
            name: name.to_string(),
            wells,
            active: 0,
            drawn_from_active_ul: 0.0,
            high_water_ul,
        })
    }

    /// Returns the well to draw from and records the deduction. When the
    /// cumulative draw would cross the active well's limit, the pool rotates
    /// once to the next well first; a dry pool is a fatal planning error,
    /// never a silent wrap-around.
    pub fn take(&mut self, volume_ul: f64) -> Result<WellRef, PlanError> {
        if volume_ul <= 0.0 {
            return Err(PlanError::InvalidConfiguration(format!(
                "draw from source pool '{}' must be positive, got {volume_ul} uL",
                self.name
            )));
        }
        if self.drawn_from_active_ul + volume_ul > self.active_limit() {
            if self.active + 1 >= self.wells.len() {
                return Err(PlanError::ResourceExhausted {
                    pool: self.name.clone(),
                    requested_ul: volume_ul,
                });
            }
            self.active += 1;
            self.drawn_from_active_ul = 0.0;
        }
        let well = &mut self.wells[self.active];
        well.remaining_ul -= volume_ul;
        self.drawn_from_active_ul += volume_ul;
        Ok(well.well)
    }

    fn active_limit(&self) -> f64 {
        let capacity = self.wells[self.active].capacity_ul;
        match self.high_water_ul {
            Some(limit) => limit.min(capacity),
            None => capacity,
        }
    }

    pub fn active_well(&self) -> WellRef {
        self.wells[self.active].well
    }

    pub fn total_drawn_ul(&self) -> f64 {
        self.wells
            .iter()
            .map(|w| w.capacity_ul - w.remaining_ul)
            .sum()
    }

    pub fn total_capacity_ul(&self) -> f64 {
        self.wells.iter().map(|w| w.capacity_ul).sum()
    }

    pub fn wells(&self) -> &[SourceWell] {
        &self.wells
    }
}
