// Plate and well addressing. Plates are opaque grids of ordered columns of
// ordered wells; binding wells to physical deck coordinates is the execution
// engine's job, never ours.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const PLATE_ROWS: usize = 8;
pub const PLATE_COLUMNS: usize = 12;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Plate {
    Reservoir,
    Source,
    /// 1-based destination plate number, one per replicate.
    Destination(u8),
}

impl fmt::Display for Plate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plate::Reservoir => write!(f, "reservoir"),
            Plate::Source => write!(f, "source"),
            Plate::Destination(n) => write!(f, "destination {n}"),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct WellRef {
    pub plate: Plate,
    pub column: usize,
    pub row: usize,
}

impl WellRef {
    pub fn new(plate: Plate, column: usize, row: usize) -> Self {
        Self { plate, column, row }
    }

    /// The row-A well of a column. A multi-channel pipette addressing this
    /// well services the whole column.
    pub fn column_top(plate: Plate, column: usize) -> Self {
        Self::new(plate, column, 0)
    }

    /// Conventional well name, e.g. row 0 / column 7 -> "A8".
    pub fn name(&self) -> String {
        let row_letter = (b'A' + self.row as u8) as char;
        format!("{}{}", row_letter, self.column + 1)
    }
}

impl fmt::Display for WellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.plate, self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_well_name_matches_convention() {
        let well = WellRef::new(Plate::Source, 7, 0);
        assert_eq!(well.name(), "A8");
        let well = WellRef::new(Plate::Source, 11, 7);
        assert_eq!(well.name(), "H12");
    }

    #[test]
    fn test_column_top_is_row_a() {
        let well = WellRef::column_top(Plate::Destination(2), 3);
        assert_eq!(well.row, 0);
        assert_eq!(well.to_string(), "destination 2 A4");
    }

    #[test]
    fn test_well_ordering_is_plate_column_row() {
        let mut wells = vec![
            WellRef::new(Plate::Destination(1), 0, 0),
            WellRef::new(Plate::Source, 4, 1),
            WellRef::new(Plate::Source, 4, 0),
            WellRef::new(Plate::Reservoir, 0, 0),
        ];
        wells.sort();
        assert_eq!(wells[0].plate, Plate::Reservoir);
        assert_eq!(wells[1], WellRef::new(Plate::Source, 4, 0));
        assert_eq!(wells[3].plate, Plate::Destination(1));
    }
}
