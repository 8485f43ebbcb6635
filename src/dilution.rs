// Dilution arithmetic: C1V1 = C2V2, so stock volume = (Ct * Vt) / C1.
// Pure functions; nothing here touches plan state.

use crate::error::PlanError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DilutionRow {
    #[serde(rename = "final_conc_uM")]
    pub final_conc_um: f64,
    #[serde(rename = "stock_vol_uL")]
    pub stock_vol_ul: f64,
    #[serde(rename = "diluent_vol_uL")]
    pub diluent_vol_ul: f64,
}

/// One row per target, input order preserved.
///
/// `stock_conc_um == 0` is a documented degenerate case: every row gets zero
/// stock volume. A target above the achievable range yields a negative
/// diluent volume; that is deliberately not rejected or clamped here, the
/// caller flags it (see [`unachievable_targets`]).
pub fn compute_dilutions(
    stock_conc_um: f64,
    total_vol_ul: f64,
    targets_um: &[f64],
) -> Vec<DilutionRow> {
    targets_um
        .iter()
        .map(|target| {
            let stock_vol_ul = if stock_conc_um > 0.0 {
                (target * total_vol_ul) / stock_conc_um
            } else {
                0.0
            };
            DilutionRow {
                final_conc_um: *target,
                stock_vol_ul,
                diluent_vol_ul: total_vol_ul - stock_vol_ul,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AchievabilityWarning {
    pub final_conc_um: f64,
    pub stock_vol_ul: f64,
    pub total_vol_ul: f64,
}

impl fmt::Display for AchievabilityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "target {} uM requires {:.2} uL of stock but the well only holds {:.2} uL",
            self.final_conc_um, self.stock_vol_ul, self.total_vol_ul
        )
    }
}

/// Rows whose stock volume exceeds the total well volume (negative diluent
/// volume). Reported, never clamped; the caller decides whether to proceed.
pub fn unachievable_targets(
    rows: &[DilutionRow],
    total_vol_ul: f64,
) -> Vec<AchievabilityWarning> {
    rows.iter()
        .filter(|row| row.stock_vol_ul > total_vol_ul)
        .map(|row| AchievabilityWarning {
            final_conc_um: row.final_conc_um,
            stock_vol_ul: row.stock_vol_ul,
            total_vol_ul,
        })
        .collect()
}

/// Writes the table the configuration editor previews, as CSV.
pub fn write_csv<W: Write>(rows: &[DilutionRow], writer: W) -> Result<(), PlanError> {
    let mut out = csv::Writer::from_writer(writer);
    for row in rows {
        out.serialize(row)?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    #[test]
    fn test_rows_preserve_order_and_sum_to_total() {
        let rows = compute_dilutions(10.0, 100.0, &[0.0, 5.0, 10.0, 50.0, 100.0]);
        assert_eq!(rows.len(), 5);
        for (row, target) in rows.iter().zip([0.0, 5.0, 10.0, 50.0, 100.0]) {
            assert_eq!(row.final_conc_um, target);
            assert!((row.stock_vol_ul + row.diluent_vol_ul - 100.0).abs() < TOLERANCE);
        }
        assert!((rows[1].stock_vol_ul - 50.0).abs() < TOLERANCE);
    }

    #[test]
    fn test_zero_stock_concentration_is_degenerate_not_error() {
        let rows = compute_dilutions(0.0, 100.0, &[0.0, 5.0, 10.0]);
        for row in rows {
            assert_eq!(row.stock_vol_ul, 0.0);
            assert_eq!(row.diluent_vol_ul, 100.0);
        }
    }

    #[test]
    fn test_dose_response_table() {
        // stock 15 uM, 100 uL wells, eight targets: the documented scenario.
        let targets = [0.0, 2.0, 4.0, 6.0, 8.0, 10.0, 12.0, 14.0];
        let rows = compute_dilutions(15.0, 100.0, &targets);
        assert_eq!(rows.len(), 8);
        let row = rows.iter().find(|r| r.final_conc_um == 10.0).unwrap();
        assert!((row.stock_vol_ul - 66.666_666_666_666_67).abs() < 1e-6);
        assert!((row.diluent_vol_ul - 33.333_333_333_333_33).abs() < 1e-6);
    }

    #[test]
    fn test_overrange_target_goes_negative_and_is_flagged() {
        let rows = compute_dilutions(10.0, 100.0, &[5.0, 20.0]);
        assert!(rows[1].diluent_vol_ul < 0.0);

        let warnings = unachievable_targets(&rows, 100.0);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].final_conc_um, 20.0);
        assert!(warnings[0].to_string().contains("200.00 uL of stock"));
    }

    #[test]
    fn test_csv_export_carries_editor_field_names() {
        let rows = compute_dilutions(10.0, 100.0, &[5.0]);
        let mut buffer = Vec::new();
        write_csv(&rows, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("final_conc_uM,stock_vol_uL,diluent_vol_uL"));
        assert!(text.contains("5.0,50.0,50.0"));
    }
}
