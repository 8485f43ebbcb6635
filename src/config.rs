// The experiment record produced by the external configuration editor.
// Field names mirror the JSON document it writes (dilution_config.json), so
// configs round-trip byte-compatibly through serde.

use crate::allocation::MAX_REPLICATES;
use crate::error::PlanError;
use serde::{Deserialize, Serialize};

/// Uniform slow-down applied to aspirate/dispense rates for viscous liquids.
pub const RATE_DEFAULT: f64 = 1.0;
pub const RATE_SLOW: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub stock_name: String,
    #[serde(rename = "stock_conc_uM")]
    pub stock_conc_um: f64,
    pub diluent_name: String,
    #[serde(rename = "total_vol_uL")]
    pub total_vol_ul: f64,
    pub replicates: u32,
    pub viscous_check: bool,
    /// Flow rates in uL/sec, applied per operation kind.
    pub asp_rate: f64,
    pub disp_rate: f64,
    pub blowout_rate: f64,
    #[serde(rename = "final_conc_uM")]
    pub targets_um: Vec<f64>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            stock_name: "Stock Solution".to_string(),
            stock_conc_um: 10.0,
            diluent_name: "Buffer".to_string(),
            total_vol_ul: 100.0,
            replicates: 1,
            viscous_check: false,
            asp_rate: 50.0,
            disp_rate: 150.0,
            blowout_rate: 150.0,
            targets_um: vec![0.0, 5.0, 10.0, 50.0, 100.0],
        }
    }
}

impl ExperimentConfig {
    /// Fail-fast validation, run before any operation is planned.
    pub fn validate(&self) -> Result<(), PlanError> {
        if self.replicates < 1 || self.replicates > MAX_REPLICATES {
            return Err(PlanError::InvalidConfiguration(format!(
                "replicates must be 1, 2, or 3. Got: {}",
                self.replicates
            )));
        }
        if self.total_vol_ul <= 0.0 {
            return Err(PlanError::InvalidConfiguration(format!(
                "total well volume must be positive, got {} uL",
                self.total_vol_ul
            )));
        }
        if self.stock_conc_um < 0.0 {
            return Err(PlanError::InvalidConfiguration(format!(
                "stock concentration must not be negative, got {} uM",
                self.stock_conc_um
            )));
        }
        if self.targets_um.is_empty() {
            return Err(PlanError::InvalidConfiguration(
                "at least one target concentration is required".to_string(),
            ));
        }
        if let Some(bad) = self.targets_um.iter().find(|t| **t < 0.0) {
            return Err(PlanError::InvalidConfiguration(format!(
                "target concentrations must not be negative, got {bad} uM"
            )));
        }
        for (name, rate) in [
            ("aspirate", self.asp_rate),
            ("dispense", self.disp_rate),
            ("blow-out", self.blowout_rate),
        ] {
            if rate <= 0.0 {
                return Err(PlanError::InvalidConfiguration(format!(
                    "{name} flow rate must be positive, got {rate} uL/sec"
                )));
            }
        }
        Ok(())
    }

    /// Rate multiplier for the viscosity flag. A pure parameter: it scales
    /// aspirate/dispense rates uniformly, never the plan topology.
    pub fn rate_multiplier(&self) -> f64 {
        if self.viscous_check {
            RATE_SLOW
        } else {
            RATE_DEFAULT
        }
    }

    pub fn load_from_path(path: &str) -> Result<Self, PlanError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| PlanError::Io(format!("Could not read config file '{path}': {e}")))?;
        serde_json::from_str(&text).map_err(|e| {
            PlanError::InvalidConfiguration(format!("Could not parse config JSON '{path}': {e}"))
        })
    }

    pub fn save_to_path(&self, path: &str) -> Result<(), PlanError> {
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| PlanError::Io(format!("Could not serialize config: {e}")))?;
        std::fs::write(path, text)
            .map_err(|e| PlanError::Io(format!("Could not write config file '{path}': {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(ExperimentConfig::default().validate().is_ok());
    }

    #[test]
    fn test_replicates_out_of_range_rejected() {
        let mut config = ExperimentConfig::default();
        config.replicates = 0;
        assert!(matches!(
            config.validate(),
            Err(PlanError::InvalidConfiguration(_))
        ));
        config.replicates = 4;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("replicates must be 1, 2, or 3"));
    }

    #[test]
    fn test_negative_target_rejected() {
        let mut config = ExperimentConfig::default();
        config.targets_um = vec![0.0, -5.0];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_positive_volume_and_rates_rejected() {
        let mut config = ExperimentConfig::default();
        config.total_vol_ul = 0.0;
        assert!(config.validate().is_err());

        let mut config = ExperimentConfig::default();
        config.disp_rate = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_viscous_flag_halves_rates() {
        let mut config = ExperimentConfig::default();
        assert_eq!(config.rate_multiplier(), RATE_DEFAULT);
        config.viscous_check = true;
        assert_eq!(config.rate_multiplier(), RATE_SLOW);
    }

    #[test]
    fn test_config_parses_external_document_field_names() {
        let text = r#"{
            "stock_name": "IPTG",
            "stock_conc_uM": 15.0,
            "diluent_name": "PBS",
            "total_vol_uL": 100.0,
            "replicates": 2,
            "viscous_check": true,
            "asp_rate": 50.0,
            "disp_rate": 150.0,
            "blowout_rate": 150.0,
            "final_conc_uM": [0, 2, 4, 6, 8, 10, 12, 14]
        }"#;
        let config: ExperimentConfig = serde_json::from_str(text).unwrap();
        assert_eq!(config.stock_conc_um, 15.0);
        assert_eq!(config.targets_um.len(), 8);
        assert!(config.viscous_check);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dilution_config.json");
        let path = path.to_str().unwrap();

        let config = ExperimentConfig::default();
        config.save_to_path(path).unwrap();
        let back = ExperimentConfig::load_from_path(path).unwrap();
        assert_eq!(back, config);
    }
}
