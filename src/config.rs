//! Model configuration loaded from JSON

use crate::core::endmembers::EndmemberParams;
use crate::core::evapotranspiration::EtParams;
use crate::core::precipitation::PrecipitationParams;
use crate::core::sensible_heat::SensibleHeatParams;
use crate::types::{EtError, EtResult};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parameters of every calibrated stage. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SebalConfig {
    pub endmembers: EndmemberParams,
    pub sensible_heat: SensibleHeatParams,
    pub et: EtParams,
    pub precipitation: PrecipitationParams,
    /// Name under which daily ET is reported in scene outputs
    pub et_band_name: String,
}

impl Default for SebalConfig {
    fn default() -> Self {
        Self {
            endmembers: EndmemberParams::default(),
            sensible_heat: SensibleHeatParams::default(),
            et: EtParams::default(),
            precipitation: PrecipitationParams::default(),
            et_band_name: "ET_24h".to_string(),
        }
    }
}

impl SebalConfig {
    pub fn from_json_str(json: &str) -> EtResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> EtResult<Self> {
        log::info!("Loading configuration from: {}", path.as_ref().display());
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn to_json_string(&self) -> EtResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> EtResult<()> {
        self.endmembers.validate()?;
        self.sensible_heat.validate()?;
        self.et.validate()?;
        self.precipitation.validate()?;
        if self.et_band_name.trim().is_empty() {
            return Err(EtError::InvalidConfig("ET band name is empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = SebalConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sensible_heat.iterations, 2);
        assert_eq!(config.precipitation.window_days, 10);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = SebalConfig::from_json_str(
            r#"{"endmembers": {"p_top_ndvi": 10.0}, "et_band_name": "ET"}"#,
        )
        .unwrap();
        assert_eq!(config.endmembers.p_top_ndvi, 10.0);
        assert_eq!(config.endmembers.p_coldest_ts, 20.0);
        assert_eq!(config.et_band_name, "ET");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = SebalConfig::from_json_str(r#"{"et": {"ef_min": 1.0, "ef_max": 0.5}}"#).unwrap_err();
        assert!(matches!(err, EtError::InvalidConfig(_)));
        assert!(matches!(SebalConfig::from_json_str("{not json"), Err(EtError::Json(_))));
    }

    #[test]
    fn test_round_trip_through_json() {
        let config = SebalConfig::default();
        let text = config.to_json_string().unwrap();
        assert_eq!(SebalConfig::from_json_str(&text).unwrap(), config);
    }
}
