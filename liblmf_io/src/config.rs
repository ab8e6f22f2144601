use serde::{Deserialize, Serialize};
use std::path::Path;

use super::daq::{ArchiveEra, DaqId};
use super::error::ConfigError;
use super::output::OutputSettings;

/// Overrides for the header of a converted file.
/// Configs are seralizable and deserializable to YAML using serde and serde_yaml.
/// Every field left `null` is taken from the input file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub daq_id: Option<DaqId>,
    pub daq_version: Option<i32>,
    pub lmf_version: Option<i32>,
    pub era: Option<ArchiveEra>,
    pub data_format: Option<i32>,
    pub timestamp_format: Option<i32>,
    pub number_of_channels: Option<u64>,
    pub max_number_of_hits: Option<u64>,
    pub frequency: Option<f64>,
    pub resolution: Option<f64>,
    pub tdc_data_type: Option<i32>,
    pub variable_event_length: Option<i32>,
    pub daq_info: Option<String>,
    pub comment: Option<String>,
}

impl OutputConfig {
    /// Read the configuration in a YAML file
    /// Returns an OutputConfig if successful
    pub fn read_config_file(config_path: &Path) -> Result<Self, ConfigError> {
        if !config_path.exists() {
            return Err(ConfigError::BadFilePath(config_path.to_path_buf()));
        }

        let yaml_str = std::fs::read_to_string(config_path)?;

        Ok(serde_yaml::from_str::<Self>(&yaml_str)?)
    }

    /// Write the configuration to a YAML file
    pub fn write_config_file(&self, config_path: &Path) -> Result<(), ConfigError> {
        let yaml_str = serde_yaml::to_string(self)?;
        std::fs::write(config_path, yaml_str)?;
        Ok(())
    }

    /// Copy every set field into the output overrides
    pub fn apply(&self, settings: &mut OutputSettings) {
        macro_rules! copy_set {
            ($($field:ident),*) => {
                $(if let Some(value) = &self.$field {
                    settings.$field = Some(value.clone());
                })*
            };
        }
        copy_set!(
            daq_id,
            daq_version,
            lmf_version,
            era,
            data_format,
            timestamp_format,
            number_of_channels,
            max_number_of_hits,
            frequency,
            resolution,
            tdc_data_type,
            variable_event_length,
            daq_info,
            comment
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.yml");
        let config = OutputConfig {
            daq_id: Some(DaqId::Tdc8hp),
            lmf_version: Some(10),
            comment: Some(String::from("converted")),
            ..Default::default()
        };
        config.write_config_file(&path).unwrap();
        let read_back = OutputConfig::read_config_file(&path).unwrap();
        assert_eq!(read_back, config);

        let mut settings = OutputSettings {
            resolution: Some(0.025),
            ..Default::default()
        };
        read_back.apply(&mut settings);
        assert_eq!(settings.daq_id, Some(DaqId::Tdc8hp));
        assert_eq!(settings.lmf_version, Some(10));
        assert_eq!(settings.resolution, Some(0.025));
    }

    #[test]
    fn test_bad_config() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.yml");
        assert!(matches!(
            OutputConfig::read_config_file(&missing),
            Err(ConfigError::BadFilePath(_))
        ));
        let broken = dir.path().join("broken.yml");
        std::fs::write(&broken, "daq_id: [not, an, id]\n").unwrap();
        assert!(matches!(
            OutputConfig::read_config_file(&broken),
            Err(ConfigError::ParsingError(_))
        ));
    }
}
