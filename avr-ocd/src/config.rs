//! Target configuration.
//!
//! A target is described in YAML, for example:
//!
//! ```yaml
//! name: atmega128
//! tap:
//!   position: 0
//!   ir_len: 4
//!   idcode: 0x6970203F
//! ```

use std::io::Read;

use serde::{Deserialize, Serialize};

use crate::probe::{IdCode, JtagTap};

/// Error while loading a target configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to parse the target description")]
    Yaml(#[from] serde_yaml::Error),
    #[error("The instruction register length must be between 1 and 32 bits, got {0}")]
    InvalidIrLength(u32),
    #[error("{0:#010x} is not a valid JTAG IDCODE")]
    InvalidIdCode(u32),
}

fn default_ir_len() -> u32 {
    4
}

/// Position and shape of the AVR TAP on the scan chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TapConfig {
    /// Position of the TAP on the chain.
    #[serde(default)]
    pub position: usize,
    /// Length of the instruction register in bits.
    #[serde(default = "default_ir_len")]
    pub ir_len: u32,
    /// The IDCODE the device is expected to report. Checked on init if present.
    #[serde(default)]
    pub idcode: Option<u32>,
}

impl Default for TapConfig {
    fn default() -> Self {
        Self {
            position: 0,
            ir_len: default_ir_len(),
            idcode: None,
        }
    }
}

impl TapConfig {
    /// The tap handle described by this configuration.
    pub fn tap(&self) -> JtagTap {
        JtagTap::new(self.position, self.ir_len)
    }

    /// The expected IDCODE, if one is configured.
    pub fn expected_idcode(&self) -> Option<IdCode> {
        self.idcode.map(IdCode::from)
    }
}

/// Description of one AVR target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AvrTargetConfig {
    /// Name of the target, used in log output.
    pub name: String,
    /// The TAP the target is reached through.
    #[serde(default)]
    pub tap: Option<TapConfig>,
}

impl Default for AvrTargetConfig {
    fn default() -> Self {
        Self {
            name: "avr".to_string(),
            tap: Some(TapConfig::default()),
        }
    }
}

impl AvrTargetConfig {
    /// Parses and validates a YAML target description.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a YAML target description.
    pub fn from_yaml_reader(reader: impl Read) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let Some(tap) = &self.tap else {
            return Ok(());
        };

        if !(1..=32).contains(&tap.ir_len) {
            return Err(ConfigError::InvalidIrLength(tap.ir_len));
        }

        if let Some(idcode) = tap.expected_idcode() {
            if !idcode.valid() {
                return Err(ConfigError::InvalidIdCode(idcode.raw()));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_full_description() {
        let config = AvrTargetConfig::from_yaml_str(
            "name: atmega128\ntap:\n  position: 1\n  ir_len: 4\n  idcode: 0x6970203F\n",
        )
        .unwrap();

        assert_eq!(
            config,
            AvrTargetConfig {
                name: "atmega128".to_string(),
                tap: Some(TapConfig {
                    position: 1,
                    ir_len: 4,
                    idcode: Some(0x6970_203F),
                }),
            }
        );
        assert_eq!(config.tap.unwrap().tap(), JtagTap::new(1, 4));
    }

    #[test]
    fn tap_fields_default() {
        let config = AvrTargetConfig::from_yaml_str("name: atmega16\ntap: {}\n").unwrap();

        assert_eq!(config.tap, Some(TapConfig::default()));
    }

    #[test]
    fn tap_is_optional() {
        let config = AvrTargetConfig::from_yaml_reader("name: detached\n".as_bytes()).unwrap();

        assert_eq!(config.tap, None);
    }

    #[test]
    fn rejects_zero_ir_len() {
        let error = AvrTargetConfig::from_yaml_str("name: broken\ntap:\n  ir_len: 0\n").unwrap_err();

        assert!(matches!(error, ConfigError::InvalidIrLength(0)));
    }

    #[test]
    fn rejects_invalid_idcode() {
        let error =
            AvrTargetConfig::from_yaml_str("name: broken\ntap:\n  idcode: 0x10\n").unwrap_err();

        assert!(matches!(error, ConfigError::InvalidIdCode(0x10)));
    }

    #[test]
    fn rejects_unknown_fields() {
        let error = AvrTargetConfig::from_yaml_str("name: x\nspeed: 1000\n").unwrap_err();

        assert!(matches!(error, ConfigError::Yaml(_)));
    }
}
