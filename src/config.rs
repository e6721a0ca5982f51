// In: src/config.rs

//! The single source of truth for all meshpack compression configuration.
//!
//! A `CompressorConfig` is created once at the application boundary (in code,
//! or from a JSON document) and handed to the builder and the compressor. It
//! carries the quantization widths active before the first
//! `QuantizationChange` element, the writer's initial capacity, and the
//! builder's vertex reuse policy.

use serde::{Deserialize, Serialize};

use crate::error::MeshpackError;
use crate::types::QuantizationTarget;

//==================================================================================
// I. Builder Policy
//==================================================================================

/// How the `ElementStream` builder turns repeated vertices into mesh buffer
/// references when adding indexed geometry.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MeshReusePolicy {
    /// Every vertex is streamed in full.
    None,

    /// A vertex equal (by value) to one of the last 16 pushed vertices is
    /// replaced by a reference to it.
    ByValue,

    /// **Default:** a vertex whose indices match one of the last 16 pushed
    /// vertices is replaced by a reference to it.
    #[default]
    ByIndex,
}

//==================================================================================
// II. The Unified CompressorConfig
//==================================================================================

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct CompressorConfig {
    /// Position width in bits (2..=16).
    #[serde(default = "default_position_quant")]
    pub position_quant: u32,

    /// Color width in bits (2..=16).
    #[serde(default = "default_color_quant")]
    pub color_quant: u32,

    /// Normal parameter width in bits (0..=6).
    #[serde(default = "default_normal_quant")]
    pub normal_quant: u32,

    /// Initial storage of the command stream writer.
    #[serde(default = "default_initial_capacity_bytes")]
    pub initial_capacity_bytes: usize,

    #[serde(default)]
    pub mesh_reuse: MeshReusePolicy,
}

impl Default for CompressorConfig {
    fn default() -> Self {
        Self {
            position_quant: default_position_quant(),
            color_quant: default_color_quant(),
            normal_quant: default_normal_quant(),
            initial_capacity_bytes: default_initial_capacity_bytes(),
            mesh_reuse: MeshReusePolicy::default(),
        }
    }
}

impl CompressorConfig {
    /// Rejects any width outside its legal range.
    pub fn validate(&self) -> Result<(), MeshpackError> {
        QuantizationTarget::Position.validate(self.position_quant)?;
        QuantizationTarget::Color.validate(self.color_quant)?;
        QuantizationTarget::Normal.validate(self.normal_quant)?;
        Ok(())
    }

    /// The configured width for one target.
    pub fn quant_for(&self, target: QuantizationTarget) -> u32 {
        match target {
            QuantizationTarget::Position => self.position_quant,
            QuantizationTarget::Color => self.color_quant,
            QuantizationTarget::Normal => self.normal_quant,
        }
    }

    /// Parses and validates a JSON config. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, MeshpackError> {
        let config: CompressorConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, MeshpackError> {
        Ok(serde_json::to_string(self)?)
    }
}

fn default_position_quant() -> u32 {
    16
}

fn default_color_quant() -> u32 {
    9
}

fn default_normal_quant() -> u32 {
    6
}

fn default_initial_capacity_bytes() -> usize {
    1024
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_format_defaults() {
        let config = CompressorConfig::default();
        assert_eq!(
            (config.position_quant, config.color_quant, config.normal_quant),
            (16, 9, 6)
        );
        assert_eq!(config.mesh_reuse, MeshReusePolicy::ByIndex);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_fills_missing_fields() {
        let config = CompressorConfig::from_json(r#"{"color_quant": 12, "mesh_reuse": "by_value"}"#)
            .unwrap();
        assert_eq!(config.color_quant, 12);
        assert_eq!(config.position_quant, 16);
        assert_eq!(config.mesh_reuse, MeshReusePolicy::ByValue);
    }

    #[test]
    fn test_from_json_rejects_illegal_width() {
        let err = CompressorConfig::from_json(r#"{"position_quant": 1}"#).unwrap_err();
        assert!(matches!(
            err,
            MeshpackError::InvalidQuantization {
                target: QuantizationTarget::Position,
                bits: 1,
                ..
            }
        ));
        assert!(CompressorConfig::from_json(r#"{"normal_quant": 7}"#).is_err());
        assert!(CompressorConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_json_round_trip() {
        let config = CompressorConfig {
            normal_quant: 3,
            mesh_reuse: MeshReusePolicy::None,
            ..Default::default()
        };
        let back = CompressorConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }
}
