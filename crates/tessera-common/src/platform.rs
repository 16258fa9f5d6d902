//! Platform limits for the tiling planner.
//!
//! Loads [`PlatformLimits`] from a TOML file (`platform.toml`) with environment
//! variable overrides via `TESSERA_PLATFORM_*` prefixed variables.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Hardware limits of the accelerator the plan is built for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformLimits {
    /// Vector compute cores available to one launch.
    /// Override: `TESSERA_PLATFORM_CORE_COUNT`
    pub core_count: u32,

    /// On-chip scratch memory per core in bytes.
    /// Override: `TESSERA_PLATFORM_SCRATCH_BYTES`
    pub scratch_bytes: u64,

    /// Hardware transfer alignment unit in bytes.
    /// Override: `TESSERA_PLATFORM_BLOCK_BYTES`
    pub block_bytes: u32,

    /// Scratch bytes withheld from every core before buffers are sized.
    /// Override: `TESSERA_PLATFORM_RESERVED_SCRATCH_BYTES`
    pub reserved_scratch_bytes: u64,

    /// Minimum work granule per core in bytes (`None` = one block).
    /// Override: `TESSERA_PLATFORM_CORE_GRANULE_BYTES` (`0` clears it)
    pub core_granule_bytes: Option<u64>,
}

impl Default for PlatformLimits {
    fn default() -> Self {
        Self {
            core_count: 48,
            scratch_bytes: 196_608,
            block_bytes: 32,
            reserved_scratch_bytes: 0,
            core_granule_bytes: None,
        }
    }
}

/// Errors that can occur when loading or validating [`PlatformLimits`].
#[derive(Debug, thiserror::Error)]
pub enum PlatformConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invalid environment override {key}={value}: {reason}")]
    EnvOverride { key: String, value: String, reason: String },
}

impl PlatformLimits {
    /// Scratch bytes left for buffers once the reservation is withheld.
    pub fn usable_scratch_bytes(&self) -> u64 {
        self.scratch_bytes.saturating_sub(self.reserved_scratch_bytes)
    }

    /// Render these limits as a TOML document.
    pub fn to_toml(&self) -> Result<String, PlatformConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load limits from a TOML file, falling back to defaults for missing
    /// fields, then apply environment variable overrides.
    pub fn load(path: &Path) -> Result<Self, PlatformConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Load from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, PlatformConfigError> {
        let mut limits: PlatformLimits = toml::from_str(toml_str)?;
        limits.apply_env_overrides()?;
        limits.validate()?;
        Ok(limits)
    }

    /// Load only from environment variables, starting from defaults.
    pub fn from_env() -> Result<Self, PlatformConfigError> {
        let mut limits = Self::default();
        limits.apply_env_overrides()?;
        limits.validate()?;
        Ok(limits)
    }

    /// Validate the limits, returning a descriptive message on failure.
    pub fn validate(&self) -> Result<(), PlatformConfigError> {
        if self.core_count == 0 {
            return Err(PlatformConfigError::Validation("core_count must be > 0".into()));
        }
        if self.block_bytes == 0 || !self.block_bytes.is_power_of_two() {
            return Err(PlatformConfigError::Validation(format!(
                "block_bytes must be a non-zero power of two, got {}",
                self.block_bytes
            )));
        }
        if self.reserved_scratch_bytes >= self.scratch_bytes {
            return Err(PlatformConfigError::Validation(format!(
                "reserved_scratch_bytes ({}) must be smaller than scratch_bytes ({})",
                self.reserved_scratch_bytes, self.scratch_bytes
            )));
        }
        if let Some(granule) = self.core_granule_bytes {
            if granule == 0 || granule % u64::from(self.block_bytes) != 0 {
                return Err(PlatformConfigError::Validation(format!(
                    "core_granule_bytes must be a positive multiple of block_bytes ({}), got {granule}",
                    self.block_bytes
                )));
            }
        }
        Ok(())
    }

    /// Apply `TESSERA_PLATFORM_*` environment variable overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), PlatformConfigError> {
        if let Some(v) = env_parse::<u32>("TESSERA_PLATFORM_CORE_COUNT")? {
            self.core_count = v;
        }
        if let Some(v) = env_parse::<u64>("TESSERA_PLATFORM_SCRATCH_BYTES")? {
            self.scratch_bytes = v;
        }
        if let Some(v) = env_parse::<u32>("TESSERA_PLATFORM_BLOCK_BYTES")? {
            self.block_bytes = v;
        }
        if let Some(v) = env_parse::<u64>("TESSERA_PLATFORM_RESERVED_SCRATCH_BYTES")? {
            self.reserved_scratch_bytes = v;
        }
        if let Some(v) = env_parse::<u64>("TESSERA_PLATFORM_CORE_GRANULE_BYTES")? {
            self.core_granule_bytes = (v != 0).then_some(v);
        }
        Ok(())
    }
}

fn env_parse<T>(key: &str) -> Result<Option<T>, PlatformConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<T>().map(Some).map_err(|e| PlatformConfigError::EnvOverride {
            key: key.into(),
            value: val.clone(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const ALL_KEYS: [&str; 5] = [
        "TESSERA_PLATFORM_CORE_COUNT",
        "TESSERA_PLATFORM_SCRATCH_BYTES",
        "TESSERA_PLATFORM_BLOCK_BYTES",
        "TESSERA_PLATFORM_RESERVED_SCRATCH_BYTES",
        "TESSERA_PLATFORM_CORE_GRANULE_BYTES",
    ];

    fn cleared_env() -> Vec<(&'static str, Option<&'static str>)> {
        ALL_KEYS.iter().map(|k| (*k, None)).collect()
    }

    #[test]
    fn test_default_limits_are_valid() {
        assert!(PlatformLimits::default().validate().is_ok());
    }

    #[test]
    #[serial(tessera_env)]
    fn test_default_toml_round_trips() {
        temp_env::with_vars(cleared_env(), || {
            let toml_str = PlatformLimits::default().to_toml().unwrap();
            let limits = PlatformLimits::from_toml(&toml_str).unwrap();
            assert_eq!(limits, PlatformLimits::default());
        });
    }

    #[test]
    #[serial(tessera_env)]
    fn test_from_toml_partial_uses_defaults() {
        temp_env::with_vars(cleared_env(), || {
            let limits = PlatformLimits::from_toml("core_count = 8\n").unwrap();
            assert_eq!(limits.core_count, 8);
            assert_eq!(limits.scratch_bytes, 196_608);
            assert_eq!(limits.block_bytes, 32);
            assert_eq!(limits.core_granule_bytes, None);
        });
    }

    #[test]
    #[serial(tessera_env)]
    fn test_from_toml_full() {
        let toml_str = r#"
core_count = 40
scratch_bytes = 253952
block_bytes = 32
reserved_scratch_bytes = 1024
core_granule_bytes = 4096
"#;
        temp_env::with_vars(cleared_env(), || {
            let limits = PlatformLimits::from_toml(toml_str).unwrap();
            assert_eq!(limits.core_count, 40);
            assert_eq!(limits.scratch_bytes, 253_952);
            assert_eq!(limits.reserved_scratch_bytes, 1024);
            assert_eq!(limits.core_granule_bytes, Some(4096));
            assert_eq!(limits.usable_scratch_bytes(), 252_928);
        });
    }

    #[test]
    fn test_validation_zero_cores() {
        let limits = PlatformLimits { core_count: 0, ..Default::default() };
        let err = limits.validate().unwrap_err();
        assert!(err.to_string().contains("core_count must be > 0"));
    }

    #[test]
    fn test_validation_block_not_power_of_two() {
        let limits = PlatformLimits { block_bytes: 24, ..Default::default() };
        let err = limits.validate().unwrap_err();
        assert!(err.to_string().contains("power of two"));
    }

    #[test]
    fn test_validation_reservation_swallows_scratch() {
        let limits =
            PlatformLimits { reserved_scratch_bytes: 196_608, ..Default::default() };
        let err = limits.validate().unwrap_err();
        assert!(err.to_string().contains("must be smaller than scratch_bytes"));
    }

    #[test]
    fn test_validation_granule_not_block_multiple() {
        let limits = PlatformLimits { core_granule_bytes: Some(100), ..Default::default() };
        let err = limits.validate().unwrap_err();
        assert!(err.to_string().contains("positive multiple of block_bytes"));
    }

    #[test]
    #[serial(tessera_env)]
    fn test_env_override_multiple_fields() {
        temp_env::with_vars(
            [
                ("TESSERA_PLATFORM_CORE_COUNT", Some("24")),
                ("TESSERA_PLATFORM_SCRATCH_BYTES", Some("65536")),
                ("TESSERA_PLATFORM_BLOCK_BYTES", Some("64")),
                ("TESSERA_PLATFORM_RESERVED_SCRATCH_BYTES", Some("512")),
                ("TESSERA_PLATFORM_CORE_GRANULE_BYTES", Some("4096")),
            ],
            || {
                let limits = PlatformLimits::from_env().unwrap();
                assert_eq!(limits.core_count, 24);
                assert_eq!(limits.scratch_bytes, 65_536);
                assert_eq!(limits.block_bytes, 64);
                assert_eq!(limits.reserved_scratch_bytes, 512);
                assert_eq!(limits.core_granule_bytes, Some(4096));
            },
        );
    }

    #[test]
    #[serial(tessera_env)]
    fn test_env_override_zero_granule_clears_it() {
        temp_env::with_vars(
            [
                ("TESSERA_PLATFORM_CORE_COUNT", None),
                ("TESSERA_PLATFORM_SCRATCH_BYTES", None),
                ("TESSERA_PLATFORM_BLOCK_BYTES", None),
                ("TESSERA_PLATFORM_RESERVED_SCRATCH_BYTES", None),
                ("TESSERA_PLATFORM_CORE_GRANULE_BYTES", Some("0")),
            ],
            || {
                let limits = PlatformLimits::from_toml("core_granule_bytes = 4096").unwrap();
                assert_eq!(limits.core_granule_bytes, None);
            },
        );
    }

    #[test]
    #[serial(tessera_env)]
    fn test_env_override_invalid_number() {
        temp_env::with_vars(
            [
                ("TESSERA_PLATFORM_CORE_COUNT", Some("many")),
                ("TESSERA_PLATFORM_SCRATCH_BYTES", None),
                ("TESSERA_PLATFORM_BLOCK_BYTES", None),
                ("TESSERA_PLATFORM_RESERVED_SCRATCH_BYTES", None),
                ("TESSERA_PLATFORM_CORE_GRANULE_BYTES", None),
            ],
            || {
                let err = PlatformLimits::from_env().unwrap_err();
                match err {
                    PlatformConfigError::EnvOverride { key, value, .. } => {
                        assert_eq!(key, "TESSERA_PLATFORM_CORE_COUNT");
                        assert_eq!(value, "many");
                    }
                    other => panic!("expected EnvOverride, got: {other}"),
                }
            },
        );
    }

    #[test]
    #[serial(tessera_env)]
    fn test_load_from_tempfile() {
        temp_env::with_vars(cleared_env(), || {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("platform.toml");
            std::fs::write(&path, "core_count = 2\nscratch_bytes = 4096\n").unwrap();
            let limits = PlatformLimits::load(&path).unwrap();
            assert_eq!(limits.core_count, 2);
            assert_eq!(limits.scratch_bytes, 4096);
        });
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = PlatformLimits::load(Path::new("/nonexistent/platform.toml"));
        assert!(matches!(result, Err(PlatformConfigError::Io(_))));
    }

    #[test]
    fn test_load_malformed_toml() {
        let result = PlatformLimits::from_toml("core_count = \"lots\"");
        assert!(matches!(result, Err(PlatformConfigError::Parse(_))));
    }
}
