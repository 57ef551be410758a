//! JSON toolchain configuration.
//!
//! Every key is optional. Command-line flags override what the file says.
//!
//! ```json
//! {
//!   "supported_versions": ["Vivado v2023.2"],
//!   "spike": { "path": "/opt/riscv/bin/spike", "isa": "rv32i" },
//!   "rtl": { "command": "vsim -c -do run.do +IMAGE={image}" },
//!   "compare": { "scope": "all", "ignore_registers": ["sp"], "tolerance": 0 },
//!   "timeout_ms": 1000
//! }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::compare::{
    ComparePolicy, DEFAULT_TIMEOUT, MemRegion, Scope, parse_number, parse_register,
};
use crate::error::ConfigError;
use crate::spike::SpikeConfig;

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "./config/toolchain_config.json";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SpikeSection {
    pub path: Option<PathBuf>,
    pub isa: Option<String>,
    pub memory_map: Option<String>,
    pub start_pc: Option<String>,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RtlSection {
    /// Simulator command template, `{image}` replaced by the image path.
    pub command: Option<String>,
    /// Directory of captured `<image>.log` commit logs.
    pub trace_dir: Option<PathBuf>,
    pub vivado_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CompareSection {
    pub scope: Option<String>,
    pub ignore_registers: Vec<String>,
    pub memory_regions: Vec<String>,
    pub tolerance: Option<u64>,
    pub stop_on_error: Option<bool>,
}

/// Contents of the toolchain configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// Accepted `vivado -version` strings.
    pub supported_versions: Vec<String>,
    pub spike: SpikeSection,
    pub rtl: RtlSection,
    pub compare: CompareSection,
    pub timeout_ms: Option<u64>,
    pub max_commits: Option<u64>,
    pub jobs: Option<usize>,
    pub riscv_tools_path: Option<PathBuf>,
    pub build_script: Option<PathBuf>,
}

impl ToolchainConfig {
    pub fn from_json(text: &str, path: &Path) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&text, path)?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Load `path`, or fall back to defaults when it is the default path and
    /// does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path == Path::new(DEFAULT_CONFIG_PATH) && !path.exists() {
            debug!("no configuration file, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout_ms.map_or(DEFAULT_TIMEOUT, Duration::from_millis)
    }

    /// Reference settings from the `spike` section.
    pub fn spike_config(&self) -> Result<SpikeConfig, ConfigError> {
        let mut config = SpikeConfig::default();
        let section = &self.spike;
        if let Some(path) = &section.path {
            config = config.with_path(path);
        }
        if let Some(isa) = &section.isa {
            config = config.with_isa(isa);
        }
        if let Some(map) = &section.memory_map {
            config = config.with_memory_map(map);
        }
        if let Some(pc) = &section.start_pc {
            let pc = parse_number(pc).ok_or_else(|| ConfigError::invalid("start PC", pc))?;
            config = config.with_start_pc(Some(pc));
        }
        Ok(config.with_extra_args(section.args.clone()))
    }

    /// Policy from the `compare` section.
    pub fn compare_policy(&self) -> Result<ComparePolicy, ConfigError> {
        let section = &self.compare;
        let scope = section
            .scope
            .as_deref()
            .map_or(Ok(Scope::All), str::parse)?;
        let ignored = section
            .ignore_registers
            .iter()
            .map(|name| parse_register(name).ok_or_else(|| ConfigError::invalid("register", name)))
            .collect::<Result<Vec<u8>, _>>()?;
        let regions = section
            .memory_regions
            .iter()
            .map(|region| region.parse::<MemRegion>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ComparePolicy::default()
            .with_scope(scope)
            .with_ignored_registers(ignored)
            .with_memory_regions(regions)
            .with_tolerance(section.tolerance.unwrap_or(0))
            .with_stop_on_first(section.stop_on_error.unwrap_or(false)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<ToolchainConfig, ConfigError> {
        ToolchainConfig::from_json(text, Path::new("test.json"))
    }

    #[test]
    fn test_empty_is_default() {
        let config = parse("{}").unwrap();
        assert!(config.supported_versions.is_empty());
        assert_eq!(config.timeout(), DEFAULT_TIMEOUT);
        let spike = config.spike_config().unwrap();
        assert_eq!(spike.isa, "rv32i");
        let policy = config.compare_policy().unwrap();
        assert_eq!(policy.scope, Scope::All);
        assert!(!policy.stop_on_first);
    }

    #[test]
    fn test_full_config() {
        let config = parse(
            r#"{
                "supported_versions": ["Vivado v2023.2 (64-bit)"],
                "spike": { "path": "/opt/spike", "isa": "rv32im", "start_pc": "0x1000", "args": ["-p1"] },
                "rtl": { "command": "sim {image}" },
                "compare": {
                    "scope": "regs",
                    "ignore_registers": ["sp", "x3"],
                    "memory_regions": ["0x0-0x100"],
                    "tolerance": 2,
                    "stop_on_error": true
                },
                "timeout_ms": 250,
                "jobs": 4
            }"#,
        )
        .unwrap();

        assert_eq!(config.timeout(), Duration::from_millis(250));
        assert_eq!(config.jobs, Some(4));
        assert_eq!(config.rtl.command.as_deref(), Some("sim {image}"));

        let spike = config.spike_config().unwrap();
        assert_eq!(spike.path, PathBuf::from("/opt/spike"));
        assert_eq!(spike.start_pc, Some(0x1000));
        assert_eq!(spike.extra_args, vec!["-p1".to_string()]);

        let policy = config.compare_policy().unwrap();
        assert_eq!(policy.scope, Scope::Registers);
        assert!(policy.ignored_registers.contains(&2));
        assert!(policy.ignored_registers.contains(&3));
        assert_eq!(policy.memory_regions, vec![MemRegion { start: 0, end: 0x100 }]);
        assert_eq!(policy.tolerance, 2);
        assert!(policy.stop_on_first);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(parse("{"), Err(ConfigError::Json { .. })));
        let config = parse(r#"{ "compare": { "ignore_registers": ["x99"] } }"#).unwrap();
        assert!(matches!(
            config.compare_policy(),
            Err(ConfigError::Invalid { what: "register", .. })
        ));
        let config = parse(r#"{ "spike": { "start_pc": "zz" } }"#).unwrap();
        assert!(config.spike_config().is_err());
    }

    #[test]
    fn test_missing_explicit_file() {
        let err = ToolchainConfig::load_or_default(Path::new("/nonexistent/friscv.json"));
        assert!(matches!(err, Err(ConfigError::Read { .. })));
    }
}
