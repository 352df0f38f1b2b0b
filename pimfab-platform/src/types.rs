// Copyright (c) 2026 Graphcore Ltd. All rights reserved.

//! Platform configuration.
//!
//! Configuration is layered with [figment]: built-in defaults, then an
//! optional TOML or YAML file, then the environment variables understood by
//! the fabric build scripts (`NODES`, `INTERLEAVE`, `MEMORY_MODEL`, ...).

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use byte_unit::Byte;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml, Yaml};
use figment::value::Uncased;
use serde::{Deserialize, Serialize, Serializer, de};
use serde_yaml::Value;

use crate::compute::working_set;
use crate::config_error;
use crate::error::BuildError;
use crate::interleave::InterleavePolicy;

/// Parse a value which could be an integer or a string and return u64 value
///
/// The string can be a hex string with underscores or a Byte string that
/// specifies units. Some examples are:
///  0x10000000
///  0x1000_0000
///  64B
///  128MiB, 4TiB
pub fn parse_byte_str<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: de::Deserializer<'de>,
{
    // Deserialize to a generic `Value` first so that plain integers are
    // accepted too.
    let value: Value = Deserialize::deserialize(deserializer)?;

    if let Some(number) = value.as_u64() {
        return Ok(number);
    }

    let s = match value.as_str() {
        Some(s) => s.to_owned(),
        None => {
            return Err(de::Error::custom(format!(
                "'{value:?}': Unsupported type for Deserialize (should be u64 or String)"
            )));
        }
    };

    // Convert to lowercase in order to standardise any 0x prefix
    let lowercase = s.to_lowercase();

    if lowercase.starts_with("0x") {
        let without_underscore = lowercase.replace('_', "");
        let without_0x = without_underscore.trim_start_matches("0x");
        u64::from_str_radix(without_0x, 16)
            .map_err(|e| de::Error::custom(format!("Unable to parse {s} as hex string: {e}")))
    } else {
        let ignore_case = false;
        let num_bytes = Byte::parse_str(&s, ignore_case)
            .map_err(|e| de::Error::custom(format!("Unable to parse {s} as Byte string: {e}")))?;
        Ok(num_bytes.as_u64())
    }
}

/// Format a byte count with the largest unit that represents it exactly
/// (`128MiB`, `64B`, `4TiB`).
#[must_use]
pub fn format_bytes(bytes: u64) -> String {
    let (value, unit) = Byte::from_u64(bytes).get_exact_unit(false);
    format!("{value}{unit}")
}

/// Accept strings and numbers as text. Environment values that look like
/// numbers (`ARGS=4`) arrive as numbers.
fn parse_text(value: Value) -> Result<String, String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(format!(
            "'{other:?}': Unsupported type for Deserialize (should be a String)"
        )),
    }
}

pub fn parse_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: de::Deserializer<'de>,
{
    let value: Value = Deserialize::deserialize(deserializer)?;
    parse_text(value).map_err(de::Error::custom)
}

pub fn parse_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: de::Deserializer<'de>,
{
    let s = parse_string(deserializer)?;
    Ok((!s.is_empty()).then_some(s))
}

/// Deserialize any type whose `FromStr` reports a [`BuildError`].
pub fn parse_from_str<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: de::Deserializer<'de>,
    T: FromStr<Err = BuildError>,
{
    let value: Value = Deserialize::deserialize(deserializer)?;
    let s = parse_text(value).map_err(de::Error::custom)?;
    s.parse().map_err(|e: BuildError| de::Error::custom(e.detail()))
}

/// The storage model behind each accelerator backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum MemoryModel {
    /// Fixed-latency storage.
    #[serde(rename = "simpleMem")]
    SimpleMem,

    /// Detailed DRAM timing model.
    #[serde(rename = "dramsim3")]
    Dramsim3,
}

impl MemoryModel {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            MemoryModel::SimpleMem => "simpleMem",
            MemoryModel::Dramsim3 => "dramsim3",
        }
    }

    /// Host component kind of the storage backend.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            MemoryModel::SimpleMem => "memHierarchy.simpleMem",
            MemoryModel::Dramsim3 => "memHierarchy.dramsim3",
        }
    }
}

impl fmt::Display for MemoryModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for MemoryModel {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "simpleMem" | "simplemem" => Ok(MemoryModel::SimpleMem),
            "dramsim3" => Ok(MemoryModel::Dramsim3),
            _ => config_error!(
                "Unsupported memory model '{s}' (must be one of: simpleMem, dramsim3)"
            ),
        }
    }
}

/// Kind of processing-in-memory unit in each accelerator backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PimType {
    None,
    Test,
    Generic,
}

impl PimType {
    #[must_use]
    pub fn code(&self) -> u8 {
        match self {
            PimType::None => 0,
            PimType::Test => 1,
            PimType::Generic => 3,
        }
    }
}

impl TryFrom<u8> for PimType {
    type Error = BuildError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(PimType::None),
            1 => Ok(PimType::Test),
            2 => config_error!("PIM type 2 is reserved"),
            3 => Ok(PimType::Generic),
            _ => config_error!("Unsupported PIM type {code} (must be one of: 0, 1, 3)"),
        }
    }
}

impl FromStr for PimType {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<u8>() {
            Ok(code) => PimType::try_from(code),
            Err(_) => config_error!("Unsupported PIM type '{s}' (must be one of: 0, 1, 3)"),
        }
    }
}

impl Serialize for PimType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    /// Size of the global physical address space.
    #[serde(deserialize_with = "parse_byte_str")]
    pub total_bytes: u64,
    pub nodes: usize,
    #[serde(deserialize_with = "parse_from_str")]
    pub interleave: InterleavePolicy,
    #[serde(deserialize_with = "parse_from_str")]
    pub model: MemoryModel,
    #[serde(deserialize_with = "parse_from_str")]
    pub pim_type: PimType,
    pub max_requests_per_cycle: u32,
    pub request_delay: String,
    pub access_time: String,
    pub dramsim3_config_ini: String,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            total_bytes: 8 * 512 * 1024 * 1024 * 1024,
            nodes: 1,
            interleave: InterleavePolicy::Wide,
            model: MemoryModel::SimpleMem,
            pim_type: PimType::None,
            max_requests_per_cycle: 128,
            request_delay: "1ns".to_string(),
            access_time: "100ns".to_string(),
            dramsim3_config_ini: "HBM2e_8Gbx128_UP.ini".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeSection {
    /// Number of processing nodes in the cluster.
    pub num_cpus: usize,
    /// Cores per instruction-driven processing node.
    pub num_cores: usize,
    #[serde(deserialize_with = "parse_string")]
    pub arch: String,
    /// Workload generator; when set the generator variant is built.
    #[serde(deserialize_with = "parse_optional_string")]
    pub app: Option<String>,
    /// Arguments; each node appends its index.
    #[serde(deserialize_with = "parse_string")]
    pub args: String,
    #[serde(deserialize_with = "parse_string")]
    pub program: String,
    pub force_noncacheable_reqs: u32,
}

impl Default for ComputeSection {
    fn default() -> Self {
        Self {
            num_cpus: 1,
            num_cores: 1,
            arch: "rv64g_zicntr".to_string(),
            app: None,
            args: String::new(),
            program: "sanity.exe".to_string(),
            force_noncacheable_reqs: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSection {
    pub clock: String,
    pub link_latency_ns: u64,
    pub max_transactions: u32,
    pub l1_access_latency_cycles: u32,
    pub l2_access_latency_cycles: u32,
    pub memnic_network_bw: String,
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            clock: "1.0GHz".to_string(),
            link_latency_ns: 1,
            max_transactions: 16,
            l1_access_latency_cycles: 8,
            l2_access_latency_cycles: 30,
            memnic_network_bw: "100GiB/s".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub l1_size: String,
    pub l1_associativity: u32,
    pub l2_size: String,
    pub l2_associativity: u32,
    pub line_size: u32,
    pub coherence_protocol: String,
    pub mshr_num_entries: u32,
    pub mshr_latency_cycles: u32,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            l1_size: "16KiB".to_string(),
            l1_associativity: 4,
            l2_size: "64 KiB".to_string(),
            l2_associativity: 16,
            line_size: 64,
            coherence_protocol: "MESI".to_string(),
            mshr_num_entries: 8,
            mshr_latency_cycles: 16,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterSection {
    pub link_bw: String,
    pub xbar_bw: String,
    pub flit_size: String,
    pub input_latency: String,
    pub output_latency: String,
    pub input_buf_size: String,
    pub output_buf_size: String,
}

impl Default for RouterSection {
    fn default() -> Self {
        Self {
            link_bw: "1TiB/s".to_string(),
            xbar_bw: "1TiB/s".to_string(),
            flit_size: "72B".to_string(),
            input_latency: "1ns".to_string(),
            output_latency: "1ns".to_string(),
            input_buf_size: "1KB".to_string(),
            output_buf_size: "1KB".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsSection {
    pub load_level: u32,
    pub output: String,
    /// File name within the output directory.
    pub file_name: String,
    pub separator: String,
    pub enable_all: bool,
}

impl Default for StatisticsSection {
    fn default() -> Self {
        Self {
            load_level: 7,
            output: "sst.statOutputCSV".to_string(),
            file_name: "sst-stats.csv".to_string(),
            separator: ",".to_string(),
            enable_all: true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub memory: MemorySection,
    pub compute: ComputeSection,
    pub timing: TimingSection,
    pub cache: CacheSection,
    pub router: RouterSection,
    pub statistics: StatisticsSection,
    #[serde(deserialize_with = "parse_string")]
    pub output_directory: String,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            memory: MemorySection::default(),
            compute: ComputeSection::default(),
            timing: TimingSection::default(),
            cache: CacheSection::default(),
            router: RouterSection::default(),
            statistics: StatisticsSection::default(),
            output_directory: "./".to_string(),
        }
    }
}

/// Map the environment variables of the build scripts onto config keys.
fn env_key(name: &str) -> Option<&'static str> {
    let key = match name.to_ascii_uppercase().as_str() {
        "NODES" => "memory.nodes",
        "INTERLEAVE" => "memory.interleave",
        "MEMORY_MODEL" => "memory.model",
        "PIM_TYPE" => "memory.pim_type",
        "NUM_CPUS" => "compute.num_cpus",
        "NUM_CORES" => "compute.num_cores",
        "ARCH" => "compute.arch",
        "APP" => "compute.app",
        "ARGS" => "compute.args",
        "REV_EXE" => "compute.program",
        "FORCE_NONCACHEABLE_REQS" => "compute.force_noncacheable_reqs",
        "OUTPUT_DIRECTORY" => "output_directory",
        _ => return None,
    };
    Some(key)
}

impl PlatformConfig {
    fn figment_with_defaults() -> Figment {
        Figment::new().merge(Serialized::defaults(PlatformConfig::default()))
    }

    fn figment_conf_file_merge(config: Figment, conf_file: &Path) -> Figment {
        match conf_file.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => config.merge(Yaml::file(conf_file)),
            _ => config.merge(Toml::file(conf_file)),
        }
    }

    fn figment_env_var_merge(config: Figment) -> Figment {
        config.merge(Env::raw().filter_map(|key| env_key(key.as_str()).map(Uncased::from)))
    }

    fn figment_extract(config: &Figment) -> Result<Self, BuildError> {
        config
            .extract()
            .map_err(|e| BuildError::Configuration(e.to_string()))
    }

    /// The full configuration stack: defaults, file, environment.
    #[must_use]
    pub fn figment(conf_file: Option<&Path>) -> Figment {
        let mut config = Self::figment_with_defaults();
        if let Some(conf_file) = conf_file {
            config = Self::figment_conf_file_merge(config, conf_file);
        }
        Self::figment_env_var_merge(config)
    }

    /// Load defaults, the optional file and the environment.
    pub fn load(conf_file: Option<&Path>) -> Result<Self, BuildError> {
        if let Some(path) = conf_file
            && !path.is_file()
        {
            return config_error!("Unable to read {}", path.display());
        }
        Self::figment_extract(&Self::figment(conf_file))
    }

    /// Load defaults overridden by a YAML document. The environment is
    /// ignored.
    pub fn from_yaml_str(s: &str) -> Result<Self, BuildError> {
        let mut config = Self::figment_with_defaults();
        if !s.trim().is_empty() {
            config = config.merge(Yaml::string(s));
        }
        Self::figment_extract(&config)
    }

    /// Checks that do not need the address partition.
    pub fn validate(&self) -> Result<(), BuildError> {
        if self.memory.nodes == 0 {
            return config_error!("Node count must be at least 1");
        }
        if self.memory.total_bytes == 0 {
            return config_error!("Total memory size must be non-zero");
        }
        if self.compute.num_cpus == 0 {
            return config_error!("A compute cluster must host at least 1 processing node");
        }
        if self.compute.num_cores == 0 {
            return config_error!("Each processing node needs at least 1 core");
        }
        if let Some(app) = &self.compute.app
            && app.contains(char::is_whitespace)
        {
            return config_error!("Workload name '{app}' must not contain whitespace");
        }
        // The highest node sits lowest in memory.
        working_set(self.compute.num_cpus - 1, self.memory.total_bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::interleave::InterleavePolicy;
    use crate::types::*;

    #[test]
    fn byte_strings() {
        let config = PlatformConfig::from_yaml_str("memory:\n  total_bytes: 4GiB\n").unwrap();
        assert_eq!(config.memory.total_bytes, 4 * 1024 * 1024 * 1024);

        let config =
            PlatformConfig::from_yaml_str("memory:\n  total_bytes: 0x1_0000_0000\n").unwrap();
        assert_eq!(config.memory.total_bytes, 0x1_0000_0000);

        let config = PlatformConfig::from_yaml_str("memory:\n  total_bytes: 4096\n").unwrap();
        assert_eq!(config.memory.total_bytes, 4096);
    }

    #[test]
    fn format_exact_units() {
        assert_eq!(format_bytes(128 * 1024 * 1024), "128MiB");
        assert_eq!(format_bytes(64), "64B");
        assert_eq!(format_bytes(256), "256B");
        assert_eq!(format_bytes(8 * 512 * 1024 * 1024 * 1024), "4TiB");
    }

    #[test]
    fn defaults() {
        let config = PlatformConfig::from_yaml_str("").unwrap();
        assert_eq!(config, PlatformConfig::default());
        assert_eq!(config.memory.interleave, InterleavePolicy::Wide);
        assert_eq!(config.memory.model, MemoryModel::SimpleMem);
        assert_eq!(config.compute.app, None);
    }

    #[test]
    fn numeric_text_accepted() {
        let config = PlatformConfig::from_yaml_str("compute:\n  args: 4\n").unwrap();
        assert_eq!(config.compute.args, "4");
    }

    #[test]
    fn reserved_pim_type() {
        let err = PlatformConfig::from_yaml_str("memory:\n  pim_type: 2\n").unwrap_err();
        assert!(matches!(err, BuildError::Configuration(_)));
        assert!(err.to_string().contains("reserved"));
        assert_eq!("3".parse::<PimType>().unwrap(), PimType::Generic);
    }

    #[test]
    fn unsupported_memory_model() {
        let err = "hbm".parse::<MemoryModel>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Configuration error: Unsupported memory model 'hbm' (must be one of: simpleMem, dramsim3)"
        );
    }

    #[test]
    fn env_names_map_to_keys() {
        assert_eq!(env_key("NODES"), Some("memory.nodes"));
        assert_eq!(env_key("REV_EXE"), Some("compute.program"));
        assert_eq!(env_key("HOME"), None);
    }

    #[test]
    fn validate_counts() {
        let mut config = PlatformConfig::default();
        config.validate().unwrap();
        config.compute.num_cpus = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_working_sets_fit() {
        let mut config = PlatformConfig::default();
        config.memory.total_bytes = 0x20000;
        config.compute.num_cpus = 2;
        config.validate().unwrap();
        config.compute.num_cpus = 3;
        let err = config.validate().unwrap_err();
        assert!(err.detail().contains("Processing node 2 working set"));

        config.memory.total_bytes = 0;
        assert!(config.validate().unwrap_err().detail().contains("non-zero"));
    }
}
