// Copyright 2024 The Kubernetes Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration for the ClusterResourceOverride admission controller.
//!
//! The on-disk shape is a small YAML document of integer percentages. A
//! percentage of 0 (or an omitted field) disables that override dimension.

use crate::admission::{AdmissionError, AdmissionResult, FieldError};
use serde::Deserialize;
use std::io::Read;

/// ClusterResourceOverrideConfig is the file format of the plugin configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterResourceOverrideConfig {
    /// Percentage of a container's memory limit used to derive its CPU limit.
    #[serde(rename = "limitCPUToMemoryPercent")]
    pub limit_cpu_to_memory_percent: i32,
    /// Percentage of a container's CPU limit used to derive its CPU request.
    pub cpu_request_to_limit_percent: i32,
    /// Percentage of a container's memory limit used to derive its memory request.
    pub memory_request_to_limit_percent: i32,
}

/// Read and validate a plugin configuration from a YAML stream.
///
/// An empty stream means the plugin is not configured; callers treat the
/// `None` as "leave the plugin inert".
pub fn read_config(reader: &mut dyn Read) -> AdmissionResult<Option<ClusterResourceOverrideConfig>> {
    let mut buf = String::new();
    reader
        .read_to_string(&mut buf)
        .map_err(|e| AdmissionError::internal_error(format!("error reading config: {}", e)))?;
    if buf.trim().is_empty() {
        return Ok(None);
    }

    let config: ClusterResourceOverrideConfig = serde_yaml::from_str(&buf)
        .map_err(|e| AdmissionError::bad_request(format!("error parsing config: {}", e)))?;

    let errs = validate(&config);
    if !errs.is_empty() {
        return Err(AdmissionError::aggregate(errs));
    }
    Ok(Some(config))
}

/// Validate a parsed configuration.
pub fn validate(config: &ClusterResourceOverrideConfig) -> Vec<FieldError> {
    let mut errs = Vec::new();

    if config.limit_cpu_to_memory_percent == 0
        && config.cpu_request_to_limit_percent == 0
        && config.memory_request_to_limit_percent == 0
    {
        errs.push(FieldError::forbidden(
            "limitCPUToMemoryPercent",
            "this plugin may not all be set to zero; \
             if you do not want anything overridden, omit the plugin from config",
        ));
    }
    if config.limit_cpu_to_memory_percent < 0 {
        errs.push(FieldError::invalid(
            "limitCPUToMemoryPercent",
            format!(
                "{}: must be a positive percentage",
                config.limit_cpu_to_memory_percent
            ),
        ));
    }
    if !(0..=100).contains(&config.cpu_request_to_limit_percent) {
        errs.push(FieldError::invalid(
            "cpuRequestToLimitPercent",
            format!(
                "{}: must be a percentage between 0 and 100",
                config.cpu_request_to_limit_percent
            ),
        ));
    }
    if !(0..=100).contains(&config.memory_request_to_limit_percent) {
        errs.push(FieldError::invalid(
            "memoryRequestToLimitPercent",
            format!(
                "{}: must be a percentage between 0 and 100",
                config.memory_request_to_limit_percent
            ),
        ));
    }

    errs
}

/// OverrideConfig is the immutable internal form of the configuration.
///
/// Each ratio is `None` when disabled. Disabled-ness is decided here, once,
/// at construction; the engine never infers it from arithmetic on the value.
#[derive(Debug, Clone, Copy, Default)]
pub struct OverrideConfig {
    limit_cpu_to_memory: Option<f64>,
    cpu_request_to_limit: Option<f64>,
    memory_request_to_limit: Option<f64>,
}

impl OverrideConfig {
    /// Build the internal ratio model from validated integer percentages.
    pub fn from_config(config: &ClusterResourceOverrideConfig) -> Self {
        fn ratio(percent: i32) -> Option<f64> {
            (percent != 0).then(|| f64::from(percent) / 100.0)
        }
        Self {
            limit_cpu_to_memory: ratio(config.limit_cpu_to_memory_percent),
            cpu_request_to_limit: ratio(config.cpu_request_to_limit_percent),
            memory_request_to_limit: ratio(config.memory_request_to_limit_percent),
        }
    }

    /// The CPU-limit-from-memory-limit ratio, if that override is active.
    pub fn limit_cpu_to_memory_ratio(&self) -> Option<f64> {
        self.limit_cpu_to_memory
    }

    /// The CPU-request-from-CPU-limit ratio, if that override is active.
    pub fn cpu_request_to_limit_ratio(&self) -> Option<f64> {
        self.cpu_request_to_limit
    }

    /// The memory-request-from-memory-limit ratio, if that override is active.
    pub fn memory_request_to_limit_ratio(&self) -> Option<f64> {
        self.memory_request_to_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn percent_config(limit_cpu: i32, cpu_req: i32, mem_req: i32) -> ClusterResourceOverrideConfig {
        ClusterResourceOverrideConfig {
            limit_cpu_to_memory_percent: limit_cpu,
            cpu_request_to_limit_percent: cpu_req,
            memory_request_to_limit_percent: mem_req,
        }
    }

    #[test]
    fn test_read_config_yaml() {
        let yaml = "\
limitCPUToMemoryPercent: 200
cpuRequestToLimitPercent: 50
memoryRequestToLimitPercent: 25
";
        let config = read_config(&mut Cursor::new(yaml)).unwrap().unwrap();
        assert_eq!(config.limit_cpu_to_memory_percent, 200);
        assert_eq!(config.cpu_request_to_limit_percent, 50);
        assert_eq!(config.memory_request_to_limit_percent, 25);
    }

    #[test]
    fn test_read_config_empty_stream_is_unconfigured() {
        assert_eq!(read_config(&mut Cursor::new("")).unwrap(), None);
        assert_eq!(read_config(&mut Cursor::new("   \n")).unwrap(), None);
    }

    #[test]
    fn test_read_config_omitted_fields_default_to_disabled() {
        let config = read_config(&mut Cursor::new("memoryRequestToLimitPercent: 50\n"))
            .unwrap()
            .unwrap();
        assert_eq!(config.limit_cpu_to_memory_percent, 0);
        assert_eq!(config.memory_request_to_limit_percent, 50);
    }

    #[test]
    fn test_read_config_malformed_yaml() {
        let result = read_config(&mut Cursor::new("limitCPUToMemoryPercent: [oops"));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_all_zero_is_forbidden() {
        let errs = validate(&percent_config(0, 0, 0));
        assert_eq!(errs.len(), 1);
        assert!(errs[0].to_string().contains("omit the plugin"));
    }

    #[test]
    fn test_validate_ranges() {
        assert!(validate(&percent_config(200, 100, 100)).is_empty());
        assert!(validate(&percent_config(1, 0, 0)).is_empty());

        let errs = validate(&percent_config(-1, 110, -5));
        assert_eq!(errs.len(), 3);

        // limitCPUToMemoryPercent has no upper bound
        assert!(validate(&percent_config(500, 50, 50)).is_empty());
    }

    #[test]
    fn test_override_config_disabled_ratios_are_none() {
        let config = OverrideConfig::from_config(&percent_config(0, 50, 0));
        assert_eq!(config.limit_cpu_to_memory_ratio(), None);
        assert_eq!(config.cpu_request_to_limit_ratio(), Some(0.5));
        assert_eq!(config.memory_request_to_limit_ratio(), None);
    }

    #[test]
    fn test_override_config_ratio_values() {
        let config = OverrideConfig::from_config(&percent_config(200, 25, 100));
        assert_eq!(config.limit_cpu_to_memory_ratio(), Some(2.0));
        assert_eq!(config.cpu_request_to_limit_ratio(), Some(0.25));
        assert_eq!(config.memory_request_to_limit_ratio(), Some(1.0));
    }
}
