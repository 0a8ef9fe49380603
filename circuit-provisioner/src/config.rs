/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Engine tunables, deserialized from the daemon configuration file.

use crate::policy::PolicyToggle;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

fn default_service_id_start() -> u64 {
    1
}

fn default_hold_timeout_secs() -> u64 {
    120
}

fn default_segment_timeout_secs() -> u64 {
    30
}

fn default_max_path_depth() -> usize {
    5
}

/// Engine-wide settings. Every field has a default so an empty
/// configuration block is valid.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    /// First service id handed out; ids increase monotonically from here.
    #[serde(default = "default_service_id_start")]
    pub service_id_start: u64,

    /// Seconds a reservation is held before an uncommitted hold expires.
    #[serde(default = "default_hold_timeout_secs")]
    pub hold_timeout_secs: u64,

    /// Per-segment deadline for backend activation and peer sub-requests.
    #[serde(default = "default_segment_timeout_secs")]
    pub segment_timeout_secs: u64,

    /// Maximum number of networks a path may traverse.
    #[serde(default = "default_max_path_depth")]
    pub max_path_depth: usize,

    /// Enabled policy toggles.
    #[serde(default)]
    pub policies: HashSet<PolicyToggle>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            service_id_start: default_service_id_start(),
            hold_timeout_secs: default_hold_timeout_secs(),
            segment_timeout_secs: default_segment_timeout_secs(),
            max_path_depth: default_max_path_depth(),
            policies: HashSet::new(),
        }
    }
}

impl EngineConfig {
    pub fn hold_timeout(&self) -> Duration {
        Duration::from_secs(self.hold_timeout_secs)
    }

    pub fn segment_timeout(&self) -> Duration {
        Duration::from_secs(self.segment_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_block_yields_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.hold_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn toggles_deserialize_by_lowercase_name() {
        let config: EngineConfig = serde_json::from_str(
            r#"{"hold_timeout_secs": 10, "policies": ["requireuser", "aggregator"]}"#,
        )
        .unwrap();
        assert_eq!(config.hold_timeout_secs, 10);
        assert!(config.policies.contains(&PolicyToggle::RequireUser));
        assert!(config.policies.contains(&PolicyToggle::Aggregator));
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(serde_json::from_str::<EngineConfig>(r#"{"hold_secs": 1}"#).is_err());
    }
}
