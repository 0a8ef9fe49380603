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

use circuit_provisioner::EngineConfig;
use serde::{Deserialize, Serialize};

/// Daemon configuration file, json5.
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Locally owned networks, each with its own NRM file and backend.
    pub(crate) networks: Vec<NetworkConfig>,
    #[serde(default)]
    pub(crate) engine: EngineConfig,
    #[serde(default)]
    pub(crate) peering: Option<PeeringConfig>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct NetworkConfig {
    /// Network name as referenced by requests, e.g. `aruba.net`.
    pub(crate) name: String,
    /// Path to the NRM topology description.
    pub(crate) nrm_file: String,
    #[serde(default)]
    pub(crate) backend: BackendKind,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Log-only emulator.
    #[default]
    Dud,
}

impl BackendKind {
    pub(crate) fn name(self) -> &'static str {
        match self {
            BackendKind::Dud => "dud",
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct PeeringConfig {
    /// Path to a peer discovery document, json5.
    pub(crate) discovery_file: String,
}
