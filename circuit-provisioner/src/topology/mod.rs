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

//! Topology layer: the resource model, the NRM parser, and the
//! atomic-swap store the rest of the engine reads snapshots from.

mod label_set;
mod model;
mod nrm;
mod store;

pub use label_set::{LabelParseError, LabelSet};
pub use model::{LabelCapacity, Network, Port, PortAttribute, PortKey, RemoteLink, Topology};
pub use nrm::parse_nrm;
pub use store::TopologyStore;
