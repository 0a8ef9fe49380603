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

//! Parser for the line-oriented NRM topology description.
//!
//! Column format: `type name remote label bandwidth interface attributes`.
//! `#` starts a comment; interface fields may be double-quoted to carry
//! spaces. Malformed lines are rejected here, at load time, never at
//! request time.

use crate::error::TopologyError;
use crate::topology::label_set::LabelSet;
use crate::topology::model::{LabelCapacity, Network, Port, PortAttribute, RemoteLink};

/// Parses one NRM document into the named network.
pub fn parse_nrm(network_name: &str, source: &str) -> Result<Network, TopologyError> {
    let mut network = Network::new(network_name);

    for (index, raw_line) in source.lines().enumerate() {
        let line_no = index + 1;
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let port = parse_line(line).map_err(|reason| TopologyError::MalformedLine {
            line: line_no,
            reason,
        })?;
        network.add_port(port)?;
    }

    Ok(network)
}

fn parse_line(line: &str) -> Result<Port, String> {
    let fields = tokenize(line)?;
    if fields.len() < 6 || fields.len() > 7 {
        return Err(format!(
            "expected 6 or 7 fields, got {} in '{line}'",
            fields.len()
        ));
    }

    // `bi-ethernet` is the legacy spelling of the same port type.
    match fields[0].as_str() {
        "ethernet" | "bi-ethernet" => {}
        other => return Err(format!("unknown port type '{other}'")),
    }

    let name = fields[1].clone();
    let remote = parse_remote(&fields[2])?;
    let label = parse_label(&fields[3])?;
    let bandwidth = fields[4]
        .parse::<u64>()
        .map_err(|_| format!("bandwidth '{}' is not an integer", fields[4]))?;
    let interface = fields[5].clone();
    let attributes = match fields.get(6) {
        Some(spec) => parse_attributes(spec)?,
        None => Vec::new(),
    };

    Ok(Port {
        name,
        remote,
        label,
        bandwidth,
        interface,
        attributes,
    })
}

/// Splits a line on whitespace, honoring double-quoted fields.
fn tokenize(line: &str) -> Result<Vec<String>, String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    fields.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if in_quotes {
        return Err("unterminated quote".to_string());
    }
    if !current.is_empty() {
        fields.push(current);
    }
    Ok(fields)
}

fn parse_remote(spec: &str) -> Result<Option<RemoteLink>, String> {
    if spec == "-" {
        return Ok(None);
    }
    let (network, port_spec) = spec
        .split_once('#')
        .ok_or_else(|| format!("remote '{spec}' must be '-' or 'network#port'"))?;
    if network.is_empty() || port_spec.is_empty() {
        return Err(format!("remote '{spec}' has an empty network or port"));
    }

    let (port, prefixed) = match port_spec.strip_suffix("-(in|out)") {
        Some(base) => (base, true),
        None => (port_spec, false),
    };
    if port.is_empty() {
        return Err(format!("remote '{spec}' has an empty port"));
    }

    Ok(Some(RemoteLink {
        network: network.to_string(),
        port: port.to_string(),
        prefixed,
    }))
}

fn parse_label(spec: &str) -> Result<LabelCapacity, String> {
    if spec == "-" {
        return Ok(LabelCapacity::Trunk);
    }
    let ranges = spec
        .strip_prefix("vlan:")
        .ok_or_else(|| format!("label '{spec}' must be '-' or 'vlan:<ranges>'"))?;
    let set = LabelSet::parse(ranges).map_err(|e| e.to_string())?;
    Ok(LabelCapacity::Vlan(set))
}

fn parse_attributes(spec: &str) -> Result<Vec<PortAttribute>, String> {
    let mut attributes = Vec::new();
    for token in spec.split(',') {
        let token = token.trim();
        if token.is_empty() {
            return Err(format!("empty attribute token in '{spec}'"));
        }
        let attribute = match token.split_once('=') {
            Some(("hostdn", value)) => PortAttribute::HostDn(value.to_string()),
            Some((key, _)) if key.is_empty() => {
                return Err(format!("attribute '{token}' has an empty key"))
            }
            Some((key, value)) => PortAttribute::KeyValue(key.to_string(), value.to_string()),
            None if token == "restricttransit" => PortAttribute::RestrictTransit,
            None => return Err(format!("unknown policy token '{token}'")),
        };
        attributes.push(attribute);
    }
    Ok(attributes)
}
