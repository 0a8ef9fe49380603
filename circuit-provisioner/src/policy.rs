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

//! Policy enforcement gating paths and label allocations.
//!
//! Segment rules are pairwise and evaluated for every hop; connection
//! rules are configuration-driven toggles checked once per request.

use crate::error::ProvisionError;
use crate::topology::Port;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::debug;

use crate::observability::events;

const COMPONENT: &str = "policy";

/// The rule a `PolicyViolation` names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PolicyRule {
    RestrictTransit,
    HostDn,
    RequireTrace,
    RequireUser,
    Aggregator,
}

impl fmt::Display for PolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PolicyRule::RestrictTransit => "restricttransit",
            PolicyRule::HostDn => "hostdn",
            PolicyRule::RequireTrace => "requiretrace",
            PolicyRule::RequireUser => "requireuser",
            PolicyRule::Aggregator => "aggregator",
        };
        write!(f, "{name}")
    }
}

/// Process-wide policy switches, drawn from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyToggle {
    RequireTrace,
    RequireUser,
    /// Permission to delegate sub-segments to peer networks. Absence
    /// fails any request whose path crosses a peer.
    Aggregator,
}

/// Caller-supplied request attributes, filled in by the transport layer.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Authenticated user attribute, when present.
    pub user: Option<String>,
    /// Authenticated host identity, matched against `hostdn` tags.
    pub identity: Option<String>,
    /// Trace/session context propagated from the requester.
    pub trace_id: Option<String>,
}

/// Evaluates security attributes and pairwise restrictions before a
/// path or label allocation is committed.
pub struct PolicyEngine {
    toggles: HashSet<PolicyToggle>,
}

impl PolicyEngine {
    pub fn new(toggles: HashSet<PolicyToggle>) -> Self {
        Self { toggles }
    }

    pub fn is_enabled(&self, toggle: PolicyToggle) -> bool {
        self.toggles.contains(&toggle)
    }

    /// Pairwise rules for one segment. All must pass.
    pub fn check_segment(
        &self,
        a: &Port,
        b: &Port,
        ctx: &RequestContext,
    ) -> Result<(), ProvisionError> {
        if a.restrict_transit() && b.restrict_transit() {
            debug!(
                event = events::POLICY_DENIED,
                component = COMPONENT,
                rule = %PolicyRule::RestrictTransit,
                port_a = a.name.as_str(),
                port_b = b.name.as_str(),
                "segment denied"
            );
            return Err(ProvisionError::PolicyViolation(PolicyRule::RestrictTransit));
        }

        for port in [a, b] {
            if let Some(dn) = port.host_dn() {
                if ctx.identity.as_deref() != Some(dn) {
                    debug!(
                        event = events::POLICY_DENIED,
                        component = COMPONENT,
                        rule = %PolicyRule::HostDn,
                        port = port.name.as_str(),
                        "segment denied"
                    );
                    return Err(ProvisionError::PolicyViolation(PolicyRule::HostDn));
                }
            }
        }

        Ok(())
    }

    /// Connection-level toggles, checked once per request. Returns the
    /// rules that were actually evaluated and satisfied, for audit.
    pub fn check_request(
        &self,
        ctx: &RequestContext,
        uses_peers: bool,
    ) -> Result<Vec<PolicyRule>, ProvisionError> {
        let mut satisfied = Vec::new();

        if self.is_enabled(PolicyToggle::RequireTrace) {
            if ctx.trace_id.is_none() {
                return Err(ProvisionError::PolicyViolation(PolicyRule::RequireTrace));
            }
            satisfied.push(PolicyRule::RequireTrace);
        }

        if self.is_enabled(PolicyToggle::RequireUser) {
            if ctx.user.is_none() {
                return Err(ProvisionError::PolicyViolation(PolicyRule::RequireUser));
            }
            satisfied.push(PolicyRule::RequireUser);
        }

        if uses_peers {
            if !self.is_enabled(PolicyToggle::Aggregator) {
                return Err(ProvisionError::PolicyViolation(PolicyRule::Aggregator));
            }
            satisfied.push(PolicyRule::Aggregator);
        }

        Ok(satisfied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{LabelCapacity, Port, PortAttribute};

    fn port(name: &str, attributes: Vec<PortAttribute>) -> Port {
        Port {
            name: name.to_string(),
            remote: None,
            label: LabelCapacity::Trunk,
            bandwidth: 1000,
            interface: "em0".to_string(),
            attributes,
        }
    }

    fn engine(toggles: &[PolicyToggle]) -> PolicyEngine {
        PolicyEngine::new(toggles.iter().copied().collect())
    }

    #[test]
    fn restricttransit_denies_only_when_both_ports_carry_the_tag() {
        let tagged_a = port("bon", vec![PortAttribute::RestrictTransit]);
        let tagged_b = port("cur", vec![PortAttribute::RestrictTransit]);
        let plain = port("ps", vec![]);
        let ctx = RequestContext::default();
        let policy = engine(&[]);

        assert_eq!(
            policy.check_segment(&tagged_a, &tagged_b, &ctx),
            Err(ProvisionError::PolicyViolation(PolicyRule::RestrictTransit))
        );
        assert!(policy.check_segment(&tagged_a, &plain, &ctx).is_ok());
        assert!(policy.check_segment(&plain, &plain, &ctx).is_ok());
    }

    #[test]
    fn hostdn_requires_matching_caller_identity() {
        let guarded = port(
            "cur",
            vec![PortAttribute::HostDn("curacao.example.net".to_string())],
        );
        let plain = port("ps", vec![]);
        let policy = engine(&[]);

        let anonymous = RequestContext::default();
        assert_eq!(
            policy.check_segment(&guarded, &plain, &anonymous),
            Err(ProvisionError::PolicyViolation(PolicyRule::HostDn))
        );

        let matching = RequestContext {
            identity: Some("curacao.example.net".to_string()),
            ..Default::default()
        };
        assert!(policy.check_segment(&guarded, &plain, &matching).is_ok());

        let wrong = RequestContext {
            identity: Some("intruder.example.net".to_string()),
            ..Default::default()
        };
        assert_eq!(
            policy.check_segment(&guarded, &plain, &wrong),
            Err(ProvisionError::PolicyViolation(PolicyRule::HostDn))
        );
    }

    #[test]
    fn request_toggles_are_configuration_driven() {
        let ctx = RequestContext::default();

        assert!(engine(&[]).check_request(&ctx, false).is_ok());
        assert_eq!(
            engine(&[PolicyToggle::RequireTrace]).check_request(&ctx, false),
            Err(ProvisionError::PolicyViolation(PolicyRule::RequireTrace))
        );
        assert_eq!(
            engine(&[PolicyToggle::RequireUser]).check_request(&ctx, false),
            Err(ProvisionError::PolicyViolation(PolicyRule::RequireUser))
        );

        let full_ctx = RequestContext {
            user: Some("alice".to_string()),
            trace_id: Some("t-1".to_string()),
            ..Default::default()
        };
        let satisfied = engine(&[PolicyToggle::RequireTrace, PolicyToggle::RequireUser])
            .check_request(&full_ctx, false)
            .unwrap();
        assert_eq!(
            satisfied,
            vec![PolicyRule::RequireTrace, PolicyRule::RequireUser]
        );
    }

    #[test]
    fn delegation_requires_the_aggregator_toggle() {
        let ctx = RequestContext::default();
        assert_eq!(
            engine(&[]).check_request(&ctx, true),
            Err(ProvisionError::PolicyViolation(PolicyRule::Aggregator))
        );
        assert_eq!(
            engine(&[PolicyToggle::Aggregator])
                .check_request(&ctx, true)
                .unwrap(),
            vec![PolicyRule::Aggregator]
        );
    }
}
