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

//! Cross-domain path computation and segment aggregation.
//!
//! Routes are composed of per-network segments. Within the local
//! topology a route is a single direct segment; toward remote networks
//! the search follows remote links through peer-registry summaries,
//! excluding already-visited networks and bounding the delegation
//! depth. No label swapping: the whole path carries one label set,
//! narrowed by intersection at every traversed port.

use crate::error::ProvisionError;
use crate::peer::PeerSummary;
use crate::policy::{PolicyEngine, RequestContext};
use crate::topology::{LabelSet, Network, Port, PortKey, Topology};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::observability::events;

const COMPONENT: &str = "pathfinder";

/// One hop of a path: ingress and egress port within one network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentPlan {
    pub network: String,
    pub ingress: String,
    pub egress: String,
    pub owner: SegmentOwner,
}

impl SegmentPlan {
    pub fn ingress_key(&self) -> PortKey {
        PortKey::new(&self.network, &self.ingress)
    }

    pub fn egress_key(&self) -> PortKey {
        PortKey::new(&self.network, &self.egress)
    }
}

/// Who provisions a segment: the local backend or a delegated peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentOwner {
    Local,
    /// Peer NSA identity the segment is delegated to.
    Peer(String),
}

/// An ordered route with its narrowed label constraint.
#[derive(Debug, Clone)]
pub struct Path {
    pub segments: Vec<SegmentPlan>,
    /// `None` when every traversed port is a trunk.
    pub labels: Option<LabelSet>,
}

impl Path {
    /// True when any segment is delegated to a peer.
    pub fn uses_peers(&self) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s.owner, SegmentOwner::Peer(_)))
    }

    fn distinct_peers(&self) -> usize {
        let mut peers: Vec<&str> = self
            .segments
            .iter()
            .filter_map(|s| match &s.owner {
                SegmentOwner::Peer(name) => Some(name.as_str()),
                SegmentOwner::Local => None,
            })
            .collect();
        peers.sort_unstable();
        peers.dedup();
        peers.len()
    }

    fn port_id_concat(&self) -> String {
        let parts: Vec<String> = self
            .segments
            .iter()
            .flat_map(|s| [s.ingress_key().to_string(), s.egress_key().to_string()])
            .collect();
        parts.join(",")
    }
}

/// Path computation over one topology and peer-summary snapshot.
pub struct PathFinder<'a> {
    topology: &'a Topology,
    peers: &'a HashMap<String, Arc<PeerSummary>>,
    policy: &'a PolicyEngine,
    max_depth: usize,
}

enum NetworkView<'a> {
    Local(&'a Network),
    Peer { network: &'a Network, peer: &'a str },
}

impl<'a> NetworkView<'a> {
    fn network(&self) -> &'a Network {
        match self {
            NetworkView::Local(network) => network,
            NetworkView::Peer { network, .. } => network,
        }
    }

    fn owner(&self) -> SegmentOwner {
        match self {
            NetworkView::Local(_) => SegmentOwner::Local,
            NetworkView::Peer { peer, .. } => SegmentOwner::Peer(peer.to_string()),
        }
    }
}

impl<'a> PathFinder<'a> {
    pub fn new(
        topology: &'a Topology,
        peers: &'a HashMap<String, Arc<PeerSummary>>,
        policy: &'a PolicyEngine,
        max_depth: usize,
    ) -> Self {
        Self {
            topology,
            peers,
            policy,
            max_depth,
        }
    }

    /// Computes a route from a local source port to a destination
    /// network+port, under an optional requested label constraint.
    pub fn find(
        &self,
        source: &PortKey,
        dest: &PortKey,
        constraint: Option<&LabelSet>,
        ctx: &RequestContext,
    ) -> Result<Path, ProvisionError> {
        // source must be fully modeled locally
        self.topology.port(source)?;

        let dest_view = self
            .lookup(&dest.network)
            .ok_or_else(|| ProvisionError::NetworkNotFound(dest.network.clone()))?;
        if dest_view.network().port(&dest.port).is_none() {
            return Err(ProvisionError::PortNotFound {
                network: dest.network.clone(),
                port: dest.port.clone(),
            });
        }

        if source.network == dest.network {
            return self.direct(source, dest, constraint, ctx);
        }

        let mut visited = vec![source.network.clone()];
        let candidates = self.search(
            &source.network,
            &source.port,
            dest,
            constraint.cloned(),
            &mut visited,
            ctx,
        );

        let chosen = candidates.into_iter().min_by(|a, b| {
            (a.segments.len(), a.distinct_peers(), a.port_id_concat()).cmp(&(
                b.segments.len(),
                b.distinct_peers(),
                b.port_id_concat(),
            ))
        });

        match chosen {
            Some(path) => {
                debug!(
                    event = events::PATH_SELECTED,
                    component = COMPONENT,
                    segments = path.segments.len(),
                    peers = path.distinct_peers(),
                    "path selected"
                );
                Ok(path)
            }
            None => {
                debug!(
                    event = events::PATH_NOT_FOUND,
                    component = COMPONENT,
                    source = %source,
                    dest = %dest,
                    "no path found"
                );
                Err(ProvisionError::NoPathFound {
                    from: source.to_string(),
                    dest: dest.to_string(),
                })
            }
        }
    }

    fn lookup(&self, name: &str) -> Option<NetworkView<'a>> {
        if let Some(network) = self.topology.network(name) {
            return Some(NetworkView::Local(network));
        }
        self.peers.get(name).map(|summary| NetworkView::Peer {
            network: &summary.network,
            peer: &summary.peer,
        })
    }

    /// Single-segment route between two local ports. Policy violations
    /// here surface to the caller rather than pruning.
    fn direct(
        &self,
        source: &PortKey,
        dest: &PortKey,
        constraint: Option<&LabelSet>,
        ctx: &RequestContext,
    ) -> Result<Path, ProvisionError> {
        let no_path = || ProvisionError::NoPathFound {
            from: source.to_string(),
            dest: dest.to_string(),
        };

        if source.port == dest.port {
            return Err(no_path());
        }

        let src_port = self.topology.port(source)?;
        let dst_port = self.topology.port(dest)?;
        self.policy.check_segment(src_port, dst_port, ctx)?;

        let labels = narrow(constraint.cloned(), src_port)
            .and_then(|c| narrow(c, dst_port))
            .ok_or_else(no_path)?;

        Ok(Path {
            segments: vec![SegmentPlan {
                network: source.network.clone(),
                ingress: source.port.clone(),
                egress: dest.port.clone(),
                owner: SegmentOwner::Local,
            }],
            labels,
        })
    }

    /// All viable candidate routes from `entry_port` in `network_name`
    /// to the destination. `visited` holds every network already on the
    /// path, including the current one.
    fn search(
        &self,
        network_name: &str,
        entry_port: &str,
        dest: &PortKey,
        constraint: Option<LabelSet>,
        visited: &mut Vec<String>,
        ctx: &RequestContext,
    ) -> Vec<Path> {
        let Some(view) = self.lookup(network_name) else {
            return Vec::new();
        };
        let network = view.network();
        let Some(ingress) = network.port(entry_port) else {
            // summary does not model the handoff port; dead branch
            return Vec::new();
        };

        // arrived in the destination network: close with a final segment
        if network_name == dest.network {
            if entry_port == dest.port {
                return Vec::new();
            }
            let Some(egress) = network.port(&dest.port) else {
                return Vec::new();
            };
            if self.policy.check_segment(ingress, egress, ctx).is_err() {
                return Vec::new();
            }
            let Some(labels) = narrow(constraint, ingress).and_then(|c| narrow(c, egress)) else {
                return Vec::new();
            };
            return vec![Path {
                segments: vec![SegmentPlan {
                    network: network_name.to_string(),
                    ingress: entry_port.to_string(),
                    egress: dest.port.to_string(),
                    owner: view.owner(),
                }],
                labels,
            }];
        }

        if visited.len() >= self.max_depth {
            return Vec::new();
        }

        let mut candidates = Vec::new();
        for egress in network.ports() {
            if egress.name == entry_port {
                continue;
            }
            let Some(remote) = &egress.remote else {
                continue;
            };
            if visited.iter().any(|seen| *seen == remote.network) {
                continue;
            }
            if self.lookup(&remote.network).is_none() {
                // unknown networks prune this branch only
                continue;
            }
            if self.policy.check_segment(ingress, egress, ctx).is_err() {
                continue;
            }
            let Some(narrowed) =
                narrow(constraint.clone(), ingress).and_then(|c| narrow(c, egress))
            else {
                continue;
            };

            let segment = SegmentPlan {
                network: network_name.to_string(),
                ingress: entry_port.to_string(),
                egress: egress.name.clone(),
                owner: view.owner(),
            };

            visited.push(remote.network.clone());
            let tails = self.search(&remote.network, &remote.port, dest, narrowed, visited, ctx);
            visited.pop();

            for tail in tails {
                let mut segments = Vec::with_capacity(tail.segments.len() + 1);
                segments.push(segment.clone());
                segments.extend(tail.segments);
                candidates.push(Path {
                    segments,
                    labels: tail.labels,
                });
            }
        }

        candidates
    }
}

/// Narrows a running constraint by one port's label capacity.
/// Trunk ports impose nothing; an empty intersection yields `None`
/// (wrapped: outer `Option` = feasibility, inner = trunk-only so far).
fn narrow(constraint: Option<LabelSet>, port: &Port) -> Option<Option<LabelSet>> {
    match (constraint, port.label.label_set()) {
        (current, None) => Some(current),
        (None, Some(declared)) => Some(Some(declared.clone())),
        (Some(current), Some(declared)) => current.intersect(declared).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::{
        PeerDescription, PeerDiscoveryDocument, PeerNetworkDescription, PeerPortDescription,
        PeerRegistry,
    };
    use crate::policy::{PolicyEngine, PolicyRule, RequestContext};
    use crate::topology::{parse_nrm, PortKey, Topology};
    use std::collections::HashSet;

    const ARUBA_NRM: &str = "
ethernet     ps      -                           vlan:1780-1789  1000    em0
ethernet     bon     bonaire.net#arb-(in|out)    vlan:1780-1789  1000    em1
ethernet     dom     dominica.net#arb-(in|out)   vlan:1781-1782   500    em2
";

    fn peer_port(name: &str, remote: Option<&str>, vlans: &str) -> PeerPortDescription {
        PeerPortDescription {
            name: name.to_string(),
            remote: remote.map(str::to_string),
            vlans: Some(vlans.to_string()),
        }
    }

    fn island_peers() -> PeerRegistry {
        // ring: aruba - bonaire - curacao - dominica - aruba
        let document = PeerDiscoveryDocument {
            peers: vec![
                PeerDescription {
                    name: "bonaire-nsa".to_string(),
                    address: "https://bonaire.example.net/nsi".to_string(),
                    networks: vec![PeerNetworkDescription {
                        name: "bonaire.net".to_string(),
                        ports: vec![
                            peer_port("arb", Some("aruba.net#bon"), "1780-1789"),
                            peer_port("cur", Some("curacao.net#bon"), "1780-1789"),
                            peer_port("ps", None, "1780-1789"),
                        ],
                    }],
                },
                PeerDescription {
                    name: "curacao-nsa".to_string(),
                    address: "https://curacao.example.net/nsi".to_string(),
                    networks: vec![PeerNetworkDescription {
                        name: "curacao.net".to_string(),
                        ports: vec![
                            peer_port("bon", Some("bonaire.net#cur"), "1780-1789"),
                            peer_port("dom", Some("dominica.net#cur"), "1783-1786"),
                            peer_port("ps", None, "1780-1789"),
                        ],
                    }],
                },
                PeerDescription {
                    name: "dominica-nsa".to_string(),
                    address: "https://dominica.example.net/nsi".to_string(),
                    networks: vec![PeerNetworkDescription {
                        name: "dominica.net".to_string(),
                        ports: vec![
                            peer_port("arb", Some("aruba.net#dom"), "1781-1782"),
                            peer_port("cur", Some("curacao.net#dom"), "1783-1786"),
                            peer_port("ps", None, "1780-1789"),
                        ],
                    }],
                },
            ],
        };
        let registry = PeerRegistry::new();
        registry.refresh(&document).unwrap();
        registry
    }

    fn local_topology() -> Topology {
        let mut topology = Topology::new();
        topology
            .add_network(parse_nrm("aruba.net", ARUBA_NRM).unwrap())
            .unwrap();
        topology
    }

    fn open_policy() -> PolicyEngine {
        PolicyEngine::new(HashSet::new())
    }

    #[test]
    fn direct_local_segment_narrows_labels() {
        let topology = local_topology();
        let registry = PeerRegistry::new();
        let peers = registry.snapshot();
        let policy = open_policy();
        let finder = PathFinder::new(&topology, &peers, &policy, 5);

        let path = finder
            .find(
                &PortKey::new("aruba.net", "ps"),
                &PortKey::new("aruba.net", "dom"),
                None,
                &RequestContext::default(),
            )
            .unwrap();

        assert_eq!(path.segments.len(), 1);
        assert_eq!(path.segments[0].owner, SegmentOwner::Local);
        assert_eq!(path.labels.as_ref().unwrap().to_string(), "1781-1782");
        assert!(!path.uses_peers());
    }

    #[test]
    fn remote_destination_routes_through_peer_summaries() {
        let topology = local_topology();
        let registry = island_peers();
        let peers = registry.snapshot();
        let policy = open_policy();
        let finder = PathFinder::new(&topology, &peers, &policy, 5);

        let path = finder
            .find(
                &PortKey::new("aruba.net", "ps"),
                &PortKey::new("bonaire.net", "ps"),
                None,
                &RequestContext::default(),
            )
            .unwrap();

        // shortest route: aruba(ps->bon) then bonaire(arb->ps)
        assert_eq!(path.segments.len(), 2);
        assert_eq!(path.segments[0].egress, "bon");
        assert_eq!(path.segments[1].network, "bonaire.net");
        assert_eq!(
            path.segments[1].owner,
            SegmentOwner::Peer("bonaire-nsa".to_string())
        );
        assert_eq!(path.labels.as_ref().unwrap().to_string(), "1780-1789");
        assert!(path.uses_peers());
    }

    #[test]
    fn label_narrowing_follows_the_chain() {
        let topology = local_topology();
        let registry = island_peers();
        let peers = registry.snapshot();
        let policy = open_policy();
        let finder = PathFinder::new(&topology, &peers, &policy, 5);

        // dominica is only reachable via the 1781-1782 link from aruba
        // or via curacao's 1783-1786 link
        let path = finder
            .find(
                &PortKey::new("aruba.net", "ps"),
                &PortKey::new("dominica.net", "ps"),
                None,
                &RequestContext::default(),
            )
            .unwrap();
        assert_eq!(path.segments.len(), 2);
        assert_eq!(path.labels.unwrap().to_string(), "1781-1782");
    }

    #[test]
    fn constraint_can_force_the_longer_route() {
        let topology = local_topology();
        let registry = island_peers();
        let peers = registry.snapshot();
        let policy = open_policy();
        let finder = PathFinder::new(&topology, &peers, &policy, 5);

        // 1784 rules out the aruba-dominica link (1781-1782), leaving
        // the ring route via bonaire and curacao
        let constraint = LabelSet::single(1784);
        let path = finder
            .find(
                &PortKey::new("aruba.net", "ps"),
                &PortKey::new("dominica.net", "ps"),
                Some(&constraint),
                &RequestContext::default(),
            )
            .unwrap();

        let networks: Vec<&str> = path.segments.iter().map(|s| s.network.as_str()).collect();
        assert_eq!(
            networks,
            vec!["aruba.net", "bonaire.net", "curacao.net", "dominica.net"]
        );
        assert_eq!(path.labels.unwrap().to_string(), "1784");
    }

    #[test]
    fn depth_bound_turns_long_chains_into_no_path() {
        let topology = local_topology();
        let registry = island_peers();
        let peers = registry.snapshot();
        let policy = open_policy();

        let finder = PathFinder::new(&topology, &peers, &policy, 2);
        let constraint = LabelSet::single(1784);
        let result = finder.find(
            &PortKey::new("aruba.net", "ps"),
            &PortKey::new("dominica.net", "ps"),
            Some(&constraint),
            &RequestContext::default(),
        );
        assert!(matches!(result, Err(ProvisionError::NoPathFound { .. })));
    }

    #[test]
    fn unknown_networks_prune_branches_not_requests() {
        let topology = local_topology();
        // registry knows bonaire but not dominica; aruba's dom link is dead
        let document = PeerDiscoveryDocument {
            peers: vec![PeerDescription {
                name: "bonaire-nsa".to_string(),
                address: "https://bonaire.example.net/nsi".to_string(),
                networks: vec![PeerNetworkDescription {
                    name: "bonaire.net".to_string(),
                    ports: vec![
                        peer_port("arb", Some("aruba.net#bon"), "1780-1789"),
                        peer_port("ps", None, "1780-1789"),
                    ],
                }],
            }],
        };
        let registry = PeerRegistry::new();
        registry.refresh(&document).unwrap();
        let peers = registry.snapshot();
        let policy = open_policy();
        let finder = PathFinder::new(&topology, &peers, &policy, 5);

        // bonaire still resolves
        assert!(finder
            .find(
                &PortKey::new("aruba.net", "ps"),
                &PortKey::new("bonaire.net", "ps"),
                None,
                &RequestContext::default(),
            )
            .is_ok());

        // dominica is unknown: the whole network reference is NotFound
        assert!(matches!(
            finder.find(
                &PortKey::new("aruba.net", "ps"),
                &PortKey::new("dominica.net", "ps"),
                None,
                &RequestContext::default(),
            ),
            Err(ProvisionError::NetworkNotFound(_))
        ));
    }

    #[test]
    fn direct_segment_policy_violation_surfaces() {
        let mut topology = Topology::new();
        topology
            .add_network(
                parse_nrm(
                    "aruba.net",
                    "
ethernet  bon  bonaire.net#arb-(in|out)  vlan:1780-1789  1000  em1  restricttransit
ethernet  cur  curacao.net#arb-(in|out)  vlan:1780-1789  1000  em2  restricttransit
",
                )
                .unwrap(),
            )
            .unwrap();
        let registry = PeerRegistry::new();
        let peers = registry.snapshot();
        let policy = open_policy();
        let finder = PathFinder::new(&topology, &peers, &policy, 5);

        let result = finder.find(
            &PortKey::new("aruba.net", "bon"),
            &PortKey::new("aruba.net", "cur"),
            None,
            &RequestContext::default(),
        );
        assert_eq!(
            result.unwrap_err(),
            ProvisionError::PolicyViolation(PolicyRule::RestrictTransit)
        );
    }

    #[test]
    fn infeasible_label_constraint_is_no_path() {
        let topology = local_topology();
        let registry = PeerRegistry::new();
        let peers = registry.snapshot();
        let policy = open_policy();
        let finder = PathFinder::new(&topology, &peers, &policy, 5);

        let constraint = LabelSet::single(2999);
        let result = finder.find(
            &PortKey::new("aruba.net", "ps"),
            &PortKey::new("aruba.net", "bon"),
            Some(&constraint),
            &RequestContext::default(),
        );
        assert!(matches!(result, Err(ProvisionError::NoPathFound { .. })));
    }
}
