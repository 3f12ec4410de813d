//! Bubble Rap community structure report
//!
//! Queries every host whose router exposes a local community view and
//! writes the *unique* community sets found across all hosts: in a
//! converged run whole cliques share one identical local community, so
//! deduplication is what reveals how many distinct communities actually
//! formed. Unique communities are listed largest first.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::path::PathBuf;

use drift_core::{
    ConnectionListener, HostId, MessageListener, Report, SimResult, UpdateListener, World,
};

use crate::{report_path, write_report};

#[derive(Debug)]
pub struct CommunityReport {
    path: PathBuf,
}

impl CommunityReport {
    pub fn new(dir: &str, scenario: &str) -> Self {
        Self {
            path: report_path(dir, scenario, "CommunityReport"),
        }
    }

    fn render(world: &World) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Community report at sim time {}",
            world.clock().time() as u64
        );
        let _ = writeln!(out, "--------------------------------------------------");

        let mut queried = 0usize;
        let mut capable = 0usize;
        // Set of sets for automatic deduplication
        let mut unique: BTreeSet<BTreeSet<HostId>> = BTreeSet::new();
        for host in world.hosts() {
            queried += 1;
            let Some(bubble) = host.router.as_bubble() else {
                continue;
            };
            capable += 1;
            let community = bubble.local_community();
            if !community.is_empty() {
                unique.insert(community.clone());
            }
        }

        if capable == 0 {
            let _ = writeln!(out, "No hosts with community-reporting routers found.");
        } else {
            let _ = writeln!(
                out,
                "Queried {queried} nodes. Found {capable} nodes capable of reporting communities."
            );
            let _ = writeln!(out, "Found {} unique communities:", unique.len());

            // Largest communities first; the stable sort keeps the set
            // order for equal sizes, so output stays deterministic
            let mut sorted: Vec<&BTreeSet<HostId>> = unique.iter().collect();
            sorted.sort_by(|a, b| b.len().cmp(&a.len()));

            for (index, community) in sorted.iter().enumerate() {
                let mut members: Vec<&str> = community
                    .iter()
                    .map(|&member| world.host(member).name.as_str())
                    .collect();
                members.sort_unstable();
                let _ = writeln!(
                    out,
                    "Community {} (size {}): [{}]",
                    index + 1,
                    community.len(),
                    members.join(", ")
                );
            }
        }

        let _ = writeln!(out, "--------------------------------------------------");
        out
    }
}

impl MessageListener for CommunityReport {}
impl ConnectionListener for CommunityReport {}
impl UpdateListener for CommunityReport {}

impl Report for CommunityReport {
    fn done(&mut self, world: &World) -> SimResult<()> {
        write_report(&self.path, &Self::render(world))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drift_core::routing::{
        BubbleConfig, CommunityAlgorithm, CommunityConfig,
    };
    use drift_core::{Coord, Interface, Movement, Router, RouterConfig, WorldConfig};

    fn bubble_world() -> World {
        let mut world = World::new(WorldConfig {
            update_interval: 1.0,
            simulate_connections: false,
            ..Default::default()
        });
        let config = RouterConfig::BubbleRap(BubbleConfig {
            community: CommunityConfig {
                algorithm: CommunityAlgorithm::KClique,
                k: 5,
                familiar_threshold: 10.0,
            },
            ..Default::default()
        });
        for _ in 0..3 {
            world.add_host(
                "n",
                Some(Coord::new(0.0, 0.0)),
                Movement::Stationary,
                vec![Interface::new(10.0, 250_000.0)],
                Router::new(&config, 1_000_000, None),
            );
        }
        world
    }

    #[test]
    fn test_duplicate_communities_collapse() {
        let mut world = bubble_world();
        // A long contact makes hosts 0 and 1 mutually familiar: both end
        // up reporting the identical community {n0, n1}
        world.connect_hosts(HostId(0), HostId(1));
        world.run_until(50.0).unwrap();
        world.disconnect_hosts(HostId(0), HostId(1));

        let text = CommunityReport::render(&world);
        assert!(text.contains("Queried 3 nodes. Found 3 nodes capable"));
        // {n0, n1} shared by two hosts plus the singletons {n2}
        assert!(text.contains("Found 2 unique communities:"), "{text}");
        assert!(text.contains("Community 1 (size 2): [n0, n1]"));
        assert!(text.contains("Community 2 (size 1): [n2]"));
    }

    #[test]
    fn test_sorted_by_size_descending() {
        let mut world = bubble_world();
        world.connect_hosts(HostId(1), HostId(2));
        world.run_until(50.0).unwrap();
        world.disconnect_hosts(HostId(1), HostId(2));

        let text = CommunityReport::render(&world);
        let first = text.lines().position(|l| l.starts_with("Community 1")).unwrap();
        let second = text.lines().position(|l| l.starts_with("Community 2")).unwrap();
        assert!(first < second);
        assert!(text.contains("Community 1 (size 2): [n1, n2]"));
        assert!(text.contains("Community 2 (size 1): [n0]"));
    }

    #[test]
    fn test_no_capable_hosts_message() {
        let mut world = World::new(WorldConfig::default());
        world.add_host(
            "e",
            Some(Coord::new(0.0, 0.0)),
            Movement::Stationary,
            vec![],
            Router::new(&RouterConfig::Epidemic, 1_000, None),
        );
        let text = CommunityReport::render(&world);
        assert!(text.contains("No hosts with community-reporting routers found."));
    }
}
