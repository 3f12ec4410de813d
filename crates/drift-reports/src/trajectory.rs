//! Node position sampling

use std::fmt::Write as _;
use std::path::PathBuf;

use drift_core::{ConnectionListener, MessageListener, Report, SimResult, UpdateListener, World};

use crate::{report_path, write_report};

/// CSV of host positions sampled every `granularity` seconds
///
/// Header `SimTime,HostID,X,Y`; rows optionally restricted to hosts whose
/// name starts with a group prefix.
#[derive(Debug)]
pub struct NodeTrajectoryReport {
    path: PathBuf,
    granularity: f64,
    group_prefix: Option<String>,
    next_sample: f64,
    rows: String,
}

impl NodeTrajectoryReport {
    pub fn new(dir: &str, scenario: &str, granularity: f64, group_prefix: Option<String>) -> Self {
        Self {
            path: report_path(dir, scenario, "NodeTrajectoryReport"),
            granularity: granularity.max(0.0),
            group_prefix,
            next_sample: 0.0,
            rows: String::from("SimTime,HostID,X,Y\n"),
        }
    }

    fn sample(&mut self, world: &World) {
        let time = world.clock().time();
        for host in world.hosts() {
            if let Some(prefix) = &self.group_prefix
                && !host.name.starts_with(prefix.as_str())
            {
                continue;
            }
            let _ = writeln!(
                self.rows,
                "{:.1},{},{:.2},{:.2}",
                time, host.address.0, host.location.x, host.location.y
            );
        }
    }
}

impl UpdateListener for NodeTrajectoryReport {
    fn updated(&mut self, world: &World) {
        let time = world.clock().time();
        if time + 1e-9 < self.next_sample {
            return;
        }
        self.sample(world);
        self.next_sample = time + self.granularity;
    }
}

impl MessageListener for NodeTrajectoryReport {}
impl ConnectionListener for NodeTrajectoryReport {}

impl Report for NodeTrajectoryReport {
    fn done(&mut self, _world: &World) -> SimResult<()> {
        write_report(&self.path, &self.rows)
    }
}
