//! Encounter-count popularity ranking
//!
//! A connection listener records one contact event per host per finished
//! contact; the report ranks hosts by how often they were encountered.
//! The collector is a concurrent map so shared listener handles can record
//! without coordination, but replay itself is single-threaded.

use std::fmt::Write as _;
use std::path::PathBuf;

use dashmap::DashMap;

use drift_core::{
    ConnectionListener, HostId, MessageListener, Report, SimResult, UpdateListener, World,
};

use crate::{report_path, write_report};

/// Per-host log of finished contacts: (end time, peer)
#[derive(Debug, Default)]
pub struct ContactLog {
    open: DashMap<(HostId, HostId), f64>,
    events: DashMap<HostId, Vec<(f64, HostId)>>,
}

impl ContactLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(a: HostId, b: HostId) -> (HostId, HostId) {
        if a <= b { (a, b) } else { (b, a) }
    }

    pub fn connected(&self, a: HostId, b: HostId, time: f64) {
        self.open.entry(Self::key(a, b)).or_insert(time);
    }

    pub fn disconnected(&self, a: HostId, b: HostId, time: f64) {
        let Some((_, start)) = self.open.remove(&Self::key(a, b)) else {
            // Disconnect without a recorded start (trace edge), ignored
            return;
        };
        if time > start {
            self.events.entry(a).or_default().push((time, b));
            self.events.entry(b).or_default().push((time, a));
        }
    }

    pub fn contact_count(&self, host: HostId) -> usize {
        self.events.get(&host).map(|e| e.len()).unwrap_or(0)
    }
}

/// Ranks hosts by total finished-contact count
#[derive(Debug)]
pub struct GlobalPopularityReport {
    path: PathBuf,
    log: ContactLog,
}

impl GlobalPopularityReport {
    pub fn new(dir: &str, scenario: &str) -> Self {
        Self {
            path: report_path(dir, scenario, "GlobalPopularityReport"),
            log: ContactLog::new(),
        }
    }
}

impl ConnectionListener for GlobalPopularityReport {
    fn hosts_connected(&mut self, a: HostId, b: HostId, time: f64) {
        self.log.connected(a, b, time);
    }

    fn hosts_disconnected(&mut self, a: HostId, b: HostId, time: f64) {
        self.log.disconnected(a, b, time);
    }
}

impl MessageListener for GlobalPopularityReport {}
impl UpdateListener for GlobalPopularityReport {}

impl Report for GlobalPopularityReport {
    fn done(&mut self, world: &World) -> SimResult<()> {
        let mut ranking: Vec<(HostId, usize)> = world
            .hosts()
            .iter()
            .map(|h| (h.address, self.log.contact_count(h.address)))
            .collect();
        ranking.sort_by(|(ha, ca), (hb, cb)| cb.cmp(ca).then(ha.cmp(hb)));

        let mut out = String::new();
        for (rank, (host, count)) in ranking.iter().enumerate() {
            let _ = writeln!(out, "{} {} {}", rank + 1, world.host(*host).name, count);
        }
        write_report(&self.path, &out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contact_log_counts_both_sides() {
        let log = ContactLog::new();
        log.connected(HostId(0), HostId(1), 10.0);
        log.disconnected(HostId(1), HostId(0), 20.0);
        assert_eq!(log.contact_count(HostId(0)), 1);
        assert_eq!(log.contact_count(HostId(1)), 1);
        assert_eq!(log.contact_count(HostId(2)), 0);
    }

    #[test]
    fn test_zero_length_contact_ignored() {
        let log = ContactLog::new();
        log.connected(HostId(0), HostId(1), 10.0);
        log.disconnected(HostId(0), HostId(1), 10.0);
        assert_eq!(log.contact_count(HostId(0)), 0);
    }

    #[test]
    fn test_disconnect_without_start_ignored() {
        let log = ContactLog::new();
        log.disconnected(HostId(0), HostId(1), 10.0);
        assert_eq!(log.contact_count(HostId(0)), 0);
    }
}
