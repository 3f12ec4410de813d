//! Windowed centrality from contact history
//!
//! Both algorithms look at the last `epochs` windows of `time_window`
//! seconds each. S-window averages the number of *unique* peers
//! encountered per window; C-window averages the total contact count per
//! window. Local centrality restricts encounters to members of the local
//! community. Values are memoized and recomputed at most every
//! `compute_interval` seconds.

use std::collections::BTreeSet;

use crate::error::SimResult;
use crate::host::HostId;
use crate::settings::Settings;

use super::contact::ContactHistory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CentralityAlgorithm {
    SWindow,
    CWindow,
}

#[derive(Debug, Clone)]
pub struct CentralityConfig {
    pub algorithm: CentralityAlgorithm,
    /// Window length in seconds
    pub time_window: f64,
    /// Minimum seconds between recomputations
    pub compute_interval: f64,
    /// Number of windows averaged
    pub epochs: usize,
}

impl Default for CentralityConfig {
    fn default() -> Self {
        Self {
            algorithm: CentralityAlgorithm::SWindow,
            time_window: 21_600.0,
            compute_interval: 600.0,
            epochs: 5,
        }
    }
}

impl CentralityConfig {
    pub fn from_settings(settings: &Settings, algorithm: CentralityAlgorithm) -> SimResult<Self> {
        Ok(Self {
            algorithm,
            time_window: settings.get_f64_or("Centrality.timeWindow", 21_600.0)?,
            compute_interval: settings.get_f64_or("Centrality.computeInterval", 600.0)?,
            epochs: settings.get_usize_or("Centrality.epochCount", 5)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Centrality {
    config: CentralityConfig,
    global_cache: f64,
    global_at: f64,
    local_cache: f64,
    local_at: f64,
}

impl Centrality {
    pub fn new(config: CentralityConfig) -> Self {
        Self {
            config,
            global_cache: 0.0,
            global_at: f64::NEG_INFINITY,
            local_cache: 0.0,
            local_at: f64::NEG_INFINITY,
        }
    }

    /// Centrality over all encountered hosts
    pub fn global(&mut self, history: &ContactHistory, now: f64) -> f64 {
        if now - self.global_at < self.config.compute_interval {
            return self.global_cache;
        }
        self.global_cache = self.compute(history, None, now);
        self.global_at = now;
        self.global_cache
    }

    /// Centrality restricted to local community members
    pub fn local(
        &mut self,
        history: &ContactHistory,
        community: &BTreeSet<HostId>,
        now: f64,
    ) -> f64 {
        if now - self.local_at < self.config.compute_interval {
            return self.local_cache;
        }
        self.local_cache = self.compute(history, Some(community), now);
        self.local_at = now;
        self.local_cache
    }

    fn compute(
        &self,
        history: &ContactHistory,
        community: Option<&BTreeSet<HostId>>,
        now: f64,
    ) -> f64 {
        let tw = self.config.time_window;
        let epochs = self.config.epochs.max(1);
        let mut sum = 0.0;
        for epoch in 0..epochs {
            let w1 = now - epoch as f64 * tw;
            let w0 = w1 - tw;
            let counts = history.window_contacts(w0, w1, now);
            let value: usize = counts
                .iter()
                .filter(|(peer, _)| community.is_none_or(|c| c.contains(peer)))
                .map(|(_, n)| match self.config.algorithm {
                    CentralityAlgorithm::SWindow => 1,
                    CentralityAlgorithm::CWindow => *n,
                })
                .sum();
            sum += value as f64;
        }
        sum / epochs as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_history() -> ContactHistory {
        let mut history = ContactHistory::new();
        // Peer 1: two contacts in the most recent window
        history.connection_up(HostId(1), 10.0);
        history.connection_down(HostId(1), 20.0);
        history.connection_up(HostId(1), 40.0);
        history.connection_down(HostId(1), 50.0);
        // Peer 2: one contact
        history.connection_up(HostId(2), 30.0);
        history.connection_down(HostId(2), 60.0);
        history
    }

    fn make_centrality(algorithm: CentralityAlgorithm) -> Centrality {
        Centrality::new(CentralityConfig {
            algorithm,
            time_window: 100.0,
            compute_interval: 0.0,
            epochs: 1,
        })
    }

    #[test]
    fn test_swindow_counts_unique_peers() {
        let mut centrality = make_centrality(CentralityAlgorithm::SWindow);
        assert_eq!(centrality.global(&make_history(), 100.0), 2.0);
    }

    #[test]
    fn test_cwindow_counts_contacts() {
        let mut centrality = make_centrality(CentralityAlgorithm::CWindow);
        assert_eq!(centrality.global(&make_history(), 100.0), 3.0);
    }

    #[test]
    fn test_local_restricts_to_community() {
        let mut centrality = make_centrality(CentralityAlgorithm::SWindow);
        let community: BTreeSet<HostId> = [HostId(0), HostId(2)].into();
        assert_eq!(centrality.local(&make_history(), &community, 100.0), 1.0);
    }

    #[test]
    fn test_epoch_averaging() {
        let mut centrality = Centrality::new(CentralityConfig {
            algorithm: CentralityAlgorithm::SWindow,
            time_window: 50.0,
            compute_interval: 0.0,
            epochs: 2,
        });
        // At t=100: window (50,100] sees peer 2 (ends at 60); window (0,50]
        // sees peers 1 and 2
        let value = centrality.global(&make_history(), 100.0);
        assert!((value - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_memoization_honors_compute_interval() {
        let mut centrality = Centrality::new(CentralityConfig {
            algorithm: CentralityAlgorithm::SWindow,
            time_window: 100.0,
            compute_interval: 1_000.0,
            epochs: 1,
        });
        let history = make_history();
        let first = centrality.global(&history, 100.0);
        let mut grown = history.clone();
        grown.connection_up(HostId(7), 150.0);
        grown.connection_down(HostId(7), 160.0);
        // Within the compute interval the cached value is returned
        assert_eq!(centrality.global(&grown, 200.0), first);
    }
}
