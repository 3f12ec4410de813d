//! Distributed community detection
//!
//! Each node grows a familiar set (peers with enough cumulative contact
//! time) and a local community. Membership is only ever added. The
//! K-clique algorithm additionally admits a connected peer whose familiar
//! set overlaps the local community in at least K members; the Simple
//! variant admits by familiar-set inclusion alone.

use std::collections::BTreeSet;

use crate::error::SimResult;
use crate::host::HostId;
use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommunityAlgorithm {
    KClique,
    Simple,
}

#[derive(Debug, Clone)]
pub struct CommunityConfig {
    pub algorithm: CommunityAlgorithm,
    /// Required overlap between a peer's familiar set and the local
    /// community for K-clique admission
    pub k: usize,
    /// Cumulative contact seconds after which a peer becomes familiar
    pub familiar_threshold: f64,
}

impl Default for CommunityConfig {
    fn default() -> Self {
        Self {
            algorithm: CommunityAlgorithm::KClique,
            k: 5,
            familiar_threshold: 700.0,
        }
    }
}

impl CommunityConfig {
    pub fn from_settings(settings: &Settings, algorithm: CommunityAlgorithm) -> SimResult<Self> {
        Ok(Self {
            algorithm,
            k: settings.get_usize_or("CommunityDetection.K", 5)?,
            familiar_threshold: settings.get_f64_or("CommunityDetection.familiarThreshold", 700.0)?,
        })
    }
}

#[derive(Debug, Clone)]
pub struct CommunityDetection {
    config: CommunityConfig,
    me: HostId,
    familiar: BTreeSet<HostId>,
    community: BTreeSet<HostId>,
}

impl CommunityDetection {
    pub fn new(config: CommunityConfig) -> Self {
        Self {
            config,
            me: HostId(usize::MAX),
            familiar: BTreeSet::new(),
            community: BTreeSet::new(),
        }
    }

    /// Bind to the owning host; the local community always contains self
    pub(crate) fn init(&mut self, me: HostId) {
        self.me = me;
        self.community.insert(me);
    }

    pub fn is_in_community(&self, host: HostId) -> bool {
        self.community.contains(&host)
    }

    pub fn community(&self) -> &BTreeSet<HostId> {
        &self.community
    }

    pub fn familiar(&self) -> &BTreeSet<HostId> {
        &self.familiar
    }

    /// A contact with `peer` came up; `peer_familiar` is the peer's
    /// current familiar set
    pub(crate) fn connection_up(&mut self, peer: HostId, peer_familiar: &BTreeSet<HostId>) {
        self.consider(peer, peer_familiar);
    }

    /// A contact with `peer` ended after `cumulative` total contact
    /// seconds across all contacts so far
    pub(crate) fn contact_ended(
        &mut self,
        peer: HostId,
        cumulative: f64,
        peer_familiar: &BTreeSet<HostId>,
    ) {
        if cumulative >= self.config.familiar_threshold && self.familiar.insert(peer) {
            // A familiar peer seeds the community; this is what lets the
            // K-overlap rule ever fire
            self.community.insert(peer);
        }
        self.consider(peer, peer_familiar);
    }

    fn consider(&mut self, peer: HostId, peer_familiar: &BTreeSet<HostId>) {
        if peer == self.me || self.community.contains(&peer) {
            return;
        }
        match self.config.algorithm {
            CommunityAlgorithm::Simple => {
                // Admission through the familiar set only
                if self.familiar.contains(&peer) {
                    self.community.insert(peer);
                }
            }
            CommunityAlgorithm::KClique => {
                let overlap = peer_familiar.intersection(&self.community).count();
                if overlap >= self.config.k {
                    self.community.insert(peer);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_detection(algorithm: CommunityAlgorithm, k: usize) -> CommunityDetection {
        let mut detection = CommunityDetection::new(CommunityConfig {
            algorithm,
            k,
            familiar_threshold: 100.0,
        });
        detection.init(HostId(0));
        detection
    }

    #[test]
    fn test_self_always_in_community() {
        let detection = make_detection(CommunityAlgorithm::KClique, 3);
        assert!(detection.is_in_community(HostId(0)));
    }

    #[test]
    fn test_familiar_requires_threshold() {
        let mut detection = make_detection(CommunityAlgorithm::KClique, 3);
        detection.contact_ended(HostId(1), 50.0, &BTreeSet::new());
        assert!(!detection.familiar().contains(&HostId(1)));
        detection.contact_ended(HostId(1), 120.0, &BTreeSet::new());
        assert!(detection.familiar().contains(&HostId(1)));
        assert!(detection.is_in_community(HostId(1)));
    }

    #[test]
    fn test_kclique_admission_by_overlap() {
        let mut detection = make_detection(CommunityAlgorithm::KClique, 2);
        // Grow the community to {0, 1, 2} through familiarity
        detection.contact_ended(HostId(1), 200.0, &BTreeSet::new());
        detection.contact_ended(HostId(2), 200.0, &BTreeSet::new());

        // Host 9 is familiar with two community members: admitted
        let peer_familiar: BTreeSet<HostId> = [HostId(1), HostId(2)].into();
        detection.connection_up(HostId(9), &peer_familiar);
        assert!(detection.is_in_community(HostId(9)));

        // Host 8 overlaps in only one member: not admitted
        let peer_familiar: BTreeSet<HostId> = [HostId(1), HostId(7)].into();
        detection.connection_up(HostId(8), &peer_familiar);
        assert!(!detection.is_in_community(HostId(8)));
    }

    #[test]
    fn test_simple_ignores_overlap() {
        let mut detection = make_detection(CommunityAlgorithm::Simple, 2);
        let peer_familiar: BTreeSet<HostId> = [HostId(0)].into();
        detection.connection_up(HostId(9), &peer_familiar);
        assert!(!detection.is_in_community(HostId(9)));

        detection.contact_ended(HostId(9), 150.0, &peer_familiar);
        assert!(detection.is_in_community(HostId(9)));
    }

    #[test]
    fn test_membership_is_additive() {
        let mut detection = make_detection(CommunityAlgorithm::KClique, 1);
        detection.contact_ended(HostId(1), 200.0, &BTreeSet::new());
        let before = detection.community().clone();
        // Later contacts never shrink the community
        detection.contact_ended(HostId(1), 0.0, &BTreeSet::new());
        assert!(detection.community().is_superset(&before));
    }
}
