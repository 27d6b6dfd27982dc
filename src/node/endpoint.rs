//! ZCL endpoint: a cluster registry plus the tasks serving it.

use log::info;

use crate::error::{RegistryError, Result};
use crate::local::LocalProcessor;
use crate::local::context::LocalEnv;
use crate::node::ports::Transport;
use crate::remote::RemoteManager;
use crate::scheduler::{Ticks, earliest_wake};
use crate::zcl::cluster::Cluster;

pub struct ZclEndpoint {
    id: u8,
    profile_id: u16,
    /// Sorted by cluster id.
    clusters: Vec<Cluster>,
    local: Option<LocalProcessor>,
    remote: Option<RemoteManager>,
}

impl ZclEndpoint {
    /// An endpoint with no clusters and neither task attached.
    pub fn new(id: u8, profile_id: u16) -> Self {
        Self {
            id,
            profile_id,
            clusters: Vec::new(),
            local: None,
            remote: None,
        }
    }

    /// Serve attribute requests received on this endpoint.
    #[must_use]
    pub fn with_local_processor(mut self, local: LocalProcessor) -> Self {
        self.local = Some(local);
        self
    }

    /// Issue attribute requests from this endpoint.
    #[must_use]
    pub fn with_remote_manager(mut self, remote: RemoteManager) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn profile_id(&self) -> u16 {
        self.profile_id
    }

    pub fn add_cluster(&mut self, cluster: Cluster) -> Result<()> {
        let pos = match self.clusters.binary_search_by_key(&cluster.id(), Cluster::id) {
            Ok(_) => return Err(RegistryError::DuplicateCluster.into()),
            Err(pos) => pos,
        };
        info!("endpoint {}: cluster 0x{:04X} registered", self.id, cluster.id());
        self.clusters.insert(pos, cluster);
        Ok(())
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn cluster(&self, cluster_id: u16) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.id() == cluster_id)
    }

    pub fn cluster_mut(&mut self, cluster_id: u16) -> Option<&mut Cluster> {
        self.clusters.iter_mut().find(|c| c.id() == cluster_id)
    }

    pub fn local(&self) -> Option<&LocalProcessor> {
        self.local.as_ref()
    }

    pub fn local_mut(&mut self) -> Option<&mut LocalProcessor> {
        self.local.as_mut()
    }

    pub fn remote(&self) -> Option<&RemoteManager> {
        self.remote.as_ref()
    }

    pub fn remote_mut(&mut self) -> Option<&mut RemoteManager> {
        self.remote.as_mut()
    }

    /// Tick every task that is due. Returns true if anything ran.
    pub(crate) fn run_due(&mut self, transport: &mut dyn Transport, now: Ticks) -> bool {
        let mut ran = false;

        if let Some(local) = self.local.as_mut() {
            if local.task().is_due(now) {
                let mut env = LocalEnv {
                    endpoint_id: self.id,
                    profile_id: self.profile_id,
                    clusters: &mut self.clusters,
                    transport,
                };
                let status = local.tick(&mut env);
                local.task().apply(status, now);
                ran = true;
            }
        }

        if let Some(remote) = self.remote.as_mut() {
            if remote.task().is_due(now) {
                let status = remote.tick(now);
                remote.task().apply(status, now);
                ran = true;
            }
        }

        ran
    }

    /// Earliest wake time across this endpoint's tasks.
    pub(crate) fn next_wake(&self, now: Ticks) -> Option<Ticks> {
        let local = self.local.as_ref().and_then(|l| l.task().wake_at(now));
        let remote = self.remote.as_ref().and_then(|r| r.task().wake_at(now));
        earliest_wake(local, remote, now)
    }
}
