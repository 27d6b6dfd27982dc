//! Cluster instances and their attribute registries.
//!
//! Attributes are kept in a vector sorted by ascending attribute id, so
//! discovery and read iteration can walk it in order. Standard and
//! manufacturer specific attributes may share an id; the pair
//! (vendor id, attribute id) is unique.

use log::info;

use super::attr::Attribute;
use crate::error::{RegistryError, Result};
use crate::node::ports::RecordStore;

/// Whether the cluster instance is the server or the client side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClusterRole {
    Server,
    Client,
}

#[derive(Debug)]
pub struct Cluster {
    id: u16,
    role: ClusterRole,
    attrs: Vec<Attribute>,
    record_tag: Option<u16>,
}

impl Cluster {
    pub fn new(id: u16, role: ClusterRole) -> Self {
        Self {
            id,
            role,
            attrs: Vec::new(),
            record_tag: None,
        }
    }

    /// Attach the record store tag holding this cluster's persistent data.
    #[must_use]
    pub fn with_record_tag(mut self, tag: u16) -> Self {
        self.record_tag = Some(tag);
        self
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn role(&self) -> ClusterRole {
        self.role
    }

    pub fn is_server(&self) -> bool {
        self.role == ClusterRole::Server
    }

    pub fn record_tag(&self) -> Option<u16> {
        self.record_tag
    }

    /// All attributes, in ascending id order.
    pub fn attrs(&self) -> &[Attribute] {
        &self.attrs
    }

    /// Register an attribute, keeping the list sorted by id.
    pub fn add_attr(&mut self, attr: Attribute) -> Result<()> {
        let (vendor_id, attr_id) = (attr.vendor_id(), attr.id());
        if self.attr_index(vendor_id, attr_id).is_some() {
            return Err(RegistryError::DuplicateAttribute.into());
        }
        let pos = self
            .attrs
            .iter()
            .position(|a| a.id() >= attr_id)
            .unwrap_or(self.attrs.len());
        self.attrs.insert(pos, attr);
        Ok(())
    }

    pub fn attr_index(&self, vendor_id: u16, attr_id: u16) -> Option<usize> {
        self.attrs
            .iter()
            .position(|a| a.vendor_id() == vendor_id && a.id() == attr_id)
    }

    pub fn attr(&self, vendor_id: u16, attr_id: u16) -> Option<&Attribute> {
        self.attr_index(vendor_id, attr_id).map(|i| &self.attrs[i])
    }

    pub fn attr_mut(&mut self, vendor_id: u16, attr_id: u16) -> Option<&mut Attribute> {
        let idx = self.attr_index(vendor_id, attr_id)?;
        self.attrs.get_mut(idx)
    }

    /// Create the cluster's persistent record with `defaults` if it does
    /// not exist yet. Clusters without a record tag succeed immediately.
    pub fn init_record<S: RecordStore + ?Sized>(&self, store: &mut S, defaults: &[u8]) -> Result<()> {
        let Some(tag) = self.record_tag else {
            return Ok(());
        };
        if store.exists(tag) {
            return Ok(());
        }
        store.write(tag, defaults)?;
        info!("cluster 0x{:04X}: created record 0x{:04X}", self.id, tag);
        Ok(())
    }
}
