//! The node and cluster data model.
//!
//! All of these are immutable value types: the `with_*` and `update_node`
//! constructors return a new instance and never mutate the receiver.
//! Equality is structural throughout, which is what the convergence loop's
//! change detection relies on.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A container image reference, `repository[:tag]`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageName {
    pub repository: String,
    pub tag: String,
}

impl ImageName {
    /// Parses `"repo"` or `"repo:tag"`; the tag defaults to `latest`.
    pub fn parse(s: &str) -> Self {
        match s.rsplit_once(':') {
            Some((repo, tag)) if !repo.is_empty() && !tag.contains('/') => Self {
                repository: repo.to_string(),
                tag: tag.to_string(),
            },
            _ => Self {
                repository: s.to_string(),
                tag: "latest".to_string(),
            },
        }
    }
}

impl fmt::Display for ImageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

/// An application (container) running, or desired to run, on a node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub name: String,
    pub image: ImageName,
}

impl Application {
    pub fn new(name: impl Into<String>, image: &str) -> Self {
        Self {
            name: name.into(),
            image: ImageName::parse(image),
        }
    }
}

/// A replicated volume of data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dataset {
    pub dataset_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum_size: Option<u64>,
}

impl Dataset {
    pub fn new(dataset_id: Uuid) -> Self {
        Self {
            dataset_id,
            maximum_size: None,
        }
    }
}

/// A dataset's presence on a particular node, primary or replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifestation {
    pub dataset: Dataset,
    pub primary: bool,
}

impl Manifestation {
    pub fn dataset_id(&self) -> Uuid {
        self.dataset.dataset_id
    }
}

/// Snapshot of one node: its applications, manifestations, block devices
/// and mounted paths, keyed under the node's hostname.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeState {
    pub hostname: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub applications: BTreeSet<Application>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub manifestations: BTreeMap<Uuid, Manifestation>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub devices: BTreeMap<Uuid, PathBuf>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub paths: BTreeMap<Uuid, PathBuf>,
}

impl NodeState {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            ..Self::default()
        }
    }

    pub fn with_applications(self, applications: impl IntoIterator<Item = Application>) -> Self {
        Self {
            applications: applications.into_iter().collect(),
            ..self
        }
    }

    pub fn with_manifestations(
        self,
        manifestations: impl IntoIterator<Item = Manifestation>,
    ) -> Self {
        Self {
            manifestations: manifestations
                .into_iter()
                .map(|m| (m.dataset_id(), m))
                .collect(),
            ..self
        }
    }

    pub fn with_devices(self, devices: impl IntoIterator<Item = (Uuid, PathBuf)>) -> Self {
        Self {
            devices: devices.into_iter().collect(),
            ..self
        }
    }

    pub fn with_paths(self, paths: impl IntoIterator<Item = (Uuid, PathBuf)>) -> Self {
        Self {
            paths: paths.into_iter().collect(),
            ..self
        }
    }
}

/// Desired configuration for the whole cluster, keyed by hostname.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub nodes: BTreeMap<String, NodeState>,
}

impl Deployment {
    pub fn from_nodes(nodes: impl IntoIterator<Item = NodeState>) -> Self {
        Self {
            nodes: nodes.into_iter().map(|n| (n.hostname.clone(), n)).collect(),
        }
    }

    pub fn node(&self, hostname: &str) -> Option<&NodeState> {
        self.nodes.get(hostname)
    }
}

/// Last-reported state of every node in the cluster, keyed by hostname.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentState {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub nodes: BTreeMap<String, NodeState>,
}

impl DeploymentState {
    pub fn from_nodes(nodes: impl IntoIterator<Item = NodeState>) -> Self {
        Self {
            nodes: nodes.into_iter().map(|n| (n.hostname.clone(), n)).collect(),
        }
    }

    pub fn node(&self, hostname: &str) -> Option<&NodeState> {
        self.nodes.get(hostname)
    }

    /// Returns a copy of the cluster state with `node` substituted for
    /// whatever was previously recorded under its hostname.
    pub fn update_node(&self, node: NodeState) -> Self {
        let mut nodes = self.nodes.clone();
        nodes.insert(node.hostname.clone(), node);
        Self { nodes }
    }
}
