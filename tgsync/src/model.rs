//! Domain types shared by the collector, the reconciler and the adapters.
//!
//! The orchestrator and the load balancer name compute nodes in different
//! identifier spaces: tasks point at a container instance ([`InstanceRef`]),
//! while the target group registers EC2 instance ids ([`NodeId`]). The
//! collector resolves one into the other explicitly.

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Task ARN, scoped to a cluster.
    TaskRef
);
string_id!(
    /// Container instance ARN (orchestrator namespace).
    InstanceRef
);
string_id!(
    /// Compute node id as registered with the load balancer (EC2 instance id).
    NodeId
);
string_id!(
    /// Stable target group handle (ARN) resolved from its name.
    TargetGroupHandle
);

/// One container of a described task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerDetail {
    pub name: String,
    pub host_ports: Vec<u16>,
}

/// Task detail as returned by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDetail {
    pub task: TaskRef,
    /// Hosting container instance; absent for tasks not placed on one (awsvpc/Fargate).
    pub instance: Option<InstanceRef>,
    pub containers: Vec<ContainerDetail>,
}

impl TaskDetail {
    /// Container whose bindings feed the target group: the named one, or the first.
    pub fn select_container(&self, name: Option<&str>) -> Option<&ContainerDetail> {
        match name {
            Some(name) => self.containers.iter().find(|c| c.name == name),
            None => self.containers.first(),
        }
    }
}

/// Container instance detail as returned by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceDetail {
    pub instance: InstanceRef,
    pub node: Option<NodeId>,
}

/// A live dynamic port binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortBinding {
    pub host_port: u16,
    pub node: NodeId,
}

/// A target to register or deregister.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub id: NodeId,
    pub port: u16,
}

/// An entry currently registered with the target group.
///
/// The registration handle needed for removal is the target id itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetGroupEntry {
    pub port: u16,
    pub target: NodeId,
    /// Reported health state, any state counts as registered.
    pub health: Option<String>,
}

impl TargetGroupEntry {
    pub fn as_target(&self) -> Target {
        Target {
            id: self.target.clone(),
            port: self.port,
        }
    }
}

/// Live host port to node mapping for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LiveSet {
    ports: BTreeMap<u16, NodeId>,
}

impl LiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a binding, returning the node previously mapped to that port.
    pub fn insert(&mut self, binding: PortBinding) -> Option<NodeId> {
        self.ports.insert(binding.host_port, binding.node)
    }

    pub fn contains_port(&self, port: u16) -> bool {
        self.ports.contains_key(&port)
    }

    pub fn get(&self, port: u16) -> Option<&NodeId> {
        self.ports.get(&port)
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, u16, NodeId> {
        self.ports.iter()
    }
}

impl FromIterator<(u16, NodeId)> for LiveSet {
    fn from_iter<I: IntoIterator<Item = (u16, NodeId)>>(iter: I) -> Self {
        Self {
            ports: iter.into_iter().collect(),
        }
    }
}

/// Entries registered with the target group at query time.
///
/// Not collapsed by port: the same port may be registered for several nodes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisteredSet {
    entries: Vec<TargetGroupEntry>,
}

impl RegisteredSet {
    /// Build from reported entries, dropping exact (port, target) duplicates.
    pub fn new(entries: impl IntoIterator<Item = TargetGroupEntry>) -> Self {
        let mut kept: Vec<TargetGroupEntry> = Vec::new();
        for entry in entries {
            if !kept
                .iter()
                .any(|e| e.port == entry.port && e.target == entry.target)
            {
                kept.push(entry);
            }
        }
        Self { entries: kept }
    }

    pub fn contains_port(&self, port: u16) -> bool {
        self.entries.iter().any(|e| e.port == port)
    }

    pub fn entries(&self) -> &[TargetGroupEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
