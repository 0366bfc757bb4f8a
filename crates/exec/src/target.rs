//! Addressing of the container a command runs in.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies where the remote half of a transfer executes.
///
/// An empty `container_name` leaves the choice to the cluster's default
/// container for the pod.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerTarget {
    pub namespace: String,
    pub pod_name: String,
    #[serde(default)]
    pub container_name: String,
}

impl ContainerTarget {
    pub fn new(
        namespace: impl Into<String>,
        pod_name: impl Into<String>,
        container_name: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            pod_name: pod_name.into(),
            container_name: container_name.into(),
        }
    }
}

impl fmt::Display for ContainerTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.pod_name)?;
        if !self.container_name.is_empty() {
            write!(f, ":{}", self.container_name)?;
        }
        Ok(())
    }
}
