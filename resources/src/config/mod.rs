pub mod jobloader;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ClusterConfig {
    /// Path to the kubeconfig file.
    /// When unset, the configuration is inferred from the environment,
    /// falling back to the in-cluster service account.
    pub kubeconfig: Option<String>,
    /// Namespace that Jobs are created in and watched from.
    pub namespace: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterConfig {
            kubeconfig: None,
            namespace: "default".to_string(),
        }
    }
}

/// Label that marks an object as owned by the job loader.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct OwnerLabel {
    pub key: String,
    pub value: String,
}

impl OwnerLabel {
    /// Label selector in `key=value` form.
    pub fn selector(&self) -> String {
        format!("{}={}", self.key, self.value)
    }

    pub fn labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(self.key.to_owned(), self.value.to_owned())])
    }
}

impl Default for OwnerLabel {
    fn default() -> Self {
        OwnerLabel {
            key: "jobloader.khaus.io/owned".to_string(),
            value: "true".to_string(),
        }
    }
}
