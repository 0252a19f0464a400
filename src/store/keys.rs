//! Key layout shared with the gateway and the management API.
//!
//! ```text
//! {clusters_root}/{cluster_id}/{options_marker}   cluster metadata
//! {clusters_root}/{cluster_id}/{instance_id}      server instance record
//! ```

use crate::config::StoreConfig;

/// What a store key refers to under the clusters root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyKind<'a> {
    /// The clusters root itself.
    Root,
    /// A cluster directory.
    Cluster { cluster_id: &'a str },
    Instance { cluster_id: &'a str, instance_id: &'a str },
    ClusterOptions { cluster_id: &'a str },
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyLayout {
    clusters_root: String,
    options_marker: String,
}

impl Default for KeyLayout {
    fn default() -> Self {
        Self::new("/clusters", "option")
    }
}

impl KeyLayout {
    pub fn new(clusters_root: &str, options_marker: &str) -> Self {
        let root = clusters_root.trim_end_matches('/');
        Self {
            clusters_root: if root.is_empty() { "/".to_string() } else { root.to_string() },
            options_marker: options_marker.to_string(),
        }
    }

    pub fn from_config(config: &StoreConfig) -> Self {
        Self::new(&config.clusters_root, &config.options_marker)
    }

    pub fn clusters_root(&self) -> &str {
        &self.clusters_root
    }

    pub fn cluster_key(&self, cluster_id: &str) -> String {
        format!("{}/{}", self.clusters_root, cluster_id)
    }

    pub fn options_key(&self, cluster_id: &str) -> String {
        format!("{}/{}/{}", self.clusters_root, cluster_id, self.options_marker)
    }

    pub fn instance_key(&self, cluster_id: &str, instance_id: &str) -> String {
        format!("{}/{}/{}", self.clusters_root, cluster_id, instance_id)
    }

    /// Classify a key by depth below the root and by its final segment.
    pub fn classify<'a>(&self, key: &'a str) -> KeyKind<'a> {
        let Some(below) = key.strip_prefix(self.clusters_root.as_str()) else {
            return KeyKind::Other;
        };
        if below.is_empty() {
            return KeyKind::Root;
        }
        let Some(rest) = below.strip_prefix('/') else {
            return KeyKind::Other;
        };

        let mut segments = rest.split('/');
        match (segments.next(), segments.next(), segments.next()) {
            (Some(cluster_id), None, None) if !cluster_id.is_empty() => KeyKind::Cluster { cluster_id },
            (Some(cluster_id), Some(last), None) if !cluster_id.is_empty() && !last.is_empty() => {
                if last == self.options_marker {
                    KeyKind::ClusterOptions { cluster_id }
                } else {
                    KeyKind::Instance { cluster_id, instance_id: last }
                }
            }
            _ => KeyKind::Other,
        }
    }
}

/// Last path segment of a key.
pub fn last_segment(key: &str) -> &str {
    key.trim_end_matches('/').rsplit('/').next().unwrap_or_default()
}
