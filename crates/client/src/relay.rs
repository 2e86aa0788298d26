//! Path handling for the origin relay endpoint.

use serde::{Deserialize, Serialize};

/// A dynamic path parameter as a router may deliver it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathParam {
    Single(String),
    Segments(Vec<String>),
}

impl PathParam {
    /// Join into one slash-separated relative path.
    ///
    /// Empty segments and surrounding slashes are dropped, so an empty list,
    /// `""` and `"/"` all normalize to the empty path instead of failing.
    pub fn normalize(&self) -> String {
        match self {
            Self::Single(path) => path.split('/').filter(|s| !s.is_empty()).collect::<Vec<_>>().join("/"),
            Self::Segments(segments) => segments
                .iter()
                .flat_map(|s| s.split('/'))
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join("/"),
        }
    }
}

impl From<&str> for PathParam {
    fn from(path: &str) -> Self {
        Self::Single(path.to_string())
    }
}

impl From<Vec<String>> for PathParam {
    fn from(segments: Vec<String>) -> Self {
        Self::Segments(segments)
    }
}

/// Absolute origin path for a relayed request under `content_prefix`.
pub fn relay_target(content_prefix: &str, param: &PathParam) -> String {
    let prefix = content_prefix.trim_end_matches('/');
    let path = param.normalize();
    if path.is_empty() { prefix.to_string() } else { format!("{prefix}/{path}") }
}
