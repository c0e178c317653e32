use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque forward cursor returned by a connection page.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageCursor(pub String);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FetchPolicy {
    StoreOrNetwork,
    NetworkOnly,
    StoreAndNetwork,
}

impl FetchPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StoreOrNetwork => "store-or-network",
            Self::NetworkOnly => "network-only",
            Self::StoreAndNetwork => "store-and-network",
        }
    }
}

/// One page of a connection. `variables` are the query arguments (for
/// example `{"search": "ann"}`) and stay fixed across the pages of a list
/// until the controller refetches with new ones.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PageRequest {
    pub variables: Value,
    pub after: Option<PageCursor>,
    pub count: usize,
    pub policy: FetchPolicy,
}

impl PageRequest {
    pub fn first(variables: Value, count: usize, policy: FetchPolicy) -> Self {
        Self {
            variables,
            after: None,
            count,
            policy,
        }
    }

    pub fn is_first_page(&self) -> bool {
        self.after.is_none()
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Page<N> {
    pub nodes: Vec<N>,
    pub has_next: bool,
    pub end_cursor: Option<PageCursor>,
}
