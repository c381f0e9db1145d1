use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier, e.g. `"accounting.entries.post"`.
///
/// Two wildcard shapes exist: `"*"` grants everything, and `"<prefix>.*"`
/// grants every permission under that prefix.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }

    /// The prefix covered by a `"<prefix>.*"` grant.
    pub fn wildcard_prefix(&self) -> Option<&str> {
        self.as_str().strip_suffix(".*").filter(|p| !p.is_empty())
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
