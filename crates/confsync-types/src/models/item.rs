use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// A single configuration entry as served by the configuration service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ConfigItem {
    /// Optional group name; empty and absent are equivalent
    #[serde(default)]
    pub group: Option<String>,
    /// Key within the group
    pub key: String,
    /// Raw string value
    #[serde(default, deserialize_with = "null_as_empty")]
    pub value: String,
}

impl ConfigItem {
    pub fn new(group: Option<&str>, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { group: group.map(str::to_string), key: key.into(), value: value.into() }
    }

    /// Group name, treating `None` and `""` the same.
    pub fn group_name(&self) -> Option<&str> {
        self.group.as_deref().filter(|g| !g.is_empty())
    }

    /// Addressing key for lookups: `group:key`, or `key` when ungrouped.
    pub fn composite_key(&self) -> CompositeKey {
        CompositeKey::from_parts(self.group_name(), &self.key)
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Case-insensitive composite key.
///
/// Equality and hashing fold case, but the original spelling is kept so that
/// enumeration (and therefore fingerprinting) sees the key as the server sent it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompositeKey(String);

impl CompositeKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn from_parts(group: Option<&str>, key: &str) -> Self {
        match group.filter(|g| !g.is_empty()) {
            Some(group) => Self(format!("{group}:{key}")),
            None => Self(key.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    fn folded(&self) -> impl Iterator<Item = char> + '_ {
        self.0.chars().flat_map(char::to_lowercase)
    }
}

impl PartialEq for CompositeKey {
    fn eq(&self, other: &Self) -> bool {
        self.folded().eq(other.folded())
    }
}

impl Eq for CompositeKey {}

impl Hash for CompositeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for c in self.folded() {
            c.hash(state);
        }
        state.write_u8(0xff);
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CompositeKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for CompositeKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for CompositeKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
