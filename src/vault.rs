//! Vault identifier allow-list.

use rustc_hash::FxHashSet;

/// Process-wide set of vault identifiers this deployment serves.
///
/// Matching is exact and case-sensitive. An empty list admits nothing.
#[derive(Debug, Clone, Default)]
pub struct VaultAllowList {
    ids: FxHashSet<String>,
}

impl VaultAllowList {
    pub fn new(ids: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
        }
    }

    /// Parses a comma-delimited list. Entries are trimmed; empty entries are dropped.
    pub fn parse(raw: &str) -> Self {
        Self::new(
            raw.split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty()),
        )
    }

    /// Returns `true` iff `vault_id` is one of the configured identifiers.
    pub fn validate(&self, vault_id: &str) -> bool {
        self.ids.contains(vault_id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
