//! Endpoint registry built once at startup from CLI args and the sites file.

use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

use crate::console;
use crate::models::Endpoint;

/// Deduplicated set of normalized endpoints. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    endpoints: HashSet<Endpoint>,
}

impl EndpointRegistry {
    /// Merges both sources, normalizes every entry and drops duplicates.
    /// Entries that are blank after trimming are skipped.
    pub fn build<I, J>(cli_args: I, file_lines: J) -> Self
    where
        I: IntoIterator<Item = String>,
        J: IntoIterator<Item = String>,
    {
        let endpoints = cli_args
            .into_iter()
            .chain(file_lines)
            .filter(|raw| !raw.trim().is_empty())
            .map(|raw| Endpoint::new(&raw))
            .collect();
        Self { endpoints }
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }
}

impl IntoIterator for EndpointRegistry {
    type Item = Endpoint;
    type IntoIter = std::collections::hash_set::IntoIter<Endpoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.endpoints.into_iter()
    }
}

/// Reads one endpoint per line. A missing or unreadable file only warns.
pub fn read_sites_file(path: &Path) -> Option<Vec<String>> {
    match std::fs::read_to_string(path) {
        Ok(content) => Some(content.lines().map(|l| l.trim().to_string()).collect()),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "sites file unavailable, using command line only");
            console::failure(&format!("No {} file found", path.display()));
            None
        }
    }
}
