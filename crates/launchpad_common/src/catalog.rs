//! Artifact catalog
//!
//! Maps logical repository paths to sanitized local file names. The catalog
//! is plain data loaded from config; presence on disk is the cache index.

use crate::config::ArtifactSpec;
use crate::error::{LaunchpadError, Result};
use std::collections::HashMap;

/// One downloadable file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactEntry {
    /// Repository-relative path ("EXM/Tool V4.cmd")
    pub logical_path: String,
    /// File name inside the cache root
    pub local_name: String,
    /// Friendly name
    pub label: Option<String>,
}

impl ArtifactEntry {
    pub fn new(logical_path: impl Into<String>) -> Result<Self> {
        let logical_path = logical_path.into();
        let last = logical_path.rsplit('/').next().unwrap_or_default();
        let local_name = sanitize_local_name(last).ok_or_else(|| {
            LaunchpadError::Catalog(format!("no usable file name in '{}'", logical_path))
        })?;
        Ok(Self {
            logical_path,
            local_name,
            label: None,
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Label if set, otherwise the logical path
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.logical_path)
    }
}

/// Reduce a path segment to a filesystem-safe name
///
/// Keeps alphanumerics, space, '.', '_', '-', '(' and ')'. Trailing spaces
/// and dots are trimmed. Returns None if nothing usable is left.
pub fn sanitize_local_name(segment: &str) -> Option<String> {
    let kept: String = segment
        .chars()
        .filter(|c| c.is_alphanumeric() || matches!(*c, ' ' | '.' | '_' | '-' | '(' | ')'))
        .collect();
    let trimmed = kept
        .trim_end_matches(|c: char| c == ' ' || c == '.')
        .trim_start()
        .to_string();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        None
    } else {
        Some(trimmed)
    }
}

/// Validated set of artifact entries
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<ArtifactEntry>,
}

impl Catalog {
    /// Build a catalog, collapsing exact duplicates
    ///
    /// Two different logical paths that sanitize to the same local name are
    /// rejected; they would overwrite each other in the cache.
    pub fn new(entries: Vec<ArtifactEntry>) -> Result<Self> {
        let mut catalog = Self::default();
        for entry in entries {
            if let Err(existing) = catalog.check_collision(&entry) {
                if existing.logical_path == entry.logical_path {
                    continue;
                }
                return Err(LaunchpadError::Catalog(format!(
                    "'{}' and '{}' both map to local name '{}'",
                    existing.logical_path, entry.logical_path, entry.local_name
                )));
            }
            catalog.entries.push(entry);
        }
        Ok(catalog)
    }

    pub fn from_specs(specs: &[ArtifactSpec]) -> Result<Self> {
        let entries = specs
            .iter()
            .map(|spec| {
                let entry = ArtifactEntry::new(spec.path.clone())?;
                Ok(match &spec.label {
                    Some(label) => entry.with_label(label.clone()),
                    None => entry,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(entries)
    }

    pub fn entries(&self) -> &[ArtifactEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve by label (case-insensitive), logical path, then local name
    pub fn find(&self, id: &str) -> Option<&ArtifactEntry> {
        self.entries
            .iter()
            .find(|e| {
                e.label
                    .as_deref()
                    .map(|l| l.eq_ignore_ascii_case(id))
                    .unwrap_or(false)
            })
            .or_else(|| self.entries.iter().find(|e| e.logical_path == id))
            .or_else(|| self.entries.iter().find(|e| e.local_name == id))
    }

    /// Entries for a bulk sync: known ones plus files discovered in a folder
    ///
    /// Discovered names already listed are skipped. Names whose local name
    /// clashes with a different entry come back in the second vector.
    pub fn with_discovered(
        &self,
        discovered: &[(String, String)],
    ) -> (Vec<ArtifactEntry>, Vec<(String, String)>) {
        let mut merged = self.entries.clone();
        let mut rejected = Vec::new();
        let mut by_local: HashMap<String, String> = merged
            .iter()
            .map(|e| (e.local_name.clone(), e.logical_path.clone()))
            .collect();

        for (folder, name) in discovered {
            let logical = format!("{}/{}", folder.trim_end_matches('/'), name);
            if merged.iter().any(|e| e.logical_path == logical) {
                continue;
            }
            let entry = match ArtifactEntry::new(logical.clone()) {
                Ok(entry) => entry.with_label(name.clone()),
                Err(e) => {
                    rejected.push((logical, e.to_string()));
                    continue;
                }
            };
            if let Some(owner) = by_local.get(&entry.local_name) {
                rejected.push((
                    logical,
                    format!("local name '{}' already used by '{}'", entry.local_name, owner),
                ));
                continue;
            }
            by_local.insert(entry.local_name.clone(), entry.logical_path.clone());
            merged.push(entry);
        }
        (merged, rejected)
    }

    fn check_collision(&self, entry: &ArtifactEntry) -> std::result::Result<(), &ArtifactEntry> {
        match self.entries.iter().find(|e| e.local_name == entry.local_name) {
            Some(existing) => Err(existing),
            None => Ok(()),
        }
    }
}
