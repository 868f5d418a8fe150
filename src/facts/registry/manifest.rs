//! Package manifest (`package.json`) parsing.
//!
//! Parsing is lenient: fields of an unexpected shape are ignored instead of failing the whole
//! manifest, since real-world manifests are frequently hand-edited.

use crate::Result;
use ohno::IntoAppError;
use semver::Version;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// File name of the manifest at the repository root.
pub const MANIFEST_FILE: &str = "package.json";

/// A declared dependency and its version requirement as written in the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub requirement: String,
}

impl Dependency {
    #[must_use]
    pub fn is_pinned(&self) -> bool {
        is_pinned(&self.requirement)
    }
}

#[derive(Debug, Clone)]
pub struct Manifest(Value);

impl Manifest {
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).into_app_err("parsing package manifest")?;
        Ok(Self(value))
    }

    /// License names declared by the manifest.
    ///
    /// Understands `license` as a string or as `{ "type": ... }`, and the legacy `licenses` array.
    #[must_use]
    pub fn license_names(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();

        if let Some(name) = self.0.get("license").and_then(license_name) {
            let _ = names.insert(name);
        }

        if let Some(Value::Array(entries)) = self.0.get("licenses") {
            names.extend(entries.iter().filter_map(license_name));
        }

        names
    }

    /// Runtime and development dependencies, merged by name. A development entry replaces a
    /// runtime entry of the same name.
    #[must_use]
    pub fn dependencies(&self) -> Vec<Dependency> {
        let mut merged = BTreeMap::new();

        for section in ["dependencies", "devDependencies"] {
            if let Some(Value::Object(entries)) = self.0.get(section) {
                for (name, requirement) in entries {
                    let requirement = requirement.as_str().unwrap_or_default().to_string();
                    let _ = merged.insert(name.clone(), requirement);
                }
            }
        }

        merged
            .into_iter()
            .map(|(name, requirement)| Dependency { name, requirement })
            .collect()
    }
}

fn license_name(value: &Value) -> Option<String> {
    let name = match value {
        Value::String(s) => s.as_str(),
        Value::Object(o) => o.get("type")?.as_str()?,
        _ => return None,
    };

    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Whether a version requirement pins at least a major and a minor version.
///
/// Exact versions (`1.2.3`, `=1.2.3`, `v1.2.3`) and two-part versions (`1.2`) are pinned.
/// Ranges (`^1.2.3`, `~1.2.3`, `>=1`), wildcards (`1.2.x`, `*`), tags, and URLs are not.
#[must_use]
pub fn is_pinned(requirement: &str) -> bool {
    let version = requirement.trim().trim_start_matches('=').trim_start_matches('v');

    if Version::parse(version).is_ok() {
        return true;
    }

    let mut parts = version.split('.');
    matches!(
        (parts.next(), parts.next(), parts.next()),
        (Some(major), Some(minor), None) if is_number(major) && is_number(minor)
    )
}

fn is_number(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
