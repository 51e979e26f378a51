//! Splits a rendered multi-document manifest into resource descriptors

use kube::core::GroupVersionKind;
use serde::Deserialize;

use crate::watches::GroupKind;
use crate::{Error, Result};

/// Identity of one object in a rendered manifest
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceDescriptor {
    pub api_version: String,
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl ResourceDescriptor {
    /// API group; empty for the core group
    pub fn group(&self) -> &str {
        split_api_version(&self.api_version).0
    }

    pub fn version(&self) -> &str {
        split_api_version(&self.api_version).1
    }

    pub fn group_kind(&self) -> GroupKind {
        GroupKind::new(self.group(), self.kind.clone())
    }

    pub fn group_version_kind(&self) -> GroupVersionKind {
        GroupVersionKind::gvk(self.group(), self.version(), &self.kind)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDocument {
    api_version: Option<String>,
    kind: Option<String>,
    #[serde(default)]
    metadata: RawMetadata,
}

#[derive(Default, Deserialize)]
struct RawMetadata {
    name: Option<String>,
    namespace: Option<String>,
}

/// Parse every non-empty document of `manifest`, in order
pub fn split_manifest(manifest: &str) -> Result<Vec<ResourceDescriptor>> {
    let mut descriptors = Vec::new();
    let rendered = documents(manifest)
        .into_iter()
        .filter(|document| !is_blank(document));
    for (index, document) in rendered.enumerate() {
        let label = document_label(index, &document);
        descriptors.push(parse_document(&document).map_err(|message| Error::Parse {
            document: label,
            message,
        })?);
    }
    Ok(descriptors)
}

fn parse_document(document: &str) -> std::result::Result<ResourceDescriptor, String> {
    let value: serde_yaml::Value = serde_yaml::from_str(document).map_err(|e| e.to_string())?;
    if value.is_null() {
        return Err("document is empty".to_string());
    }
    if !value.is_mapping() {
        return Err("document is not a mapping".to_string());
    }
    let raw: RawDocument = serde_yaml::from_value(value).map_err(|e| e.to_string())?;

    let api_version = raw
        .api_version
        .filter(|v| !v.is_empty())
        .ok_or_else(|| "missing apiVersion".to_string())?;
    let kind = raw
        .kind
        .filter(|k| !k.is_empty())
        .ok_or_else(|| "missing kind".to_string())?;
    let name = raw
        .metadata
        .name
        .filter(|n| !n.is_empty())
        .ok_or_else(|| "missing metadata.name".to_string())?;

    Ok(ResourceDescriptor {
        api_version,
        kind,
        namespace: raw.metadata.namespace.filter(|ns| !ns.is_empty()),
        name,
    })
}

/// Split on `---` separator lines
fn documents(manifest: &str) -> Vec<String> {
    let mut docs = Vec::new();
    let mut current = String::new();
    for line in manifest.lines() {
        if is_separator(line) {
            docs.push(std::mem::take(&mut current));
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }
    docs.push(current);
    docs
}

fn is_separator(line: &str) -> bool {
    match line.strip_prefix("---") {
        Some(rest) => rest.is_empty() || rest.starts_with(char::is_whitespace),
        None => false,
    }
}

fn is_blank(document: &str) -> bool {
    document
        .lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with('#'))
}

/// Helm's `# Source:` comment when present, else the position among
/// non-blank documents
fn document_label(index: usize, document: &str) -> String {
    document
        .lines()
        .filter_map(|line| line.trim().strip_prefix("# Source:"))
        .map(str::trim)
        .find(|source| !source.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("document {}", index))
}

fn split_api_version(api_version: &str) -> (&str, &str) {
    match api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", api_version),
    }
}
