//! Seed objects for the in-process store.
//!
//! Every `*.yaml` / `*.yml` file in the directory is read in file-name order.
//! A file may hold several YAML documents separated by `---`; each non-empty
//! document is one kind-tagged object.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use mtr_schemas::AnyObject;
use mtr_store::MemoryStore;
use serde::Deserialize;

/// Parse every manifest under `dir`.
pub fn load_dir(dir: &Path) -> Result<Vec<AnyObject>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("failed to read manifest dir: {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("yaml") | Some("yml")
                )
        })
        .collect();
    files.sort();

    let mut out = Vec::new();
    for path in files {
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read manifest: {}", path.display()))?;
        let objs =
            parse_documents(&raw).with_context(|| format!("invalid manifest: {}", path.display()))?;
        out.extend(objs);
    }
    Ok(out)
}

/// Parse a multi-document YAML string.
pub fn parse_documents(raw: &str) -> Result<Vec<AnyObject>> {
    let mut out = Vec::new();
    for (i, doc) in serde_yaml::Deserializer::from_str(raw).enumerate() {
        let value = serde_yaml::Value::deserialize(doc)
            .with_context(|| format!("document {i}: invalid yaml"))?;
        if value.is_null() {
            continue;
        }
        let obj: AnyObject = serde_yaml::from_value(value)
            .with_context(|| format!("document {i}: not a reporting object"))?;
        out.push(obj);
    }
    Ok(out)
}

/// Apply `objects` to `store` in order. Returns how many were written.
pub async fn seed(store: &MemoryStore, objects: Vec<AnyObject>) -> Result<usize> {
    let mut n = 0;
    for obj in objects {
        let label = format!("{} {}", obj.kind(), obj.meta().key());
        store
            .apply(obj)
            .await
            .with_context(|| format!("failed to seed {label}"))?;
        n += 1;
    }
    Ok(n)
}
