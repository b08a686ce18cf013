//! Shared `.acmi` recordings for tests and benches, listed in `fixtures/manifest.json`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::Deserialize;

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    recordings: HashMap<String, String>,
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn lookup(name: &str) -> Result<&'static str> {
    MANIFEST
        .recordings
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| anyhow!("unknown recording fixture '{name}'"))
}

pub mod recordings {
    use super::*;

    /// Fixture names, sorted.
    pub fn keys() -> Vec<String> {
        let mut keys: Vec<String> = MANIFEST.recordings.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        Ok(fixtures_root().join(lookup(name)?))
    }

    pub fn text(name: &str) -> Result<String> {
        let path = path(name)?;
        fs::read_to_string(&path)
            .with_context(|| format!("failed to read fixture at {}", path.display()))
    }
}
