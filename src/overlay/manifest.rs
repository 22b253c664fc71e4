//! Install manifest (`.specify/install-manifest.json`) and the optional
//! extension-side compatibility document.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MANIFEST_PATH: &str = ".specify/install-manifest.json";
pub const COMPATIBILITY_FILENAME: &str = ".spec-kit-compatibility.yml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub owner: String,
    pub repo: String,
    pub tag: String,
    pub digest_sha256: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallManifest {
    pub base: SourceRecord,
    pub extension: SourceRecord,
    pub installed_at_utc: DateTime<Utc>,
    pub engine_version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityRange {
    pub min: String,
    pub max: String,
    pub tested: Option<String>,
    pub recommended: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityDocument {
    pub extension: ExtensionCompatibility,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtensionCompatibility {
    pub version: String,
    pub compatible_with: CompatibleWith,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibleWith {
    pub base: CompatibilityRange,
}

impl InstallManifest {
    pub fn load(path: &std::path::Path) -> std::io::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        serde_json::from_str(&raw).map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    pub fn write(&self, path: &std::path::Path) -> std::io::Result<()> {
        let serialized = serde_json::to_vec_pretty(self)?;
        crate::backlog::atomic_write(path, &serialized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_manifest_json() {
        let manifest = InstallManifest {
            base: SourceRecord {
                owner: "flowspec-dev".to_string(),
                repo: "base-templates".to_string(),
                tag: "v1.2.0".to_string(),
                digest_sha256: "deadbeef".to_string(),
            },
            extension: SourceRecord {
                owner: "flowspec-dev".to_string(),
                repo: "ext-templates".to_string(),
                tag: "v0.3.0".to_string(),
                digest_sha256: "cafebabe".to_string(),
            },
            installed_at_utc: "2026-01-01T00:00:00Z".parse().unwrap(),
            engine_version: "0.1.0".to_string(),
        };
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(MANIFEST_PATH);
        manifest.write(&path).unwrap();
        let loaded = InstallManifest::load(&path).unwrap();
        assert_eq!(loaded, manifest);
    }
}
