// image.rs — Container image records: name, build metadata, scan results.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A container image with optional metadata and vulnerability scan.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Image {
    pub id: String,
    #[serde(default)]
    pub name: ImageName,
    #[serde(default)]
    pub metadata: Option<ImageMetadata>,
    /// `None` when the image has never been scanned.
    #[serde(default)]
    pub scan: Option<ImageScan>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageName {
    #[serde(default)]
    pub registry: String,
    #[serde(default)]
    pub remote: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub full_name: String,
}

impl ImageName {
    /// `registry/remote:tag`, or the stored full name when set.
    pub fn display_name(&self) -> String {
        if !self.full_name.is_empty() {
            return self.full_name.clone();
        }
        format!("{}/{}:{}", self.registry, self.remote, self.tag)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageMetadata {
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    /// Dockerfile layers in build order.
    #[serde(default)]
    pub layers: Vec<ImageLayer>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// One Dockerfile instruction, e.g. `EXPOSE 22/tcp`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageLayer {
    pub instruction: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImageScan {
    #[serde(default)]
    pub scan_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub components: Vec<Component>,
}

/// An installed package found by the scanner.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Component {
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub vulns: Vec<Vulnerability>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Vulnerability {
    pub cve: String,
    #[serde(default)]
    pub cvss: f32,
    #[serde(default)]
    pub link: String,
    /// Version that fixes the vulnerability, if one exists.
    #[serde(default)]
    pub fixed_by: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_prefers_full_name() {
        let name = ImageName {
            registry: "docker.io".to_string(),
            remote: "library/nginx".to_string(),
            tag: "1.10".to_string(),
            full_name: String::new(),
        };
        assert_eq!(name.display_name(), "docker.io/library/nginx:1.10");

        let named = ImageName {
            full_name: "nginx:latest".to_string(),
            ..name
        };
        assert_eq!(named.display_name(), "nginx:latest");
    }

    #[test]
    fn unscanned_image_has_no_scan() {
        let image: Image = serde_json::from_str(r#"{"id": "sha256:abc"}"#).unwrap();
        assert!(image.scan.is_none());
        assert!(image.metadata.is_none());
    }
}
