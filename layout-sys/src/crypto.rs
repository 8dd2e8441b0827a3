// SPDX-License-Identifier: GPL-3.0-only

use layout_contracts::CryptoContainers;
use serde::Deserialize;

use crate::command::run_command;
use crate::{Result, SysError};

#[derive(Debug, Deserialize)]
struct LsblkOutput {
    #[serde(default)]
    blockdevices: Vec<LsblkDevice>,
}

#[derive(Debug, Deserialize)]
struct LsblkDevice {
    path: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    children: Vec<LsblkDevice>,
}

/// First `crypt` child of the device described by `json`
pub fn mapped_device_from_lsblk(json: &str) -> Result<Option<String>> {
    let output: LsblkOutput =
        serde_json::from_str(json).map_err(|err| SysError::parse("lsblk", err.to_string()))?;
    Ok(output
        .blockdevices
        .iter()
        .flat_map(|device| device.children.iter())
        .find(|child| child.kind.as_deref() == Some("crypt"))
        .and_then(|child| child.path.clone()))
}

/// dm-crypt mappings discovered through `lsblk`
#[derive(Debug, Clone, Copy, Default)]
pub struct LsblkCrypto;

impl CryptoContainers for LsblkCrypto {
    fn mapped_device_of(&self, raw_path: &str) -> Option<String> {
        let mapped = run_command("lsblk", &["--json", "-o", "PATH,TYPE", raw_path])
            .and_then(|json| mapped_device_from_lsblk(&json));
        match mapped {
            Ok(mapped) => mapped,
            Err(err) => {
                tracing::warn!(%raw_path, %err, "could not query crypt mappings");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_the_crypt_child() {
        let json = r#"{
            "blockdevices": [
                {"path": "/dev/sda3", "type": "part", "children": [
                    {"path": "/dev/mapper/luks-5f1c", "type": "crypt"}
                ]}
            ]
        }"#;
        assert_eq!(
            mapped_device_from_lsblk(json).expect("parse"),
            Some("/dev/mapper/luks-5f1c".to_string())
        );
    }

    #[test]
    fn locked_containers_have_no_mapping() {
        let json = r#"{"blockdevices": [{"path": "/dev/sda3", "type": "part"}]}"#;
        assert_eq!(mapped_device_from_lsblk(json).expect("parse"), None);
        assert!(mapped_device_from_lsblk("not json").is_err());
    }
}
