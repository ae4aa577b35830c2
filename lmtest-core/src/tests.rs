#[cfg(test)]
mod topology_tests {
    use crate::config::HarnessConfig;
    use crate::topology::{Place, Resolution, resolve_target};
    use anyhow::Result;
    use std::fs;
    use std::path::Path;

    fn config(root: &Path) -> HarnessConfig {
        HarnessConfig {
            env_override: None,
            place: None,
            repo_root: root.to_path_buf(),
            firmware: "firmware.bin".into(),
        }
    }

    fn write_labnet(root: &Path, contents: &str) -> Result<()> {
        fs::write(root.join("labnet.yaml"), contents)?;
        Ok(())
    }

    fn write_target(root: &Path, name: &str) -> Result<()> {
        fs::create_dir_all(root.join("targets"))?;
        fs::write(
            root.join("targets").join(format!("{name}.yaml")),
            "ssh:\n  host: 192.0.2.1\n",
        )?;
        Ok(())
    }

    #[test]
    fn test_place_parse() -> Result<()> {
        let place = Place::parse("lab1-seg1-boardA").expect("valid place");
        assert_eq!(place.lab, "lab1");
        assert_eq!(place.segment, "seg1");
        assert_eq!(place.device_instance, "boardA");

        // The instance keeps any further hyphens.
        let place = Place::parse("lab1-seg1-node-a").expect("valid place");
        assert_eq!(place.device_instance, "node-a");

        assert!(Place::parse("lab1-seg1").is_none());
        assert!(Place::parse("lab1").is_none());
        Ok(())
    }

    #[test]
    fn test_override_wins() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut config = config(dir.path());
        config.env_override = Some("targets/explicit.yaml".to_string());
        config.place = Some("lab1-seg1-boardA".to_string());

        assert_eq!(
            resolve_target(&config),
            Resolution::Overridden("targets/explicit.yaml".to_string())
        );
        Ok(())
    }

    #[test]
    fn test_no_place() -> Result<()> {
        let dir = tempfile::tempdir()?;
        assert_eq!(resolve_target(&config(dir.path())), Resolution::NoPlace);
        Ok(())
    }

    #[test]
    fn test_bad_place() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut config = config(dir.path());
        config.place = Some("lab1-seg1".to_string());
        assert_eq!(resolve_target(&config), Resolution::BadPlace);
        Ok(())
    }

    #[test]
    fn test_no_topology_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut config = config(dir.path());
        config.place = Some("lab1-seg1-boardA".to_string());
        assert_eq!(resolve_target(&config), Resolution::NoTopologyFile);
        Ok(())
    }

    #[test]
    fn test_malformed_topology() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_labnet(dir.path(), "devices: [not, a, mapping]")?;

        let mut config = config(dir.path());
        config.place = Some("lab1-seg1-boardA".to_string());
        assert!(matches!(
            resolve_target(&config),
            Resolution::MalformedTopology(_)
        ));
        Ok(())
    }

    #[test]
    fn test_direct_resolution_with_target_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_labnet(dir.path(), "devices:\n  boardA:\n    target_file: foo\n")?;
        write_target(dir.path(), "foo")?;

        let mut config = config(dir.path());
        config.place = Some("lab1-seg1-boardA".to_string());

        let expected = dir.path().join("targets").join("foo.yaml");
        assert_eq!(resolve_target(&config), Resolution::Resolved(expected));
        Ok(())
    }

    #[test]
    fn test_direct_resolution_defaults_to_device_name() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_labnet(dir.path(), "devices:\n  boardA: {}\n")?;
        write_target(dir.path(), "boardA")?;

        let mut config = config(dir.path());
        config.place = Some("lab1-seg1-boardA".to_string());

        let expected = dir.path().join("targets").join("boardA.yaml");
        assert_eq!(resolve_target(&config), Resolution::Resolved(expected));
        Ok(())
    }

    #[test]
    fn test_direct_resolution_missing_descriptor() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_labnet(dir.path(), "devices:\n  boardA:\n    target_file: foo\n")?;

        let mut config = config(dir.path());
        config.place = Some("lab1-seg1-boardA".to_string());
        assert_eq!(resolve_target(&config), Resolution::NoMatch);
        Ok(())
    }

    #[test]
    fn test_indirect_resolution_via_lab_instances() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_labnet(
            dir.path(),
            "devices:\n  qemu-x86-64:\n    target_file: qemu\nlabs:\n  lab1:\n    device_instances:\n      qemu-x86-64:\n        - vnode-a\n        - vnode-b\n",
        )?;
        write_target(dir.path(), "qemu")?;

        let mut config = config(dir.path());
        config.place = Some("lab1-seg1-vnode-b".to_string());

        let expected = dir.path().join("targets").join("qemu.yaml");
        assert_eq!(resolve_target(&config), Resolution::Resolved(expected));
        Ok(())
    }

    #[test]
    fn test_indirect_resolution_unknown_base_device() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_labnet(
            dir.path(),
            "devices: {}\nlabs:\n  lab1:\n    device_instances:\n      ghost:\n        - vnode-a\n",
        )?;

        let mut config = config(dir.path());
        config.place = Some("lab1-seg1-vnode-a".to_string());
        assert_eq!(resolve_target(&config), Resolution::NoMatch);
        Ok(())
    }

    #[test]
    fn test_resolution_path_accessor() -> Result<()> {
        let resolved = Resolution::Resolved("targets/foo.yaml".into());
        assert!(resolved.path().is_some());
        assert!(Resolution::NoMatch.path().is_none());
        assert!(Resolution::BadPlace.into_path().is_none());
        Ok(())
    }
}

#[cfg(test)]
mod state_tests {
    use crate::state::{MeshState, canonical_link_key, strip_mac};
    use anyhow::{Context, Result};
    use serde_json::json;

    #[test]
    fn test_strip_mac() -> Result<()> {
        assert_eq!(strip_mac("02:58:47:00:00:01"), "025847000001");
        assert_eq!(strip_mac("AA:BB:CC:DD:EE:FF"), "aabbccddeeff");
        Ok(())
    }

    #[test]
    fn test_canonical_link_key_commutes() -> Result<()> {
        let pairs = [
            ("02:58:47:12:34:56", "02:58:47:00:00:01"),
            ("02:00:00:00:00:01", "02:00:00:00:00:02"),
            ("AA:BB:CC:DD:EE:FF", "00:11:22:33:44:55"),
        ];

        for (a, b) in pairs {
            assert_eq!(canonical_link_key(a, b)?, canonical_link_key(b, a)?);
        }
        Ok(())
    }

    #[test]
    fn test_canonical_link_key_format() -> Result<()> {
        let key = canonical_link_key("02:58:47:12:34:56", "02:58:47:00:00:01")?;
        assert!(!key.contains(':'));
        assert_eq!(key, key.to_lowercase());
        assert_eq!(key, "025847000001025847123456");
        Ok(())
    }

    #[test]
    fn test_canonical_link_key_rejects_non_macs() -> Result<()> {
        assert!(canonical_link_key("not-a-mac", "02:58:47:00:00:01").is_err());
        assert!(canonical_link_key("02:58:47:00:00", "02:58:47:00:00:01").is_err());
        Ok(())
    }

    #[test]
    fn test_mesh_state_from_value() -> Result<()> {
        let key = canonical_link_key("02:58:47:12:34:56", "02:58:47:00:00:01")?;
        let state = MeshState::from_value(json!({
            "LiMe-123456": {
                "links": {
                    (key.as_str()): {"tq": 0.98, "iface": "wlan0-mesh"},
                },
                "bleachTTL": 25,
            },
            "LiMe-000001": {},
        }))?;

        assert!(!state.is_empty());
        assert!(state.has_link("LiMe-123456", &key));
        assert!(!state.has_link("LiMe-000001", &key));

        let node = state.node("LiMe-123456").context("Node not found")?;
        let link = node.links.get(&key).context("Link not found")?;
        assert_eq!(link.tq, Some(0.98));
        assert_eq!(link.iface.as_deref(), Some("wlan0-mesh"));
        assert!(node.extra.contains_key("bleachTTL"));
        Ok(())
    }
}

#[cfg(test)]
mod rpc_tests {
    use crate::rpc::{decode_output, extract_json_from_mixed};
    use anyhow::Result;
    use serde_json::json;

    #[test]
    fn test_decode_output_valid_json() -> Result<()> {
        let lines = vec![
            "{".to_string(),
            "  \"hostname\": \"LiMe-123456\"".to_string(),
            "}".to_string(),
        ];
        assert_eq!(
            decode_output(&lines),
            json!({"hostname": "LiMe-123456"})
        );
        Ok(())
    }

    #[test]
    fn test_decode_output_malformed_json() -> Result<()> {
        let lines = vec!["error: ubus call failed".to_string()];
        assert_eq!(decode_output(&lines), json!({}));

        assert_eq!(decode_output(&[]), json!({}));
        Ok(())
    }

    #[test]
    fn test_extract_json_from_mixed() -> Result<()> {
        let text = "syncing bat_links_info\n{\"LiMe-000001\": {\"links\": {}}}\ndone";
        let value = extract_json_from_mixed(text)?;
        assert_eq!(value, json!({"LiMe-000001": {"links": {}}}));
        Ok(())
    }

    #[test]
    fn test_extract_json_from_mixed_no_json() -> Result<()> {
        assert!(extract_json_from_mixed("no json here").is_err());
        assert!(extract_json_from_mixed("} backwards {").is_err());
        Ok(())
    }
}

#[cfg(test)]
mod bringup_tests {
    use crate::bringup::{BringUp, next_delay};
    use anyhow::Result;
    use std::time::Duration;

    #[test]
    fn test_next_delay_doubles_and_caps() -> Result<()> {
        let mut delay = Duration::from_secs(2);
        delay = next_delay(delay);
        assert_eq!(delay, Duration::from_secs(4));
        delay = next_delay(delay);
        assert_eq!(delay, Duration::from_secs(8));
        delay = next_delay(delay);
        assert_eq!(delay, Duration::from_secs(10));
        delay = next_delay(delay);
        assert_eq!(delay, Duration::from_secs(10));
        Ok(())
    }

    #[test]
    fn test_defaults() -> Result<()> {
        let bringup = BringUp::default();
        assert_eq!(bringup.extra_radios, 2);
        assert_eq!(bringup.expected_phys, 4);
        assert_eq!(bringup.mesh_ifname, "wlan0-mesh");
        assert_eq!(bringup.peer_macs.len(), 3);
        assert!(bringup.peer_macs.contains(&"02:00:00:00:00:01".to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod config_tests {
    use crate::config::HarnessConfig;
    use anyhow::{Context, Result};
    use std::path::PathBuf;

    #[test]
    fn test_session_images() -> Result<()> {
        let config = HarnessConfig {
            env_override: None,
            place: None,
            repo_root: PathBuf::from("."),
            firmware: PathBuf::from("firmware.bin"),
        }
        .with_firmware("images/custom.bin");

        let images = config.session_images();
        let firmware = images.get("firmware").context("Firmware image not set")?;
        assert_eq!(firmware, &PathBuf::from("images/custom.bin"));
        Ok(())
    }
}
