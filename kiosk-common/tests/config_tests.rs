//! Config file discovery tests
//!
//! Uses serial_test to prevent environment variable races: these tests point
//! XDG_CONFIG_HOME at a temporary directory.

use kiosk_common::config::{locate_config_file, load_toml_or_default, CONFIG_DIR_NAME};
use serde::Deserialize;
use serial_test::serial;
use std::env;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Probe {
    catalog_size: u16,
}

#[cfg(target_os = "linux")]
#[test]
#[serial]
fn test_user_config_dir_is_discovered() {
    let home = tempfile::tempdir().unwrap();
    let dir = home.path().join(CONFIG_DIR_NAME);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("probe.toml"), "catalog_size = 100\n").unwrap();

    let previous = env::var("XDG_CONFIG_HOME").ok();
    env::set_var("XDG_CONFIG_HOME", home.path());

    let found = locate_config_file(None, "probe.toml");
    let probe: Probe = load_toml_or_default(None, "probe.toml").unwrap();

    match previous {
        Some(value) => env::set_var("XDG_CONFIG_HOME", value),
        None => env::remove_var("XDG_CONFIG_HOME"),
    }

    assert_eq!(found, Some(dir.join("probe.toml")));
    assert_eq!(probe.catalog_size, 100);
}

#[cfg(target_os = "linux")]
#[test]
#[serial]
fn test_missing_config_falls_back_to_default() {
    let home = tempfile::tempdir().unwrap();

    let previous = env::var("XDG_CONFIG_HOME").ok();
    env::set_var("XDG_CONFIG_HOME", home.path());

    // A file name no system install would carry
    let probe: Probe = load_toml_or_default(None, "kiosk-test-absent-7f3a.toml").unwrap();

    match previous {
        Some(value) => env::set_var("XDG_CONFIG_HOME", value),
        None => env::remove_var("XDG_CONFIG_HOME"),
    }

    assert_eq!(probe.catalog_size, 0);
}
