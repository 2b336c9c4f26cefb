//! Fuzz target: NVS config blob
//!
//! Stores arbitrary bytes under the node config key and loads them back
//! through `ConfigPort`, verifying:
//! - No panics on corrupt or truncated postcard data
//! - Anything that loads also passes validation
//! - The repair path always yields a valid config and a loadable store
//!
//! cargo fuzz run fuzz_config_blob

#![no_main]

use libfuzzer_sys::fuzz_target;
use roomsense::adapters::nvs::{NvsAdapter, validate_config};
use roomsense::app::ports::{ConfigPort, StoragePort};

fuzz_target!(|data: &[u8]| {
    let Ok(mut nvs) = NvsAdapter::new() else {
        return;
    };
    if nvs.write("roomsense", "nodecfg", data).is_err() {
        return;
    }
    if let Ok(config) = nvs.load() {
        assert!(validate_config(&config).is_ok());
    }
    let repaired = nvs.load_or_repair();
    assert!(validate_config(&repaired).is_ok());
    assert_eq!(nvs.load(), Ok(repaired));
});
