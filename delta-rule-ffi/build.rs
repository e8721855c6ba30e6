// Delta Rule - Change and deviation detection for telemetry datapoints
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Build script for delta-rule-ffi
//!
//! Writes `include/delta_rule.h` with cbindgen. Result codes come out as
//! `DELTA_RESULT_*` constants so they do not clash with host symbols.

use cbindgen::{Config, EnumConfig, Language, RenameRule};

fn header_config() -> Config {
    let mut config = Config::default();
    config.language = Language::C;
    config.include_guard = Some("DELTA_RULE_H".to_string());
    config.cpp_compat = true;
    config.autogen_warning =
        Some("/* Generated by delta-rule-ffi/build.rs, edit src/lib.rs instead */".to_string());
    config.enumeration = EnumConfig {
        rename_variants: RenameRule::ScreamingSnakeCase,
        prefix_with_name: true,
        ..Default::default()
    };
    config
}

fn main() {
    println!("cargo:rerun-if-changed=src/lib.rs");
    println!("cargo:rerun-if-changed=build.rs");

    let Ok(crate_dir) = std::env::var("CARGO_MANIFEST_DIR") else {
        return;
    };

    match cbindgen::generate_with_config(&crate_dir, header_config()) {
        Ok(bindings) => {
            bindings.write_to_file(format!("{}/include/delta_rule.h", crate_dir));
        }
        Err(e) => {
            // The Rust library is still usable without the header
            println!("cargo:warning=delta_rule.h not generated: {}", e);
        }
    }
}
