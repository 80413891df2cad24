//! Build script for dashlink-firmware
//!
//! - Passes the cortex-m-rt and defmt linker scripts
//! - Validates link.toml at compile time

use std::fs;
use std::path::Path;

/// Sections the on-target parser understands
const SECTIONS: [&str; 6] = ["link", "scan", "ingest", "health", "backoff", "store"];

/// Compiled-in decode profiles
const PROFILES: [&str; 2] = ["none", "haltech"];

fn main() {
    setup_linker();
    validate_config();
}

/// memory.x comes from embassy-stm32's `memory-x` feature
fn setup_linker() {
    println!("cargo:rustc-link-arg-bins=--nmagic");
    println!("cargo:rustc-link-arg-bins=-Tlink.x");
    println!("cargo:rustc-link-arg-bins=-Tdefmt.x");
    println!("cargo:rerun-if-changed=build.rs");
}

/// Validate link.toml at compile time
fn validate_config() {
    println!("cargo:rerun-if-changed=link.toml");

    let config_path = Path::new("link.toml");
    if !config_path.exists() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: link.toml not found!                                     ║\n\
            ║                                                                  ║\n\
            ║  The firmware embeds link.toml as its default configuration.     ║\n\
            ║  Please create one in the dashlink-firmware directory.           ║\n\
            ╚══════════════════════════════════════════════════════════════════╝\n"
        );
    }

    let config_content = match fs::read_to_string(config_path) {
        Ok(content) => content,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Failed to read link.toml                                 ║\n\
                ║                                                                  ║\n\
                ║  Error: {:<56} ║\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                e
            );
        }
    };

    let config: toml::Value = match toml::from_str(&config_content) {
        Ok(value) => value,
        Err(e) => {
            panic!(
                "\n\
                ╔══════════════════════════════════════════════════════════════════╗\n\
                ║  ERROR: Invalid TOML syntax in link.toml                         ║\n\
                ╠══════════════════════════════════════════════════════════════════╣\n\
                {}\n\
                ╚══════════════════════════════════════════════════════════════════╝\n",
                format_error_lines(&e.to_string())
            );
        }
    };

    let mut errors = Vec::new();
    validate_sections(&config, &mut errors);
    validate_link(&config, &mut errors);
    validate_thresholds(&config, &mut errors);

    if !errors.is_empty() {
        panic!(
            "\n\
            ╔══════════════════════════════════════════════════════════════════╗\n\
            ║  ERROR: Invalid link configuration                               ║\n\
            ╠══════════════════════════════════════════════════════════════════╣\n\
            {}\n\
            ╚══════════════════════════════════════════════════════════════════╝\n",
            errors
                .iter()
                .map(|e| format!("║  • {:<62} ║", e))
                .collect::<Vec<_>>()
                .join("\n")
        );
    }

    println!("cargo:warning=link.toml validated successfully");
}

/// Format error message lines with box drawing
fn format_error_lines(msg: &str) -> String {
    msg.lines()
        .map(|line| {
            let truncated = if line.len() > 64 {
                format!("{}...", &line[..61])
            } else {
                line.to_string()
            };
            format!("║  {:<64} ║", truncated)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Every table must be one the firmware parser knows, with integer values
fn validate_sections(config: &toml::Value, errors: &mut Vec<String>) {
    let Some(root) = config.as_table() else {
        return;
    };

    for (name, value) in root {
        let toml::Value::Table(table) = value else {
            // Root-level keys belong to [link]
            continue;
        };
        if !SECTIONS.contains(&name.as_str()) {
            errors.push(format!("unknown section [{}]", name));
            continue;
        }
        if name == "link" {
            continue;
        }
        for (key, value) in table {
            match value {
                toml::Value::Integer(n) if *n < 0 || *n > i64::from(u32::MAX) => {
                    errors.push(format!("[{}] {} out of range", name, key));
                }
                toml::Value::Integer(_) => {}
                _ => errors.push(format!("[{}] {} must be an integer", name, key)),
            }
        }
    }
}

fn validate_link(config: &toml::Value, errors: &mut Vec<String>) {
    let link = config.get("link").unwrap_or(config);

    if let Some(profile) = link.get("profile") {
        match profile.as_str() {
            Some(name) if PROFILES.contains(&name) => {}
            Some(name) => errors.push(format!("unknown profile '{}'", name)),
            None => errors.push("profile must be a string".to_string()),
        }
    }
    if let Some(simulate) = link.get("simulate") {
        if simulate.as_bool().is_none() {
            errors.push("simulate must be true or false".to_string());
        }
    }
}

/// Relationships the core rejects at boot
fn validate_thresholds(config: &toml::Value, errors: &mut Vec<String>) {
    let int = |section: &str, key: &str| {
        config
            .get(section)
            .and_then(|s| s.get(key))
            .and_then(toml::Value::as_integer)
    };

    if let (Some(lag), Some(no_frames)) = (int("health", "lag_ms"), int("health", "no_frames_ms")) {
        if lag >= no_frames {
            errors.push("[health] lag_ms must be below no_frames_ms".to_string());
        }
    }
    if let (Some(base), Some(max)) = (int("backoff", "base_ms"), int("backoff", "max_ms")) {
        if base == 0 || base > max {
            errors.push("[backoff] base_ms must be 1..=max_ms".to_string());
        }
    }
    if let Some(percent) = int("health", "ratio_percent") {
        if percent > 100 {
            errors.push("[health] ratio_percent must be 0-100".to_string());
        }
    }
    for (section, key) in [("scan", "frames_per_step"), ("ingest", "batch_frames")] {
        if int(section, key) == Some(0) {
            errors.push(format!("[{}] {} must be non-zero", section, key));
        }
    }
}
