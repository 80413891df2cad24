//! Minimal TOML overlay for link configuration
//!
//! Handles only the subset `link.toml` uses:
//! - `[section]` headers
//! - `key = value` pairs with integer, boolean or string values
//! - Comments (`# ...`), including trailing ones
//!
//! Keys present in the input replace the matching field of the base
//! configuration; everything else keeps its value. Unknown keys are ignored
//! so older firmware accepts newer files.

use super::link::LinkConfig;
use crate::profile::ProfileKind;

/// Parse error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseError {
    /// Unknown or malformed section header
    InvalidSection,
    /// Value of the wrong type or out of range
    InvalidValue,
    /// Profile name not compiled in
    UnknownProfile,
    /// A line that is neither a header nor a key-value pair
    InvalidLine,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Root,
    Link,
    Scan,
    Ingest,
    Health,
    Backoff,
    Store,
}

/// Parse `input` on top of `base`
pub fn parse_link_config(input: &str, base: LinkConfig) -> Result<LinkConfig, ParseError> {
    let mut config = base;
    let mut section = Section::Root;

    for line in input.lines() {
        let line = line.trim();

        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        if line.starts_with('[') {
            let header = strip_comment(line);
            if !header.ends_with(']') {
                return Err(ParseError::InvalidSection);
            }
            section = parse_section_header(&header[1..header.len() - 1])?;
            continue;
        }

        let (key, value) = parse_key_value(line).ok_or(ParseError::InvalidLine)?;
        apply_value(section, key, value, &mut config)?;
    }

    Ok(config)
}

fn parse_section_header(header: &str) -> Result<Section, ParseError> {
    match header.trim() {
        "link" => Ok(Section::Link),
        "scan" => Ok(Section::Scan),
        "ingest" => Ok(Section::Ingest),
        "health" => Ok(Section::Health),
        "backoff" => Ok(Section::Backoff),
        "store" => Ok(Section::Store),
        _ => Err(ParseError::InvalidSection),
    }
}

/// Drop a trailing comment that is not inside a string
fn strip_comment(text: &str) -> &str {
    match text.find('#') {
        Some(pos) if text[..pos].matches('"').count() % 2 == 0 => text[..pos].trim(),
        _ => text,
    }
}

/// Split "key = value"
fn parse_key_value(line: &str) -> Option<(&str, &str)> {
    let eq_pos = line.find('=')?;
    let key = line[..eq_pos].trim();
    let value = strip_comment(line[eq_pos + 1..].trim());

    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some((key, value))
}

fn parse_string(value: &str) -> Result<&str, ParseError> {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        Ok(&value[1..value.len() - 1])
    } else {
        Err(ParseError::InvalidValue)
    }
}

/// Integers accept `_` separators (`30_000`)
fn parse_int<T: core::str::FromStr>(value: &str) -> Result<T, ParseError> {
    let mut digits = heapless::String::<24>::new();
    for c in value.chars().filter(|&c| c != '_') {
        digits.push(c).map_err(|_| ParseError::InvalidValue)?;
    }
    digits.parse().map_err(|_| ParseError::InvalidValue)
}

fn parse_bool(value: &str) -> Result<bool, ParseError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ParseError::InvalidValue),
    }
}

fn parse_profile(value: &str) -> Result<ProfileKind, ParseError> {
    ProfileKind::from_name(parse_string(value)?).ok_or(ParseError::UnknownProfile)
}

fn apply_value(section: Section, key: &str, value: &str, config: &mut LinkConfig) -> Result<(), ParseError> {
    match section {
        Section::Root | Section::Link => match key {
            "profile" => config.profile = parse_profile(value)?,
            "simulate" => config.simulate = parse_bool(value)?,
            _ => {}
        },
        Section::Scan => {
            let s = &mut config.scan;
            match key {
                "listen_window_ms" => s.listen_window_ms = parse_int(value)?,
                "normal_window_ms" => s.normal_window_ms = parse_int(value)?,
                "confirm_window_ms" => s.confirm_window_ms = parse_int(value)?,
                "confirm_passes" => s.confirm_passes = parse_int(value)?,
                "guard_window_ms" => s.guard_window_ms = parse_int(value)?,
                "validate_window_ms" => s.validate_window_ms = parse_int(value)?,
                "clear_margin" => s.clear_margin = parse_int(value)?,
                "frames_per_step" => s.frames_per_step = parse_int(value)?,
                _ => {}
            }
        }
        Section::Ingest => {
            let i = &mut config.ingest;
            match key {
                "batch_frames" => i.batch_frames = parse_int(value)?,
                "invalid_hold_ms" => i.invalid_hold_ms = parse_int(value)?,
                "status_interval_ms" => i.status_interval_ms = parse_int(value)?,
                _ => {}
            }
        }
        Section::Health => {
            let h = &mut config.health;
            match key {
                "link_window_ms" => h.link_window_ms = parse_int(value)?,
                "no_match_floor" => h.no_match_floor = parse_int(value)?,
                "no_frames_ms" => h.no_frames_ms = parse_int(value)?,
                "lag_ms" => h.lag_ms = parse_int(value)?,
                "no_match_ms" => h.no_match_ms = parse_int(value)?,
                "oor_window_ms" => h.oor_window_ms = parse_int(value)?,
                "implausible_count" => h.implausible_count = parse_int(value)?,
                "ratio_min_samples" => h.ratio_min_samples = parse_int(value)?,
                "ratio_percent" => h.ratio_percent = parse_int(value)?,
                "edge_activity_min" => h.edge_activity_min = parse_int(value)?,
                "no_frames_dwell_ms" => h.no_frames_dwell_ms = parse_int(value)?,
                "recent_frame_ms" => h.recent_frame_ms = parse_int(value)?,
                _ => {}
            }
        }
        Section::Backoff => {
            let b = &mut config.backoff;
            match key {
                "base_ms" => b.base_ms = parse_int(value)?,
                "max_ms" => b.max_ms = parse_int(value)?,
                "cooldown_ms" => b.cooldown_ms = parse_int(value)?,
                "scan_retry_ms" => b.scan_retry_ms = parse_int(value)?,
                "scan_retry_max_ms" => b.scan_retry_max_ms = parse_int(value)?,
                "stable_ms" => b.stable_ms = parse_int(value)?,
                "stuck_ms" => b.stuck_ms = parse_int(value)?,
                "stuck_interval_ms" => b.stuck_interval_ms = parse_int(value)?,
                _ => {}
            }
        }
        Section::Store => match key {
            "stale_ms" => config.store.stale_ms = Some(parse_int(value)?),
            "expire_ms" => config.store.expire_ms = Some(parse_int(value)?),
            _ => {}
        },
    }
    Ok(())
}
