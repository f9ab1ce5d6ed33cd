//! Declarative configuration: parsing, unit normalization and validation.
//!
//! Pure functions only: no I/O, no async. Filesystem existence checks are
//! injected by the caller as a predicate.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::domain::error::{ConfigError, VagrantpError};
use crate::domain::instance::InfraKind;

// ── Constants ────────────────────────────────────────────────────────────────

pub const KEY_INFRA_KIND: &str = "infra_kind";
pub const KEY_BACKEND_NAME: &str = "backend_name";
pub const KEY_MEMORY: &str = "memory";
pub const KEY_CPU_COUNT: &str = "cpu_count";
pub const KEY_DISK_SIZE: &str = "disk_size";
pub const KEY_NETWORK_MODE: &str = "network_mode";
pub const KEY_STATIC_IP: &str = "static_ip";
pub const KEY_PORT_MAPPINGS: &str = "port_mappings";
pub const KEY_PLAYBOOK_PATH: &str = "playbook_path";
pub const KEY_VARS_PATH: &str = "vars_path";
pub const KEY_AUTO_BOOTSTRAP: &str = "auto_bootstrap_config_mgmt";
pub const KEY_INFRA_ID: &str = "infra_id";
pub const KEY_BOX: &str = "box";
pub const KEY_IMAGE: &str = "image";
pub const KEY_SSH_USER: &str = "ssh_user";
pub const KEY_SSH_KEY: &str = "ssh_key";

/// Legacy and shorthand key names accepted in the source file.
const KEY_ALIASES: &[(&str, &str)] = &[
    ("infra_type", KEY_INFRA_KIND),
    ("provider", KEY_BACKEND_NAME),
    ("backend", KEY_BACKEND_NAME),
    ("cpus", KEY_CPU_COUNT),
    ("ip_address", KEY_STATIC_IP),
    ("ports", KEY_PORT_MAPPINGS),
    ("provisioning_playbook", KEY_PLAYBOOK_PATH),
    ("provisioning_vars", KEY_VARS_PATH),
    ("provisioning_auto_install_ansible", KEY_AUTO_BOOTSTRAP),
];

pub const MIN_MEMORY_MB: u64 = 512;
pub const MIN_CPU_COUNT: u32 = 1;
pub const MIN_DISK_GB: u64 = 5;

pub const DEFAULT_BOX: &str = "generic/alpine319";
pub const DEFAULT_IMAGE: &str = "alpine:latest";

const TRUTHY: &[&str] = &["true", "1", "yes"];
const FALSY: &[&str] = &["false", "0", "no"];

#[allow(clippy::expect_used)] // pattern is a compile-time constant
static SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)(G|GB|M|MB)?$").expect("valid size pattern"));

// ── Configuration ────────────────────────────────────────────────────────────

/// Ordered key/value pairs loaded from a single `.env`-style source.
///
/// Keys are stored in canonical form; a later duplicate overwrites the
/// earlier value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    entries: Vec<(String, String)>,
}

impl Configuration {
    /// Parse `KEY=VALUE` lines. Blank lines and `#` comments are skipped,
    /// as are lines without `=`.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut config = Self::default();
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                config.set(key, value.trim());
            }
        }
        config
    }

    /// Build from literal pairs (keys are canonicalized).
    #[must_use]
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut config = Self::default();
        for (k, v) in pairs {
            config.set(k, v);
        }
        config
    }

    pub fn set(&mut self, key: &str, value: &str) {
        let key = canonical_key(key);
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value.to_string();
        } else {
            self.entries.push((key, value.to_string()));
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        let key = canonical_key(key);
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Lower-case the key and resolve aliases to the canonical name.
#[must_use]
pub fn canonical_key(raw: &str) -> String {
    let lower = raw.trim().to_ascii_lowercase();
    KEY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map_or(lower, |(_, canonical)| (*canonical).to_string())
}

// ── Value parsers ────────────────────────────────────────────────────────────

/// Parse a memory size to megabytes. `G`/`GB` multiply by 1024;
/// `M`/`MB`/no suffix are taken as megabytes.
///
/// # Errors
///
/// Returns `ConfigError::InvalidFormat` naming `MEMORY` when the value is
/// not `digits[unit]`.
pub fn parse_memory_mb(raw: &str) -> Result<u64, ConfigError> {
    let (value, unit) = split_size(raw, "MEMORY")?;
    match unit {
        Some("G" | "GB") => value.checked_mul(1024).ok_or_else(|| invalid("MEMORY", raw)),
        _ => Ok(value),
    }
}

/// Parse a disk size to gigabytes. `M`/`MB` integer-divide by 1024;
/// `G`/`GB`/no suffix are taken as gigabytes.
///
/// # Errors
///
/// Returns `ConfigError::InvalidFormat` naming `DISK_SIZE` when the value
/// is not `digits[unit]`.
pub fn parse_disk_gb(raw: &str) -> Result<u64, ConfigError> {
    let (value, unit) = split_size(raw, "DISK_SIZE")?;
    match unit {
        Some("M" | "MB") => Ok(value / 1024),
        _ => Ok(value),
    }
}

fn split_size(raw: &str, field: &'static str) -> Result<(u64, Option<&'static str>), ConfigError> {
    let upper = raw.trim().to_ascii_uppercase();
    let caps = SIZE_RE.captures(&upper).ok_or_else(|| invalid(field, raw))?;
    let value: u64 = caps[1].parse().map_err(|_| invalid(field, raw))?;
    let unit = caps.get(2).map(|m| match m.as_str() {
        "G" => "G",
        "GB" => "GB",
        "M" => "M",
        _ => "MB",
    });
    Ok((value, unit))
}

fn invalid(field: &'static str, raw: &str) -> ConfigError {
    ConfigError::InvalidFormat {
        field,
        value: raw.trim().to_string(),
    }
}

/// One forwarded port. `auto` means the host side is assigned by the
/// backend; `host` is then `0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortMapping {
    pub host: u16,
    pub guest: u16,
    pub auto: bool,
}

/// Parse a single `HOST:GUEST` entry (`HOST` may be `auto`).
///
/// # Errors
///
/// Returns `ConfigError::InvalidPortMapping` for a missing `:` or a side
/// that is not a port number.
pub fn parse_port_mapping(entry: &str) -> Result<PortMapping, ConfigError> {
    let entry = entry.trim();
    let bad = || ConfigError::InvalidPortMapping {
        mapping: entry.to_string(),
    };
    let (host, guest) = entry.split_once(':').ok_or_else(bad)?;
    let guest: u16 = guest.trim().parse().map_err(|_| bad())?;
    let host = host.trim();
    if host.eq_ignore_ascii_case("auto") {
        return Ok(PortMapping {
            host: 0,
            guest,
            auto: true,
        });
    }
    let host: u16 = host.parse().map_err(|_| bad())?;
    Ok(PortMapping {
        host,
        guest,
        auto: false,
    })
}

/// Parse a comma-separated list of port mappings. An empty string is an
/// empty list.
///
/// # Errors
///
/// Returns the first malformed entry.
pub fn parse_port_mappings(raw: &str) -> Result<Vec<PortMapping>, ConfigError> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    raw.split(',').map(parse_port_mapping).collect()
}

/// Accepts `true/false`, `1/0`, `yes/no` (case-insensitive).
#[must_use]
pub fn parse_bool(raw: &str) -> Option<bool> {
    let lower = raw.trim().to_ascii_lowercase();
    if TRUTHY.contains(&lower.as_str()) {
        Some(true)
    } else if FALSY.contains(&lower.as_str()) {
        Some(false)
    } else {
        None
    }
}

// ── Validation ───────────────────────────────────────────────────────────────

/// Outcome of `validate`: every violation plus non-fatal warnings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Validate every rule and accumulate all violations.
///
/// `exists` answers whether a configured path is present on disk.
#[must_use]
pub fn validate(config: &Configuration, exists: impl Fn(&Path) -> bool) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let kind = match config.get(KEY_INFRA_KIND) {
        None => {
            errors.push(format!("{KEY_INFRA_KIND} is required"));
            None
        }
        Some(raw) => match raw.parse::<InfraKind>() {
            Ok(kind) => Some(kind),
            Err(e) => {
                errors.push(e);
                None
            }
        },
    };

    if kind == Some(InfraKind::Vm) && config.get(KEY_BACKEND_NAME).is_none_or(str::is_empty) {
        errors.push(format!("{KEY_BACKEND_NAME} is required for VM infrastructure"));
    }
    if kind == Some(InfraKind::Container) && config.contains(KEY_DISK_SIZE) {
        warnings.push(format!(
            "{KEY_DISK_SIZE} is not applicable for container infrastructure (ignored)"
        ));
    }

    if let Some(raw) = config.get(KEY_MEMORY) {
        match parse_memory_mb(raw) {
            Ok(mb) if mb < MIN_MEMORY_MB => errors.push(format!(
                "{KEY_MEMORY} must be at least {MIN_MEMORY_MB}MB, got: {mb}MB"
            )),
            Ok(_) => {}
            Err(e) => errors.push(e.to_string()),
        }
    }

    if let Some(raw) = config.get(KEY_CPU_COUNT) {
        match raw.trim().parse::<i64>() {
            Ok(n) if n < i64::from(MIN_CPU_COUNT) => {
                errors.push(format!("{KEY_CPU_COUNT} must be at least {MIN_CPU_COUNT}, got: {n}"));
            }
            Ok(n) if u32::try_from(n).is_err() => {
                errors.push(format!("Invalid {KEY_CPU_COUNT} value: {raw}"));
            }
            Ok(_) => {}
            Err(_) => errors.push(format!("Invalid {KEY_CPU_COUNT} value: {raw}")),
        }
    }

    if kind != Some(InfraKind::Container)
        && let Some(raw) = config.get(KEY_DISK_SIZE)
    {
        match parse_disk_gb(raw) {
            Ok(gb) if gb < MIN_DISK_GB => errors.push(format!(
                "{KEY_DISK_SIZE} must be at least {MIN_DISK_GB}GB, got: {gb}GB"
            )),
            Ok(_) => {}
            Err(e) => errors.push(e.to_string()),
        }
    }

    if let Some(raw) = config.get(KEY_NETWORK_MODE)
        && raw.parse::<NetworkMode>().is_err()
    {
        errors.push(format!(
            "{KEY_NETWORK_MODE} must be 'bridge' or 'default', got: {raw}"
        ));
    }

    if let Some(raw) = config.get(KEY_STATIC_IP)
        && raw.trim().parse::<Ipv4Addr>().is_err()
    {
        errors.push(format!("Invalid {KEY_STATIC_IP} format: {raw}"));
    }

    if let Some(raw) = config.get(KEY_PORT_MAPPINGS)
        && !raw.trim().is_empty()
    {
        for entry in raw.split(',') {
            if let Err(e) = parse_port_mapping(entry) {
                errors.push(e.to_string());
            }
        }
    }

    if let Some(raw) = config.get(KEY_PLAYBOOK_PATH) {
        let path = Path::new(raw);
        if !exists(path) {
            errors.push(format!("{KEY_PLAYBOOK_PATH} not found: {raw}"));
        }
        let ext = path.extension().and_then(|e| e.to_str());
        if !matches!(ext, Some("yml" | "yaml")) {
            errors.push(format!("{KEY_PLAYBOOK_PATH} must be a .yml or .yaml file"));
        }
    }

    if let Some(raw) = config.get(KEY_VARS_PATH)
        && !exists(Path::new(raw))
    {
        errors.push(format!("{KEY_VARS_PATH} not found: {raw}"));
    }

    if let Some(raw) = config.get(KEY_AUTO_BOOTSTRAP)
        && parse_bool(raw).is_none()
    {
        errors.push(format!(
            "{KEY_AUTO_BOOTSTRAP} must be true/false, 1/0, or yes/no"
        ));
    }

    ValidationReport {
        valid: errors.is_empty(),
        errors,
        warnings,
    }
}

// ── Typed settings ───────────────────────────────────────────────────────────

/// Guest networking mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NetworkMode {
    Bridge,
    #[default]
    Default,
}

impl std::str::FromStr for NetworkMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "bridge" => Ok(Self::Bridge),
            "default" => Ok(Self::Default),
            _ => Err(()),
        }
    }
}

/// Provisioning inputs taken from the configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvisioningSettings {
    pub playbook: Option<PathBuf>,
    pub vars: Option<PathBuf>,
    pub auto_bootstrap: bool,
    pub ssh_user: Option<String>,
    pub ssh_key: Option<PathBuf>,
}

/// Typed view of a configuration that passed `validate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfraSettings {
    pub kind: InfraKind,
    pub infra_id: Option<String>,
    pub backend_name: Option<String>,
    pub memory_mb: u64,
    pub cpu_count: u32,
    /// `None` for containers.
    pub disk_gb: Option<u64>,
    pub network_mode: NetworkMode,
    pub static_ip: Option<Ipv4Addr>,
    pub port_mappings: Vec<PortMapping>,
    pub base_box: String,
    pub image: String,
    pub provisioning: ProvisioningSettings,
}

impl InfraSettings {
    /// Convert a configuration into typed settings, applying per-kind defaults.
    ///
    /// # Errors
    ///
    /// Returns `VagrantpError::ConfigInvalid` if any value fails to parse.
    /// Callers are expected to have run `validate` first.
    pub fn from_config(config: &Configuration) -> Result<Self, VagrantpError> {
        let mut errors = Vec::new();
        let mut note = |e: String| errors.push(e);

        let kind = match config.get(KEY_INFRA_KIND).map(str::parse::<InfraKind>) {
            Some(Ok(kind)) => kind,
            Some(Err(e)) => {
                note(e);
                InfraKind::Vm
            }
            None => {
                note(format!("{KEY_INFRA_KIND} is required"));
                InfraKind::Vm
            }
        };
        let (default_mem, default_cpus) = match kind {
            InfraKind::Vm => (2048, 2),
            InfraKind::Container => (512, 1),
        };

        let memory_mb = config
            .get(KEY_MEMORY)
            .map_or(Ok(default_mem), parse_memory_mb)
            .unwrap_or_else(|e| {
                note(e.to_string());
                default_mem
            });
        let cpu_count = config
            .get(KEY_CPU_COUNT)
            .map_or(Ok(default_cpus), |raw| raw.trim().parse::<u32>())
            .unwrap_or_else(|_| {
                note(format!("Invalid {KEY_CPU_COUNT} value"));
                default_cpus
            });
        let disk_gb = match kind {
            InfraKind::Container => None,
            InfraKind::Vm => Some(
                config
                    .get(KEY_DISK_SIZE)
                    .map_or(Ok(20), parse_disk_gb)
                    .unwrap_or_else(|e| {
                        note(e.to_string());
                        20
                    }),
            ),
        };
        let network_mode = config
            .get(KEY_NETWORK_MODE)
            .map_or(Ok(NetworkMode::Default), str::parse)
            .unwrap_or_else(|()| {
                note(format!("Invalid {KEY_NETWORK_MODE}"));
                NetworkMode::Default
            });
        let static_ip = match config.get(KEY_STATIC_IP).map(|s| s.trim().parse::<Ipv4Addr>()) {
            Some(Ok(ip)) => Some(ip),
            Some(Err(_)) => {
                note(format!("Invalid {KEY_STATIC_IP}"));
                None
            }
            None => None,
        };
        let port_mappings = config
            .get(KEY_PORT_MAPPINGS)
            .map_or(Ok(Vec::new()), parse_port_mappings)
            .unwrap_or_else(|e| {
                note(e.to_string());
                Vec::new()
            });
        let auto_bootstrap = config
            .get(KEY_AUTO_BOOTSTRAP)
            .map_or(Some(false), parse_bool)
            .unwrap_or_else(|| {
                note(format!("Invalid {KEY_AUTO_BOOTSTRAP}"));
                false
            });

        if !errors.is_empty() {
            return Err(VagrantpError::ConfigInvalid { errors });
        }

        let non_empty = |key: &str| {
            config
                .get(key)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        Ok(Self {
            kind,
            infra_id: non_empty(KEY_INFRA_ID),
            backend_name: non_empty(KEY_BACKEND_NAME),
            memory_mb,
            cpu_count,
            disk_gb,
            network_mode,
            static_ip,
            port_mappings,
            base_box: non_empty(KEY_BOX).unwrap_or_else(|| DEFAULT_BOX.to_string()),
            image: non_empty(KEY_IMAGE).unwrap_or_else(|| DEFAULT_IMAGE.to_string()),
            provisioning: ProvisioningSettings {
                playbook: non_empty(KEY_PLAYBOOK_PATH).map(PathBuf::from),
                vars: non_empty(KEY_VARS_PATH).map(PathBuf::from),
                auto_bootstrap,
                ssh_user: non_empty(KEY_SSH_USER),
                ssh_key: non_empty(KEY_SSH_KEY).map(PathBuf::from),
            },
        })
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
