//! Environment-variable helpers shared by the `from_env()` constructors.
//!
//! Misconfiguration is a startup error: these panic with the variable name
//! rather than silently falling back.

use std::str::FromStr;

/// Read `name`, falling back to `default`, and parse it.
///
/// # Panics
///
/// If the value (or the default) does not parse as `T`.
pub fn var_or<T: FromStr>(name: &str, default: &str) -> T {
    let raw = std::env::var(name).unwrap_or_else(|_| default.into());
    raw.trim()
        .parse()
        .unwrap_or_else(|_| panic!("{name} must be a valid {}", std::any::type_name::<T>()))
}

/// Read an optional variable; empty values count as unset.
pub fn var_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read a boolean flag (`1`, `true`, `yes`, `on` are true).
pub fn flag(name: &str) -> bool {
    var_opt(name)
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}
