//! Key=value configuration store
//!
//! Scenario files use one `dotted.namespace.key = value` pair per line with
//! `#` comments. Values support `k`/`M`/`G` size suffixes and `lo,hi`
//! ranges. Group-scoped lookups fall back from `Group3.key` to the shared
//! `Group.key`. Every failed lookup is a fatal configuration error naming
//! the key, raised before tick 0.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{SimError, SimResult};

#[derive(Debug, Clone, Default)]
pub struct Settings {
    values: BTreeMap<String, String>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse settings from text
    pub fn parse(text: &str) -> SimResult<Self> {
        let mut values = BTreeMap::new();
        for (lineno, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(SimError::config(
                    line,
                    format!("line {}: expected 'key = value'", lineno + 1),
                ));
            };
            values.insert(key.trim().to_string(), value.trim().to_string());
        }
        Ok(Self { values })
    }

    pub fn from_file(path: impl AsRef<Path>) -> SimResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Insert or overwrite a value (used by tests and demo scenarios)
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn raw(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn get(&self, key: &str) -> SimResult<&str> {
        self.raw(key)
            .ok_or_else(|| SimError::config(key, "missing required setting"))
    }

    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.raw(key).unwrap_or(default)
    }

    pub fn get_f64(&self, key: &str) -> SimResult<f64> {
        parse_f64(key, self.get(key)?)
    }

    pub fn get_f64_or(&self, key: &str, default: f64) -> SimResult<f64> {
        match self.raw(key) {
            Some(v) => parse_f64(key, v),
            None => Ok(default),
        }
    }

    pub fn get_usize(&self, key: &str) -> SimResult<usize> {
        let v = self.get(key)?;
        v.parse()
            .map_err(|_| SimError::config(key, format!("'{v}' is not a valid integer")))
    }

    pub fn get_usize_or(&self, key: &str, default: usize) -> SimResult<usize> {
        match self.raw(key) {
            Some(v) => v
                .parse()
                .map_err(|_| SimError::config(key, format!("'{v}' is not a valid integer"))),
            None => Ok(default),
        }
    }

    pub fn get_u64_or(&self, key: &str, default: u64) -> SimResult<u64> {
        match self.raw(key) {
            Some(v) => v
                .parse()
                .map_err(|_| SimError::config(key, format!("'{v}' is not a valid integer"))),
            None => Ok(default),
        }
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> SimResult<bool> {
        match self.raw(key) {
            Some("true") => Ok(true),
            Some("false") => Ok(false),
            Some(v) => Err(SimError::config(
                key,
                format!("'{v}' is not a boolean (expected true/false)"),
            )),
            None => Ok(default),
        }
    }

    /// Byte count with optional `k`/`M`/`G` decimal suffix
    pub fn get_size(&self, key: &str) -> SimResult<u64> {
        parse_size(key, self.get(key)?)
    }

    pub fn get_size_or(&self, key: &str, default: u64) -> SimResult<u64> {
        match self.raw(key) {
            Some(v) => parse_size(key, v),
            None => Ok(default),
        }
    }

    /// A `lo,hi` range; a single value yields a degenerate `(v, v)` range
    pub fn get_range_f64(&self, key: &str) -> SimResult<(f64, f64)> {
        let v = self.get(key)?;
        parse_range(key, v, parse_f64)
    }

    /// An unordered `x, y` pair (world sizes, coordinates)
    pub fn get_coord(&self, key: &str) -> SimResult<(f64, f64)> {
        let v = self.get(key)?;
        let Some((x, y)) = v.split_once(',') else {
            return Err(SimError::config(key, format!("'{v}' is not an 'x, y' pair")));
        };
        Ok((parse_f64(key, x.trim())?, parse_f64(key, y.trim())?))
    }

    pub fn get_range_f64_or(&self, key: &str, default: (f64, f64)) -> SimResult<(f64, f64)> {
        match self.raw(key) {
            Some(v) => parse_range(key, v, parse_f64),
            None => Ok(default),
        }
    }

    /// A `lo,hi` byte-size range supporting suffixes
    pub fn get_range_size(&self, key: &str) -> SimResult<(u64, u64)> {
        let v = self.get(key)?;
        parse_range(key, v, parse_size)
    }

    /// Lookups under `primary.` falling back to `fallback.`
    pub fn scoped<'a>(&'a self, primary: &str, fallback: &str) -> ScopedSettings<'a> {
        ScopedSettings {
            base: self,
            primary: primary.to_string(),
            fallback: fallback.to_string(),
        }
    }
}

/// A view of [`Settings`] resolving `Group3.key`, then `Group.key`
#[derive(Debug, Clone)]
pub struct ScopedSettings<'a> {
    base: &'a Settings,
    primary: String,
    fallback: String,
}

impl<'a> ScopedSettings<'a> {
    fn resolve(&self, key: &str) -> Option<(String, &'a str)> {
        let primary = format!("{}.{}", self.primary, key);
        if let Some(v) = self.base.raw(&primary) {
            return Some((primary, v));
        }
        let fallback = format!("{}.{}", self.fallback, key);
        self.base.raw(&fallback).map(|v| (fallback, v))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.resolve(key).is_some()
    }

    pub fn get(&self, key: &str) -> SimResult<&'a str> {
        self.resolve(key).map(|(_, v)| v).ok_or_else(|| {
            SimError::config(
                format!("{}.{}", self.primary, key),
                "missing required setting",
            )
        })
    }

    pub fn get_or(&self, key: &str, default: &'a str) -> &'a str {
        self.resolve(key).map(|(_, v)| v).unwrap_or(default)
    }

    pub fn get_f64(&self, key: &str) -> SimResult<f64> {
        let (key, v) = self.require(key)?;
        parse_f64(&key, v)
    }

    pub fn get_f64_or(&self, key: &str, default: f64) -> SimResult<f64> {
        match self.resolve(key) {
            Some((key, v)) => parse_f64(&key, v),
            None => Ok(default),
        }
    }

    pub fn get_usize(&self, key: &str) -> SimResult<usize> {
        let (key, v) = self.require(key)?;
        v.parse()
            .map_err(|_| SimError::config(key, format!("'{v}' is not a valid integer")))
    }

    pub fn get_usize_or(&self, key: &str, default: usize) -> SimResult<usize> {
        match self.resolve(key) {
            Some((key, v)) => v
                .parse()
                .map_err(|_| SimError::config(key, format!("'{v}' is not a valid integer"))),
            None => Ok(default),
        }
    }

    pub fn get_size(&self, key: &str) -> SimResult<u64> {
        let (key, v) = self.require(key)?;
        parse_size(&key, v)
    }

    pub fn get_range_f64_or(&self, key: &str, default: (f64, f64)) -> SimResult<(f64, f64)> {
        match self.resolve(key) {
            Some((key, v)) => parse_range(&key, v, parse_f64),
            None => Ok(default),
        }
    }

    pub fn get_range_size(&self, key: &str) -> SimResult<(u64, u64)> {
        let (key, v) = self.require(key)?;
        parse_range(&key, v, parse_size)
    }

    /// An unordered `x, y` pair (coordinates, address ranges)
    pub fn get_coord(&self, key: &str) -> SimResult<(f64, f64)> {
        let (key, v) = self.require(key)?;
        let Some((x, y)) = v.split_once(',') else {
            return Err(SimError::config(key, format!("'{v}' is not an 'x, y' pair")));
        };
        Ok((parse_f64(&key, x.trim())?, parse_f64(&key, y.trim())?))
    }

    fn require(&self, key: &str) -> SimResult<(String, &'a str)> {
        self.resolve(key).ok_or_else(|| {
            SimError::config(
                format!("{}.{}", self.primary, key),
                "missing required setting",
            )
        })
    }
}

fn parse_f64(key: &str, v: &str) -> SimResult<f64> {
    v.parse()
        .map_err(|_| SimError::config(key, format!("'{v}' is not a valid number")))
}

fn parse_size(key: &str, v: &str) -> SimResult<u64> {
    let v = v.trim();
    let (digits, mult) = match v.chars().last() {
        Some('k') => (&v[..v.len() - 1], 1_000u64),
        Some('M') => (&v[..v.len() - 1], 1_000_000),
        Some('G') => (&v[..v.len() - 1], 1_000_000_000),
        _ => (v, 1),
    };
    let base: f64 = digits
        .trim()
        .parse()
        .map_err(|_| SimError::config(key, format!("'{v}' is not a valid size")))?;
    if base < 0.0 {
        return Err(SimError::config(key, format!("'{v}' is negative")));
    }
    Ok((base * mult as f64) as u64)
}

fn parse_range<T: PartialOrd + Copy>(
    key: &str,
    v: &str,
    parse: impl Fn(&str, &str) -> SimResult<T>,
) -> SimResult<(T, T)> {
    match v.split_once(',') {
        Some((lo, hi)) => {
            let lo = parse(key, lo.trim())?;
            let hi = parse(key, hi.trim())?;
            if hi < lo {
                return Err(SimError::config(key, format!("range '{v}' has hi < lo")));
            }
            Ok((lo, hi))
        }
        None => {
            let single = parse(key, v)?;
            Ok((single, single))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_settings() -> Settings {
        Settings::parse(
            "# a comment\n\
             Scenario.endTime = 43200\n\
             Group.bufferSize = 5M\n\
             Group2.bufferSize = 100k\n\
             Group.speed = 0.5, 1.5\n\
             Events1.size = 500k,1M\n\
             Scenario.simulateConnections = true\n",
        )
        .unwrap()
    }

    #[test]
    fn test_basic_lookup() {
        let s = make_settings();
        assert_eq!(s.get_f64("Scenario.endTime").unwrap(), 43200.0);
        assert!(s.get_bool_or("Scenario.simulateConnections", false).unwrap());
    }

    #[test]
    fn test_size_suffixes() {
        let s = make_settings();
        assert_eq!(s.get_size("Group.bufferSize").unwrap(), 5_000_000);
        assert_eq!(s.get_size("Group2.bufferSize").unwrap(), 100_000);
        assert_eq!(
            s.get_range_size("Events1.size").unwrap(),
            (500_000, 1_000_000)
        );
    }

    #[test]
    fn test_group_fallback() {
        let s = make_settings();
        let g1 = s.scoped("Group1", "Group");
        let g2 = s.scoped("Group2", "Group");
        assert_eq!(g1.get_size("bufferSize").unwrap(), 5_000_000);
        assert_eq!(g2.get_size("bufferSize").unwrap(), 100_000);
        assert_eq!(g1.get_range_f64_or("speed", (0.0, 0.0)).unwrap(), (0.5, 1.5));
    }

    #[test]
    fn test_missing_key_names_key() {
        let s = make_settings();
        let err = s.get("Scenario.updateInterval").unwrap_err();
        assert!(err.to_string().contains("Scenario.updateInterval"));

        let err = s.scoped("Group3", "Group").get("nrofHosts").unwrap_err();
        assert!(err.to_string().contains("Group3.nrofHosts"));
    }

    #[test]
    fn test_malformed_value_is_fatal() {
        let s = Settings::parse("Scenario.endTime = soon\n").unwrap();
        assert!(s.get_f64("Scenario.endTime").is_err());
    }

    #[test]
    fn test_single_value_range() {
        let s = Settings::parse("Group.waitTime = 12\n").unwrap();
        let g = s.scoped("Group1", "Group");
        assert_eq!(g.get_range_f64_or("waitTime", (0.0, 0.0)).unwrap(), (12.0, 12.0));
    }

    #[test]
    fn test_inverted_range_rejected() {
        let s = Settings::parse("Group.speed = 5, 1\n").unwrap();
        assert!(s.scoped("Group1", "Group").get_range_f64_or("speed", (0.0, 0.0)).is_err());
    }

    #[test]
    fn test_coord_pairs_are_unordered() {
        // World sizes and node locations are x,y pairs, not ranges
        let s = Settings::parse(
            "MovementModel.worldSize = 4500, 3400\nGroup.nodeLocation = 20, 10\n",
        )
        .unwrap();
        assert_eq!(s.get_coord("MovementModel.worldSize").unwrap(), (4500.0, 3400.0));
        let g = s.scoped("Group1", "Group");
        assert_eq!(g.get_coord("nodeLocation").unwrap(), (20.0, 10.0));
    }
}
