//! Ports and port specifications.
//!
//! A user writes a [`PortSpec`] ("22,80,8000-8100", "all", or nothing at all);
//! [`expand`] turns it into the ascending, duplicate-free [`PortSet`] that
//! jobs are built from.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A port number in 1-65535. Zero is not a probe target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Port(u16);

impl Port {
    pub const LOWEST: Port = Port(1);
    pub const HIGHEST: Port = Port(u16::MAX);

    /// `None` for port 0.
    #[inline]
    pub const fn new(value: u16) -> Option<Self> {
        match value {
            0 => None,
            n => Some(Self(n)),
        }
    }

    #[inline]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl TryFrom<u16> for Port {
    type Error = PortError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(PortError::OutOfRange(u32::from(value)))
    }
}

/// Why a port specification was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("{0} is not a port number (expected 1-65535)")]
    OutOfRange(u32),
    #[error("'{0}' is not a port or a port range")]
    InvalidFormat(String),
    #[error("range start ({0}) > end ({1})")]
    InvalidRange(u16, u16),
    #[error("no ports given")]
    Empty,
}

/// Inclusive run of ports, `first <= last`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRange {
    first: Port,
    last: Port,
}

impl PortRange {
    pub fn new(first: Port, last: Port) -> Result<Self, PortError> {
        if first > last {
            return Err(PortError::InvalidRange(first.0, last.0));
        }
        Ok(Self { first, last })
    }

    pub const fn single(port: Port) -> Self {
        Self {
            first: port,
            last: port,
        }
    }

    pub const fn everything() -> Self {
        Self {
            first: Port::LOWEST,
            last: Port::HIGHEST,
        }
    }

    pub const fn len(&self) -> usize {
        (self.last.0 - self.first.0) as usize + 1
    }

    /// Never true; a range holds at least its first port.
    pub const fn is_empty(&self) -> bool {
        false
    }

    pub fn ports(&self) -> impl Iterator<Item = Port> {
        (self.first.0..=self.last.0).map(Port)
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.len() {
            1 => write!(f, "{}", self.first),
            _ => write!(f, "{}-{}", self.first, self.last),
        }
    }
}

/// Ports probed when no specification is given.
pub const COMMON_PORTS: &[u16] = &[
    21, 22, 23, 25, 53, 80, 110, 111, 135, 139, 143, 443, 445, 993, 995, 1723, 3306, 3389, 5900,
    8080, 8443,
];

/// What the user asked to scan.
///
/// Parses `"-"`/`"all"` as [`PortSpec::All`], `"common"` as
/// [`PortSpec::Common`], and anything else as a comma list of
/// `N` or `A-B` items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PortSpec {
    /// [`COMMON_PORTS`].
    #[default]
    Common,
    /// 1-65535.
    All,
    /// Explicit ports and ranges, in the order written.
    Ranges(Vec<PortRange>),
}

impl PortSpec {
    /// Sorted, deduplicated ports this spec covers.
    pub fn to_set(&self) -> PortSet {
        let mut ports: Vec<Port> = match self {
            Self::Common => COMMON_PORTS.iter().copied().filter_map(Port::new).collect(),
            Self::All => PortRange::everything().ports().collect(),
            Self::Ranges(ranges) => ranges.iter().flat_map(PortRange::ports).collect(),
        };
        ports.sort_unstable();
        ports.dedup();
        PortSet(ports)
    }
}

/// Parse one bound. Only ASCII digits are accepted, so "+80" and "-80" fail.
fn parse_bound(raw: &str) -> Result<Port, PortError> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PortError::InvalidFormat(raw.to_string()));
    }
    let value: u32 = raw
        .parse()
        .map_err(|_| PortError::InvalidFormat(raw.to_string()))?;
    u16::try_from(value)
        .ok()
        .and_then(Port::new)
        .ok_or(PortError::OutOfRange(value))
}

fn parse_item(item: &str) -> Result<PortRange, PortError> {
    match item.split_once('-') {
        Some((first, last)) => PortRange::new(parse_bound(first)?, parse_bound(last)?),
        None => parse_bound(item).map(PortRange::single),
    }
}

impl FromStr for PortSpec {
    type Err = PortError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(PortError::Empty),
            "-" => Ok(Self::All),
            t if t.eq_ignore_ascii_case("all") => Ok(Self::All),
            t if t.eq_ignore_ascii_case("common") => Ok(Self::Common),
            t => t
                .split(',')
                .map(parse_item)
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Ranges),
        }
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Common => f.write_str("common"),
            Self::All => f.write_str("all"),
            Self::Ranges(ranges) => {
                for (i, range) in ranges.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}", range)?;
                }
                Ok(())
            }
        }
    }
}

/// Ascending ports with no repeats.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PortSet(Vec<Port>);

impl PortSet {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, port: Port) -> bool {
        self.0.binary_search(&port).is_ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = Port> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[Port] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a PortSet {
    type Item = &'a Port;
    type IntoIter = std::slice::Iter<'a, Port>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Expand an optional port specification into the set of ports to probe.
///
/// `None` selects [`COMMON_PORTS`]; `"-"` or `"all"` selects 1-65535.
pub fn expand(spec: Option<&str>) -> Result<PortSet, PortError> {
    let spec = spec.map(str::parse::<PortSpec>).transpose()?.unwrap_or_default();
    let set = PortSpec::to_set(&spec);
    if set.is_empty() {
        return Err(PortError::Empty);
    }
    Ok(set)
}
