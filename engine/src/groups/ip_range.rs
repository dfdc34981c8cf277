//! IP range parsing and matching for IP-based group membership.
//!
//! Ranges are written as `BEGIN-END`, separated by `;`. A single address is a
//! range whose bounds are equal. Both IPv4 and IPv6 are accepted, but a range
//! never spans address families.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::error::{AccessError, AccessResult};

/// Separator between ranges in the textual form.
pub const RANGE_SEPARATOR: char = ';';

/// Separator between the bounds of one range.
pub const BOUND_SEPARATOR: char = '-';

/// Inclusive address range with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IpRange {
    start: IpAddr,
    end: IpAddr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Family {
    V4,
    V6,
}

/// Address family and integer ordinal of an address, as written.
fn ordinal(addr: IpAddr) -> (Family, u128) {
    match addr {
        IpAddr::V4(v4) => (Family::V4, u128::from(u32::from(v4))),
        IpAddr::V6(v6) => (Family::V6, u128::from(v6)),
    }
}

impl IpRange {
    /// Build a range from its bounds.
    ///
    /// Family and order are checked on the bounds as written. A range whose
    /// bounds are both IPv4-mapped is stored as the equivalent IPv4 range.
    pub fn new(start: IpAddr, end: IpAddr) -> AccessResult<Self> {
        let (start_family, start_ord) = ordinal(start);
        let (end_family, end_ord) = ordinal(end);

        if start_family != end_family {
            return Err(AccessError::validation(format!(
                "IP range {start}-{end} mixes IPv4 and IPv6"
            )));
        }
        if start_ord > end_ord {
            return Err(AccessError::validation(format!(
                "IP range {start}-{end} has its bounds out of order"
            )));
        }

        if let (IpAddr::V6(s), IpAddr::V6(e)) = (start, end) {
            if let (Some(s), Some(e)) = (s.to_ipv4_mapped(), e.to_ipv4_mapped()) {
                return Ok(Self {
                    start: IpAddr::V4(s),
                    end: IpAddr::V4(e),
                });
            }
        }
        Ok(Self { start, end })
    }

    pub fn single(addr: IpAddr) -> Self {
        let addr = addr.to_canonical();
        Self {
            start: addr,
            end: addr,
        }
    }

    pub const fn start(&self) -> IpAddr {
        self.start
    }

    pub const fn end(&self) -> IpAddr {
        self.end
    }

    /// Whether the range holds `addr`, in its IPv4 or IPv4-mapped form.
    pub fn contains(&self, addr: IpAddr) -> bool {
        match addr.to_canonical() {
            IpAddr::V4(v4) => {
                self.contains_exact(IpAddr::V4(v4))
                    || self.contains_exact(IpAddr::V6(v4.to_ipv6_mapped()))
            }
            v6 => self.contains_exact(v6),
        }
    }

    fn contains_exact(&self, addr: IpAddr) -> bool {
        let (family, value) = ordinal(addr);
        let (range_family, start) = ordinal(self.start);
        let (_, end) = ordinal(self.end);

        family == range_family && (start..=end).contains(&value)
    }
}

impl fmt::Display for IpRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}{BOUND_SEPARATOR}{}", self.start, self.end)
        }
    }
}

fn parse_addr(raw: &str) -> AccessResult<IpAddr> {
    raw.trim()
        .parse()
        .map_err(|_| AccessError::validation(format!("Invalid IP address: {:?}", raw.trim())))
}

impl FromStr for IpRange {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(BOUND_SEPARATOR) {
            Some((start, end)) => Self::new(parse_addr(start)?, parse_addr(end)?),
            None => parse_addr(s).map(Self::single),
        }
    }
}

/// Parse a `;`-separated list of ranges.
///
/// Blank entries (e.g. a trailing `;`) are skipped. Any malformed entry
/// rejects the whole list.
pub fn parse_ranges(input: &str) -> AccessResult<Vec<IpRange>> {
    input
        .split(RANGE_SEPARATOR)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(str::parse)
        .collect()
}

/// Textual form of a range list, the inverse of [`parse_ranges`].
pub fn format_ranges(ranges: &[IpRange]) -> String {
    ranges
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(&RANGE_SEPARATOR.to_string())
}

/// Whether `address` falls within at least one of `ranges`.
pub fn matches(address: IpAddr, ranges: &[IpRange]) -> bool {
    ranges.iter().any(|range| range.contains(address))
}
