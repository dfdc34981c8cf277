//! Requester Types

use std::collections::BTreeSet;
use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// The already-authenticated party asking for access.
///
/// Everything the engine needs to compute group membership: the user id
/// (`None` for anonymous visitors), the user's role names, the user's
/// privilege level (0-10, `None` for anonymous visitors) and the address the
/// request came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Requester {
    pub user_id: Option<String>,
    pub roles: BTreeSet<String>,
    pub access_level: Option<u8>,
    pub ip: Option<IpAddr>,
}

impl Requester {
    /// A visitor that is not logged in.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A logged-in user without roles.
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            access_level: Some(0),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    #[must_use]
    pub fn with_access_level(mut self, level: u8) -> Self {
        self.access_level = Some(level);
        self
    }

    #[must_use]
    pub fn with_ip(mut self, ip: IpAddr) -> Self {
        self.ip = Some(ip);
        self
    }

    pub const fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_builder() {
        let ip = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5));
        let requester = Requester::user("7")
            .with_role("editor")
            .with_role("author")
            .with_access_level(3)
            .with_ip(ip);

        assert_eq!(requester.user_id.as_deref(), Some("7"));
        assert_eq!(requester.roles.len(), 2);
        assert_eq!(requester.access_level, Some(3));
        assert_eq!(requester.ip, Some(ip));
        assert!(!requester.is_anonymous());
    }

    #[test]
    fn test_anonymous_has_no_level() {
        let requester = Requester::anonymous();
        assert!(requester.is_anonymous());
        assert_eq!(requester.access_level, None);
        assert!(requester.roles.is_empty());
    }
}
