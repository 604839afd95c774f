// SPDX-FileCopyrightText: 2026 Tether Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Peer Addressing
//!
//! Identifier types for correspondents on the messaging network. A bare
//! identifier names an account (`operator@example.org`); a full address
//! additionally names one of the account's connected clients
//! (`operator@example.org/phone`).

use std::fmt;

/// Separator between the bare identifier and the client resource.
const RESOURCE_SEPARATOR: char = '/';

/// A normalized bare peer identifier.
///
/// Normalization lowercases the identifier and strips any client resource,
/// so two spellings of the same account compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(String);

impl PeerId {
    /// Creates a normalized peer identifier from any spelling.
    pub fn new(raw: &str) -> Self {
        let bare = match raw.find(RESOURCE_SEPARATOR) {
            Some(pos) => &raw[..pos],
            None => raw,
        };
        PeerId(bare.trim().to_lowercase())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A full address: a bare identifier plus an optional client resource.
///
/// Presence is reported per full address; a bare address reaches the
/// account's server-side inbox regardless of which clients are online.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FullAddress {
    bare: PeerId,
    resource: Option<String>,
}

impl FullAddress {
    /// Parses an address of the form `account` or `account/resource`.
    pub fn parse(raw: &str) -> Self {
        let (bare, resource) = match raw.find(RESOURCE_SEPARATOR) {
            Some(pos) => {
                let res = &raw[pos + 1..];
                let resource = if res.is_empty() {
                    None
                } else {
                    Some(res.to_string())
                };
                (&raw[..pos], resource)
            }
            None => (raw, None),
        };
        FullAddress {
            bare: PeerId::new(bare),
            resource,
        }
    }

    /// Creates a bare address for a peer (no client resource).
    pub fn bare(peer: PeerId) -> Self {
        FullAddress {
            bare: peer,
            resource: None,
        }
    }

    /// Creates an address for a specific client resource of a peer.
    pub fn with_resource(peer: PeerId, resource: &str) -> Self {
        FullAddress {
            bare: peer,
            resource: Some(resource.to_string()),
        }
    }

    /// Returns the bare identifier of the addressed account.
    pub fn peer_id(&self) -> &PeerId {
        &self.bare
    }

    /// Returns the client resource, if the address names one.
    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }

    /// Returns true if this address names a specific client.
    pub fn is_full(&self) -> bool {
        self.resource.is_some()
    }
}

impl fmt::Display for FullAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.resource {
            Some(res) => write!(f, "{}{}{}", self.bare, RESOURCE_SEPARATOR, res),
            None => f.write_str(self.bare.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_id_normalizes_case_and_resource() {
        let a = PeerId::new("Operator@Example.ORG/Phone");
        let b = PeerId::new("operator@example.org");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "operator@example.org");
    }

    #[test]
    fn test_full_address_parse_roundtrip() {
        let addr = FullAddress::parse("operator@example.org/phone");
        assert_eq!(addr.peer_id().as_str(), "operator@example.org");
        assert_eq!(addr.resource(), Some("phone"));
        assert_eq!(addr.to_string(), "operator@example.org/phone");
    }

    #[test]
    fn test_bare_address_has_no_resource() {
        let addr = FullAddress::parse("operator@example.org");
        assert!(!addr.is_full());
        assert_eq!(addr.to_string(), "operator@example.org");
    }

    #[test]
    fn test_trailing_separator_treated_as_bare() {
        let addr = FullAddress::parse("operator@example.org/");
        assert_eq!(addr.resource(), None);
    }
}
