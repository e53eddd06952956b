//! Share links
//!
//! A secure drop is shared as two links to the same viewer page, each carrying
//! one key half in its URL fragment:
//!
//! ```text
//! https://vanish.example/d/<drop id>#k1=<64 hex>
//! https://vanish.example/d/<drop id>#k2=<64 hex>
//! ```
//!
//! Browsers never send the fragment to the server, so the service only ever
//! learns the drop id. Standard drops use the bare link without a fragment.

use std::fmt;

use serde::{Deserialize, Serialize};
use vanish_core::model::DropId;
use vanish_crypto::KeyMaterial;

use crate::{ClientError, draft::KeyFragments};

/// Path segment in front of the drop id.
const VIEW_PATH: &str = "/d/";

/// Which half of the split key a link carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FragmentSlot {
    /// `k1`, the primary link
    First,
    /// `k2`, the secondary link
    Second,
}

impl FragmentSlot {
    fn label(self) -> &'static str {
        match self {
            Self::First => "k1",
            Self::Second => "k2",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        match label {
            "k1" => Some(Self::First),
            "k2" => Some(Self::Second),
            _ => None,
        }
    }

    /// The other half.
    pub fn other(self) -> Self {
        match self {
            Self::First => Self::Second,
            Self::Second => Self::First,
        }
    }
}

impl fmt::Display for FragmentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One parsed or rendered share link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    base: String,
    drop_id: DropId,
    fragment: Option<(FragmentSlot, KeyMaterial)>,
}

impl ShareLink {
    /// Bare link to a standard drop.
    pub fn standard(base: &str, drop_id: DropId) -> Self {
        Self { base: trim_base(base), drop_id, fragment: None }
    }

    /// Link carrying one key half.
    pub fn with_fragment(base: &str, drop_id: DropId, slot: FragmentSlot, key: KeyMaterial) -> Self {
        Self { base: trim_base(base), drop_id, fragment: Some((slot, key)) }
    }

    /// Parse a link rendered by [`ShareLink::to_url`].
    ///
    /// # Errors
    ///
    /// - `InvalidLink`: no `/d/` segment, a malformed drop id, a query string,
    ///   or a fragment that is not `k1=` or `k2=` followed by 64 hex digits
    pub fn parse(url: &str) -> Result<Self, ClientError> {
        let (location, fragment) = match url.split_once('#') {
            Some((location, fragment)) => (location, Some(fragment)),
            None => (url, None),
        };
        if location.contains('?') {
            return Err(ClientError::invalid_link("query strings are not part of share links"));
        }

        let Some(split) = location.rfind(VIEW_PATH) else {
            return Err(ClientError::invalid_link("missing /d/ segment"));
        };
        let base = &location[..split];
        let id = location[split + VIEW_PATH.len()..].trim_end_matches('/');
        if base.is_empty() {
            return Err(ClientError::invalid_link("missing base url"));
        }
        let drop_id: DropId =
            id.parse().map_err(|_| ClientError::invalid_link("malformed drop id"))?;

        let fragment = match fragment {
            None | Some("") => None,
            Some(fragment) => Some(parse_fragment(fragment)?),
        };

        Ok(Self { base: base.to_string(), drop_id, fragment })
    }

    /// Render the link.
    pub fn to_url(&self) -> String {
        match &self.fragment {
            Some((slot, key)) => {
                format!("{}{VIEW_PATH}{}#{}={}", self.base, self.drop_id, slot, key.to_hex())
            },
            None => format!("{}{VIEW_PATH}{}", self.base, self.drop_id),
        }
    }

    /// Base URL the link points at.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Drop the link opens.
    pub fn drop_id(&self) -> DropId {
        self.drop_id
    }

    /// Slot of the carried key half, if any.
    pub fn slot(&self) -> Option<FragmentSlot> {
        self.fragment.as_ref().map(|(slot, _)| *slot)
    }

    /// Carried key half, if any.
    pub fn key(&self) -> Option<&KeyMaterial> {
        self.fragment.as_ref().map(|(_, key)| key)
    }
}

fn parse_fragment(fragment: &str) -> Result<(FragmentSlot, KeyMaterial), ClientError> {
    let (label, encoded) = fragment
        .split_once('=')
        .ok_or_else(|| ClientError::invalid_link("fragment must be k1=<hex> or k2=<hex>"))?;
    let slot = FragmentSlot::from_label(label)
        .ok_or_else(|| ClientError::invalid_link("fragment must be k1=<hex> or k2=<hex>"))?;
    let key = KeyMaterial::from_hex(encoded)
        .map_err(|_| ClientError::invalid_link("key half must be 64 hex digits"))?;
    Ok((slot, key))
}

fn trim_base(base: &str) -> String {
    base.trim_end_matches('/').to_string()
}

/// The pair of links for one secure drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLinks {
    /// Carries `k1`
    pub primary: ShareLink,
    /// Carries `k2`
    pub secondary: ShareLink,
}

impl ShareLinks {
    /// Links for `fragments` under `base`.
    pub fn new(base: &str, fragments: &KeyFragments) -> Self {
        Self {
            primary: ShareLink::with_fragment(
                base,
                fragments.drop_id,
                FragmentSlot::First,
                fragments.k1.clone(),
            ),
            secondary: ShareLink::with_fragment(
                base,
                fragments.drop_id,
                FragmentSlot::Second,
                fragments.k2.clone(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use vanish_crypto::KEY_SIZE;

    use super::*;

    const BASE: &str = "https://vanish.example";

    fn fragments() -> KeyFragments {
        KeyFragments {
            drop_id: DropId::from_u128(0xabc),
            k1: KeyMaterial::from_bytes([1; KEY_SIZE]),
            k2: KeyMaterial::from_bytes([2; KEY_SIZE]),
        }
    }

    #[test]
    fn renders_both_halves() {
        let links = ShareLinks::new("https://vanish.example/", &fragments());
        let id = DropId::from_u128(0xabc);

        assert_eq!(links.primary.to_url(), format!("{BASE}/d/{id}#k1={}", "01".repeat(32)));
        assert_eq!(links.secondary.to_url(), format!("{BASE}/d/{id}#k2={}", "02".repeat(32)));
    }

    #[test]
    fn parse_reads_back_rendered_links() {
        let links = ShareLinks::new(BASE, &fragments());
        let parsed = ShareLink::parse(&links.secondary.to_url()).unwrap();

        assert_eq!(parsed, links.secondary);
        assert_eq!(parsed.slot(), Some(FragmentSlot::Second));
        assert_eq!(parsed.base(), BASE);
    }

    #[test]
    fn standard_link_has_no_fragment() {
        let id = DropId::from_u128(9);
        let parsed = ShareLink::parse(&format!("{BASE}/d/{id}/")).unwrap();

        assert_eq!(parsed, ShareLink::standard(BASE, id));
        assert_eq!(parsed.key(), None);
    }

    #[test]
    fn rejects_malformed_links() {
        let id = DropId::from_u128(9);
        for url in [
            format!("{BASE}/x/{id}"),
            format!("{BASE}/d/not-hex"),
            format!("/d/{id}"),
            format!("{BASE}/d/{id}?k1=00"),
            format!("{BASE}/d/{id}#k3={}", "00".repeat(32)),
            format!("{BASE}/d/{id}#k1={}", "00".repeat(31)),
            format!("{BASE}/d/{id}#k1"),
        ] {
            assert!(
                matches!(ShareLink::parse(&url), Err(ClientError::InvalidLink { .. })),
                "{url} should be rejected"
            );
        }
    }

    #[test]
    fn other_slot_flips() {
        assert_eq!(FragmentSlot::First.other(), FragmentSlot::Second);
        assert_eq!(FragmentSlot::Second.other(), FragmentSlot::First);
    }
}
