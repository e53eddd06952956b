//! Identifiers
//!
//! Drop and session ids are random 128-bit values rendered as 32 lowercase hex
//! characters. Access tokens carry 256 bits. All of them travel as hex strings
//! in every encoding.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

use crate::{env::Environment, error::DropError};

macro_rules! hex_u128_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u128);

        impl $name {
            /// Wrap a raw value.
            pub const fn from_u128(value: u128) -> Self {
                Self(value)
            }

            /// Raw value.
            pub const fn as_u128(self) -> u128 {
                self.0
            }

            /// Fresh id from the environment's RNG.
            pub fn random<E: Environment>(env: &E) -> Self {
                Self(env.random_u128())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:032x}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = DropError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                if s.len() != 32 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return Err(DropError::invalid(concat!(
                        stringify!($name),
                        " must be 32 hex chars"
                    )));
                }
                u128::from_str_radix(s, 16)
                    .map(Self)
                    .map_err(|_| DropError::invalid(concat!(stringify!($name), " is not hex")))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let encoded = String::deserialize(deserializer)?;
                encoded.parse().map_err(de::Error::custom)
            }
        }
    };
}

hex_u128_id!(
    /// Identifier of a drop.
    ///
    /// Allocated by whoever seals the content, since secure content is bound
    /// to it.
    DropId
);

hex_u128_id!(
    /// Identifier of one viewer session.
    ///
    /// Password clearance is recorded per `(drop, session)` pair.
    SessionId
);

impl DropId {
    /// Content id of the inline text body.
    pub fn text_content_id(self) -> String {
        format!("{self}/text")
    }

    /// Content id of the link at `index`.
    pub fn link_content_id(self, index: usize) -> String {
        format!("{self}/url/{index}")
    }

    /// Content id of the file at `index`.
    pub fn file_content_id(self, index: usize) -> String {
        format!("{self}/file/{index}")
    }

    /// Object-storage key of the file at `index`.
    pub fn object_key(self, index: usize) -> String {
        format!("drops/{self}/{index}")
    }

    /// Inverse of [`DropId::object_key`].
    ///
    /// Returns `None` for any key that [`DropId::object_key`] could not have
    /// produced.
    pub fn parse_object_key(key: &str) -> Option<(Self, usize)> {
        let rest = key.strip_prefix("drops/")?;
        let (id, index) = rest.split_once('/')?;
        let id: Self = id.parse().ok()?;
        let index: usize = index.parse().ok()?;
        (Self::object_key(id, index) == key).then_some((id, index))
    }
}

/// Opaque owner reference, used only for listing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Size of an access token in bytes.
pub const TOKEN_SIZE: usize = 32;

/// Value of a single-use access token.
///
/// `Debug` only shows a short prefix so tokens never land in logs whole.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenValue([u8; TOKEN_SIZE]);

impl TokenValue {
    /// Wrap raw bytes.
    pub const fn from_bytes(bytes: [u8; TOKEN_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8; TOKEN_SIZE] {
        &self.0
    }

    /// Fresh token from the environment's RNG.
    pub fn random<E: Environment>(env: &E) -> Self {
        Self(env.random_array())
    }
}

impl fmt::Display for TokenValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for TokenValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TokenValue({}..)", hex::encode(&self.0[..4]))
    }
}

impl FromStr for TokenValue {
    type Err = DropError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; TOKEN_SIZE];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| DropError::AccessDenied)?;
        Ok(Self(bytes))
    }
}

impl Serialize for TokenValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TokenValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        encoded.parse().map_err(de::Error::custom)
    }
}
