//! # Addresses & Currencies
//!
//! Every party that touches the vault — lockers, registered apps, hook
//! callbacks, claim holders — is identified by a 20-byte [`Address`].
//! Every asset class is identified by a [`Currency`], which is an address
//! with one reserved value: the all-zero address is the *native* asset
//! sentinel (the host network's own coin, as opposed to a token contract).
//!
//! Addresses are plain identifiers. The vault never verifies signatures or
//! derives keys; whoever sits in front of it (a node, a runtime, a test)
//! decides what an address *means*. For tests and demos,
//! [`Address::derive`] produces a stable BLAKE3-based identity from a
//! human-readable label.

use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 20-byte account identity, rendered as `0x`-prefixed hex.
///
/// `Address::ZERO` is reserved: as a [`Currency`] it denotes the native
/// asset, and it never identifies a real party.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address([u8; 20]);

impl Address {
    /// The all-zero address. Reserved; see type docs.
    pub const ZERO: Address = Address([0u8; 20]);

    /// Creates an address from raw bytes.
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Returns the raw 20-byte identifier.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Returns the `0x`-prefixed hex rendering.
    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Parses a hex address, with or without the `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let stripped = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(stripped)?;
        if bytes.len() != 20 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&bytes);
        Ok(Self(arr))
    }

    /// Derives a deterministic address from a human-readable label.
    ///
    /// Computed as the first 20 bytes of `BLAKE3(label)`. The same label
    /// always yields the same address, which makes test scenarios and
    /// demo fixtures reproducible without key material.
    pub fn derive(label: &str) -> Self {
        let digest = blake3::hash(label.as_bytes());
        let mut arr = [0u8; 20];
        arr.copy_from_slice(&digest.as_bytes()[..20]);
        Self(arr)
    }

    /// Returns `true` for the reserved all-zero address.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({}...)", &self.to_hex()[..10])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl std::str::FromStr for Address {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

// ---------------------------------------------------------------------------
// Currency
// ---------------------------------------------------------------------------

/// Identifies a fungible asset class held by the vault.
///
/// Either the native-asset sentinel ([`Currency::NATIVE`], the zero
/// address) or the address of an external token contract. Equality and
/// ordering are by identifier; the vault attaches no meaning beyond that.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Currency(Address);

impl Currency {
    /// The native asset of the host network.
    pub const NATIVE: Currency = Currency(Address::ZERO);

    /// Wraps a token contract address as a currency.
    pub fn token(address: Address) -> Self {
        Self(address)
    }

    /// Returns the underlying address (zero for native).
    pub fn address(&self) -> Address {
        self.0
    }

    /// Returns `true` if this is the native-asset sentinel.
    pub fn is_native(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Debug for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_native() {
            write!(f, "Currency(native)")
        } else {
            write!(f, "Currency({}...)", &self.0.to_hex()[..10])
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_native() {
            write!(f, "native")
        } else {
            write!(f, "{}", self.0.to_hex())
        }
    }
}

// ---------------------------------------------------------------------------
// Composite map keys for serde
// ---------------------------------------------------------------------------

/// A type usable as a string-encoded map key in serialized vault state.
///
/// JSON requires object keys to be strings, but the vault's books are
/// keyed by addresses, currencies, and tuples of both. `MapKey` gives each
/// key type a canonical string form (`:`-joined hex segments, `native` for
/// the native currency) and [`keyed_map`] plugs it into serde.
pub trait MapKey: Sized {
    /// Canonical string form of the key.
    fn encode(&self) -> String;

    /// Parses the canonical string form.
    fn decode(s: &str) -> Result<Self, String>;
}

impl MapKey for Address {
    fn encode(&self) -> String {
        self.to_hex()
    }

    fn decode(s: &str) -> Result<Self, String> {
        Address::from_hex(s).map_err(|e| format!("bad address key '{s}': {e}"))
    }
}

impl MapKey for Currency {
    fn encode(&self) -> String {
        if self.is_native() {
            "native".to_string()
        } else {
            self.0.to_hex()
        }
    }

    fn decode(s: &str) -> Result<Self, String> {
        if s == "native" {
            return Ok(Currency::NATIVE);
        }
        Address::from_hex(s)
            .map(Currency::token)
            .map_err(|e| format!("bad currency key '{s}': {e}"))
    }
}

impl<A: MapKey, B: MapKey> MapKey for (A, B) {
    fn encode(&self) -> String {
        format!("{}:{}", self.0.encode(), self.1.encode())
    }

    fn decode(s: &str) -> Result<Self, String> {
        let (a, b) = s
            .split_once(':')
            .ok_or_else(|| format!("bad composite key '{s}'"))?;
        Ok((A::decode(a)?, B::decode(b)?))
    }
}

impl<A: MapKey, B: MapKey, C: MapKey> MapKey for (A, B, C) {
    fn encode(&self) -> String {
        format!("{}:{}:{}", self.0.encode(), self.1.encode(), self.2.encode())
    }

    fn decode(s: &str) -> Result<Self, String> {
        let mut parts = s.splitn(3, ':');
        let (a, b, c) = match (parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(b), Some(c)) => (a, b, c),
            _ => return Err(format!("bad composite key '{s}'")),
        };
        Ok((A::decode(a)?, B::decode(b)?, C::decode(c)?))
    }
}

/// Serde helper for `HashMap<K, V>` where `K: MapKey`.
///
/// # Usage
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Book {
///     #[serde(with = "crate::currency::keyed_map")]
///     entries: HashMap<(Address, Currency), u128>,
/// }
/// ```
pub mod keyed_map {
    use super::MapKey;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::HashMap;
    use std::hash::Hash;

    pub fn serialize<K, V, S>(map: &HashMap<K, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        K: MapKey,
        V: Serialize,
        S: Serializer,
    {
        use serde::ser::SerializeMap;
        let mut ser_map = serializer.serialize_map(Some(map.len()))?;
        for (key, value) in map {
            ser_map.serialize_entry(&key.encode(), value)?;
        }
        ser_map.end()
    }

    pub fn deserialize<'de, K, V, D>(deserializer: D) -> Result<HashMap<K, V>, D::Error>
    where
        K: MapKey + Eq + Hash,
        V: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        let string_map: HashMap<String, V> = HashMap::deserialize(deserializer)?;
        string_map
            .into_iter()
            .map(|(key, value)| {
                K::decode(&key)
                    .map(|k| (k, value))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
