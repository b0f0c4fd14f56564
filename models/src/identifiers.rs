// models/src/identifiers.rs
use core::ops::Deref;
use std::{fmt, num::NonZeroU64, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{ValidationError, ValidationResult};

const ADDRESS_HEX_LEN: usize = 40;
const TX_HASH_HEX_LEN: usize = 64;

fn is_prefixed_hex(value: &str, hex_len: usize) -> bool {
    match value.strip_prefix("0x") {
        Some(digits) => digits.len() == hex_len && digits.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

/// Account identifier: `0x` followed by 40 hex digits, stored lowercase.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    pub fn parse(value: &str) -> ValidationResult<Self> {
        Self::parse_field(value, "address")
    }

    /// Like `parse`, but names the offending field in the error.
    pub fn parse_field(value: &str, field: &str) -> ValidationResult<Self> {
        if !is_prefixed_hex(value, ADDRESS_HEX_LEN) {
            return Err(ValidationError::InvalidAddress(field.to_string()));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Raw 20 address bytes.
    pub fn to_bytes(&self) -> ValidationResult<[u8; 20]> {
        let mut out = [0u8; 20];
        let digits = self.0.strip_prefix("0x").unwrap_or(&self.0);
        hex::decode_to_slice(digits, &mut out).map_err(|_| ValidationError::InvalidAddress("address".into()))?;
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8; 20]) -> Self {
        Self(format!("0x{}", hex::encode(bytes)))
    }
}

impl TryFrom<String> for Address {
    type Error = ValidationError;
    fn try_from(value: String) -> ValidationResult<Self> {
        Self::parse(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl FromStr for Address {
    type Err = ValidationError;
    fn from_str(s: &str) -> ValidationResult<Self> {
        Self::parse(s)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Deref for Address {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Transaction hash: `0x` followed by 64 hex digits, stored lowercase.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TxHash(String);

impl TxHash {
    pub fn parse(value: &str) -> ValidationResult<Self> {
        if !is_prefixed_hex(value, TX_HASH_HEX_LEN) {
            return Err(ValidationError::InvalidTransactionHash("transactionHash".to_string()));
        }
        Ok(Self(value.to_ascii_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TxHash {
    type Error = ValidationError;
    fn try_from(value: String) -> ValidationResult<Self> {
        Self::parse(&value)
    }
}

impl From<TxHash> for String {
    fn from(hash: TxHash) -> Self {
        hash.0
    }
}

impl FromStr for TxHash {
    type Err = ValidationError;
    fn from_str(s: &str) -> ValidationResult<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// On-chain prescription id. Always a positive integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct PrescriptionId(NonZeroU64);

impl PrescriptionId {
    pub fn new(value: u64) -> ValidationResult<Self> {
        NonZeroU64::new(value)
            .map(PrescriptionId)
            .ok_or(ValidationError::InvalidPrescriptionId)
    }

    pub fn get(&self) -> u64 {
        self.0.get()
    }

    /// Accepts JSON numbers holding a positive integer, including integral
    /// floats such as `7.0`. Rejects `7.5`, `-3` and strings like `"7"`.
    pub fn from_json(value: &serde_json::Value) -> ValidationResult<Self> {
        let integral = value.as_u64().or_else(|| {
            value
                .as_f64()
                .filter(|f| f.fract() == 0.0 && *f >= 1.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        });
        integral.ok_or(ValidationError::InvalidPrescriptionId).and_then(Self::new)
    }
}

impl TryFrom<u64> for PrescriptionId {
    type Error = ValidationError;
    fn try_from(value: u64) -> ValidationResult<Self> {
        Self::new(value)
    }
}

impl From<PrescriptionId> for u64 {
    fn from(id: PrescriptionId) -> Self {
        id.get()
    }
}

impl FromStr for PrescriptionId {
    type Err = ValidationError;
    fn from_str(s: &str) -> ValidationResult<Self> {
        s.parse::<u64>()
            .map_err(|_| ValidationError::InvalidPrescriptionId)
            .and_then(Self::new)
    }
}

impl fmt::Display for PrescriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque request identifier, assigned by the store at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new_v4() -> Self {
        RequestId(Uuid::new_v4())
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl FromStr for RequestId {
    type Err = ValidationError;
    fn from_str(s: &str) -> ValidationResult<Self> {
        Uuid::parse_str(s)
            .map(RequestId)
            .map_err(|e| ValidationError::InvalidRequestId(e.to_string()))
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(uuid: Uuid) -> Self {
        RequestId(uuid)
    }
}
