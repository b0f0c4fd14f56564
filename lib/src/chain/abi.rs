// lib/src/chain/abi.rs
//! Minimal Solidity ABI codec for the prescription registry calls.
//!
//! Only the shapes the registry uses are supported: static `uint256`/`address`
//! arguments, `bool` returns, the `(address,address,string,uint256)` tuple and
//! `Error(string)` revert payloads.

use models::errors::{LedgerError, LedgerResult};
use models::{Address, PrescriptionId, PrescriptionRecord};
use sha3::{Digest, Keccak256};

pub const WORD: usize = 32;

pub const GET_PRESCRIPTION: &str = "getPrescription(uint256)";
pub const CAN_VIEW: &str = "canView(uint256,address)";
pub const IS_DOCTOR: &str = "isDoctor(address)";

/// Custom errors the registry raises when the caller may not read a record.
pub const UNAUTHORIZED_VIEWER_ERRORS: [&str; 2] = ["UnauthorizedViewer()", "UnauthorizedViewer(uint256,address)"];

const ERROR_STRING: &str = "Error(string)";

pub type Word = [u8; WORD];

pub fn keccak256(input: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(input);
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

pub fn encode_u64(value: u64) -> Word {
    let mut word = [0u8; WORD];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

pub fn encode_address(address: &Address) -> LedgerResult<Word> {
    let mut word = [0u8; WORD];
    word[12..].copy_from_slice(&address.to_bytes()?);
    Ok(word)
}

/// Selector followed by the given static argument words.
pub fn encode_call(signature: &str, args: &[Word]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + args.len() * WORD);
    data.extend_from_slice(&selector(signature));
    for arg in args {
        data.extend_from_slice(arg);
    }
    data
}

pub fn get_prescription_call(id: PrescriptionId) -> Vec<u8> {
    encode_call(GET_PRESCRIPTION, &[encode_u64(id.get())])
}

pub fn can_view_call(id: PrescriptionId, viewer: &Address) -> LedgerResult<Vec<u8>> {
    Ok(encode_call(CAN_VIEW, &[encode_u64(id.get()), encode_address(viewer)?]))
}

pub fn is_doctor_call(doctor: &Address) -> LedgerResult<Vec<u8>> {
    Ok(encode_call(IS_DOCTOR, &[encode_address(doctor)?]))
}

fn malformed(what: &str) -> LedgerError {
    LedgerError::Dependency(format!("Malformed ABI response: {}", what))
}

fn word_at(data: &[u8], offset: usize) -> LedgerResult<&[u8]> {
    offset
        .checked_add(WORD)
        .and_then(|end| data.get(offset..end))
        .ok_or_else(|| malformed("truncated word"))
}

/// Reads a uint256 word that must fit in a u64.
pub fn decode_u64(word: &[u8]) -> LedgerResult<u64> {
    if word.len() != WORD || word[..24].iter().any(|b| *b != 0) {
        return Err(malformed("integer out of range"));
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&word[24..]);
    Ok(u64::from_be_bytes(bytes))
}

fn decode_usize(word: &[u8]) -> LedgerResult<usize> {
    usize::try_from(decode_u64(word)?).map_err(|_| malformed("offset out of range"))
}

pub fn decode_address(word: &[u8]) -> LedgerResult<Address> {
    if word.len() != WORD || word[..12].iter().any(|b| *b != 0) {
        return Err(malformed("address has dirty high bytes"));
    }
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&word[12..]);
    Ok(Address::from_bytes(&bytes))
}

pub fn decode_bool(data: &[u8]) -> LedgerResult<bool> {
    match decode_u64(word_at(data, 0)?)? {
        0 => Ok(false),
        1 => Ok(true),
        _ => Err(malformed("bool is neither 0 nor 1")),
    }
}

fn decode_string(data: &[u8], offset: usize) -> LedgerResult<String> {
    let len = decode_usize(word_at(data, offset)?)?;
    let start = offset + WORD;
    let bytes = start
        .checked_add(len)
        .and_then(|end| data.get(start..end))
        .ok_or_else(|| malformed("truncated string"))?;
    String::from_utf8(bytes.to_vec()).map_err(|_| malformed("string is not UTF-8"))
}

/// Decodes the single dynamic tuple returned by `getPrescription`.
pub fn decode_prescription(data: &[u8]) -> LedgerResult<PrescriptionRecord> {
    let tuple = decode_usize(word_at(data, 0)?)?;
    let body = data.get(tuple..).ok_or_else(|| malformed("tuple offset past end"))?;

    let doctor = decode_address(word_at(body, 0)?)?;
    let patient = decode_address(word_at(body, WORD)?)?;
    let uri_offset = decode_usize(word_at(body, 2 * WORD)?)?;
    let created_at = decode_u64(word_at(body, 3 * WORD)?)?;
    let metadata_uri = decode_string(body, uri_offset)?;

    Ok(PrescriptionRecord { doctor, patient, metadata_uri, created_at })
}

/// Reason string of a standard `Error(string)` revert.
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    let payload = data.strip_prefix(&selector(ERROR_STRING)[..])?;
    let offset = decode_usize(word_at(payload, 0).ok()?).ok()?;
    decode_string(payload, offset).ok()
}

pub fn is_unauthorized_viewer_revert(data: &[u8]) -> bool {
    if data.len() >= 4 && UNAUTHORIZED_VIEWER_ERRORS.iter().any(|sig| data[..4] == selector(sig)) {
        return true;
    }
    decode_revert_reason(data).map_or(false, |reason| reason.contains("UnauthorizedViewer"))
}

pub fn to_hex(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

pub fn from_hex(value: &str) -> LedgerResult<Vec<u8>> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    hex::decode(digits).map_err(|e| malformed(&format!("invalid hex: {}", e)))
}


#[cfg(test)]
mod tests {
    use super::test_encoding::*;
    use super::*;

    const DOCTOR: &str = "0x1111111111111111111111111111111111111111";
    const PATIENT: &str = "0x2222222222222222222222222222222222222222";

    #[test]
    fn keccak_and_selectors_match_known_values() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
        assert_eq!(hex::encode(selector("transfer(address,uint256)")), "a9059cbb");
        assert_eq!(hex::encode(selector("balanceOf(address)")), "70a08231");
        assert_eq!(hex::encode(selector(ERROR_STRING)), "08c379a0");
    }

    #[test]
    fn can_view_call_layout() {
        let viewer = Address::parse(PATIENT).unwrap();
        let data = can_view_call(PrescriptionId::new(7).unwrap(), &viewer).unwrap();
        assert_eq!(data.len(), 4 + 2 * WORD);
        assert_eq!(&data[..4], &selector(CAN_VIEW));
        assert_eq!(data[4 + WORD - 1], 7);
        assert_eq!(&data[4 + WORD + 12..], &viewer.to_bytes().unwrap());
    }

    #[test]
    fn decodes_prescription_tuple() {
        let record = PrescriptionRecord {
            doctor: Address::parse(DOCTOR).unwrap(),
            patient: Address::parse(PATIENT).unwrap(),
            metadata_uri: "https://gateway.pinata.cloud/ipfs/Qm123".into(),
            created_at: 1_700_000_000,
        };
        assert_eq!(decode_prescription(&encode_prescription(&record)).unwrap(), record);
    }

    #[test]
    fn rejects_truncated_tuple() {
        let record = PrescriptionRecord {
            doctor: Address::parse(DOCTOR).unwrap(),
            patient: Address::parse(PATIENT).unwrap(),
            metadata_uri: "ipfs://Qm123".into(),
            created_at: 1,
        };
        let encoded = encode_prescription(&record);
        assert!(decode_prescription(&encoded[..encoded.len() - WORD]).is_err());
    }

    #[test]
    fn decodes_bool_strictly() {
        assert!(decode_bool(&encode_u64(1)).unwrap());
        assert!(!decode_bool(&encode_u64(0)).unwrap());
        assert!(decode_bool(&encode_u64(2)).is_err());
        assert!(decode_bool(&[]).is_err());
    }

    #[test]
    fn recognises_unauthorized_viewer_reverts() {
        let mut custom = selector("UnauthorizedViewer(uint256,address)").to_vec();
        custom.extend_from_slice(&encode_u64(7));
        assert!(is_unauthorized_viewer_revert(&custom));
        assert!(is_unauthorized_viewer_revert(&selector("UnauthorizedViewer()")));
        assert!(is_unauthorized_viewer_revert(&encode_revert("UnauthorizedViewer")));
        assert!(!is_unauthorized_viewer_revert(&encode_revert("PrescriptionNotFound")));
        assert_eq!(decode_revert_reason(&encode_revert("nope")).as_deref(), Some("nope"));
    }

    #[test]
    fn hex_round_trip_accepts_missing_prefix() {
        assert_eq!(from_hex("0x0a0b").unwrap(), vec![10, 11]);
        assert_eq!(from_hex("0a0b").unwrap(), vec![10, 11]);
        assert_eq!(to_hex(&[10, 11]), "0x0a0b");
        assert!(from_hex("0xzz").is_err());
    }
}
