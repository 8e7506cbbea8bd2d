//! `naddr` addresses: bech32 encoded (kind, author, durable key) coordinates.

use bech32::{Bech32, Hrp};
use thiserror::Error;

const NADDR_HRP: Hrp = Hrp::parse_unchecked("naddr");
const URI_PREFIX: &str = "nostr:";

const TLV_IDENTIFIER: u8 = 0;
const TLV_RELAY: u8 = 1;
const TLV_AUTHOR: u8 = 2;
const TLV_KIND: u8 = 3;

/// Longest value a single TLV entry can carry.
pub const MAX_TLV_VALUE_LEN: usize = u8::MAX as usize;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("invalid bech32: {0}")]
    Bech32(String),
    #[error("expected an naddr address, got prefix {0:?}")]
    WrongPrefix(String),
    #[error("truncated TLV entry")]
    Truncated,
    #[error("missing {0} in address")]
    Missing(&'static str),
    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Coordinate of an addressable record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookAddress {
    pub kind: u32,
    /// Hex encoded 32-byte public key.
    pub author: String,
    pub identifier: String,
    pub relays: Vec<String>,
}

impl BookAddress {
    #[must_use]
    pub fn new(kind: u32, author: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self {
            kind,
            author: author.into(),
            identifier: identifier.into(),
            relays: Vec::new(),
        }
    }

    pub fn encode(&self) -> Result<String, AddressError> {
        let author = decode_author(&self.author)?;

        let mut data = Vec::new();
        push_tlv(&mut data, TLV_IDENTIFIER, self.identifier.as_bytes(), "identifier")?;
        for relay in &self.relays {
            push_tlv(&mut data, TLV_RELAY, relay.as_bytes(), "relay")?;
        }
        push_tlv(&mut data, TLV_AUTHOR, &author, "author")?;
        push_tlv(&mut data, TLV_KIND, &self.kind.to_be_bytes(), "kind")?;

        bech32::encode::<Bech32>(NADDR_HRP, &data)
            .map_err(|err| AddressError::Bech32(err.to_string()))
    }

    /// Parses an `naddr1...` string, with or without a leading `nostr:`.
    pub fn decode(address: &str) -> Result<Self, AddressError> {
        let address = address.trim();
        let address = address.strip_prefix(URI_PREFIX).unwrap_or(address);

        let (hrp, data) =
            bech32::decode(address).map_err(|err| AddressError::Bech32(err.to_string()))?;
        if hrp != NADDR_HRP {
            return Err(AddressError::WrongPrefix(hrp.to_string()));
        }

        let mut identifier = None;
        let mut author = None;
        let mut kind = None;
        let mut relays = Vec::new();

        let mut rest = data.as_slice();
        while !rest.is_empty() {
            let [ty, len, tail @ ..] = rest else {
                return Err(AddressError::Truncated);
            };
            let len = usize::from(*len);
            if tail.len() < len {
                return Err(AddressError::Truncated);
            }
            let (value, tail) = tail.split_at(len);
            rest = tail;

            match *ty {
                TLV_IDENTIFIER if identifier.is_none() => {
                    identifier = Some(utf8(value, "identifier")?);
                }
                TLV_RELAY => relays.push(utf8(value, "relay")?),
                TLV_AUTHOR if author.is_none() => {
                    if value.len() != 32 {
                        return Err(AddressError::Invalid {
                            field: "author",
                            reason: format!("expected 32 bytes, got {}", value.len()),
                        });
                    }
                    author = Some(hex::encode(value));
                }
                TLV_KIND if kind.is_none() => {
                    let bytes: [u8; 4] = value.try_into().map_err(|_| AddressError::Invalid {
                        field: "kind",
                        reason: format!("expected 4 bytes, got {}", value.len()),
                    })?;
                    kind = Some(u32::from_be_bytes(bytes));
                }
                // Unknown and repeated entries are skipped.
                _ => {}
            }
        }

        Ok(Self {
            kind: kind.ok_or(AddressError::Missing("kind"))?,
            author: author.ok_or(AddressError::Missing("author"))?,
            identifier: identifier.ok_or(AddressError::Missing("identifier"))?,
            relays,
        })
    }
}

/// Checks that `author` is a 64 character hex public key.
pub fn validate_author(author: &str) -> Result<(), AddressError> {
    decode_author(author).map(|_| ())
}

fn decode_author(author: &str) -> Result<[u8; 32], AddressError> {
    let mut out = [0u8; 32];
    hex::decode_to_slice(author, &mut out).map_err(|err| AddressError::Invalid {
        field: "author",
        reason: err.to_string(),
    })?;
    Ok(out)
}

fn push_tlv(
    data: &mut Vec<u8>,
    ty: u8,
    value: &[u8],
    field: &'static str,
) -> Result<(), AddressError> {
    let len = u8::try_from(value.len()).map_err(|_| AddressError::Invalid {
        field,
        reason: format!("{} bytes exceeds {MAX_TLV_VALUE_LEN}", value.len()),
    })?;
    data.push(ty);
    data.push(len);
    data.extend_from_slice(value);
    Ok(())
}

fn utf8(value: &[u8], field: &'static str) -> Result<String, AddressError> {
    String::from_utf8(value.to_vec()).map_err(|err| AddressError::Invalid {
        field,
        reason: err.to_string(),
    })
}
