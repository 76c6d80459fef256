//! Persisted records and their binary container.
//!
//! A record is laid out much like a DCA1 file: a magic number, a
//! little-endian `u32` header length, a JSON header, then the payload body.
//!
//! ```text
//! b"ABS1" | header_len: u32 | header: JSON | body
//! ```
//!
//! The header names the key, the commit time, and the payload [`Layout`]; the
//! body is either raw file bytes or planar little-endian `f32` channels.

use crate::{
    constants::{MAX_HEADER_LEN, RECORD_MAGIC, RECORD_PREFIX_LEN, RECORD_VERSION},
    error::{Error, RecordError, StoreResult},
    key::CacheKey,
    payload::{Layout, Payload, PayloadShape},
};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::{
    convert::TryFrom,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// One cached payload, as returned by a successful lookup.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheRecord<P> {
    /// Key the payload was stored under.
    pub key: CacheKey,
    /// The cached audio.
    pub payload: P,
    /// When the payload was committed.
    ///
    /// The store never expires records; this is exposed for callers which
    /// want to apply their own eviction policy.
    pub stored_at: SystemTime,
}

impl<P> CacheRecord<P> {
    /// Consumes the record, returning its payload.
    pub fn into_payload(self) -> P {
        self.payload
    }
}

/// Summary of a stored record, read from its header.
#[derive(Clone, Debug, PartialEq)]
pub struct EntryInfo {
    /// Key the record was stored under.
    pub key: CacheKey,
    /// When the record was committed.
    pub stored_at: SystemTime,
    /// Shape and dimensions of the stored payload.
    pub layout: Layout,
    /// Size of the encoded record, in bytes.
    pub encoded_len: u64,
}

impl EntryInfo {
    /// Shape of the stored payload.
    #[must_use]
    pub fn shape(&self) -> PayloadShape {
        self.layout.shape()
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecordHeader {
    version: u32,
    key: String,
    stored_at: u64,
    layout: Layout,
}

/// Encodes one record, ready to be written in a single transaction.
pub(crate) fn encode<P: Payload>(
    key: &CacheKey,
    payload: &P,
    stored_at: SystemTime,
) -> StoreResult<Vec<u8>> {
    let header = RecordHeader {
        version: RECORD_VERSION,
        key: key.as_str().to_owned(),
        stored_at: unix_millis(stored_at),
        layout: payload.layout(),
    };

    let raw_header = serde_json::to_vec(&header).map_err(Error::Encode)?;
    let header_len = u32::try_from(raw_header.len())
        .ok()
        .filter(|len| *len <= MAX_HEADER_LEN)
        .ok_or_else(|| {
            RecordError::HeaderTooLarge(u32::try_from(raw_header.len()).unwrap_or(u32::MAX))
        })?;

    let body_len = header.layout.body_len().unwrap_or(0) as usize;
    let mut out = Vec::with_capacity(RECORD_PREFIX_LEN + raw_header.len() + body_len);

    out.extend_from_slice(RECORD_MAGIC);
    out.write_u32::<LittleEndian>(header_len)?;
    out.extend_from_slice(&raw_header);
    payload.write_body(&mut out);

    Ok(out)
}

/// Decodes one record, checking it belongs to `key` and holds a `P`.
pub(crate) fn decode<P: Payload>(
    key: &CacheKey,
    bytes: &[u8],
) -> Result<CacheRecord<P>, RecordError> {
    let (header, body) = split(bytes)?;

    if header.key != key.as_str() {
        return Err(RecordError::KeyMismatch {
            expected: key.as_str().to_owned(),
            found: header.key,
        });
    }

    let found = header.layout.shape();
    if found != P::SHAPE {
        return Err(RecordError::ShapeMismatch {
            expected: P::SHAPE,
            found,
        });
    }

    let expected = header.layout.body_len();
    if expected != Some(body.len() as u64) {
        return Err(RecordError::BodyLength {
            expected: expected.unwrap_or(u64::MAX),
            found: body.len() as u64,
        });
    }

    let payload = P::read_body(&header.layout, body)?;

    Ok(CacheRecord {
        key: key.clone(),
        payload,
        stored_at: from_unix_millis(header.stored_at),
    })
}

/// Summarises a record from its header, without decoding its body.
///
/// The header is held to the same rules as a full decode, so a listed record
/// decodes for any store of its shape.
pub(crate) fn inspect(bytes: &[u8]) -> Result<EntryInfo, RecordError> {
    let (header, body) = split(bytes)?;

    if header.layout.body_len() != Some(body.len() as u64) {
        return Err(RecordError::BodyLength {
            expected: header.layout.body_len().unwrap_or(u64::MAX),
            found: body.len() as u64,
        });
    }

    header.layout.validate()?;

    let key = CacheKey::new(header.key).map_err(|_| RecordError::MissingKey)?;

    Ok(EntryInfo {
        key,
        stored_at: from_unix_millis(header.stored_at),
        layout: header.layout,
        encoded_len: bytes.len() as u64,
    })
}

fn split(bytes: &[u8]) -> Result<(RecordHeader, &[u8]), RecordError> {
    if bytes.len() < RECORD_PREFIX_LEN {
        return Err(RecordError::Truncated);
    }

    if &bytes[..RECORD_MAGIC.len()] != RECORD_MAGIC {
        return Err(RecordError::BadMagic);
    }

    let header_len = LittleEndian::read_u32(&bytes[RECORD_MAGIC.len()..RECORD_PREFIX_LEN]);

    // Sanity check
    if header_len > MAX_HEADER_LEN {
        return Err(RecordError::HeaderTooLarge(header_len));
    }

    let rest = &bytes[RECORD_PREFIX_LEN..];
    if rest.len() < header_len as usize {
        return Err(RecordError::Truncated);
    }

    let (raw_header, body) = rest.split_at(header_len as usize);
    let header: RecordHeader = serde_json::from_slice(raw_header)?;

    if header.version != RECORD_VERSION {
        return Err(RecordError::UnsupportedVersion(header.version));
    }

    Ok((header, body))
}

fn unix_millis(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

fn from_unix_millis(millis: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(millis)
}
