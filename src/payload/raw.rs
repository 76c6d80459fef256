use super::{Layout, Payload, PayloadShape};
use crate::error::RecordError;

/// Undecoded audio file bytes, stored verbatim.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RawAudio(Vec<u8>);

impl RawAudio {
    /// Wraps a buffer of file bytes.
    #[must_use]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// The stored bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Number of stored bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consumes the payload, returning its bytes.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for RawAudio {
    fn from(val: Vec<u8>) -> Self {
        Self(val)
    }
}

impl From<&[u8]> for RawAudio {
    fn from(val: &[u8]) -> Self {
        Self(val.to_vec())
    }
}

impl AsRef<[u8]> for RawAudio {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Payload for RawAudio {
    const SHAPE: PayloadShape = PayloadShape::Raw;

    fn layout(&self) -> Layout {
        Layout::Raw {
            byte_length: self.0.len() as u64,
        }
    }

    fn write_body(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.0);
    }

    fn read_body(layout: &Layout, body: &[u8]) -> Result<Self, RecordError> {
        match layout {
            Layout::Raw { .. } => Ok(Self(body.to_vec())),
            other => Err(RecordError::ShapeMismatch {
                expected: Self::SHAPE,
                found: other.shape(),
            }),
        }
    }
}
