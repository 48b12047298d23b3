//! On-disk formats of the OAP buffer.
//!
//! A buffer directory holds segment files and two marker files.
//!
//! A segment file is nothing but a sequence of frames, appended one after another.
//! There is no header; a segment may be cut off anywhere after its last complete frame.
//!
//! ```ignore
//! Frame is:
//! +--------~--------+--------~--------+
//! |  varint length  |     payload     |
//! +--------~--------+--------~--------+
//! ```
//!
//! The length is an unsigned LEB128 varint, the same framing as a protobuf delimited stream.
//!
//! A marker file records a position, and is always replaced as a whole:
//!
//! ```ignore
//! +--------+--------+---------+----------+-----~-----+-----+-----+-----+-----+
//! |  0x6F  |  0x62  | version | name len | file name |  offset   |  crc32    |
//! +--------+--------+---------+----------+-----~-----+-----+-----+-----+-----+
//! ```
//!
//! Offset is a u64, crc32 a u32 over all preceding bytes. All numbers are encoded in big endian.

use thiserror::Error;

/// A u64 never takes more than 10 bytes as a varint.
pub const MAX_VARINT_LEN: usize = 10;

const MARKER_BYTE_MARK: [u8; 2] = [0x6F, 0x62];
const MARKER_VERSION: u8 = 0x01;

#[derive(Error, Debug)]
pub enum FormatErr {
    #[error("Byte mark mismatch")]
    ByteMark,
    #[error("Version mismatch")]
    Version,
    #[error("Unexpected length: expected {expected}, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("Checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    Checksum { expected: u32, actual: u32 },
    #[error("File name too long")]
    NameTooLong,
    #[error("Utf8Error: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// What can be said about the bytes at a frame boundary.
pub enum FrameHeader {
    /// A length prefix was decoded. The frame is complete only if
    /// `header_size + payload_size` bytes are available.
    Length {
        header_size: usize,
        payload_size: usize,
    },
    /// Not enough bytes to decode the length prefix.
    Incomplete,
    /// These bytes cannot be the start of a frame.
    Invalid,
}

/// Decode the length prefix at the start of `bytes`.
///
/// A length above `max_record_size` is treated as garbage rather than as a large frame in progress.
pub fn read_frame_header(bytes: &[u8], max_record_size: usize) -> FrameHeader {
    let mut cursor = bytes;
    match leb128::read::unsigned(&mut cursor) {
        Ok(len) => {
            if len > max_record_size as u64 {
                FrameHeader::Invalid
            } else {
                FrameHeader::Length {
                    header_size: bytes.len() - cursor.len(),
                    payload_size: len as usize,
                }
            }
        }
        Err(leb128::read::Error::IoError(_)) => {
            if bytes.len() < MAX_VARINT_LEN {
                FrameHeader::Incomplete
            } else {
                FrameHeader::Invalid
            }
        }
        Err(leb128::read::Error::Overflow) => FrameHeader::Invalid,
    }
}

/// Size of the varint length prefix for a payload of `payload_size` bytes.
pub fn header_size(payload_size: usize) -> usize {
    let mut size = 1;
    let mut value = payload_size as u64 >> 7;
    while value != 0 {
        size += 1;
        value >>= 7;
    }
    size
}

/// Size of the frame holding a payload of `payload_size` bytes.
pub fn frame_size(payload_size: usize) -> usize {
    header_size(payload_size) + payload_size
}

/// Prefix the payload with its length.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(frame_size(payload.len()));
    leb128::write::unsigned(&mut frame, payload.len() as u64)
        .expect("Writing to a Vec never fails");
    frame.extend_from_slice(payload);
    frame
}

/// Iterates the complete frames of an in-memory segment, yielding payloads.
///
/// Iteration stops at the first incomplete or invalid frame; [`FrameIter::offset`]
/// then tells where the valid part of the segment ends.
#[derive(Debug)]
pub struct FrameIter<'a> {
    bytes: &'a [u8],
    offset: usize,
    max_record_size: usize,
}

impl<'a> FrameIter<'a> {
    /// Start iterating at `offset`. An offset beyond the end yields nothing.
    pub fn new(bytes: &'a [u8], offset: usize, max_record_size: usize) -> Self {
        Self {
            bytes,
            offset: offset.min(bytes.len()),
            max_record_size,
        }
    }

    /// End of the last frame yielded so far.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes after [`FrameIter::offset`].
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.offset
    }
}

impl<'a> Iterator for FrameIter<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let bytes = &self.bytes[self.offset..];
        let head = &bytes[..bytes.len().min(MAX_VARINT_LEN)];
        match read_frame_header(head, self.max_record_size) {
            FrameHeader::Length {
                header_size,
                payload_size,
            } if header_size + payload_size <= bytes.len() => {
                self.offset += header_size + payload_size;
                Some(&bytes[header_size..header_size + payload_size])
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerV1 {
    pub file_name: String,
    pub offset: u64,
}

pub type Marker = MarkerV1;

impl MarkerV1 {
    pub fn to_bytes(&self) -> Result<Vec<u8>, FormatErr> {
        if self.file_name.len() > u8::MAX as usize {
            return Err(FormatErr::NameTooLong);
        }
        let mut bytes = Vec::with_capacity(self.size());
        bytes.extend_from_slice(&MARKER_BYTE_MARK);
        bytes.push(MARKER_VERSION);
        bytes.push(self.file_name.len() as u8);
        bytes.extend_from_slice(self.file_name.as_bytes());
        bytes.extend_from_slice(&self.offset.to_be_bytes());
        let checksum = crc32fast::hash(&bytes);
        bytes.extend_from_slice(&checksum.to_be_bytes());
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormatErr> {
        if bytes.len() < 4 {
            return Err(FormatErr::Length {
                expected: 4,
                actual: bytes.len(),
            });
        }
        if bytes[0..2] != MARKER_BYTE_MARK {
            return Err(FormatErr::ByteMark);
        }
        if bytes[2] != MARKER_VERSION {
            return Err(FormatErr::Version);
        }
        let name_len = bytes[3] as usize;
        let expected = Self::size_of(name_len);
        if bytes.len() != expected {
            return Err(FormatErr::Length {
                expected,
                actual: bytes.len(),
            });
        }
        let (body, tail) = bytes.split_at(expected - 4);
        let expected = u32::from_be_bytes([tail[0], tail[1], tail[2], tail[3]]);
        let actual = crc32fast::hash(body);
        if expected != actual {
            return Err(FormatErr::Checksum { expected, actual });
        }
        let file_name = std::str::from_utf8(&body[4..4 + name_len])?.to_owned();
        let mut offset = [0u8; 8];
        offset.copy_from_slice(&body[4 + name_len..]);
        Ok(Self {
            file_name,
            offset: u64::from_be_bytes(offset),
        })
    }

    pub fn size(&self) -> usize {
        Self::size_of(self.file_name.len())
    }

    fn size_of(name_len: usize) -> usize {
        4 + name_len + 8 + 4
    }
}
