//! Binary codec for the trace file.
//!
//! File layout:
//! ```text
//! header: [magic:4][version:4][session_start:8]                 16 bytes
//! event:  [kind:4][offset_us:8][slot0:4][slot1:4][slot2:4]       24 bytes
//! file  = header || event*
//! ```
//! All multi-byte integers are little-endian, packed, with no padding and no
//! terminator record.  End of stream is end of file.
//!
//! Every record has the same width, so a short read always means either end
//! of stream or truncation, and the N-th event lives at a known byte offset.
//!
//! # Older traces
//!
//! An earlier recorder wrote files with the same magic and version but a
//! different kind numbering (0 move, 1 wheel, 2 key down, 3 key up).  Those
//! files pass header validation and are not replayable by this build: their
//! tags decode to the kinds listed in [`EventKind`], not to what was
//! recorded.  Re-record them.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::event::{Event, EventKind};

/// `'RMAC'` read as a little-endian u32.
pub const TRACE_MAGIC: u32 = 0x524D_4143;

/// The only format version this build reads or writes.
pub const TRACE_VERSION: u32 = 1;

/// Size of the encoded [`TraceHeader`] in bytes.
pub const HEADER_SIZE: usize = 16;

/// Size of one encoded [`Event`] record in bytes.
pub const EVENT_SIZE: usize = 24;

/// Errors produced while decoding trace bytes.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    /// The first four bytes are not the trace magic.
    #[error("bad magic: 0x{0:08X} is not an rmac trace")]
    BadMagic(u32),

    /// The header declares a version this build does not understand.
    #[error("unsupported trace version: {0}")]
    UnsupportedVersion(u32),

    /// Fewer bytes were available than one full header or record needs.
    #[error("truncated record: need {needed} bytes, got {available}")]
    TruncatedRecord { needed: usize, available: usize },
}

/// Fixed-size header written once at the start of every trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceHeader {
    pub magic: u32,
    pub version: u32,
    /// Wall-clock anchor in Unix microseconds.  Informational only: playback
    /// timing is reconstructed from event offsets alone.
    pub session_start_timestamp: u64,
}

impl TraceHeader {
    /// Creates a header for `version`, stamped with the current wall clock.
    pub fn new(version: u32) -> Self {
        let session_start_timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        Self {
            magic: TRACE_MAGIC,
            version,
            session_start_timestamp,
        }
    }
}

impl Default for TraceHeader {
    fn default() -> Self {
        Self::new(TRACE_VERSION)
    }
}

// ── Header ───────────────────────────────────────────────────────────────────

/// Encodes a header into its 16-byte on-disk form.
pub fn encode_header(header: &TraceHeader) -> [u8; HEADER_SIZE] {
    let mut buf = [0u8; HEADER_SIZE];
    buf[0..4].copy_from_slice(&header.magic.to_le_bytes());
    buf[4..8].copy_from_slice(&header.version.to_le_bytes());
    buf[8..16].copy_from_slice(&header.session_start_timestamp.to_le_bytes());
    buf
}

/// Decodes and validates a header from the start of `bytes`.
///
/// # Errors
///
/// - [`FormatError::TruncatedRecord`] if fewer than 16 bytes are available.
/// - [`FormatError::BadMagic`] if the magic does not match.
/// - [`FormatError::UnsupportedVersion`] for any version other than 1.
pub fn decode_header(bytes: &[u8]) -> Result<TraceHeader, FormatError> {
    require_len(bytes, HEADER_SIZE)?;

    let magic = read_u32(bytes, 0);
    if magic != TRACE_MAGIC {
        return Err(FormatError::BadMagic(magic));
    }

    let version = read_u32(bytes, 4);
    if version != TRACE_VERSION {
        return Err(FormatError::UnsupportedVersion(version));
    }

    Ok(TraceHeader {
        magic,
        version,
        session_start_timestamp: read_u64(bytes, 8),
    })
}

// ── Events ───────────────────────────────────────────────────────────────────

/// Encodes an event into its 24-byte on-disk form.
pub fn encode_event(event: &Event) -> [u8; EVENT_SIZE] {
    let mut buf = [0u8; EVENT_SIZE];
    buf[0..4].copy_from_slice(&event.kind.tag().to_le_bytes());
    buf[4..12].copy_from_slice(&event.offset_micros.to_le_bytes());
    buf[12..16].copy_from_slice(&event.slots[0].to_le_bytes());
    buf[16..20].copy_from_slice(&event.slots[1].to_le_bytes());
    buf[20..24].copy_from_slice(&event.slots[2].to_le_bytes());
    buf
}

/// Decodes one full event record.  Infallible: unknown tags are preserved as
/// [`EventKind::Unknown`].
pub fn decode_event(bytes: &[u8; EVENT_SIZE]) -> Event {
    Event {
        kind: EventKind::from_tag(read_u32(bytes, 0)),
        offset_micros: read_u64(bytes, 4),
        slots: [read_i32(bytes, 12), read_i32(bytes, 16), read_i32(bytes, 20)],
    }
}

/// Decodes one event from the start of an arbitrary slice.
///
/// # Errors
///
/// Returns [`FormatError::TruncatedRecord`] when fewer than 24 bytes remain.
pub fn decode_event_slice(bytes: &[u8]) -> Result<Event, FormatError> {
    require_len(bytes, EVENT_SIZE)?;
    let mut record = [0u8; EVENT_SIZE];
    record.copy_from_slice(&bytes[..EVENT_SIZE]);
    Ok(decode_event(&record))
}

// ── Primitive helpers ─────────────────────────────────────────────────────────

fn require_len(bytes: &[u8], needed: usize) -> Result<(), FormatError> {
    if bytes.len() < needed {
        return Err(FormatError::TruncatedRecord {
            needed,
            available: bytes.len(),
        });
    }
    Ok(())
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn read_i32(bytes: &[u8], offset: usize) -> i32 {
    read_u32(bytes, offset) as i32
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(raw)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
