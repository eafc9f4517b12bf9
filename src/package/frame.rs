use std::io::{Read, Write};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{NodeRecord, PackageManifest};

/// package stream magic
pub const MAGIC: [u8; 4] = *b"TPKG";

/// upper bound on a single frame, a structural sanity check
const MAX_FRAME_LEN: u32 = 64 * 1024 * 1024;

/// a single record in the package stream
///
/// the stream is: magic, format version byte, then length-prefixed frames.
/// each frame is zstd-compressed CBOR of one record. a `Segment` frame is
/// followed by exactly `size` raw (unframed) payload bytes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum Record {
    /// first record of every package
    Manifest(PackageManifest),
    /// one node, parents always precede children
    Node(NodeRecord),
    /// binary segment header; `size` raw bytes follow the frame
    Segment {
        segment: u64,
        size: u64,
        /// sha-256 of the payload, hex encoded
        checksum: String,
    },
    /// end of package
    End,
}

/// write one record as a length-prefixed zstd+cbor frame
pub fn write_frame<W: Write>(out: &mut W, record: &Record) -> Result<()> {
    let mut cbor_bytes = Vec::new();
    ciborium::into_writer(record, &mut cbor_bytes)?;

    // zstd level 3 - fast, reasonable ratio
    let compressed = zstd::encode_all(&cbor_bytes[..], 3).map_err(io_err)?;

    let len = compressed.len() as u32;
    out.write_all(&len.to_le_bytes()).map_err(io_err)?;
    out.write_all(&compressed).map_err(io_err)?;
    Ok(())
}

/// read one frame; None on clean end of stream
pub fn read_frame<R: Read>(input: &mut R) -> Result<Option<Record>> {
    let mut len_bytes = [0u8; 4];
    match input.read_exact(&mut len_bytes) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(io_err(e)),
    }

    let len = u32::from_le_bytes(len_bytes);
    if len == 0 || len > MAX_FRAME_LEN {
        return Err(Error::ImportStructural(format!(
            "implausible frame length {}",
            len
        )));
    }

    let mut compressed = vec![0u8; len as usize];
    input
        .read_exact(&mut compressed)
        .map_err(|e| Error::ImportStructural(format!("truncated frame: {}", e)))?;

    let cbor_bytes = zstd::decode_all(&compressed[..])
        .map_err(|e| Error::ImportStructural(format!("frame decompression failed: {}", e)))?;

    let record: Record = ciborium::from_reader(&cbor_bytes[..])
        .map_err(|e| Error::ImportStructural(format!("undecodable record: {}", e)))?;
    Ok(Some(record))
}

fn io_err(source: std::io::Error) -> Error {
    Error::Io {
        path: PathBuf::from("<package stream>"),
        source,
    }
}
