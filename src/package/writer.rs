use std::io::Write;
use std::path::PathBuf;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::package::frame::{write_frame, Record, MAGIC};
use crate::types::{NodeRecord, PackageManifest};

/// streaming package writer
///
/// emits the package header and manifest up front, then node records and
/// binary segments as the assembler walks the tree. the caller owns the
/// underlying sink and closes it after [`finish`](PackageWriter::finish).
pub struct PackageWriter<W: Write> {
    out: W,
    next_segment: u64,
}

impl<W: Write> PackageWriter<W> {
    /// write the stream header and manifest
    pub fn new(mut out: W, manifest: &PackageManifest) -> Result<Self> {
        out.write_all(&MAGIC).map_err(io_err)?;
        out.write_all(&[manifest.version]).map_err(io_err)?;
        write_frame(&mut out, &Record::Manifest(manifest.clone()))?;
        Ok(Self {
            out,
            next_segment: 0,
        })
    }

    /// append one node record
    pub fn write_node(&mut self, record: &NodeRecord) -> Result<()> {
        write_frame(&mut self.out, &Record::Node(record.clone()))
    }

    /// append a binary segment, returning its id for the referencing property
    ///
    /// the payload is copied out in 64 KiB steps while the checksum is
    /// computed incrementally, so segment size is not bounded by this method.
    pub fn write_segment(&mut self, payload: &[u8]) -> Result<u64> {
        let segment = self.next_segment;
        self.next_segment += 1;

        let mut hasher = Sha256::new();
        for chunk in payload.chunks(64 * 1024) {
            hasher.update(chunk);
        }
        let checksum = hex::encode(hasher.finalize());

        write_frame(
            &mut self.out,
            &Record::Segment {
                segment,
                size: payload.len() as u64,
                checksum,
            },
        )?;
        for chunk in payload.chunks(64 * 1024) {
            self.out.write_all(chunk).map_err(io_err)?;
        }
        Ok(segment)
    }

    /// number of segments written so far
    pub fn segments_written(&self) -> u64 {
        self.next_segment
    }

    /// write the end record and flush; the sink stays open for the caller
    pub fn finish(mut self) -> Result<W> {
        write_frame(&mut self.out, &Record::End)?;
        self.out.flush().map_err(io_err)?;
        Ok(self.out)
    }
}

fn io_err(source: std::io::Error) -> Error {
    Error::Io {
        path: PathBuf::from("<package stream>"),
        source,
    }
}
