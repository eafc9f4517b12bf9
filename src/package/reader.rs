use std::io::{Read, Write};

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::package::frame::{read_frame, Record, MAGIC};
use crate::types::{PackageManifest, FORMAT_VERSION};

/// streaming package reader
///
/// validates the header and manifest on construction, then yields records
/// one at a time. after a `Segment` record the caller must consume its
/// payload via [`read_segment`](PackageReader::read_segment) or
/// [`copy_segment_to`](PackageReader::copy_segment_to) before asking for the
/// next record; an unconsumed payload is skipped.
pub struct PackageReader<R: Read> {
    input: R,
    manifest: PackageManifest,
    pending_payload: u64,
    ended: bool,
}

impl<R: Read> PackageReader<R> {
    /// read and validate the stream header and manifest
    pub fn new(mut input: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        input
            .read_exact(&mut magic)
            .map_err(|e| Error::ImportStructural(format!("missing package header: {}", e)))?;
        if magic != MAGIC {
            return Err(Error::ImportStructural("bad package magic".to_string()));
        }

        let mut version = [0u8; 1];
        input
            .read_exact(&mut version)
            .map_err(|e| Error::ImportStructural(format!("missing format version: {}", e)))?;
        if version[0] != FORMAT_VERSION {
            return Err(Error::UnsupportedVersion(version[0]));
        }

        let manifest = match read_frame(&mut input)? {
            Some(Record::Manifest(m)) => m,
            Some(other) => {
                return Err(Error::ImportStructural(format!(
                    "expected manifest, got {:?}",
                    other
                )))
            }
            None => return Err(Error::ImportStructural("empty package".to_string())),
        };

        Ok(Self {
            input,
            manifest,
            pending_payload: 0,
            ended: false,
        })
    }

    pub fn manifest(&self) -> &PackageManifest {
        &self.manifest
    }

    /// next record; None after the end record
    ///
    /// a truncated stream without an end record is a structural error.
    pub fn next_record(&mut self) -> Result<Option<Record>> {
        if self.ended {
            return Ok(None);
        }
        self.skip_pending_payload()?;

        match read_frame(&mut self.input)? {
            Some(Record::Manifest(_)) => Err(Error::ImportStructural(
                "unexpected second manifest".to_string(),
            )),
            Some(Record::End) => {
                self.ended = true;
                Ok(None)
            }
            Some(record) => {
                if let Record::Segment { size, .. } = &record {
                    self.pending_payload = *size;
                }
                Ok(Some(record))
            }
            None => Err(Error::ImportStructural(
                "package truncated before end record".to_string(),
            )),
        }
    }

    /// consume the pending segment payload into memory, checksum verified
    pub fn read_segment(&mut self, segment: u64, checksum: &str) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.pending_payload as usize);
        self.copy_segment_to(segment, checksum, &mut buf)?;
        Ok(buf)
    }

    /// stream the pending segment payload to a writer, checksum verified
    pub fn copy_segment_to<W: Write>(
        &mut self,
        segment: u64,
        checksum: &str,
        out: &mut W,
    ) -> Result<u64> {
        let mut remaining = self.pending_payload;
        let total = remaining;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; 64 * 1024];

        while remaining > 0 {
            let want = remaining.min(buf.len() as u64) as usize;
            self.input.read_exact(&mut buf[..want]).map_err(|e| {
                Error::ImportStructural(format!("truncated segment {}: {}", segment, e))
            })?;
            hasher.update(&buf[..want]);
            out.write_all(&buf[..want]).map_err(|e| Error::Io {
                path: std::path::PathBuf::from("<segment sink>"),
                source: e,
            })?;
            remaining -= want as u64;
        }
        self.pending_payload = 0;

        let actual = hex::encode(hasher.finalize());
        if actual != checksum {
            return Err(Error::CorruptSegment { segment });
        }
        Ok(total)
    }

    fn skip_pending_payload(&mut self) -> Result<()> {
        let mut remaining = self.pending_payload;
        let mut buf = [0u8; 64 * 1024];
        while remaining > 0 {
            let want = remaining.min(buf.len() as u64) as usize;
            self.input
                .read_exact(&mut buf[..want])
                .map_err(|e| Error::ImportStructural(format!("truncated segment: {}", e)))?;
            remaining -= want as u64;
        }
        self.pending_payload = 0;
        Ok(())
    }
}
