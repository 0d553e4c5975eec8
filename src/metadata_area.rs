//! Metadata-area reader: validates the 512-byte metadata-area header and
//! enumerates its non-ignored raw location descriptors with absolute file
//! offsets.

use std::io::{Read, Seek, SeekFrom};

use tracing::trace;

use crate::codec::{MetadataAreaHeader, RawLocationDescriptor, SECTOR_SIZE};
use crate::error::Error;

/// A raw location descriptor with its offset made absolute against the
/// enclosing metadata area's own file offset.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedLocationDescriptor {
    pub file_offset: u64,
    pub size: u64,
    pub crc32: u32,
}

/// Reads the 512-byte header at `area_file_offset`, validates its
/// signature and CRC, and returns the non-ignored raw location
/// descriptors with offsets resolved to absolute file positions.
///
/// Fails with `Unsupported` unless exactly one non-ignored descriptor is
/// present (spec.md §1/§4.4/§9: multiple raw location descriptors per
/// metadata area are not supported by this core).
pub fn read_metadata_area<R: Read + Seek>(
    reader: &mut R,
    area_file_offset: u64,
) -> Result<ResolvedLocationDescriptor, Error> {
    reader
        .seek(SeekFrom::Start(area_file_offset))
        .map_err(Error::io)?;
    let mut buf = [0u8; SECTOR_SIZE];
    reader.read_exact(&mut buf).map_err(Error::io)?;

    let header = MetadataAreaHeader::parse(&buf)?;
    trace!(version = header.version, descriptors = header.location_descriptors.len(), "parsed metadata area header");

    let active: Vec<&RawLocationDescriptor> = header
        .location_descriptors
        .iter()
        .filter(|d| !d.is_ignored())
        .collect();

    match active.as_slice() {
        [only] => Ok(ResolvedLocationDescriptor {
            file_offset: area_file_offset + only.offset,
            size: only.size,
            crc32: only.crc32,
        }),
        [] => Err(Error::unsupported(
            "metadata area has no non-ignored raw location descriptor",
        )),
        _ => Err(Error::unsupported(
            "metadata area has more than one non-ignored raw location descriptor",
        )),
    }
}
