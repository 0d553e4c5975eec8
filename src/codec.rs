//! Fixed-layout binary codecs: PV label sector, PV header, metadata-area
//! header and raw location descriptors.
//!
//! Parsing is done with `nom`, mirroring how the teacher crate parses its
//! `PhysicalVolumeLabelHeader`/`PhysicalVolumeHeader`/`MetadataAreaHeader`.

use nom::bytes::complete::{tag, take};
use nom::multi::count;
use nom::number::complete::{le_u32, le_u64};
use nom::IResult;

use crate::error::Error;

pub const SECTOR_SIZE: usize = 512;
pub const LABEL_SCAN_SECTORS: usize = 4;
pub const LABEL_SIGNATURE: &[u8; 8] = b"LABELONE";
pub const METADATA_AREA_SIGNATURE: &[u8; 16] = b" LVM2 x[5A%r0N*>";
pub const METADATA_AREA_CRC_SEED: u32 = 0xF597_A6CF;
pub const RAW_LOCATION_IGNORE_FLAG: u32 = 0x0000_0001;

/// Header found at the start of a 512-byte sector carrying a PV label.
#[derive(Debug, Clone)]
pub struct PhysicalVolumeLabelHeader {
    pub sector_number: u64,
    pub checksum: u32,
    pub data_offset: u32,
}

impl PhysicalVolumeLabelHeader {
    /// Parses the fixed 24-byte label prefix: 8-byte "LABELONE" signature,
    /// 8-byte sector number, 4-byte checksum, 4-byte data offset.
    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, _) = tag(LABEL_SIGNATURE.as_slice())(input)?;
        let (input, sector_number) = le_u64(input)?;
        let (input, checksum) = le_u32(input)?;
        let (input, data_offset) = le_u32(input)?;
        Ok((
            input,
            PhysicalVolumeLabelHeader {
                sector_number,
                checksum,
                data_offset,
            },
        ))
    }
}

/// An (offset, size) pair describing a data area or metadata area on a PV.
/// An all-zero pair terminates the enclosing array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetSizePair {
    pub offset: u64,
    pub size: u64,
}

impl OffsetSizePair {
    fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, offset) = le_u64(input)?;
        let (input, size) = le_u64(input)?;
        Ok((input, OffsetSizePair { offset, size }))
    }

    fn is_zero(&self) -> bool {
        self.offset == 0 && self.size == 0
    }
}

/// Reads a zero-terminated array of (offset, size) pairs, stopping at (and
/// consuming) the first all-zero sentinel, or at `max_entries` whichever
/// comes first.
fn parse_descriptor_array(
    mut input: &[u8],
    max_entries: usize,
) -> IResult<&[u8], Vec<OffsetSizePair>> {
    let mut entries = Vec::new();
    for _ in 0..max_entries {
        let (rest, pair) = OffsetSizePair::parse(input)?;
        input = rest;
        if pair.is_zero() {
            return Ok((input, entries));
        }
        entries.push(pair);
    }
    Ok((input, entries))
}

/// The PV header proper, found at `data_offset` bytes into the label
/// sector: 32-byte raw UUID, 8-byte size, then the data-area and
/// metadata-area descriptor arrays.
#[derive(Debug, Clone)]
pub struct PhysicalVolumeHeader {
    pub pv_uuid_raw: [u8; 32],
    pub pv_size: u64,
    pub data_area_descriptors: Vec<OffsetSizePair>,
    pub metadata_area_descriptors: Vec<OffsetSizePair>,
}

impl PhysicalVolumeHeader {
    pub fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, uuid_bytes) = take(32usize)(input)?;
        let mut pv_uuid_raw = [0u8; 32];
        pv_uuid_raw.copy_from_slice(uuid_bytes);
        let (input, pv_size) = le_u64(input)?;
        // libvslvm caps a PV at a small, fixed number of data/metadata
        // area descriptors per sector; 16 is generous headroom without
        // risking a runaway read on corrupt input.
        let (input, data_area_descriptors) = parse_descriptor_array(input, 16)?;
        let (input, metadata_area_descriptors) = parse_descriptor_array(input, 16)?;
        Ok((
            input,
            PhysicalVolumeHeader {
                pv_uuid_raw,
                pv_size,
                data_area_descriptors,
                metadata_area_descriptors,
            },
        ))
    }
}

/// Formats a 32-character raw LVM UUID into the canonical 38-character
/// dashed form (6-4-4-4-4-4-6 groups), e.g.
/// `xsa1Ab-...` -> `xsa1Ab-cdef-...`.
pub fn format_uuid(raw: &[u8; 32]) -> Result<String, Error> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| Error::invalid_data("PV UUID is not valid ASCII"))?;
    const GROUPS: [usize; 7] = [6, 4, 4, 4, 4, 4, 6];
    let mut out = String::with_capacity(38);
    let mut idx = 0;
    for (i, &len) in GROUPS.iter().enumerate() {
        if i > 0 {
            out.push('-');
        }
        out.push_str(&text[idx..idx + len]);
        idx += len;
    }
    Ok(out)
}

/// Strips the dashes from a pretty 38-character UUID, returning the raw
/// 32-character form used for comparisons against label UUIDs.
pub fn strip_uuid_dashes(id: &str) -> String {
    id.chars().filter(|c| *c != '-').collect()
}

/// A single 24-byte raw location descriptor: offset/size/crc32/flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawLocationDescriptor {
    pub offset: u64,
    pub size: u64,
    pub crc32: u32,
    pub flags: u32,
}

impl RawLocationDescriptor {
    pub fn is_ignored(&self) -> bool {
        self.flags & RAW_LOCATION_IGNORE_FLAG != 0
    }

    fn parse(input: &[u8]) -> IResult<&[u8], Self> {
        let (input, offset) = le_u64(input)?;
        let (input, size) = le_u64(input)?;
        let (input, crc32) = le_u32(input)?;
        let (input, flags) = le_u32(input)?;
        Ok((
            input,
            RawLocationDescriptor {
                offset,
                size,
                crc32,
                flags,
            },
        ))
    }

    fn is_zero(&self) -> bool {
        self.offset == 0 && self.size == 0 && self.crc32 == 0 && self.flags == 0
    }
}

/// The 512-byte metadata-area header: stored CRC, signature, version, the
/// header's own data offset/size, and up to four raw location descriptors
/// (enumeration stops at the first all-zero descriptor).
#[derive(Debug, Clone)]
pub struct MetadataAreaHeader {
    pub stored_checksum: u32,
    pub version: u32,
    pub data_offset: u64,
    pub data_size: u64,
    pub location_descriptors: Vec<RawLocationDescriptor>,
}

impl MetadataAreaHeader {
    /// Parses and CRC-validates a full 512-byte metadata-area header.
    pub fn parse(data: &[u8]) -> Result<Self, Error> {
        if data.len() != SECTOR_SIZE {
            return Err(Error::invalid_argument(format!(
                "metadata area header must be exactly {SECTOR_SIZE} bytes, got {}",
                data.len()
            )));
        }
        let (rest, stored_checksum) = le_u32::<_, nom::error::Error<&[u8]>>(data)
            .map_err(|_| Error::invalid_data("truncated metadata area header"))?;
        let (rest, _signature) = tag::<_, _, nom::error::Error<&[u8]>>(
            METADATA_AREA_SIGNATURE.as_slice(),
        )(rest)
        .map_err(|_| Error::invalid_data("metadata area signature mismatch"))?;
        let (rest, version) = le_u32::<_, nom::error::Error<&[u8]>>(rest)
            .map_err(|_| Error::invalid_data("truncated metadata area header"))?;
        let (rest, data_offset) = le_u64::<_, nom::error::Error<&[u8]>>(rest)
            .map_err(|_| Error::invalid_data("truncated metadata area header"))?;
        let (rest, data_size) = le_u64::<_, nom::error::Error<&[u8]>>(rest)
            .map_err(|_| Error::invalid_data("truncated metadata area header"))?;
        let (_rest, raw_descriptors) =
            count::<_, _, nom::error::Error<&[u8]>, _>(RawLocationDescriptor::parse, 4)(rest)
                .map_err(|_| Error::invalid_data("truncated raw location descriptors"))?;

        let calculated = crate::checksum::weak_crc32(&data[4..], METADATA_AREA_CRC_SEED);
        if stored_checksum != 0 && stored_checksum != calculated {
            return Err(Error::invalid_data(format!(
                "metadata area checksum mismatch (stored 0x{stored_checksum:08x}, calculated 0x{calculated:08x})"
            )));
        }

        let mut location_descriptors = Vec::new();
        for descriptor in raw_descriptors {
            if descriptor.is_zero() {
                break;
            }
            location_descriptors.push(descriptor);
        }

        Ok(MetadataAreaHeader {
            stored_checksum,
            version,
            data_offset,
            data_size,
            location_descriptors,
        })
    }
}
