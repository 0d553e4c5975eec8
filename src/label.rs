//! PV label discovery: scans the first four 512-byte sectors of a
//! physical volume for its label signature, then parses out the PV's
//! identifier, size, and its data-area / metadata-area descriptor arrays.

use std::io::{Read, Seek, SeekFrom};

use log::debug;

use crate::codec::{
    format_uuid, PhysicalVolumeHeader, PhysicalVolumeLabelHeader, LABEL_SCAN_SECTORS, SECTOR_SIZE,
};
use crate::error::Error;
use crate::model::{DataAreaDescriptor, MetadataAreaDescriptor};

/// What the label reader extracts from a PV before metadata text is even
/// available: its own identifier/size and where its data and metadata
/// areas live.
#[derive(Debug, Clone)]
pub struct PhysicalVolumeLabel {
    pub identifier: String,
    pub size_bytes: u64,
    pub data_area_descriptors: Vec<DataAreaDescriptor>,
    pub metadata_area_descriptors: Vec<MetadataAreaDescriptor>,
}

impl PhysicalVolumeLabel {
    /// The single metadata-area descriptor this core supports (more than
    /// one is rejected as `Unsupported` per spec.md §4.4/§9).
    pub fn metadata_area_descriptor(&self) -> Result<&MetadataAreaDescriptor, Error> {
        match self.metadata_area_descriptors.as_slice() {
            [one] => Ok(one),
            [] => Err(Error::invalid_data("PV label has no metadata area descriptor")),
            _ => Err(Error::unsupported(
                "multiple metadata area descriptors per PV are not supported",
            )),
        }
    }
}

/// Scans the first four sectors of `reader` for the PV label signature
/// and parses it. Fails with `NotFound` if no sector in that range
/// carries the signature.
pub fn read_label<R: Read + Seek>(reader: &mut R) -> Result<PhysicalVolumeLabel, Error> {
    let mut buf = [0u8; SECTOR_SIZE];
    for sector in 0..LABEL_SCAN_SECTORS {
        let sector_offset = (sector * SECTOR_SIZE) as u64;
        reader
            .seek(SeekFrom::Start(sector_offset))
            .map_err(Error::io)?;
        reader.read_exact(&mut buf).map_err(Error::io)?;

        let (_, label_header) = match PhysicalVolumeLabelHeader::parse(&buf) {
            Ok(parsed) => parsed,
            Err(_) => continue,
        };
        debug!(
            "found PV label in sector {sector}: sector_number={}, data_offset={}",
            label_header.sector_number, label_header.data_offset
        );

        let header_start = label_header.data_offset as usize;
        let header_bytes = buf.get(header_start..).ok_or_else(|| {
            Error::invalid_data("PV label data offset is out of range of the sector")
        })?;
        let (_, pv_header) = PhysicalVolumeHeader::parse(header_bytes)
            .map_err(|e| Error::invalid_data(format!("malformed PV header: {e}")))?;

        let identifier = format_uuid(&pv_header.pv_uuid_raw)?;
        let data_area_descriptors = pv_header
            .data_area_descriptors
            .iter()
            .map(|pair| DataAreaDescriptor {
                offset_bytes: pair.offset,
                size_bytes: pair.size,
            })
            .collect();
        let metadata_area_descriptors = pv_header
            .metadata_area_descriptors
            .iter()
            .map(|pair| MetadataAreaDescriptor {
                offset_bytes: pair.offset,
                size_bytes: pair.size,
            })
            .collect();

        return Ok(PhysicalVolumeLabel {
            identifier,
            size_bytes: pv_header.pv_size,
            data_area_descriptors,
            metadata_area_descriptors,
        });
    }
    Err(Error::NotFound)
}
