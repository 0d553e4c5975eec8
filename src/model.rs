//! In-memory metadata model: VolumeGroup, PhysicalVolume,
//! LogicalVolumeValues, Segment, Stripe, and the descriptor types.
//!
//! These are immutable once the parser (`parser.rs`) finishes building a
//! `VolumeGroup` -- readers only ever take shared references, per the
//! concurrency model in the spec.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

pub use crate::codec::RawLocationDescriptor;

/// A data area on a PV: `(offset_bytes, size_bytes)`, immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataAreaDescriptor {
    pub offset_bytes: u64,
    pub size_bytes: u64,
}

/// A metadata area descriptor on a PV, same shape as `DataAreaDescriptor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataAreaDescriptor {
    pub offset_bytes: u64,
    pub size_bytes: u64,
}

/// A physical volume contributing extents to a volume group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhysicalVolume {
    pub name: String,
    pub identifier: String,
    pub device_path: String,
    pub size_bytes: u64,
    pub status: Vec<String>,
    pub data_area_descriptors: Vec<DataAreaDescriptor>,
    pub metadata_area_descriptors: Vec<MetadataAreaDescriptor>,
    /// `pe_start`, in bytes: the byte offset of the PV's first physical
    /// extent. Not needed by the read path for single-stripe segments
    /// (stripes already carry an absolute `data_area_offset`), kept
    /// because the original metadata grammar always has it and a future
    /// data-area table (see DESIGN.md Open Question 2) would need it.
    pub pe_start_bytes: u64,
}

/// A single stripe: maps a (portion of a) segment onto one PV at a byte
/// offset. The PV name is resolved against the VG's PV array lazily, via
/// `VolumeGroup::physical_volume_index`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stripe {
    pub physical_volume_name: String,
    pub data_area_offset_bytes: u64,
}

/// A contiguous range within a logical volume, mapped onto PVs via one or
/// more stripes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    pub name: String,
    pub offset_bytes: u64,
    pub size_bytes: u64,
    pub type_tag: String,
    pub stripe_size_sectors: u64,
    pub stripes: Vec<Stripe>,
}

impl Segment {
    /// Whether this segment is the one form the reader can service: a
    /// `striped` type with exactly one stripe.
    pub fn is_single_stripe_striped(&self) -> bool {
        self.type_tag == "striped" && self.stripes.len() == 1
    }
}

/// The declarative data for one logical volume: name, identifier, and its
/// ordered segments. Owned by the `VolumeGroup`; a runtime `LogicalVolume`
/// (see `lv.rs`) wraps one of these with a cursor and a pool reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalVolumeValues {
    pub name: String,
    pub identifier: String,
    pub status: Vec<String>,
    pub segments: Vec<Segment>,
}

impl LogicalVolumeValues {
    /// Total size in bytes: the sum of all segment sizes.
    pub fn size_bytes(&self) -> u64 {
        self.segments.iter().map(|s| s.size_bytes).sum()
    }

    /// Finds the segment containing logical byte offset `offset`, and the
    /// offset relative to the start of that segment. Segments are assumed
    /// to form a contiguous, non-overlapping partition starting at 0 (an
    /// invariant the parser upholds by construction order).
    pub fn segment_containing(&self, offset: u64) -> Option<(&Segment, u64)> {
        let mut base = 0u64;
        for segment in &self.segments {
            if offset < base + segment.size_bytes {
                return Some((segment, offset - base));
            }
            base += segment.size_bytes;
        }
        None
    }
}

/// A named set of PVs pooling their extents, plus the LVs consuming them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolumeGroup {
    pub name: String,
    pub identifier: String,
    pub seqno: u32,
    pub status: Vec<String>,
    pub extent_size_bytes: u64,
    pub physical_volumes: Vec<PhysicalVolume>,
    pub logical_volumes: Vec<LogicalVolumeValues>,
    /// `physical_volume name -> index into physical_volumes`, precomputed
    /// once at parse completion (DESIGN.md Open Question 2) so stripe
    /// resolution never needs a VG back-pointer on `Stripe`.
    #[serde(skip)]
    pub pv_name_index: HashMap<String, usize>,
}

impl VolumeGroup {
    pub fn physical_volume_by_name(&self, name: &str) -> Option<&PhysicalVolume> {
        self.pv_name_index
            .get(name)
            .map(|&idx| &self.physical_volumes[idx])
    }

    pub fn physical_volume_index(&self, name: &str) -> Option<usize> {
        self.pv_name_index.get(name).copied()
    }

    pub fn logical_volume_by_name(&self, name: &str) -> Option<&LogicalVolumeValues> {
        self.logical_volumes.iter().find(|lv| lv.name == name)
    }

    pub fn logical_volume_by_id(&self, id: &str) -> Option<&LogicalVolumeValues> {
        self.logical_volumes.iter().find(|lv| lv.identifier == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(offset: u64, size: u64) -> Segment {
        Segment {
            name: "seg".to_string(),
            offset_bytes: offset,
            size_bytes: size,
            type_tag: "striped".to_string(),
            stripe_size_sectors: 0,
            stripes: vec![Stripe {
                physical_volume_name: "pv0".to_string(),
                data_area_offset_bytes: 0,
            }],
        }
    }

    #[test]
    fn segment_containing_finds_correct_segment_and_relative_offset() {
        let lv = LogicalVolumeValues {
            name: "lv0".to_string(),
            identifier: "id".to_string(),
            status: vec![],
            segments: vec![segment(0, 4 * 1024 * 1024), segment(4 * 1024 * 1024, 4 * 1024 * 1024)],
        };
        let (seg, rel) = lv.segment_containing(5 * 1024 * 1024).unwrap();
        assert_eq!(seg.offset_bytes, 4 * 1024 * 1024);
        assert_eq!(rel, 1024 * 1024);
    }

    #[test]
    fn size_bytes_sums_segments() {
        let lv = LogicalVolumeValues {
            name: "lv0".to_string(),
            identifier: "id".to_string(),
            status: vec![],
            segments: vec![segment(0, 100), segment(100, 200)],
        };
        assert_eq!(lv.size_bytes(), 300);
    }
}
