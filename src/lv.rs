//! Runtime logical-volume reader (spec.md §4.8).
//!
//! Wraps a `LogicalVolumeValues` (declarative, owned by the `VolumeGroup`)
//! plus a reference to its VG and the `Handle`'s bound PV pool, and
//! services reads by walking the segment partition and translating each
//! logical byte range to a `(pool index, physical offset)` pair. Built via
//! `Handle::open_lv_by_name`/`open_lv_by_id`; not constructible directly,
//! mirroring the teacher's own `OpenLV` split between declarative values
//! and a cursor-bearing runtime reader.

use std::cell::RefCell;

use crate::error::Error;
use crate::model::{LogicalVolumeValues, VolumeGroup};
use crate::pool::{Pool, Whence};

/// A byte-addressable view onto one logical volume, with a cursor private
/// to this instance. Independent `LogicalVolume` instances over the same
/// LV (or different LVs in the same VG) may be driven concurrently,
/// provided the bound pool's implementation supports it (spec.md §5).
pub struct LogicalVolume<'a> {
    vg: &'a VolumeGroup,
    values: &'a LogicalVolumeValues,
    pool: &'a RefCell<Box<dyn Pool>>,
    cursor: u64,
}

impl<'a> LogicalVolume<'a> {
    pub(crate) fn new(
        vg: &'a VolumeGroup,
        values: &'a LogicalVolumeValues,
        pool: &'a RefCell<Box<dyn Pool>>,
    ) -> Self {
        LogicalVolume {
            vg,
            values,
            pool,
            cursor: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.values.name
    }

    pub fn identifier(&self) -> &str {
        &self.values.identifier
    }

    /// Total size in bytes: the sum of all segment sizes.
    pub fn size(&self) -> u64 {
        self.values.size_bytes()
    }

    pub fn segment_count(&self) -> usize {
        self.values.segments.len()
    }

    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Seeks this reader's cursor. Accepts absolute (`Set`), current-
    /// relative (`Cur`) and end-relative (`End`) origins; a resulting
    /// negative offset is rejected with `OutOfBounds`.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64, Error> {
        let base = match whence {
            Whence::Set => 0i64,
            Whence::Cur => i64::try_from(self.cursor)
                .map_err(|_| Error::overflow("current cursor does not fit in i64"))?,
            Whence::End => i64::try_from(self.size())
                .map_err(|_| Error::overflow("logical volume size does not fit in i64"))?,
        };
        let new_offset = base
            .checked_add(offset)
            .ok_or_else(|| Error::overflow("seek offset overflows i64"))?;
        if new_offset < 0 {
            return Err(Error::out_of_bounds("seek would produce a negative offset"));
        }
        self.cursor = new_offset as u64;
        Ok(self.cursor)
    }

    /// Reads at the cursor and advances it by the number of bytes read.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        let n = self.read_at(self.cursor, buf)?;
        self.cursor += n as u64;
        Ok(n)
    }

    /// Reads up to `buf.len()` bytes starting at logical byte `offset`,
    /// without touching the cursor. Implements the translation algorithm
    /// of spec.md §4.8:
    /// 1. Clamp `offset` into `[0, size)`; `offset == size` reads 0 bytes.
    /// 2. Clamp the effective length to what's left in the LV.
    /// 3. Walk the segment partition (contiguous, non-overlapping from 0).
    /// 4. For a single-stripe `striped` segment, resolve the stripe's PV
    ///    name to a pool index and compute the physical byte offset.
    /// 5. Seek and read the contiguous run within that segment; repeat
    ///    across segments until `buf` is filled or the LV is exhausted.
    pub fn read_at(&self, offset: u64, buf: &mut [u8]) -> Result<usize, Error> {
        let total = self.size();
        if offset >= total {
            return Ok(0);
        }
        let want = buf.len().min((total - offset) as usize);
        let mut filled = 0usize;
        let mut logical_offset = offset;

        while filled < want {
            let (segment, rel_offset) = self
                .values
                .segment_containing(logical_offset)
                .ok_or_else(|| {
                    Error::invalid_data("logical offset is not covered by any segment")
                })?;

            if !segment.is_single_stripe_striped() {
                return Err(Error::unsupported(format!(
                    "segment '{}' has type '{}' with {} stripe(s); only single-stripe striped \
                     segments can be read",
                    segment.name,
                    segment.type_tag,
                    segment.stripes.len()
                )));
            }
            let stripe = &segment.stripes[0];
            let pv_index = self
                .vg
                .physical_volume_index(&stripe.physical_volume_name)
                .ok_or_else(|| {
                    Error::invalid_data(format!(
                        "stripe references unknown physical volume '{}'",
                        stripe.physical_volume_name
                    ))
                })?;

            let physical_offset = stripe.data_area_offset_bytes + rel_offset;
            let contiguous = (segment.size_bytes - rel_offset) as usize;
            let chunk_len = contiguous.min(want - filled);

            let seek_offset = i64::try_from(physical_offset)
                .map_err(|_| Error::overflow("physical offset does not fit in i64"))?;
            let mut pool = self.pool.borrow_mut();
            pool.seek(pv_index, seek_offset, Whence::Set)?;

            let mut chunk_filled = 0usize;
            while chunk_filled < chunk_len {
                let n = pool.read(pv_index, &mut buf[filled + chunk_filled..filled + chunk_len])?;
                if n == 0 {
                    break;
                }
                chunk_filled += n;
            }
            drop(pool);

            filled += chunk_filled;
            logical_offset += chunk_filled as u64;

            if chunk_filled < chunk_len {
                // the backing descriptor hit EOF short of the segment's
                // declared size; stop rather than loop forever.
                break;
            }
        }

        Ok(filled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DataAreaDescriptor, MetadataAreaDescriptor, PhysicalVolume, Segment, Stripe};
    use crate::pool::FilePool;
    use std::collections::HashMap;
    use std::io::Cursor as IoCursor;

    fn make_vg(segments: Vec<Segment>) -> VolumeGroup {
        let pv = PhysicalVolume {
            name: "pv0".to_string(),
            identifier: "id".to_string(),
            device_path: "/dev/loop0".to_string(),
            size_bytes: 16 * 1024 * 1024,
            status: vec![],
            data_area_descriptors: Vec::<DataAreaDescriptor>::new(),
            metadata_area_descriptors: Vec::<MetadataAreaDescriptor>::new(),
            pe_start_bytes: 0,
        };
        VolumeGroup {
            name: "vg0".to_string(),
            identifier: "id".to_string(),
            seqno: 1,
            status: vec![],
            extent_size_bytes: 4 * 1024 * 1024,
            physical_volumes: vec![pv],
            logical_volumes: vec![LogicalVolumeValues {
                name: "lv0".to_string(),
                identifier: "id".to_string(),
                status: vec![],
                segments,
            }],
            pv_name_index: HashMap::from([("pv0".to_string(), 0)]),
        }
    }

    fn striped_segment(offset: u64, size: u64, data_area_offset: u64, pv: &str) -> Segment {
        Segment {
            name: "seg".to_string(),
            offset_bytes: offset,
            size_bytes: size,
            type_tag: "striped".to_string(),
            stripe_size_sectors: 0,
            stripes: vec![Stripe {
                physical_volume_name: pv.to_string(),
                data_area_offset_bytes: data_area_offset,
            }],
        }
    }

    #[test]
    fn reads_within_a_single_segment() {
        let vg = make_vg(vec![striped_segment(0, 4 * 1024 * 1024, 2 * 1024 * 1024, "pv0")]);
        let values = &vg.logical_volumes[0];
        let mut data = vec![0u8; 16 * 1024 * 1024];
        for (i, b) in data.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        let mut pool = FilePool::new();
        pool.push(Box::new(IoCursor::new(data.clone())));
        let pool_cell = RefCell::new(Box::new(pool) as Box<dyn Pool>);
        let lv = LogicalVolume::new(&vg, values, &pool_cell);

        let mut buf = vec![0u8; 65536];
        let n = lv.read_at(0, &mut buf).unwrap();
        assert_eq!(n, 65536);
        assert_eq!(buf, data[2 * 1024 * 1024..2 * 1024 * 1024 + 65536]);
    }

    #[test]
    fn reads_span_segment_boundary_without_gap_or_duplication() {
        let vg = make_vg(vec![
            striped_segment(0, 4 * 1024 * 1024, 2 * 1024 * 1024, "pv0"),
            striped_segment(4 * 1024 * 1024, 4 * 1024 * 1024, 12 * 1024 * 1024, "pv0"),
        ]);
        let values = &vg.logical_volumes[0];
        let mut data = vec![0u8; 20 * 1024 * 1024];
        for (i, b) in data.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        let mut pool = FilePool::new();
        pool.push(Box::new(IoCursor::new(data.clone())));
        let pool_cell = RefCell::new(Box::new(pool) as Box<dyn Pool>);
        let lv = LogicalVolume::new(&vg, values, &pool_cell);

        // last 2 MiB of segment 0, then all 4 MiB of segment 1 = 6 MiB.
        let mut buf = vec![0u8; 6 * 1024 * 1024];
        let n = lv.read_at(2 * 1024 * 1024, &mut buf).unwrap();
        assert_eq!(n, 6 * 1024 * 1024);
        let mut expected = Vec::new();
        expected.extend_from_slice(&data[4 * 1024 * 1024..6 * 1024 * 1024]);
        expected.extend_from_slice(&data[12 * 1024 * 1024..16 * 1024 * 1024]);
        assert_eq!(buf, expected);
    }

    #[test]
    fn read_at_size_returns_zero_bytes() {
        let vg = make_vg(vec![striped_segment(0, 4 * 1024 * 1024, 0, "pv0")]);
        let values = &vg.logical_volumes[0];
        let pool = FilePool::new();
        let pool_cell = RefCell::new(Box::new(pool) as Box<dyn Pool>);
        let lv = LogicalVolume::new(&vg, values, &pool_cell);
        let mut buf = [0u8; 16];
        assert_eq!(lv.read_at(4 * 1024 * 1024, &mut buf).unwrap(), 0);
    }

    #[test]
    fn unsupported_segment_type_fails_read_but_not_introspection() {
        let mut segment = striped_segment(0, 4 * 1024 * 1024, 0, "pv0");
        segment.type_tag = "raid1".to_string();
        segment.stripes.push(Stripe {
            physical_volume_name: "pv0".to_string(),
            data_area_offset_bytes: 0,
        });
        let vg = make_vg(vec![segment]);
        let values = &vg.logical_volumes[0];
        let pool = FilePool::new();
        let pool_cell = RefCell::new(Box::new(pool) as Box<dyn Pool>);
        let lv = LogicalVolume::new(&vg, values, &pool_cell);
        assert_eq!(lv.size(), 4 * 1024 * 1024);
        let mut buf = [0u8; 16];
        assert!(matches!(
            lv.read_at(0, &mut buf),
            Err(Error::Unsupported { .. })
        ));
    }

    #[test]
    fn dangling_stripe_reference_is_invalid_data() {
        let vg = make_vg(vec![striped_segment(0, 4 * 1024 * 1024, 0, "pv1")]);
        let values = &vg.logical_volumes[0];
        let pool = FilePool::new();
        let pool_cell = RefCell::new(Box::new(pool) as Box<dyn Pool>);
        let lv = LogicalVolume::new(&vg, values, &pool_cell);
        let mut buf = [0u8; 16];
        assert!(matches!(
            lv.read_at(0, &mut buf),
            Err(Error::InvalidData { .. })
        ));
    }

    #[test]
    fn seek_rejects_negative_result() {
        let vg = make_vg(vec![striped_segment(0, 4 * 1024 * 1024, 0, "pv0")]);
        let values = &vg.logical_volumes[0];
        let pool = FilePool::new();
        let pool_cell = RefCell::new(Box::new(pool) as Box<dyn Pool>);
        let mut lv = LogicalVolume::new(&vg, values, &pool_cell);
        assert!(matches!(
            lv.seek(-1, Whence::Set),
            Err(Error::OutOfBounds { .. })
        ));
    }

    #[test]
    fn cursor_read_matches_read_at() {
        let vg = make_vg(vec![striped_segment(0, 4 * 1024 * 1024, 0, "pv0")]);
        let values = &vg.logical_volumes[0];
        let mut data = vec![0u8; 4 * 1024 * 1024];
        for (i, b) in data.iter_mut().enumerate() {
            *b = (i % 251) as u8;
        }
        let mut pool = FilePool::new();
        pool.push(Box::new(IoCursor::new(data.clone())));
        let pool_cell = RefCell::new(Box::new(pool) as Box<dyn Pool>);
        let mut lv = LogicalVolume::new(&vg, values, &pool_cell);

        lv.seek(1000, Whence::Set).unwrap();
        let mut via_cursor = vec![0u8; 2048];
        let n1 = lv.read(&mut via_cursor).unwrap();
        assert_eq!(lv.cursor(), 1000 + n1 as u64);

        let mut via_read_at = vec![0u8; 2048];
        let n2 = lv.read_at(1000, &mut via_read_at).unwrap();
        assert_eq!(n1, n2);
        assert_eq!(via_cursor, via_read_at);
    }
}
