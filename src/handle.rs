//! Handle and lifecycle (spec.md §4.7): orchestrates opening a PV label,
//! reading its metadata area, parsing the metadata text into a
//! `VolumeGroup`, and finally binding a pool of backing PV descriptors in
//! metadata order so logical-volume reads become possible.
//!
//! Three user-facing states, enforced by which fields are populated:
//! Fresh (neither), MetadataLoaded (`volume_group` set), PoolBound (`pool`
//! also set). Every one-shot transition fails with `AlreadySet` on a
//! repeat attempt; `close` idempotently tears both down.

use std::cell::RefCell;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use log::debug;

use crate::checksum::weak_crc32;
use crate::codec::{strip_uuid_dashes, METADATA_AREA_CRC_SEED};
use crate::error::Error;
use crate::label::read_label;
use crate::lv::LogicalVolume;
use crate::metadata_area::read_metadata_area;
use crate::model::VolumeGroup;
use crate::parser::parse_metadata;
use crate::pool::{FilePool, Pool};

/// Access mode requested when opening a primary descriptor. The core is
/// read-only end to end; requesting `Write` fails with `Unsupported`
/// (spec.md §6/§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

/// Orchestrates the Fresh -> MetadataLoaded -> PoolBound lifecycle for one
/// volume group.
pub struct Handle {
    volume_group: Option<VolumeGroup>,
    pool: Option<RefCell<Box<dyn Pool>>>,
    abort: AtomicBool,
}

impl Default for Handle {
    fn default() -> Self {
        Self::new()
    }
}

impl Handle {
    pub fn new() -> Self {
        Handle {
            volume_group: None,
            pool: None,
            abort: AtomicBool::new(false),
        }
    }

    /// Sets the abort flag. Long-running operations (currently just the
    /// full metadata parse) observe it on entry; the read path does not
    /// poll it (spec.md §5) -- a caller wanting to stop reads simply stops
    /// issuing them.
    pub fn signal_abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
    }

    fn check_abort(&self) -> Result<(), Error> {
        if self.abort.load(Ordering::SeqCst) {
            return Err(Error::invalid_argument(
                "handle has been aborted; metadata parse was not started",
            ));
        }
        Ok(())
    }

    /// Opens `path` as the primary descriptor, reads its PV label, its
    /// metadata area, and its metadata text, and populates the handle's
    /// `VolumeGroup`. Transitions Fresh -> MetadataLoaded.
    pub fn open_primary<P: AsRef<Path>>(&mut self, path: P, access: Access) -> Result<(), Error> {
        let mut file = File::open(path.as_ref()).map_err(|e| Error::io_at(e, path.as_ref()))?;
        self.open_primary_from_descriptor(&mut file, access)
    }

    /// Same as `open_primary`, but against an already-open descriptor the
    /// caller constructed itself (a block device handle, a carved-out
    /// partition view, etc).
    pub fn open_primary_from_descriptor<R: Read + Seek>(
        &mut self,
        reader: &mut R,
        access: Access,
    ) -> Result<(), Error> {
        if access == Access::Write {
            return Err(Error::unsupported(
                "write access is not supported by this read-only core",
            ));
        }
        if self.volume_group.is_some() {
            return Err(Error::already_set("primary descriptor / metadata"));
        }
        self.check_abort()?;

        let label = read_label(reader)?;
        let metadata_area_descriptor = label.metadata_area_descriptor()?;
        let resolved = read_metadata_area(reader, metadata_area_descriptor.offset_bytes)?;

        reader
            .seek(SeekFrom::Start(resolved.file_offset))
            .map_err(Error::io)?;
        let mut text_buf = vec![0u8; resolved.size as usize];
        reader.read_exact(&mut text_buf).map_err(Error::io)?;

        if resolved.crc32 != 0 {
            let calculated = weak_crc32(&text_buf, METADATA_AREA_CRC_SEED);
            if calculated != resolved.crc32 {
                return Err(Error::invalid_data(format!(
                    "metadata text checksum mismatch (stored 0x{:08x}, calculated 0x{:08x})",
                    resolved.crc32, calculated
                )));
            }
        }

        let text = std::str::from_utf8(&text_buf)
            .map_err(|_| Error::invalid_data("metadata text is not valid ASCII/UTF-8"))?;
        let mut vg = parse_metadata(text)?;

        // The label we just read off disk carries the PV's own identifier,
        // size and data-area descriptors (spec.md §4.4); find the matching
        // entry in the VG the metadata text just described and merge them
        // in, mirroring the teacher's own `PVDoesntContainItself` check
        // (`examples/forensicxlab-exhume_lvm/src/lib.rs`'s
        // `v.id.replace('-', "") == pvh.pv_ident` lookup) rather than
        // dropping what the label reader found.
        let primary_pv_index = vg
            .physical_volumes
            .iter()
            .position(|pv| strip_uuid_dashes(&pv.identifier) == strip_uuid_dashes(&label.identifier))
            .ok_or_else(|| {
                Error::invalid_data(
                    "primary PV's on-disk label does not match any physical volume declared in \
                     its own volume group metadata",
                )
            })?;
        let primary_pv = &mut vg.physical_volumes[primary_pv_index];
        primary_pv.identifier = label.identifier.clone();
        primary_pv.size_bytes = label.size_bytes;
        primary_pv.data_area_descriptors = label.data_area_descriptors.clone();

        debug!(
            "parsed volume group '{}' ({} PV(s), {} LV(s))",
            vg.name,
            vg.physical_volumes.len(),
            vg.logical_volumes.len()
        );
        self.volume_group = Some(vg);
        Ok(())
    }

    /// Opens each path in `paths` (VG-declared PV order) and binds them as
    /// the physical-volume pool. Sugar over `bind_physical_volume_pool`
    /// using the default `FilePool`.
    pub fn bind_physical_volumes<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<(), Error> {
        let vg = self.volume_group.as_ref().ok_or_else(|| {
            Error::invalid_argument("metadata must be loaded before binding a pool")
        })?;
        if self.pool.is_some() {
            return Err(Error::already_set("physical volume pool"));
        }
        if paths.len() != vg.physical_volumes.len() {
            return Err(Error::unsupported(format!(
                "pool descriptor count {} does not match volume group PV count {}",
                paths.len(),
                vg.physical_volumes.len()
            )));
        }

        let mut pool = FilePool::new();
        for path in paths {
            let file = File::open(path.as_ref()).map_err(|e| Error::io_at(e, path.as_ref()))?;
            pool.push(Box::new(file));
        }
        self.pool = Some(RefCell::new(Box::new(pool)));
        Ok(())
    }

    /// Binds an already-constructed pool. The pool's length must equal the
    /// VG's PV count exactly, in the same order (spec.md §5/§8 property 12).
    pub fn bind_physical_volume_pool<T: Pool + 'static>(&mut self, pool: T) -> Result<(), Error> {
        let vg = self.volume_group.as_ref().ok_or_else(|| {
            Error::invalid_argument("metadata must be loaded before binding a pool")
        })?;
        if self.pool.is_some() {
            return Err(Error::already_set("physical volume pool"));
        }
        if pool.len() != vg.physical_volumes.len() {
            return Err(Error::unsupported(format!(
                "pool descriptor count {} does not match volume group PV count {}",
                pool.len(),
                vg.physical_volumes.len()
            )));
        }
        self.pool = Some(RefCell::new(Box::new(pool)));
        Ok(())
    }

    /// The parsed volume group. Available once `MetadataLoaded`.
    pub fn volume_group(&self) -> Result<&VolumeGroup, Error> {
        self.volume_group
            .as_ref()
            .ok_or_else(|| Error::invalid_argument("metadata has not been loaded yet"))
    }

    pub fn is_pool_bound(&self) -> bool {
        self.pool.is_some()
    }

    /// Opens a cursor-bearing reader over the named logical volume.
    /// Requires `PoolBound`.
    pub fn open_lv_by_name(&self, name: &str) -> Result<LogicalVolume<'_>, Error> {
        let vg = self.volume_group()?;
        let pool = self
            .pool
            .as_ref()
            .ok_or_else(|| Error::invalid_argument("no physical volume pool is bound"))?;
        let values = vg
            .logical_volume_by_name(name)
            .ok_or_else(|| Error::invalid_argument(format!("no such logical volume: {name}")))?;
        Ok(LogicalVolume::new(vg, values, pool))
    }

    /// Opens a cursor-bearing reader over the logical volume with the
    /// given 38-character identifier. Requires `PoolBound`.
    pub fn open_lv_by_id(&self, id: &str) -> Result<LogicalVolume<'_>, Error> {
        let vg = self.volume_group()?;
        let pool = self
            .pool
            .as_ref()
            .ok_or_else(|| Error::invalid_argument("no physical volume pool is bound"))?;
        let values = vg
            .logical_volume_by_id(id)
            .ok_or_else(|| Error::invalid_argument(format!("no such logical volume: {id}")))?;
        Ok(LogicalVolume::new(vg, values, pool))
    }

    /// Idempotently frees the pool-bound and metadata-loaded state.
    pub fn close(&mut self) {
        self.pool = None;
        self.volume_group = None;
    }
}
