//! Read-only LVM2 metadata parsing and logical-volume byte-stream mapping.
//!
//! Given one or more backing files or block devices that together make up
//! an LVM2 volume group, this crate locates and validates the physical
//! volume labels, locates and parses the textual metadata area describing
//! the volume group, reconstructs the logical-volume extent map, and
//! translates logical-volume byte reads into reads against the right
//! backing physical volume.
//!
//! Entry point: [`Handle`]. Open a primary descriptor to load metadata
//! (`open_primary`/`open_primary_from_descriptor`), bind a pool of PV
//! backing descriptors in VG-declared order (`bind_physical_volumes`/
//! `bind_physical_volume_pool`), then open logical volumes for reading
//! (`open_lv_by_name`/`open_lv_by_id`).
//!
//! This core is strictly read-only: no metadata creation or modification,
//! no snapshots, thin provisioning, or encryption, no filesystem-level
//! interpretation of logical-volume contents.

pub mod checksum;
pub mod codec;
pub mod error;
pub mod handle;
pub mod label;
pub mod lv;
pub mod metadata_area;
pub mod model;
pub mod parser;
pub mod pool;
pub mod text;

pub use error::Error;
pub use handle::{Access, Handle};
pub use lv::LogicalVolume;
pub use model::{
    DataAreaDescriptor, LogicalVolumeValues, MetadataAreaDescriptor, PhysicalVolume,
    RawLocationDescriptor, Segment, Stripe, VolumeGroup,
};
pub use pool::{FilePool, Pool, ReadSeek, Whence};
