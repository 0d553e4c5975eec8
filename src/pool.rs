//! Pool interface (spec.md §6): a caller-supplied collection of backing
//! descriptors for a volume group's physical volumes, indexed in the same
//! order as `VolumeGroup::physical_volumes`. The engine only ever performs
//! synchronous seeks and reads through it; mutual exclusion on shared
//! descriptors is the pool implementation's responsibility, not this
//! crate's (spec.md §5).

use std::io::{Cursor, Read, Seek};

use crate::error::Error;

/// Origin for a pool seek. Mirrors `std::io::SeekFrom` without tying the
/// trait's callers to that exact enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

/// Anything a pool can hold: a seekable, readable backing descriptor.
pub trait ReadSeek: Read + Seek {}
impl<T: Read + Seek> ReadSeek for T {}

/// A pool of `N` indexed backing descriptors, one per physical volume in
/// VG-declared order. `seek`/`read` are the only operations the
/// logical-volume read path exercises; `set_descriptor`/`remove_descriptor`
/// let a caller manage pool membership directly.
pub trait Pool {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn seek(&mut self, index: usize, offset: i64, whence: Whence) -> Result<u64, Error>;

    fn read(&mut self, index: usize, buf: &mut [u8]) -> Result<usize, Error>;

    fn set_descriptor(
        &mut self,
        index: usize,
        descriptor: Box<dyn ReadSeek + Send>,
    ) -> Result<(), Error>;

    fn remove_descriptor(&mut self, index: usize) -> Result<Box<dyn ReadSeek + Send>, Error>;
}

/// Default `Pool` implementation backing `Handle::bind_physical_volumes`: a
/// flat `Vec` of boxed `Read + Seek` descriptors, one per PV, in VG order.
#[derive(Default)]
pub struct FilePool {
    descriptors: Vec<Box<dyn ReadSeek + Send>>,
}

impl FilePool {
    pub fn new() -> Self {
        FilePool {
            descriptors: Vec::new(),
        }
    }

    /// Appends a descriptor at the next index. Used by
    /// `Handle::bind_physical_volumes` while it opens PV files in
    /// VG-declared order.
    pub fn push(&mut self, descriptor: Box<dyn ReadSeek + Send>) {
        self.descriptors.push(descriptor);
    }

    fn get_mut(&mut self, index: usize) -> Result<&mut Box<dyn ReadSeek + Send>, Error> {
        self.descriptors
            .get_mut(index)
            .ok_or_else(|| Error::invalid_argument(format!("pool index {index} out of range")))
    }
}

impl Pool for FilePool {
    fn len(&self) -> usize {
        self.descriptors.len()
    }

    fn seek(&mut self, index: usize, offset: i64, whence: Whence) -> Result<u64, Error> {
        let seek_from = match whence {
            Whence::Set => {
                let offset = u64::try_from(offset)
                    .map_err(|_| Error::out_of_bounds("SeekSet offset must be non-negative"))?;
                std::io::SeekFrom::Start(offset)
            }
            Whence::Cur => std::io::SeekFrom::Current(offset),
            Whence::End => std::io::SeekFrom::End(offset),
        };
        self.get_mut(index)?.seek(seek_from).map_err(Error::io)
    }

    fn read(&mut self, index: usize, buf: &mut [u8]) -> Result<usize, Error> {
        self.get_mut(index)?.read(buf).map_err(Error::io)
    }

    fn set_descriptor(
        &mut self,
        index: usize,
        descriptor: Box<dyn ReadSeek + Send>,
    ) -> Result<(), Error> {
        let slot = self.get_mut(index)?;
        *slot = descriptor;
        Ok(())
    }

    fn remove_descriptor(&mut self, index: usize) -> Result<Box<dyn ReadSeek + Send>, Error> {
        let slot = self.get_mut(index)?;
        let placeholder: Box<dyn ReadSeek + Send> = Box::new(Cursor::new(Vec::<u8>::new()));
        Ok(std::mem::replace(slot, placeholder))
    }
}
