//! Public block plus per-level private slots
//!
//! Every class and instance owns one public block and, for each ancestor
//! level that declares private data, a separate private block keyed by
//! that level's type. Private regions of different levels never alias.

use super::{Allocator, Block};
use crate::core::Type;
use crate::errors::MetaResult;
use smallvec::SmallVec;

/// Where the public block comes from
pub(crate) enum Placement {
    /// Allocate `size` bytes from the registry's allocator
    Heap(usize),
    /// Caller-supplied block, zeroed before use and handed back on release
    InPlace(Block),
}

#[derive(Clone, Copy)]
pub(crate) enum StorageKind {
    Class,
    Instance,
}

impl StorageKind {
    fn public_tag(self) -> &'static str {
        match self {
            StorageKind::Class => "class",
            StorageKind::Instance => "instance",
        }
    }

    fn private_tag(self) -> &'static str {
        match self {
            StorageKind::Class => "class-private",
            StorageKind::Instance => "instance-private",
        }
    }
}

#[derive(Default)]
pub(crate) struct Storage {
    pub public: Block,
    private: SmallVec<[(Type, Block); 2]>,
    in_place: bool,
}

impl Storage {
    pub fn allocate(
        allocator: &dyn Allocator,
        placement: Placement,
        private_levels: &[(Type, usize)],
        kind: StorageKind,
    ) -> MetaResult<Self> {
        let mut storage = match placement {
            Placement::Heap(size) => Storage {
                public: allocator.alloc(size, kind.public_tag())?,
                private: SmallVec::new(),
                in_place: false,
            },
            Placement::InPlace(mut block) => {
                block.fill(0);
                Storage {
                    public: block,
                    private: SmallVec::new(),
                    in_place: true,
                }
            }
        };

        for &(ty, size) in private_levels {
            match allocator.alloc(size, kind.private_tag()) {
                Ok(block) => storage.private.push((ty, block)),
                Err(err) => {
                    storage.release(allocator, kind);
                    return Err(err);
                }
            }
        }
        Ok(storage)
    }

    pub fn private(&self, ty: Type) -> Option<&[u8]> {
        self.private
            .iter()
            .find(|(owner, _)| *owner == ty)
            .map(|(_, block)| &**block)
    }

    pub fn private_mut(&mut self, ty: Type) -> Option<&mut [u8]> {
        self.private
            .iter_mut()
            .find(|(owner, _)| *owner == ty)
            .map(|(_, block)| &mut **block)
    }

    pub fn is_in_place(&self) -> bool {
        self.in_place
    }

    pub fn is_released(&self) -> bool {
        !self.in_place && self.public.is_empty() && self.private.is_empty()
    }

    pub fn private_size(&self) -> usize {
        self.private.iter().map(|(_, block)| block.len()).sum()
    }

    /// Return every allocator-owned block; a caller-supplied public block is
    /// handed back instead.
    pub fn release(self, allocator: &dyn Allocator, kind: StorageKind) -> Option<Block> {
        // Taken-out storage; its blocks were already returned
        if self.is_released() {
            return None;
        }
        for (_, block) in self.private {
            allocator.free(block, kind.private_tag());
        }
        if self.in_place {
            Some(self.public)
        } else {
            allocator.free(self.public, kind.public_tag());
            None
        }
    }
}
