use core::num::NonZero;

/// Arena address of a node: a slot index tagged with the slot's reuse
/// generation.
///
/// Splits allocate nodes and merges free them, so arena slots recycle
/// constantly. A bare index held across a free would silently resolve to
/// whatever node the slot hosts next; the generation tag turns that into a
/// loud failure, since the arena retires a slot's generation when it frees
/// it and checks the tag on every access.
///
/// The index is stored shifted by one so the niche optimization keeps
/// `Option<NodeId>` the same size as `NodeId`; the parent, sibling, and
/// child links are all plain ids.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct NodeId {
    slot: NonZero<u32>,
    generation: u32,
}

impl NodeId {
    pub(crate) const MAX_INDEX: usize = (u32::MAX - 1) as usize;

    #[inline]
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) fn new(index: usize, generation: u32) -> Self {
        assert!(index <= Self::MAX_INDEX, "`NodeId::new()` - `index` > `NodeId::MAX_INDEX`!");
        // `index + 1` cannot be zero and cannot overflow.
        Self {
            slot: NonZero::new(index as u32 + 1).unwrap(),
            generation,
        }
    }

    #[inline]
    pub(crate) fn index(self) -> usize {
        (self.slot.get() - 1) as usize
    }

    #[inline]
    pub(crate) fn generation(self) -> u32 {
        self.generation
    }
}
