use alloc::vec::Vec;

use super::node_id::NodeId;

/// One arena slot: the element, if live, and the slot's reuse generation.
struct Slot<T> {
    generation: u32,
    element: Option<T>,
}

/// Slot-vector arena that owns every node in the tree.
///
/// Nodes name each other (parent, siblings, children) by [`NodeId`], so the
/// arena is the single owner and the links carry no ownership. Freed slots go
/// on a free list and are reused by later allocations; the generation tag in
/// each id pins down which incarnation of a slot it names, so an id held
/// across a free stops resolving instead of landing on an unrelated node.
/// Dropping the arena drops every live node.
pub(crate) struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<usize>,
}

impl<T> Arena<T> {
    pub(crate) const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Number of live elements.
    pub(crate) fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub(crate) fn alloc(&mut self, element: T) -> NodeId {
        if let Some(index) = self.free.pop() {
            // Reuse a free slot under its current generation.
            let slot = &mut self.slots[index];
            slot.element = Some(element);
            NodeId::new(index, slot.generation)
        } else {
            // Strict less-than so every slot index stays addressable.
            assert!(
                self.slots.len() < NodeId::MAX_INDEX,
                "`Arena::alloc()` - arena is at maximum capacity ({})",
                NodeId::MAX_INDEX
            );
            self.slots.push(Slot {
                generation: 0,
                element: Some(element),
            });
            NodeId::new(self.slots.len() - 1, 0)
        }
    }

    #[inline]
    pub(crate) fn get(&self, id: NodeId) -> &T {
        let slot = &self.slots[id.index()];
        assert!(slot.generation == id.generation(), "`Arena::get()` - `id` is stale!");
        slot.element.as_ref().expect("`Arena::get()` - `id` is invalid!")
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut T {
        let slot = &mut self.slots[id.index()];
        assert!(slot.generation == id.generation(), "`Arena::get_mut()` - `id` is stale!");
        slot.element.as_mut().expect("`Arena::get_mut()` - `id` is invalid!")
    }

    pub(crate) fn free(&mut self, id: NodeId) {
        let slot = &mut self.slots[id.index()];
        assert!(slot.generation == id.generation(), "`Arena::free()` - `id` is stale!");
        let element = slot.element.take().expect("`Arena::free()` - `id` is invalid!");
        // Retire this incarnation; ids taken out before the free no longer
        // resolve.
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index());
        drop(element);
    }
}
