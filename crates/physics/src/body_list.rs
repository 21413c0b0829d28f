//! # Body List View
//!
//! A linked list of handles with O(1) insertion and removal, plus a lazily
//! rebuilt flat array for index-based parallel iteration.
//!
//! Mutations only flip a dirty flag. [`ListView::update_view`] walks the list
//! once when the flag is set and reports whether it did, so callers know
//! that indices taken from the previous view are stale.

use crate::types::BodyId;

/// Handle of an entry in a [`ListView`], returned by
/// [`ListView::add_item`] and consumed by [`ListView::remove_item`].
/// Slots are reused, so the handle carries the slot generation it was
/// issued for; a handle from a removed entry never matches a later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListNodeId {
    index: u32,
    generation: u32,
}

#[derive(Debug, Clone)]
struct Link<T> {
    item: T,
    prev: Option<u32>,
    next: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct ListView<T: Copy> {
    links: Vec<Option<Link<T>>>,
    generations: Vec<u32>,
    free: Vec<u32>,
    head: Option<u32>,
    tail: Option<u32>,
    len: usize,
    view: Vec<T>,
    dirty: bool,
}

/// The world's list of attached bodies.
pub type BodyList = ListView<BodyId>;

impl<T: Copy> Default for ListView<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy> ListView<T> {
    /// Creates an empty list. A new list starts dirty.
    #[must_use]
    pub fn new() -> Self {
        Self {
            links: Vec::new(),
            generations: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
            view: Vec::new(),
            dirty: true,
        }
    }

    /// Moves every entry of `src` into a new list, leaving `src` empty and
    /// dirty. The cached view travels with the entries.
    #[must_use]
    pub fn take_from(src: &mut Self) -> Self {
        let mut list = std::mem::take(src);
        list.dirty = true;
        list
    }

    /// Appends `item`.
    pub fn add_item(&mut self, item: T) -> ListNodeId {
        let link = Link {
            item,
            prev: self.tail,
            next: None,
        };
        let index = if let Some(index) = self.free.pop() {
            self.links[index as usize] = Some(link);
            index
        } else {
            #[allow(clippy::cast_possible_truncation)]
            let index = self.links.len() as u32;
            self.links.push(Some(link));
            self.generations.push(0);
            index
        };

        match self.tail {
            Some(tail) => {
                if let Some(prev) = self.links[tail as usize].as_mut() {
                    prev.next = Some(index);
                }
            }
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;
        self.dirty = true;
        ListNodeId {
            index,
            generation: self.generations[index as usize],
        }
    }

    /// Unlinks the entry `node` and returns its item. Returns `None` for a
    /// handle whose entry was already removed.
    pub fn remove_item(&mut self, node: ListNodeId) -> Option<T> {
        if !self.is_live(node) {
            return None;
        }
        let slot = node.index as usize;
        let link = self.links[slot].take()?;
        self.generations[slot] = self.generations[slot].wrapping_add(1);

        match link.prev {
            Some(prev) => {
                if let Some(prev) = self.links[prev as usize].as_mut() {
                    prev.next = link.next;
                }
            }
            None => self.head = link.next,
        }
        match link.next {
            Some(next) => {
                if let Some(next) = self.links[next as usize].as_mut() {
                    next.prev = link.prev;
                }
            }
            None => self.tail = link.prev,
        }

        self.free.push(node.index);
        self.len -= 1;
        self.dirty = true;
        Some(link.item)
    }

    #[must_use]
    pub fn get(&self, node: ListNodeId) -> Option<T> {
        if !self.is_live(node) {
            return None;
        }
        self.links[node.index as usize].as_ref().map(|link| link.item)
    }

    fn is_live(&self, node: ListNodeId) -> bool {
        self.generations.get(node.index as usize) == Some(&node.generation)
    }

    /// Rebuilds the flat view if the list changed since the last call.
    /// Returns `true` when the view was rebuilt.
    pub fn update_view(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.dirty = false;
        self.view.clear();
        self.view.reserve(self.len);
        let mut cursor = self.head;
        while let Some(index) = cursor {
            match self.links[index as usize].as_ref() {
                Some(link) => {
                    self.view.push(link.item);
                    cursor = link.next;
                }
                None => break,
            }
        }
        true
    }

    /// The cached array. Only reflects the list after
    /// [`ListView::update_view`].
    #[must_use]
    pub fn view(&self) -> &[T] {
        &self.view
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Walks the list in traversal order, independently of the cached view.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            let link = self.links[cursor? as usize].as_ref()?;
            cursor = link.next;
            Some(link.item)
        })
    }

    /// Drops every entry. Handles issued before the call stay dead.
    pub fn clear(&mut self) {
        self.free.clear();
        for (index, (link, generation)) in
            (0u32..).zip(self.links.iter_mut().zip(&mut self.generations))
        {
            if link.take().is_some() {
                *generation = generation.wrapping_add(1);
            }
            self.free.push(index);
        }
        self.head = None;
        self.tail = None;
        self.len = 0;
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_list_is_dirty() {
        let mut list: ListView<u32> = ListView::new();
        assert!(list.is_dirty());
        assert!(list.update_view());
        assert!(!list.update_view());
        assert!(list.view().is_empty());
    }

    #[test]
    fn removal_from_middle_keeps_order() {
        let mut list = ListView::new();
        let _a = list.add_item(1);
        let b = list.add_item(2);
        let _c = list.add_item(3);
        assert_eq!(list.remove_item(b), Some(2));
        list.update_view();
        assert_eq!(list.view(), &[1, 3]);
        assert_eq!(list.iter().collect::<Vec<_>>(), vec![1, 3]);
    }

    #[test]
    fn freed_slots_are_reused_at_the_tail() {
        let mut list = ListView::new();
        let a = list.add_item(10);
        list.add_item(20);
        list.remove_item(a);
        list.add_item(30);
        list.update_view();
        assert_eq!(list.view(), &[20, 30]);
    }

    #[test]
    fn take_from_steals_entries() {
        let mut src = ListView::new();
        src.add_item(5);
        src.add_item(6);
        src.update_view();
        let mut dst = ListView::take_from(&mut src);
        assert!(src.is_empty());
        assert!(src.is_dirty());
        assert!(dst.update_view());
        assert_eq!(dst.view(), &[5, 6]);
    }

    #[test]
    fn stale_handle_does_not_remove_the_new_entry() {
        let mut list = ListView::new();
        let a = list.add_item(1);
        assert_eq!(list.remove_item(a), Some(1));
        let b = list.add_item(2);
        assert_ne!(a, b);
        assert_eq!(list.remove_item(a), None);
        assert_eq!(list.get(a), None);
        assert_eq!(list.get(b), Some(2));
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn handles_from_before_clear_stay_dead() {
        let mut list = ListView::new();
        let a = list.add_item(1);
        list.clear();
        let b = list.add_item(2);
        assert_eq!(list.remove_item(a), None);
        assert_eq!(list.remove_item(b), Some(2));
        assert!(list.is_empty());
    }
}
