//! Intrusive singly-linked list of free descriptors.
//!
//! The list owns no memory: its links live in the block headers
//! themselves. Insertion is always at the head, so the most recently
//! released block is the first one a search sees.

use super::block::BlockPtr;

/// A list entry together with its predecessor, which is what unlinking needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Link {
    pub prev: Option<BlockPtr>,
    pub block: BlockPtr,
}

#[derive(Debug, Default)]
pub(crate) struct FreeList {
    head: Option<BlockPtr>,
}

impl FreeList {
    pub(crate) const fn new() -> Self {
        Self { head: None }
    }

    pub(crate) fn head(&self) -> Option<BlockPtr> {
        self.head
    }

    /// Walks the list from the head.
    ///
    /// # Safety
    ///
    /// Every entry must be a live header, and the list must not be mutated
    /// while the iterator is in use.
    pub(crate) unsafe fn iter(&self) -> Iter {
        Iter {
            prev: None,
            cur: self.head,
        }
    }

    /// Prepends `block`.
    ///
    /// # Safety
    ///
    /// `block` must be a live header that is not already on the list.
    pub(crate) unsafe fn push(&mut self, block: BlockPtr) {
        // SAFETY: forwarded to caller.
        unsafe { block.set_next(self.head) };
        self.head = Some(block);
    }

    /// First entry whose payload can hold `size` bytes.
    ///
    /// # Safety
    ///
    /// Same as [`FreeList::iter`].
    pub(crate) unsafe fn first_fit(&self, size: usize) -> Option<Link> {
        // SAFETY: forwarded to caller.
        unsafe { self.iter() }.find(|link| unsafe { link.block.len() } >= size)
    }

    /// Entry whose header sits exactly at `addr`, if any. Never dereferences `addr`.
    ///
    /// # Safety
    ///
    /// Same as [`FreeList::iter`].
    pub(crate) unsafe fn find(&self, addr: usize) -> Option<Link> {
        // SAFETY: forwarded to caller.
        unsafe { self.iter() }.find(|link| link.block.addr() == addr)
    }

    /// Removes `link.block` and clears its `next`.
    ///
    /// # Safety
    ///
    /// `link` must come from this list with no mutation since.
    pub(crate) unsafe fn unlink(&mut self, link: Link) {
        // SAFETY: forwarded to caller.
        unsafe {
            let after = link.block.next();
            self.relink(link.prev, after);
            link.block.set_next(None);
        }
    }

    /// Puts `replacement` where `link.block` was and clears the old block's `next`.
    ///
    /// # Safety
    ///
    /// As [`FreeList::unlink`]; `replacement` must be a live header not on the list.
    pub(crate) unsafe fn replace(&mut self, link: Link, replacement: BlockPtr) {
        // SAFETY: forwarded to caller.
        unsafe {
            replacement.set_next(link.block.next());
            self.relink(link.prev, Some(replacement));
            link.block.set_next(None);
        }
    }

    unsafe fn relink(&mut self, prev: Option<BlockPtr>, to: Option<BlockPtr>) {
        match prev {
            // SAFETY: forwarded to caller.
            Some(prev) => unsafe { prev.set_next(to) },
            None => self.head = to,
        }
    }
}

pub(crate) struct Iter {
    prev: Option<BlockPtr>,
    cur: Option<BlockPtr>,
}

impl Iterator for Iter {
    type Item = Link;

    fn next(&mut self) -> Option<Link> {
        let block = self.cur?;
        let link = Link {
            prev: self.prev,
            block,
        };
        self.prev = Some(block);
        // SAFETY: construction of `Iter` requires live headers.
        self.cur = unsafe { block.next() };
        Some(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::block::HEADER_SIZE;
    use std::ptr::NonNull;

    // Three 32-byte-payload blocks laid out back to back in one buffer.
    fn three_blocks(buf: &mut [u8]) -> [BlockPtr; 3] {
        let base = NonNull::new(buf.as_mut_ptr()).unwrap();
        // SAFETY: callers pass buffers of at least 3 * (HEADER_SIZE + 32) bytes.
        unsafe {
            let a = BlockPtr::init(base, 32, None);
            let b = BlockPtr::init(a.payload_offset(32), 32, None);
            let c = BlockPtr::init(b.payload_offset(32), 32, None);
            [a, b, c]
        }
    }

    fn addrs(list: &FreeList) -> Vec<usize> {
        // SAFETY: test lists only hold headers in a live buffer.
        unsafe { list.iter() }.map(|l| l.block.addr()).collect()
    }

    #[test]
    fn push_is_lifo() {
        let mut buf = vec![0_u8; 3 * (HEADER_SIZE + 32)];
        let [a, b, c] = three_blocks(&mut buf);
        let mut list = FreeList::new();
        // SAFETY: distinct live headers.
        unsafe {
            list.push(a);
            list.push(b);
            list.push(c);
        }
        assert_eq!(addrs(&list), vec![c.addr(), b.addr(), a.addr()]);
        assert_eq!(list.head(), Some(c));
    }

    #[test]
    fn unlink_middle_and_head() {
        let mut buf = vec![0_u8; 3 * (HEADER_SIZE + 32)];
        let [a, b, c] = three_blocks(&mut buf);
        let mut list = FreeList::new();
        // SAFETY: distinct live headers; links come straight from `find`.
        unsafe {
            list.push(a);
            list.push(b);
            list.push(c);

            let mid = list.find(b.addr()).unwrap();
            assert_eq!(mid.prev, Some(c));
            list.unlink(mid);
            assert_eq!(b.next(), None);
            assert_eq!(addrs(&list), vec![c.addr(), a.addr()]);

            let head = list.find(c.addr()).unwrap();
            assert_eq!(head.prev, None);
            list.unlink(head);
        }
        assert_eq!(addrs(&list), vec![a.addr()]);
    }

    #[test]
    fn replace_keeps_position() {
        let mut buf = vec![0_u8; 3 * (HEADER_SIZE + 32)];
        let [a, b, c] = three_blocks(&mut buf);
        let mut list = FreeList::new();
        // SAFETY: as above; `b` is off-list when used as the replacement.
        unsafe {
            list.push(a);
            list.push(c);
            let link = list.find(c.addr()).unwrap();
            list.replace(link, b);
            assert_eq!(c.next(), None);
        }
        assert_eq!(addrs(&list), vec![b.addr(), a.addr()]);
    }

    #[test]
    fn first_fit_takes_first_not_best() {
        let mut buf = vec![0_u8; 3 * (HEADER_SIZE + 32)];
        let [a, b, c] = three_blocks(&mut buf);
        let mut list = FreeList::new();
        // SAFETY: as above.
        unsafe {
            a.set_len(16);
            c.set_len(64);
            list.push(a);
            list.push(b);
            list.push(c);
            assert_eq!(list.first_fit(16).unwrap().block, c);
            assert_eq!(list.first_fit(65), None);
        }
    }

    #[test]
    fn find_misses_unknown_addresses() {
        let mut buf = vec![0_u8; 3 * (HEADER_SIZE + 32)];
        let [a, b, _] = three_blocks(&mut buf);
        let mut list = FreeList::new();
        // SAFETY: as above.
        unsafe {
            list.push(a);
            assert!(list.find(b.addr()).is_none());
            assert!(list.find(a.addr() + 1).is_none());
        }
    }
}
