//! A persistent, append-only sequence used as builder state.
//!
//! Appending allocates one link that points at the previous head, so every
//! builder derived from a common prefix shares that prefix read-only.

use std::sync::Arc;

#[derive(Debug)]
struct Link<T> {
    item: T,
    prev: Option<Arc<Link<T>>>,
}

#[derive(Debug)]
pub struct Chain<T> {
    head: Option<Arc<Link<T>>>,
    len: usize,
}

impl<T> Chain<T> {
    pub fn new() -> Self {
        Self { head: None, len: 0 }
    }

    /// Returns a new chain with `item` appended; `self` is left untouched.
    pub fn push(&self, item: T) -> Self {
        Self {
            head: Some(Arc::new(Link {
                item,
                prev: self.head.clone(),
            })),
            len: self.len + 1,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates over the items in insertion order.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        let mut items = Vec::with_capacity(self.len);
        let mut cursor = self.head.as_deref();

        while let Some(link) = cursor {
            items.push(&link.item);
            cursor = link.prev.as_deref();
        }

        items.into_iter().rev()
    }

    /// Whether both chains are the same instance (same head link).
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.head, &other.head) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<T> Clone for Chain<T> {
    fn clone(&self) -> Self {
        Self { head: self.head.clone(), len: self.len }
    }
}

impl<T> Default for Chain<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for Chain<T> {
    // Unlink iteratively so long chains don't recurse on drop.
    fn drop(&mut self) {
        let mut cursor = self.head.take();

        while let Some(link) = cursor {
            match Arc::try_unwrap(link) {
                Ok(mut link) => cursor = link.prev.take(),
                Err(_) => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_leaves_original_untouched() {
        let base = Chain::new().push(1).push(2);
        let left = base.push(3);
        let right = base.push(4);

        assert_eq!(base.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(left.iter().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(right.iter().copied().collect::<Vec<_>>(), vec![1, 2, 4]);
        assert_eq!(left.len(), 3);
        assert!(!left.ptr_eq(&base));
        assert!(base.clone().ptr_eq(&base));
    }

    #[test]
    fn drops_long_chains() {
        let mut chain = Chain::new();
        for i in 0..200_000 {
            chain = chain.push(i);
        }
        assert_eq!(chain.len(), 200_000);
        drop(chain);
    }
}
