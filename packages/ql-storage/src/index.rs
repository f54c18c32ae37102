//! Ordered byte-key index kept entirely in a heap.
//!
//! The index is a B-tree whose nodes are heap allocations. Each entry maps a
//! key to the handle of a separate value allocation, so an upsert rewrites
//! only the value. Only the root handle and the entry count stay in memory.

use std::cmp::Ordering;
use std::mem;

use crate::error::{Result, StorageError};
use crate::heap::{Handle, Heap};

/// Fallible byte comparator deciding index order.
pub type Collator = fn(&[u8], &[u8]) -> Result<Ordering>;

/// Node split threshold.
const MAX_KEYS: usize = 32;

/// One B-tree node. Leaves have no children; a branch with `n` keys has
/// `n + 1` children.
#[derive(Debug, Default, PartialEq)]
struct Node {
    keys: Vec<Vec<u8>>,
    values: Vec<Handle>,
    children: Vec<Handle>,
}

impl Node {
    fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    // keys u32 | children u32 | (key len u32, key, value u64)* | child u64*
    fn encode(&self) -> Vec<u8> {
        let keys_len: usize = self.keys.iter().map(|k| 12 + k.len()).sum();
        let mut buf = Vec::with_capacity(8 + keys_len + 8 * self.children.len());
        buf.extend_from_slice(&(self.keys.len() as u32).to_be_bytes());
        buf.extend_from_slice(&(self.children.len() as u32).to_be_bytes());
        for (key, value) in self.keys.iter().zip(&self.values) {
            buf.extend_from_slice(&(key.len() as u32).to_be_bytes());
            buf.extend_from_slice(key);
            buf.extend_from_slice(&value.to_be_bytes());
        }
        for child in &self.children {
            buf.extend_from_slice(&child.to_be_bytes());
        }
        buf
    }

    fn decode(handle: Handle, bytes: &[u8]) -> Result<Self> {
        let mut reader = NodeReader { handle, bytes, pos: 0 };
        let key_count = reader.u32()? as usize;
        let child_count = reader.u32()? as usize;
        if child_count != 0 && child_count != key_count + 1 {
            return Err(reader.damaged("child count does not match key count"));
        }

        let mut node = Node::default();
        for _ in 0..key_count {
            let len = reader.u32()? as usize;
            node.keys.push(reader.take(len)?.to_vec());
            node.values.push(reader.u64()?);
        }
        for _ in 0..child_count {
            node.children.push(reader.u64()?);
        }
        if reader.pos != bytes.len() {
            return Err(reader.damaged("trailing bytes"));
        }
        Ok(node)
    }
}

struct NodeReader<'a> {
    handle: Handle,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> NodeReader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.bytes.len())
            .ok_or_else(|| self.damaged("truncated"))?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(u32::from_be_bytes(raw))
    }

    fn u64(&mut self) -> Result<u64> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(u64::from_be_bytes(raw))
    }

    fn damaged(&self, what: &str) -> StorageError {
        StorageError::BadFormat(format!("index node {}: {}", self.handle, what))
    }
}

/// Result of inserting below a node.
enum Insert {
    Done,
    /// The node overflowed; `key`/`value` move up and `right` is the new
    /// sibling.
    Split {
        key: Vec<u8>,
        value: Handle,
        right: Handle,
    },
}

/// Sorted map from byte keys to byte values, both heap-resident.
pub struct OrderedIndex<H> {
    heap: H,
    collate: Collator,
    root: Option<Handle>,
    len: usize,
}

impl<H: Heap> OrderedIndex<H> {
    pub fn new(heap: H, collate: Collator) -> Self {
        Self {
            heap,
            collate,
            root: None,
            len: 0,
        }
    }

    fn load(&self, handle: Handle) -> Result<Node> {
        Node::decode(handle, &self.heap.get(handle)?)
    }

    /// Binary search within one node: `Ok(pos)` on a hit, `Err(pos)` for the
    /// child (or insertion point) to follow.
    fn position(&self, node: &Node, key: &[u8]) -> Result<std::result::Result<usize, usize>> {
        let (mut lo, mut hi) = (0usize, node.keys.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match (self.collate)(&node.keys[mid], key)? {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return Ok(Ok(mid)),
            }
        }
        Ok(Err(lo))
    }

    /// Handle of the value stored under `key`.
    fn find(&self, key: &[u8]) -> Result<Option<Handle>> {
        let Some(mut handle) = self.root else {
            return Ok(None);
        };
        loop {
            let node = self.load(handle)?;
            match self.position(&node, key)? {
                Ok(pos) => return Ok(Some(node.values[pos])),
                Err(_) if node.is_leaf() => return Ok(None),
                Err(pos) => handle = node.children[pos],
            }
        }
    }

    /// Inserts or replaces the value stored under `key`.
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        // The lookup runs every comparison the insert will, so a key the
        // collator rejects fails before anything is written.
        if let Some(existing) = self.find(key)? {
            return self.heap.realloc(existing, value);
        }

        let value = self.heap.alloc(value)?;
        let Some(root) = self.root else {
            let leaf = Node {
                keys: vec![key.to_vec()],
                values: vec![value],
                children: Vec::new(),
            };
            self.root = Some(self.heap.alloc(&leaf.encode())?);
            self.len = 1;
            return Ok(());
        };

        if let Insert::Split { key, value, right } = self.insert_into(root, key, value)? {
            let branch = Node {
                keys: vec![key],
                values: vec![value],
                children: vec![root, right],
            };
            self.root = Some(self.heap.alloc(&branch.encode())?);
        }
        self.len += 1;
        Ok(())
    }

    fn insert_into(&mut self, handle: Handle, key: &[u8], value: Handle) -> Result<Insert> {
        let mut node = self.load(handle)?;
        let pos = match self.position(&node, key)? {
            Ok(_) => {
                return Err(StorageError::InternalInvariantViolation(format!(
                    "index key already present in node {}",
                    handle
                )))
            }
            Err(pos) => pos,
        };

        if node.is_leaf() {
            node.keys.insert(pos, key.to_vec());
            node.values.insert(pos, value);
        } else {
            match self.insert_into(node.children[pos], key, value)? {
                Insert::Done => return Ok(Insert::Done),
                Insert::Split { key, value, right } => {
                    node.keys.insert(pos, key);
                    node.values.insert(pos, value);
                    node.children.insert(pos + 1, right);
                }
            }
        }

        if node.keys.len() <= MAX_KEYS {
            self.heap.realloc(handle, &node.encode())?;
            return Ok(Insert::Done);
        }
        self.split(handle, node)
    }

    /// Moves the upper half of an overflowing node into a new sibling.
    fn split(&mut self, handle: Handle, mut node: Node) -> Result<Insert> {
        let mid = node.keys.len() / 2;
        let right = Node {
            keys: node.keys.split_off(mid + 1),
            values: node.values.split_off(mid + 1),
            children: if node.is_leaf() {
                Vec::new()
            } else {
                node.children.split_off(mid + 1)
            },
        };
        let (Some(key), Some(value)) = (node.keys.pop(), node.values.pop()) else {
            return Err(StorageError::InternalInvariantViolation(format!(
                "split of empty index node {}",
                handle
            )));
        };

        self.heap.realloc(handle, &node.encode())?;
        let right = self.heap.alloc(&right.encode())?;
        Ok(Insert::Split { key, value, right })
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.find(key)? {
            Some(handle) => self.heap.get(handle).map(Some),
            None => Ok(None),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Enumerates `(key, value)` pairs from the first key in order.
    pub fn seek_first(&self) -> Enumerator<'_, H> {
        Enumerator {
            index: self,
            start: self.root,
            stack: Vec::new(),
            remaining: self.len,
        }
    }

    pub fn heap(&self) -> &H {
        &self.heap
    }

    pub fn into_heap(self) -> H {
        self.heap
    }
}

struct Frame {
    node: Node,
    next: usize,
}

/// Forward-only cursor over an [`OrderedIndex`].
///
/// Holds one node per tree level; nodes are read from the heap as the
/// cursor reaches them.
pub struct Enumerator<'a, H> {
    index: &'a OrderedIndex<H>,
    start: Option<Handle>,
    stack: Vec<Frame>,
    remaining: usize,
}

impl<H: Heap> Enumerator<'_, H> {
    /// Pushes the leftmost path below `handle`.
    fn descend(&mut self, mut handle: Handle) -> Result<()> {
        loop {
            let node = self.index.load(handle)?;
            let first = node.children.first().copied();
            self.stack.push(Frame { node, next: 0 });
            match first {
                Some(child) => handle = child,
                None => return Ok(()),
            }
        }
    }

    fn advance(&mut self) -> Result<Option<(Vec<u8>, Handle)>> {
        if let Some(root) = self.start.take() {
            self.descend(root)?;
        }
        loop {
            let Some(frame) = self.stack.last_mut() else {
                return Ok(None);
            };
            if frame.next == frame.node.keys.len() {
                self.stack.pop();
                continue;
            }
            let i = frame.next;
            frame.next += 1;
            let key = mem::take(&mut frame.node.keys[i]);
            let value = frame.node.values[i];
            if let Some(child) = frame.node.children.get(i + 1).copied() {
                self.descend(child)?;
            }
            return Ok(Some((key, value)));
        }
    }
}

impl<H: Heap> Iterator for Enumerator<'_, H> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.advance() {
            Ok(Some((key, handle))) => {
                self.remaining = self.remaining.saturating_sub(1);
                Some(self.index.heap.get(handle).map(|value| (key, value)))
            }
            Ok(None) => None,
            Err(e) => {
                self.stack.clear();
                self.remaining = 0;
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}
