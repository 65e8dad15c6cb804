//! Arena-backed path-compressed binary trie.
//!
//! Keys are left-aligned in a `u128`: bit 0 of the key is the most
//! significant bit. IPv4 keys occupy the top 32 bits. Nodes live in a single
//! `Vec` and refer to each other by index.

/// Sentinel for "no child".
const NONE: u32 = u32::MAX;

#[derive(Debug, Clone, Copy)]
struct Node {
    /// Key bits, masked to `len`.
    prefix: u128,
    /// Number of significant bits in `prefix`.
    len: u8,
    /// Whether an inserted prefix ends exactly at this node.
    terminal: bool,
    children: [u32; 2],
}

impl Node {
    fn new(prefix: u128, len: u8, terminal: bool) -> Self {
        Self {
            prefix,
            len,
            terminal,
            children: [NONE, NONE],
        }
    }
}

/// Mask `key` down to its first `len` bits.
#[inline]
pub(crate) fn mask(key: u128, len: u8) -> u128 {
    if len == 0 {
        0
    } else {
        key & (u128::MAX << (128 - u32::from(len)))
    }
}

/// The bit of `key` at position `index` (0 = most significant).
#[inline]
fn bit(key: u128, index: u8) -> usize {
    ((key >> (127 - u32::from(index))) & 1) as usize
}

/// Length of the common prefix of two masked keys.
#[inline]
fn common_len(a: u128, a_len: u8, b: u128, b_len: u8) -> u8 {
    let diff = (a ^ b).leading_zeros().min(128) as u8;
    diff.min(a_len).min(b_len)
}

/// Containment trie over prefixes of up to `width` bits.
#[derive(Debug, Clone)]
pub(crate) struct BitTrie {
    nodes: Vec<Node>,
    root: u32,
    width: u8,
    prefixes: usize,
}

impl BitTrie {
    pub(crate) fn new(width: u8) -> Self {
        Self {
            nodes: Vec::new(),
            root: NONE,
            width,
            prefixes: 0,
        }
    }

    /// Number of stored prefixes.
    pub(crate) fn len(&self) -> usize {
        self.prefixes
    }

    /// Number of arena nodes, including branch-only nodes.
    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn push(&mut self, node: Node) -> u32 {
        let idx = self.nodes.len() as u32;
        self.nodes.push(node);
        idx
    }

    fn relink(&mut self, parent: Option<(u32, usize)>, idx: u32) {
        match parent {
            Some((p, side)) => self.nodes[p as usize].children[side] = idx,
            None => self.root = idx,
        }
    }

    /// Insert a prefix. Returns `false` when an inserted prefix already
    /// covers it, in which case nothing is stored.
    pub(crate) fn insert(&mut self, key: u128, len: u8) -> bool {
        debug_assert!(len <= self.width);
        let key = mask(key, len);

        if self.root == NONE {
            self.root = self.push(Node::new(key, len, true));
            self.prefixes += 1;
            return true;
        }

        let mut parent: Option<(u32, usize)> = None;
        let mut idx = self.root;

        loop {
            let node = self.nodes[idx as usize];
            let common = common_len(key, len, node.prefix, node.len);

            if common < node.len {
                // The new prefix diverges inside this node's compressed path.
                let new_idx = if common == len {
                    // New prefix is an ancestor of the node.
                    let mut ancestor = Node::new(key, len, true);
                    ancestor.children[bit(node.prefix, len)] = idx;
                    self.push(ancestor)
                } else {
                    let leaf = self.push(Node::new(key, len, true));
                    let mut branch = Node::new(mask(key, common), common, false);
                    branch.children[bit(key, common)] = leaf;
                    branch.children[bit(node.prefix, common)] = idx;
                    self.push(branch)
                };
                self.relink(parent, new_idx);
                self.prefixes += 1;
                return true;
            }

            // The node's path is a prefix of the new key.
            if node.terminal {
                return false;
            }
            if node.len == len {
                self.nodes[idx as usize].terminal = true;
                self.prefixes += 1;
                return true;
            }

            let side = bit(key, node.len);
            let child = node.children[side];
            if child == NONE {
                let leaf = self.push(Node::new(key, len, true));
                self.nodes[idx as usize].children[side] = leaf;
                self.prefixes += 1;
                return true;
            }

            parent = Some((idx, side));
            idx = child;
        }
    }

    /// Whether any stored prefix covers the full-width `key`.
    pub(crate) fn contains(&self, key: u128) -> bool {
        let mut idx = self.root;
        while idx != NONE {
            let node = &self.nodes[idx as usize];
            if mask(key, node.len) != node.prefix {
                return false;
            }
            if node.terminal {
                return true;
            }
            if node.len >= self.width {
                return false;
            }
            idx = node.children[bit(key, node.len)];
        }
        false
    }
}
