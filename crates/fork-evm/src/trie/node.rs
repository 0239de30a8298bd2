//! Immutable trie nodes and the path-copying operations over them.
//!
//! Every update returns a new root that shares all untouched subtrees with the previous one,
//! so keeping an old root around is a constant-time snapshot.

use std::sync::{Arc, OnceLock};

use alloy_primitives::{keccak256, B256};
use alloy_rlp::{Encodable, Header, EMPTY_STRING_CODE};

use super::nibbles::{common_prefix_len, Nibbles};

pub(crate) type NodeRef = Arc<Node>;

/// A trie node together with its lazily computed reference.
#[derive(Debug)]
pub(crate) struct Node {
    kind: NodeKind,
    /// RLP of the node if shorter than 32 bytes, otherwise the RLP of its hash.
    reference: OnceLock<Vec<u8>>,
}

#[derive(Debug)]
pub(crate) enum NodeKind {
    Empty,
    Leaf { path: Nibbles, value: Vec<u8> },
    Extension { path: Nibbles, child: NodeRef },
    Branch { children: Box<[Option<NodeRef>; 16]>, value: Option<Vec<u8>> },
}

impl Node {
    fn new(kind: NodeKind) -> NodeRef {
        Arc::new(Self { kind, reference: OnceLock::new() })
    }

    pub(crate) fn empty() -> NodeRef {
        Self::new(NodeKind::Empty)
    }

    fn leaf(path: &[u8], value: Vec<u8>) -> NodeRef {
        Self::new(NodeKind::Leaf { path: Nibbles::from_nibbles(path), value })
    }

    fn extension(path: &[u8], child: NodeRef) -> NodeRef {
        if path.is_empty() {
            return child;
        }
        Self::new(NodeKind::Extension { path: Nibbles::from_nibbles(path), child })
    }

    fn branch(children: [Option<NodeRef>; 16], value: Option<Vec<u8>>) -> NodeRef {
        Self::new(NodeKind::Branch { children: Box::new(children), value })
    }

    pub(crate) fn is_empty(&self) -> bool {
        matches!(self.kind, NodeKind::Empty)
    }

    /// The reference a parent embeds for this node.
    fn reference(&self) -> &[u8] {
        self.reference.get_or_init(|| {
            let rlp = self.encode();
            if rlp.len() < 32 {
                rlp
            } else {
                alloy_rlp::encode(keccak256(&rlp))
            }
        })
    }

    /// The hash of this node when used as a root.
    pub(crate) fn hash(&self) -> B256 {
        let reference = self.reference();
        // a hashed reference is the 33-byte RLP string of the hash
        if reference.len() == 33 {
            B256::from_slice(&reference[1..])
        } else {
            keccak256(reference)
        }
    }

    fn encode(&self) -> Vec<u8> {
        let mut payload = Vec::new();
        match &self.kind {
            NodeKind::Empty => return vec![EMPTY_STRING_CODE],
            NodeKind::Leaf { path, value } => {
                path.encode_hex_prefix(true).as_slice().encode(&mut payload);
                value.as_slice().encode(&mut payload);
            }
            NodeKind::Extension { path, child } => {
                path.encode_hex_prefix(false).as_slice().encode(&mut payload);
                payload.extend_from_slice(child.reference());
            }
            NodeKind::Branch { children, value } => {
                for child in children.iter() {
                    match child {
                        Some(child) => payload.extend_from_slice(child.reference()),
                        None => payload.push(EMPTY_STRING_CODE),
                    }
                }
                match value {
                    Some(value) => value.as_slice().encode(&mut payload),
                    None => payload.push(EMPTY_STRING_CODE),
                }
            }
        }
        let mut out = Vec::with_capacity(payload.len() + 3);
        Header { list: true, payload_length: payload.len() }.encode(&mut out);
        out.extend_from_slice(&payload);
        out
    }
}

pub(crate) fn get<'a>(mut node: &'a Node, mut path: &[u8]) -> Option<&'a [u8]> {
    loop {
        match &node.kind {
            NodeKind::Empty => return None,
            NodeKind::Leaf { path: leaf_path, value } => {
                return (leaf_path.as_slice() == path).then_some(value.as_slice());
            }
            NodeKind::Extension { path: ext_path, child } => {
                path = path.strip_prefix(ext_path.as_slice())?;
                node = child.as_ref();
            }
            NodeKind::Branch { children, value } => {
                let Some((first, rest)) = path.split_first() else {
                    return value.as_deref();
                };
                node = children[*first as usize].as_deref()?;
                path = rest;
            }
        }
    }
}

pub(crate) fn insert(node: &NodeRef, path: &[u8], value: Vec<u8>) -> NodeRef {
    match &node.kind {
        NodeKind::Empty => Node::leaf(path, value),
        NodeKind::Leaf { path: leaf_path, value: leaf_value } => {
            let leaf_path = leaf_path.as_slice();
            let common = common_prefix_len(leaf_path, path);
            if common == leaf_path.len() && common == path.len() {
                return Node::leaf(path, value);
            }
            let mut children: [Option<NodeRef>; 16] = Default::default();
            let mut branch_value = None;
            place(&mut children, &mut branch_value, &leaf_path[common..], leaf_value.clone());
            place(&mut children, &mut branch_value, &path[common..], value);
            Node::extension(&path[..common], Node::branch(children, branch_value))
        }
        NodeKind::Extension { path: ext_path, child } => {
            let ext_path = ext_path.as_slice();
            let common = common_prefix_len(ext_path, path);
            if common == ext_path.len() {
                return Node::extension(ext_path, insert(child, &path[common..], value));
            }
            let mut children: [Option<NodeRef>; 16] = Default::default();
            let mut branch_value = None;
            children[ext_path[common] as usize] =
                Some(Node::extension(&ext_path[common + 1..], child.clone()));
            place(&mut children, &mut branch_value, &path[common..], value);
            Node::extension(&path[..common], Node::branch(children, branch_value))
        }
        NodeKind::Branch { children, value: branch_value } => {
            let Some((first, rest)) = path.split_first() else {
                return Node::branch((**children).clone(), Some(value));
            };
            let mut children = (**children).clone();
            let slot = &mut children[*first as usize];
            let child = slot.take().unwrap_or_else(Node::empty);
            *slot = Some(insert(&child, rest, value));
            Node::branch(children, branch_value.clone())
        }
    }
}

/// Places `value` at the relative `path` below a fresh branch.
fn place(
    children: &mut [Option<NodeRef>; 16],
    branch_value: &mut Option<Vec<u8>>,
    path: &[u8],
    value: Vec<u8>,
) {
    match path.split_first() {
        None => *branch_value = Some(value),
        Some((first, rest)) => children[*first as usize] = Some(Node::leaf(rest, value)),
    }
}

/// Removes `path` below `node`. Returns `None` if the key is absent, leaving `node` valid.
pub(crate) fn delete(node: &NodeRef, path: &[u8]) -> Option<NodeRef> {
    match &node.kind {
        NodeKind::Empty => None,
        NodeKind::Leaf { path: leaf_path, .. } => {
            (leaf_path.as_slice() == path).then(Node::empty)
        }
        NodeKind::Extension { path: ext_path, child } => {
            let rest = path.strip_prefix(ext_path.as_slice())?;
            let child = delete(child, rest)?;
            Some(join_extension(ext_path.as_slice(), child))
        }
        NodeKind::Branch { children, value } => {
            let mut children = (**children).clone();
            let mut value = value.clone();
            match path.split_first() {
                None => {
                    value.take()?;
                }
                Some((first, rest)) => {
                    let slot = &mut children[*first as usize];
                    let child = delete(slot.as_ref()?, rest)?;
                    *slot = (!child.is_empty()).then_some(child);
                }
            }
            Some(normalize_branch(children, value))
        }
    }
}

/// Merges an extension path into its (possibly shrunk) child.
fn join_extension(path: &[u8], child: NodeRef) -> NodeRef {
    match &child.kind {
        NodeKind::Empty => child,
        NodeKind::Leaf { path: leaf_path, value } => {
            Node::new(NodeKind::Leaf { path: leaf_path.prepend(path), value: value.clone() })
        }
        NodeKind::Extension { path: ext_path, child } => {
            Node::new(NodeKind::Extension { path: ext_path.prepend(path), child: child.clone() })
        }
        NodeKind::Branch { .. } => Node::extension(path, child),
    }
}

/// Collapses a branch left with fewer than two entries.
fn normalize_branch(mut children: [Option<NodeRef>; 16], value: Option<Vec<u8>>) -> NodeRef {
    let mut occupied = children.iter().enumerate().filter(|(_, c)| c.is_some()).map(|(i, _)| i);
    let first = occupied.next();
    let single = occupied.next().is_none();
    match (first, value) {
        (None, None) => Node::empty(),
        (None, Some(value)) => Node::leaf(&[], value),
        (Some(index), None) if single => match children[index].take() {
            Some(child) => join_extension(&[index as u8], child),
            None => Node::empty(),
        },
        (_, value) => Node::branch(children, value),
    }
}

/// Visits every key/value pair in key order.
pub(crate) fn collect(node: &Node, prefix: &mut Vec<u8>, out: &mut Vec<(Nibbles, Vec<u8>)>) {
    match &node.kind {
        NodeKind::Empty => {}
        NodeKind::Leaf { path, value } => {
            out.push((path.prepend(prefix), value.clone()));
        }
        NodeKind::Extension { path, child } => {
            let len = prefix.len();
            prefix.extend_from_slice(path.as_slice());
            collect(child, prefix, out);
            prefix.truncate(len);
        }
        NodeKind::Branch { children, value } => {
            if let Some(value) = value {
                out.push((Nibbles::from_nibbles(prefix), value.clone()));
            }
            for (index, child) in children.iter().enumerate() {
                if let Some(child) = child {
                    prefix.push(index as u8);
                    collect(child, prefix, out);
                    prefix.pop();
                }
            }
        }
    }
}
