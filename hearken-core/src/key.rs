//! # Event Key Graph
//!
//! Every event carries a [`Key`] naming its runtime "type". Keys form a
//! directed acyclic graph: a key may have several parents, modelling the
//! several facets one event can expose (a group message is both a message
//! event and a group event). Listeners target keys, and an event matches a
//! listener when the event's key is the target or one of its ancestors.
//!
//! Keys live in a flat arena owned by [`KeyGraph`]; parent links are indices.
//! Ancestor sets are computed lazily on first use and memoized per key.
//!
//! ```rust,ignore
//! let graph = KeyGraphBuilder::new()
//!     .key("message", [ROOT_KEY])
//!     .key("group", [ROOT_KEY])
//!     .key("group_message", ["message", "group"])
//!     .build()?;
//!
//! let group_message = graph.get("group_message").unwrap();
//! assert!(group_message.is_subtype_of(&graph.root()));
//! ```

use crate::error::KeyGraphError;
use std::{
    collections::{HashMap, HashSet},
    fmt,
    hash::{Hash, Hasher},
    sync::{Arc, OnceLock},
};

/// Id of the root key every [`KeyGraphBuilder`] starts with.
pub const ROOT_KEY: &str = "event";

struct KeyNode {
    id: String,
    parents: Vec<usize>,
    ancestors: OnceLock<HashSet<usize>>,
}

struct GraphInner {
    nodes: Vec<KeyNode>,
    index: HashMap<String, usize>,
}

impl GraphInner {
    fn ancestors(&self, index: usize) -> &HashSet<usize> {
        self.nodes[index].ancestors.get_or_init(|| {
            let mut seen = HashSet::new();
            let mut stack = self.nodes[index].parents.clone();
            while let Some(parent) = stack.pop() {
                if seen.insert(parent) {
                    stack.extend_from_slice(&self.nodes[parent].parents);
                }
            }
            seen
        })
    }
}

/// Builder for a [`KeyGraph`].
///
/// Declarations may reference parents declared later; everything is resolved
/// and validated in [`build`](Self::build).
pub struct KeyGraphBuilder {
    declarations: Vec<(String, Vec<String>)>,
}

impl Default for KeyGraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyGraphBuilder {
    /// Create a builder that already contains the [`ROOT_KEY`].
    pub fn new() -> Self {
        Self {
            declarations: vec![(ROOT_KEY.to_string(), Vec::new())],
        }
    }

    /// Declare a key with its parents.
    pub fn key<I, P>(mut self, id: impl Into<String>, parents: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.declare(id, parents);
        self
    }

    /// Declare a key with its parents (mutable version).
    pub fn declare<I, P>(&mut self, id: impl Into<String>, parents: I)
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.declarations
            .push((id.into(), parents.into_iter().map(Into::into).collect()));
    }

    /// Resolve every declaration into an immutable graph.
    ///
    /// Fails on duplicate ids, unknown parents and cycles.
    pub fn build(self) -> Result<KeyGraph, KeyGraphError> {
        let mut index = HashMap::with_capacity(self.declarations.len());
        for (position, (id, _)) in self.declarations.iter().enumerate() {
            if index.insert(id.clone(), position).is_some() {
                return Err(KeyGraphError::Duplicate(id.clone()));
            }
        }

        let mut nodes = Vec::with_capacity(self.declarations.len());
        for (id, parents) in self.declarations {
            let mut resolved = Vec::with_capacity(parents.len());
            for parent in parents {
                match index.get(&parent) {
                    Some(&position) if !resolved.contains(&position) => resolved.push(position),
                    Some(_) => {}
                    None => {
                        return Err(KeyGraphError::UnknownParent { key: id, parent });
                    }
                }
            }
            nodes.push(KeyNode {
                id,
                parents: resolved,
                ancestors: OnceLock::new(),
            });
        }

        detect_cycle(&nodes)?;

        Ok(KeyGraph {
            inner: Arc::new(GraphInner { nodes, index }),
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

fn detect_cycle(nodes: &[KeyNode]) -> Result<(), KeyGraphError> {
    let mut marks = vec![Mark::Unvisited; nodes.len()];
    for start in 0..nodes.len() {
        if marks[start] != Mark::Unvisited {
            continue;
        }
        // (node, next parent slot to visit)
        let mut stack = vec![(start, 0usize)];
        marks[start] = Mark::InProgress;
        while let Some((node, slot)) = stack.last_mut() {
            let node = *node;
            if let Some(&parent) = nodes[node].parents.get(*slot) {
                *slot += 1;
                match marks[parent] {
                    Mark::InProgress => {
                        return Err(KeyGraphError::Cycle(nodes[parent].id.clone()));
                    }
                    Mark::Unvisited => {
                        marks[parent] = Mark::InProgress;
                        stack.push((parent, 0));
                    }
                    Mark::Done => {}
                }
            } else {
                marks[node] = Mark::Done;
                stack.pop();
            }
        }
    }
    Ok(())
}

/// An immutable, shareable graph of event keys.
#[derive(Clone)]
pub struct KeyGraph {
    inner: Arc<GraphInner>,
}

impl KeyGraph {
    /// Look up a key by id.
    pub fn get(&self, id: &str) -> Option<Key> {
        self.inner.index.get(id).map(|&index| Key {
            graph: Arc::clone(&self.inner),
            index,
        })
    }

    /// The [`ROOT_KEY`].
    pub fn root(&self) -> Key {
        Key {
            graph: Arc::clone(&self.inner),
            index: 0,
        }
    }

    /// Iterate over every key in declaration order.
    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        (0..self.inner.nodes.len()).map(|index| Key {
            graph: Arc::clone(&self.inner),
            index,
        })
    }

    /// Number of declared keys, the root included.
    pub fn len(&self) -> usize {
        self.inner.nodes.len()
    }

    /// Always `false`: a graph holds at least the root key.
    pub fn is_empty(&self) -> bool {
        self.inner.nodes.is_empty()
    }
}

impl fmt::Debug for KeyGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.inner.nodes.iter().map(|n| &n.id))
            .finish()
    }
}

/// A handle to one key of a [`KeyGraph`].
///
/// Cloning is cheap. Keys from different graphs are never equal and never
/// subtypes of each other.
#[derive(Clone)]
pub struct Key {
    graph: Arc<GraphInner>,
    index: usize,
}

impl Key {
    /// The key id.
    pub fn id(&self) -> &str {
        &self.graph.nodes[self.index].id
    }

    /// Direct parents.
    pub fn parents(&self) -> impl Iterator<Item = Key> + '_ {
        self.graph.nodes[self.index].parents.iter().map(|&index| Key {
            graph: Arc::clone(&self.graph),
            index,
        })
    }

    /// Every transitive ancestor, excluding `self`.
    pub fn ancestors(&self) -> Vec<Key> {
        let mut ancestors: Vec<usize> = self.graph.ancestors(self.index).iter().copied().collect();
        ancestors.sort_unstable();
        ancestors
            .into_iter()
            .map(|index| Key {
                graph: Arc::clone(&self.graph),
                index,
            })
            .collect()
    }

    /// Returns `true` if `other` is `self` or one of its transitive parents.
    pub fn is_subtype_of(&self, other: &Key) -> bool {
        if !Arc::ptr_eq(&self.graph, &other.graph) {
            return false;
        }
        self.index == other.index || self.graph.ancestors(self.index).contains(&other.index)
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.graph, &other.graph) && self.index == other.index
    }
}

impl Eq for Key {}

impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.graph).hash(state);
        self.index.hash(state);
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", self.id())
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}
