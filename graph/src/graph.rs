use std::cell::Cell;

use anyhow::Result;

use config::{DataType, Direction, ToolArgument, LIST_EXTENSION};
use intern::{GetStr, InternStr, LookupStr, PackedInterner};
use util::{hash_map, HashMap, IdVec};
use workflow::TaskId;

use crate::{AddressId, EdgeId, Error, NodeId};

/// What a node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// One run (or set of runs) of a tool.
    Task(TaskId),
    /// A file on disk.
    File,
    /// A plain value passed on a command line.
    Option,
}

impl NodeKind {
    pub fn is_task(self) -> bool {
        matches!(self, Self::Task(_))
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Task(_) => "task",
            Self::File => "file",
            Self::Option => "option",
        }
    }
}

/// Where a node's current values came from. Later sources overwrite earlier ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum ValueSource {
    #[default]
    Unset,
    ParameterSet,
    CommandLine,
    Constructed,
    Evaluated,
}

impl ValueSource {
    /// Values that came from configuration or the user rather than being derived.
    pub fn is_supplied(self) -> bool {
        matches!(self, Self::ParameterSet | Self::CommandLine)
    }
}

/// Membership in a stub group: one of several files that differ only by extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubMember {
    pub extension: String,
    pub primary: bool,
}

/// A command whose output becomes an option's value when the Makefile runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub command: String,
    /// placeholder text -> node whose value replaces it
    pub placeholders: Vec<(String, NodeId)>,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub address: AddressId,
    pub kind: NodeKind,
    pub values: Vec<String>,
    pub source: ValueSource,
    pub stub: Option<StubMember>,
    /// Declared as an intermediate file, deleted after use.
    pub intermediate: bool,
    /// Random text that keeps intermediate filenames distinct; generated once.
    pub token: Option<String>,
    pub evaluation: Option<Evaluation>,
}

impl Node {
    fn new(address: AddressId, kind: NodeKind) -> Self {
        Self {
            address,
            kind,
            values: Vec::new(),
            source: ValueSource::Unset,
            stub: None,
            intermediate: false,
            token: None,
            evaluation: None,
        }
    }

    pub fn has_values(&self) -> bool {
        !self.values.is_empty() || self.evaluation.is_some()
    }

    pub fn set_values(&mut self, values: Vec<String>, source: ValueSource) {
        self.values = values;
        self.source = source;
    }
}

/// The tool argument an edge stands for, copied out of the tool configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeArgument {
    pub long_form: String,
    pub short_form: Option<String>,
    pub data_type: DataType,
    pub direction: Direction,
    pub required: bool,
    pub extensions: Vec<String>,
    pub stub_extension: Option<String>,
    pub greedy: bool,
    pub allow_multiple_values: bool,
}

impl EdgeArgument {
    pub fn new(arg: &ToolArgument, greedy: bool, stub_extension: Option<&str>) -> Self {
        Self {
            long_form: arg.long_form.clone(),
            short_form: arg.short_form.clone(),
            data_type: arg.data_type,
            direction: arg.direction,
            required: arg.required,
            extensions: arg.extensions.clone(),
            stub_extension: stub_extension.map(str::to_owned),
            greedy,
            allow_multiple_values: arg.allow_multiple_values,
        }
    }

    /// True if every value goes to a single run of the task.
    pub fn takes_all_values(&self) -> bool {
        self.greedy || self.allow_multiple_values
    }

    /// False when the argument itself reads `.list` files, so a `.list` value is kept as is
    /// instead of being replaced by the lines of the file.
    pub fn accepts_list_files(&self) -> bool {
        !self.extensions.iter().any(|ext| ext == LIST_EXTENSION)
    }

    /// Extensions a value on this edge may end with.
    pub fn allowed_extensions(&self) -> Vec<String> {
        match &self.stub_extension {
            Some(ext) => vec![ext.clone()],
            None => self.extensions.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct Edge {
    source: NodeId,
    target: NodeId,
    argument: Option<EdgeArgument>,
    link_only: bool,
}

/// An edge with its endpoints resolved to canonical nodes.
#[derive(Debug, Clone, Copy)]
pub struct EdgeRef<'a> {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub argument: Option<&'a EdgeArgument>,
    pub link_only: bool,
}

impl<'a> EdgeRef<'a> {
    /// Edge that puts a value on a command line.
    pub fn is_argument(&self) -> bool {
        !self.link_only && self.argument.is_some()
    }

    pub fn long_form(&self) -> Option<&'a str> {
        self.argument.map(|arg| arg.long_form.as_str())
    }
}

/// Directed graph of tasks, files and options.
///
/// Nodes live in an arena and are never removed. Merging two nodes points one at
/// the other (union-find with path compression) and moves its edge lists across,
/// so every id ever handed out stays valid and resolves to the surviving node.
#[derive(Debug, Default)]
pub struct PipelineGraph {
    nodes: IdVec<NodeId, Node>,
    edges: IdVec<EdgeId, Edge>,
    parents: Vec<Cell<NodeId>>,
    preds: Vec<Vec<EdgeId>>,
    succs: Vec<Vec<EdgeId>>,
    addresses: PackedInterner<AddressId>,
    index: HashMap<AddressId, NodeId>,
    /// declared address -> every node standing for it (several for a stub group)
    groups: HashMap<AddressId, Vec<NodeId>>,
    tasks: Vec<(TaskId, NodeId)>,
}

impl PipelineGraph {
    pub fn with_capacity(nodes: usize) -> Self {
        Self {
            nodes: IdVec::with_capacity(nodes),
            edges: IdVec::with_capacity(nodes * 2),
            parents: Vec::with_capacity(nodes),
            preds: Vec::with_capacity(nodes),
            succs: Vec::with_capacity(nodes),
            addresses: PackedInterner::with_capacity_and_avg_len(nodes, 24),
            index: hash_map(nodes),
            groups: hash_map(nodes),
            tasks: Vec::with_capacity(nodes / 4),
        }
    }

    /// Add a node at `address`, which must not already be in use.
    pub fn add_node(&mut self, address: &str, kind: NodeKind) -> Result<NodeId> {
        let addr = self.addresses.intern(address)?;
        if self.index.contains_key(&addr) {
            return Err(Error::DuplicateAddress(address.to_owned()).into());
        }
        let id = self.nodes.push(Node::new(addr, kind));
        self.parents.push(Cell::new(id));
        self.preds.push(Vec::new());
        self.succs.push(Vec::new());
        self.index.insert(addr, id);
        if let NodeKind::Task(task) = kind {
            self.tasks.push((task, id));
        }
        log::trace!("added {} node {address}", kind.label());
        Ok(id)
    }

    /// Make `address` a second name for `node`.
    pub fn alias(&mut self, address: &str, node: NodeId) -> Result<()> {
        let addr = self.addresses.intern(address)?;
        match self.index.get(&addr).copied() {
            Some(existing) if self.canonical(existing) != self.canonical(node) => {
                Err(Error::DuplicateAddress(address.to_owned()).into())
            }
            _ => {
                self.index.insert(addr, node);
                Ok(())
            }
        }
    }

    /// Record the nodes that stand for a declared address.
    pub fn register_group(&mut self, address: &str, members: Vec<NodeId>) -> Result<()> {
        let addr = self.addresses.intern(address)?;
        self.groups.insert(addr, members);
        Ok(())
    }

    /// Every node standing for `address`, canonical and deduplicated.
    /// Falls back to a plain node lookup for addresses that aren't groups.
    pub fn resolve_address(&self, address: &str) -> Option<Vec<NodeId>> {
        let addr = self.addresses.lookup(address)?;
        if let Some(members) = self.groups.get(&addr) {
            let mut nodes: Vec<NodeId> = Vec::with_capacity(members.len());
            for m in members {
                let c = self.canonical(*m);
                if !nodes.contains(&c) {
                    nodes.push(c);
                }
            }
            return Some(nodes);
        }
        self.index.get(&addr).map(|id| vec![self.canonical(*id)])
    }

    /// The node that `id` has been merged into (or `id` itself).
    pub fn canonical(&self, id: NodeId) -> NodeId {
        let mut root = id;
        loop {
            let parent = self.parents[usize::from(root)].get();
            if parent == root {
                break;
            }
            root = parent;
        }
        let mut cur = id;
        while cur != root {
            let next = self.parents[usize::from(cur)].replace(root);
            cur = next;
        }
        root
    }

    pub fn is_canonical(&self, id: NodeId) -> bool {
        self.parents[usize::from(id)].get() == id
    }

    /// Find the node at `address`, following merges.
    pub fn lookup(&self, address: &str) -> Option<NodeId> {
        let addr = self.addresses.lookup(address)?;
        self.index.get(&addr).map(|id| self.canonical(*id))
    }

    pub fn task_node(&self, task: TaskId) -> Option<NodeId> {
        self.tasks
            .iter()
            .find(|(t, _)| *t == task)
            .map(|(_, n)| self.canonical(*n))
    }

    /// Every task node, in the order tasks were added.
    pub fn task_nodes(&self) -> impl Iterator<Item = (TaskId, NodeId)> + '_ {
        self.tasks.iter().copied()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        self.nodes.get(self.canonical(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        let id = self.canonical(id);
        self.nodes.get_mut(id)
    }

    /// Every live (unmerged) node.
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.nodes
            .iter_ids()
            .filter(move |(id, _)| self.is_canonical(*id))
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes().count()
    }

    /// Address of the node, for messages.
    pub fn address(&self, id: NodeId) -> &str {
        let addr = self.node(id).address;
        self.addresses.get(addr).unwrap_or("<unknown node>")
    }

    /// Add an edge, or return the existing identical edge.
    pub fn add_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        argument: Option<EdgeArgument>,
        link_only: bool,
    ) -> EdgeId {
        let source = self.canonical(source);
        let target = self.canonical(target);
        let edge = Edge {
            source,
            target,
            argument,
            link_only,
        };
        if let Some(existing) = self.succs[usize::from(source)]
            .iter()
            .find(|e| self.same_edge(**e, &edge))
        {
            return *existing;
        }
        let id = self.edges.push(edge);
        self.succs[usize::from(source)].push(id);
        self.preds[usize::from(target)].push(id);
        id
    }

    fn same_edge(&self, id: EdgeId, other: &Edge) -> bool {
        let edge = self.edges.get(id);
        self.canonical(edge.source) == self.canonical(other.source)
            && self.canonical(edge.target) == self.canonical(other.target)
            && edge.link_only == other.link_only
            && edge.argument == other.argument
    }

    fn edge_ref(&self, id: EdgeId) -> EdgeRef<'_> {
        let edge = self.edges.get(id);
        EdgeRef {
            id,
            source: self.canonical(edge.source),
            target: self.canonical(edge.target),
            argument: edge.argument.as_ref(),
            link_only: edge.link_only,
        }
    }

    pub fn edge(&self, id: EdgeId) -> EdgeRef<'_> {
        self.edge_ref(id)
    }

    /// Edges pointing into `node`.
    pub fn predecessors(&self, node: NodeId) -> impl Iterator<Item = EdgeRef<'_>> + '_ {
        let node = self.canonical(node);
        self.preds[usize::from(node)].iter().map(move |e| self.edge_ref(*e))
    }

    /// Edges leaving `node`.
    pub fn successors(&self, node: NodeId) -> impl Iterator<Item = EdgeRef<'_>> + '_ {
        let node = self.canonical(node);
        self.succs[usize::from(node)].iter().map(move |e| self.edge_ref(*e))
    }

    /// Every edge touching `node`, in either direction.
    pub fn edges_of(&self, node: NodeId) -> impl Iterator<Item = EdgeRef<'_>> + '_ {
        self.predecessors(node).chain(self.successors(node))
    }

    /// Argument edges joining `task` to the data nodes for one of its tool arguments.
    pub fn argument_edges<'a>(
        &'a self,
        task: NodeId,
        long_form: &'a str,
    ) -> impl Iterator<Item = EdgeRef<'a>> + 'a {
        self.edges_of(task)
            .filter(move |e| !e.link_only && e.long_form() == Some(long_form))
    }

    /// Data nodes connected to one of `task`'s tool arguments (stub members, primary first).
    pub fn argument_nodes(&self, task: NodeId, long_form: &str) -> Vec<NodeId> {
        let task = self.canonical(task);
        let mut nodes: Vec<NodeId> = self
            .argument_edges(task, long_form)
            .map(|e| if e.source == task { e.target } else { e.source })
            .collect();
        nodes.sort();
        nodes.dedup();
        nodes.sort_by_key(|n| !self.node(*n).stub.as_ref().is_some_and(|s| s.primary));
        nodes
    }

    /// Tasks writing `node`.
    pub fn producers(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.predecessors(node)
            .filter(move |e| !e.link_only && self.node(e.source).kind.is_task())
            .map(|e| e.source)
    }

    /// Tasks that read `node`, including dependency-only links.
    pub fn consumers(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.successors(node)
            .filter(move |e| self.node(e.target).kind.is_task())
            .map(|e| e.target)
    }

    /// Merge `b` into `a` (or vice versa), keeping every edge of both.
    /// Returns the surviving node.
    pub fn merge(&mut self, a: NodeId, b: NodeId) -> Result<NodeId> {
        let a = self.canonical(a);
        let b = self.canonical(b);
        if a == b {
            return Ok(a);
        }
        let (kind_a, kind_b) = (self.node(a).kind, self.node(b).kind);
        if kind_a != kind_b || kind_a.is_task() {
            return Err(Error::MergeConflict {
                first: self.address(a).to_owned(),
                first_kind: kind_a.label(),
                second: self.address(b).to_owned(),
                second_kind: kind_b.label(),
            }
            .into());
        }

        // keep the node with more edges, so fewer ids get moved.
        let degree = |n: NodeId| self.preds[usize::from(n)].len() + self.succs[usize::from(n)].len();
        let (keep, lose) = if degree(b) > degree(a) { (b, a) } else { (a, b) };
        log::trace!("merging {} into {}", self.address(lose), self.address(keep));

        let lost = self.nodes.get(lose).clone();
        let kept = self.nodes.get_mut(keep);
        if kept.values.is_empty() && !lost.values.is_empty() {
            kept.values = lost.values;
            kept.source = lost.source;
        }
        if kept.stub.is_none() {
            kept.stub = lost.stub;
        }
        kept.intermediate |= lost.intermediate;
        if kept.token.is_none() {
            kept.token = lost.token;
        }
        if kept.evaluation.is_none() {
            kept.evaluation = lost.evaluation;
        }

        self.parents[usize::from(lose)].set(keep);
        let preds = std::mem::take(&mut self.preds[usize::from(lose)]);
        let succs = std::mem::take(&mut self.succs[usize::from(lose)]);
        self.preds[usize::from(keep)].extend(preds);
        self.succs[usize::from(keep)].extend(succs);

        let neighbours: Vec<NodeId> = self
            .edges_of(keep)
            .map(|e| if e.source == keep { e.target } else { e.source })
            .collect();
        self.dedup_edges(keep);
        for n in neighbours {
            self.dedup_edges(n);
        }
        Ok(keep)
    }

    fn dedup_edges(&mut self, node: NodeId) {
        for incoming in [true, false] {
            let list = if incoming {
                &self.preds[usize::from(node)]
            } else {
                &self.succs[usize::from(node)]
            };
            let mut sorted = list.clone();
            sorted.sort();
            let mut kept: Vec<EdgeId> = Vec::with_capacity(sorted.len());
            for id in &sorted {
                let edge = self.edges.get(*id);
                if !kept.iter().any(|k| self.same_edge(*k, edge)) {
                    kept.push(*id);
                }
            }
            if incoming {
                self.preds[usize::from(node)] = kept;
            } else {
                self.succs[usize::from(node)] = kept;
            }
        }
    }
}
