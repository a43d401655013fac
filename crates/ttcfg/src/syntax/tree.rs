//! parse tree arena
//!
//! Nodes live in a single [Vec] and refer to each other by [NodeId]. The parent link is a stored index, so
//! attaching a node is an arena operation and there are no owning back-references to keep consistent.
use super::token::TokenStream;
use crate::section::SectionKind;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RuleKind {
    ConfigFile,
    Section(SectionKind),
    /// `key := value;`
    Entry,
    Key,
    Value,
    /// `{ ... }` inside a value
    Aggregate,
    /// quoted file name inside `[INCLUDE]` or `[ORDERED_INCLUDE]`
    IncludeFile,
    /// `module[.testcase]` inside `[EXECUTE]`
    ExecuteItem,
    /// tokens skipped during error recovery
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NodeData {
    Rule {
        kind: RuleKind,
        /// index of the first token
        start: usize,
        /// index of the last token (inclusive)
        stop: usize,
        children: Vec<NodeId>,
    },
    Terminal {
        token: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub parent: Option<NodeId>,
    pub data: NodeData,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl ParseTree {
    /// Tree consisting of a single open rule
    pub fn new(kind: RuleKind, start: usize) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            root: NodeId(0),
        };
        tree.alloc(None, rule(kind, start));
        tree
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.node(id).data {
            NodeData::Rule { children, .. } => children,
            NodeData::Terminal { .. } => &[],
        }
    }

    pub fn rule_kind(&self, id: NodeId) -> Option<RuleKind> {
        match &self.node(id).data {
            NodeData::Rule { kind, .. } => Some(*kind),
            NodeData::Terminal { .. } => None,
        }
    }

    pub fn terminal_token(&self, id: NodeId) -> Option<usize> {
        match &self.node(id).data {
            NodeData::Terminal { token } => Some(*token),
            NodeData::Rule { .. } => None,
        }
    }

    /// First and last token index covered by `id`
    pub fn token_range(&self, id: NodeId) -> (usize, usize) {
        match &self.node(id).data {
            NodeData::Rule { start, stop, .. } => (*start, *stop),
            NodeData::Terminal { token } => (*token, *token),
        }
    }

    /// Source text of `id`, hidden tokens between its first and last token included
    pub fn text(&self, id: NodeId, tokens: &TokenStream) -> String {
        let (start, stop) = self.token_range(id);
        tokens.text(start, stop)
    }

    /// Top level sections in file order
    pub fn sections(&self) -> impl Iterator<Item = (NodeId, SectionKind)> + '_ {
        self.children(self.root)
            .iter()
            .filter_map(|child| match self.rule_kind(*child) {
                Some(RuleKind::Section(kind)) => Some((*child, kind)),
                _ => None,
            })
    }

    /// Direct children of `id` that are rules of `kind`
    pub fn child_rules(&self, id: NodeId, kind: RuleKind) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |child| self.rule_kind(*child) == Some(kind))
    }

    /// Append a new open rule under `parent`
    pub fn open_rule(&mut self, parent: NodeId, kind: RuleKind, start: usize) -> NodeId {
        let id = self.alloc(Some(parent), rule(kind, start));
        self.attach(parent, id);
        id
    }

    /// Set the last token of a rule
    pub fn close_rule(&mut self, id: NodeId, last_token: usize) {
        if let NodeData::Rule { start, stop, .. } = &mut self.nodes[id.0].data {
            *stop = last_token.max(*start);
        }
    }

    pub fn push_terminal(&mut self, parent: NodeId, token: usize) -> NodeId {
        let id = self.alloc(Some(parent), NodeData::Terminal { token });
        self.attach(parent, id);
        id
    }

    fn alloc(&mut self, parent: Option<NodeId>, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node { parent, data });
        id
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        if let NodeData::Rule { children, .. } = &mut self.nodes[parent.0].data {
            children.push(child);
        }
    }
}

fn rule(kind: RuleKind, start: usize) -> NodeData {
    NodeData::Rule {
        kind,
        start,
        stop: start,
        children: Vec::new(),
    }
}
