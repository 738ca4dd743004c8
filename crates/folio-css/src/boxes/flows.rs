//! Named flows.
//!
//! [CSS Regions § 2](https://www.w3.org/TR/css-regions-1/#named-flows)
//!
//! "The flow-into property can place an element or its contents into a named
//! flow. Content that belongs to the same flow is laid out in the regions
//! associated with that flow."

use std::collections::{HashMap, HashSet};

use folio_dom::{DomTree, NodeId, NodeType};

use crate::cascade::StyleResolver;

/// Which elements feed which named flow, and where each flow is consumed.
#[derive(Debug, Clone, Default)]
pub struct FlowMap {
    sources: HashMap<String, Vec<NodeId>>,
    regions: HashMap<String, NodeId>,
}

impl FlowMap {
    /// No named flows.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan the document in order and collect `flow-into` sources and
    /// `flow-from` regions. A flow with no region is reported and its
    /// content stays in the normal flow.
    pub fn build(tree: &DomTree, resolver: &mut StyleResolver) -> Self {
        let mut map = Self::new();
        let mut redirected: HashSet<NodeId> = HashSet::new();
        for node in tree.descendants(tree.root()) {
            let Some(node_data) = tree.get(node) else {
                continue;
            };
            if !matches!(node_data.node_type, NodeType::Element(_)) {
                continue;
            }
            let style = resolver.resolve_style(tree, node, None);
            if style.display_none {
                continue;
            }
            if let Some(name) = &style.flow_from {
                let _ = map.regions.entry(name.clone()).or_insert(node);
            }
            if let Some(name) = &style.flow_into {
                // Only the outermost element of a redirected subtree is a source.
                if tree.ancestors(node).any(|a| redirected.contains(&a)) {
                    continue;
                }
                let _ = redirected.insert(node);
                map.sources.entry(name.clone()).or_default().push(node);
            }
        }
        let mut unresolved: Vec<&String> = map
            .sources
            .keys()
            .filter(|name| !map.regions.contains_key(*name))
            .collect();
        unresolved.sort();
        for name in unresolved {
            resolver.messages().warn(
                "Layout",
                format!("named flow '{name}' has no region; its content stays in the normal flow"),
            );
        }
        map
    }

    /// The element is moved into a flow that some region consumes.
    #[must_use]
    pub fn is_redirected(&self, flow_into: Option<&str>) -> bool {
        flow_into.is_some_and(|name| self.regions.contains_key(name))
    }

    /// Sources of flow `name` in document order, when the flow has a region.
    #[must_use]
    pub fn content_of(&self, name: &str) -> &[NodeId] {
        if self.regions.contains_key(name) {
            self.sources.get(name).map_or(&[], Vec::as_slice)
        } else {
            &[]
        }
    }

    /// The region element `node` is the first consumer of flow `name`.
    #[must_use]
    pub fn is_region(&self, name: &str, node: NodeId) -> bool {
        self.regions.get(name) == Some(&node)
    }

    /// Number of named flows seen.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// No named flows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
