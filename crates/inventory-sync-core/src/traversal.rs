//! Selection graph for the property filter.
//!
//! Rules reference each other by name; the folder rule selects itself, so
//! arbitrarily deep folder nesting is covered by two finite rules.

use inventory_sync_protocol::{ManagedObjectRef, ObjectKind, ObjectSpec, TraversalSpec};
use std::collections::{HashSet, VecDeque};

use crate::error::{Result, SyncError};

/// Folder → child entities, re-applying itself and the datacenter rule.
pub const FOLDER_TRAVERSAL: &str = "FolderTraversalSpec";

/// Datacenter → VM folder, handing over to the folder rule.
pub const DATACENTER_TO_VM_FOLDER: &str = "DatacenterToVmFolderTraversalSpec";

/// Ordered set of named traversal rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionGraph {
    rules: Vec<TraversalSpec>,
}

impl SelectionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule. Names are checked by [`SelectionGraph::validate`].
    pub fn with_rule(mut self, rule: TraversalSpec) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn rules(&self) -> &[TraversalSpec] {
        &self.rules
    }

    pub fn rule(&self, name: &str) -> Option<&TraversalSpec> {
        self.rules.iter().find(|rule| rule.name == name)
    }

    /// Check that names are unique and every reference resolves.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for rule in &self.rules {
            if rule.name.is_empty() {
                return Err(SyncError::InvalidTraversal(
                    "rule name must not be empty".to_string(),
                ));
            }
            if !seen.insert(rule.name.as_str()) {
                return Err(SyncError::InvalidTraversal(format!(
                    "duplicate rule name {}",
                    rule.name
                )));
            }
        }

        for rule in &self.rules {
            if let Some(missing) = rule.selects.iter().find(|name| !seen.contains(name.as_str())) {
                return Err(SyncError::InvalidTraversal(format!(
                    "rule {} selects unknown rule {}",
                    rule.name, missing
                )));
            }
        }

        Ok(())
    }

    /// Anchor this graph at `root` as a flat object spec.
    pub fn object_spec(&self, root: ManagedObjectRef) -> ObjectSpec {
        ObjectSpec {
            root,
            skip: false,
            select_set: self.rules.clone(),
        }
    }

    /// Evaluate the graph from `root` over a containment function.
    ///
    /// `children(object, edge)` returns the objects reachable from `object`
    /// through `edge`. Returns every selected object, root first, each once.
    /// Each (object, rule) pair is visited at most once, so cyclic rule
    /// references and cyclic containment both terminate.
    pub fn expand<F>(&self, root: &ManagedObjectRef, mut children: F) -> Vec<ManagedObjectRef>
    where
        F: FnMut(&ManagedObjectRef, &str) -> Vec<ManagedObjectRef>,
    {
        let mut selected = vec![root.clone()];
        let mut included: HashSet<ManagedObjectRef> = HashSet::from([root.clone()]);
        let mut visited: HashSet<(ManagedObjectRef, String)> = HashSet::new();
        let mut queue: VecDeque<(ManagedObjectRef, &TraversalSpec)> =
            self.rules.iter().map(|rule| (root.clone(), rule)).collect();

        while let Some((object, rule)) = queue.pop_front() {
            if object.kind != rule.root_kind {
                continue;
            }
            if !visited.insert((object.clone(), rule.name.clone())) {
                continue;
            }

            for child in children(&object, &rule.edge) {
                if !rule.skip && included.insert(child.clone()) {
                    selected.push(child.clone());
                }
                for name in &rule.selects {
                    if let Some(next) = self.rule(name) {
                        queue.push_back((child.clone(), next));
                    }
                }
            }
        }

        selected
    }
}

/// The graph reaching every virtual machine under the inventory root.
pub fn inventory_graph() -> SelectionGraph {
    SelectionGraph::new()
        .with_rule(
            TraversalSpec::new(FOLDER_TRAVERSAL, ObjectKind::Folder, "childEntity")
                .select(FOLDER_TRAVERSAL)
                .select(DATACENTER_TO_VM_FOLDER),
        )
        .with_rule(
            TraversalSpec::new(DATACENTER_TO_VM_FOLDER, ObjectKind::Datacenter, "vmFolder")
                .select(FOLDER_TRAVERSAL),
        )
}
