//! Sidebar-local tree operations.
//!
//! The background process owns the tree-building algorithms; these functions
//! only apply structural state the background has already decided on, keeping
//! parent/child links and derived collapsed flags consistent inside the
//! registry.

use crate::messages::TreeStructureEntry;
use crate::tab::TabRegistry;
use arbor_config::TabId;
use std::collections::HashSet;

/// Ancestor chain of a tab, nearest first. Tolerates broken links.
pub fn ancestors(registry: &TabRegistry, id: TabId) -> Vec<TabId> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut current = registry.get(id).and_then(|record| record.parent);
    while let Some(parent) = current {
        if !seen.insert(parent) {
            log::warn!("cycle detected in tab tree at {parent}");
            break;
        }
        chain.push(parent);
        current = registry.get(parent).and_then(|record| record.parent);
    }
    chain
}

/// Whether any ancestor currently collapses this tab.
///
/// This is the reference state for the `by_ancestor` staleness check on
/// collapse broadcasts.
pub fn has_collapsed_ancestor(registry: &TabRegistry, id: TabId) -> bool {
    ancestors(registry, id)
        .into_iter()
        .any(|ancestor| {
            registry
                .get(ancestor)
                .map(|record| record.subtree_collapsed)
                .unwrap_or(false)
        })
}

/// Descendants of a tab in depth-first order.
pub fn descendants(registry: &TabRegistry, id: TabId) -> Vec<TabId> {
    let mut result = Vec::new();
    let mut stack: Vec<TabId> = registry
        .get(id)
        .map(|record| record.children)
        .unwrap_or_default();
    stack.reverse();
    let mut seen = HashSet::new();
    while let Some(next) = stack.pop() {
        if !seen.insert(next) {
            continue;
        }
        result.push(next);
        if let Some(record) = registry.get(next) {
            for child in record.children.into_iter().rev() {
                stack.push(child);
            }
        }
    }
    result
}

/// Attach `child` under `parent`, positioned among the existing children by
/// `insert_before`/`insert_after` (sibling ids), appended otherwise.
///
/// Only tree links change here; window-order moves arrive as separate move
/// commands from the background.
pub fn attach_tab_to(
    registry: &TabRegistry,
    child: TabId,
    parent: TabId,
    insert_before: Option<TabId>,
    insert_after: Option<TabId>,
) {
    if child == parent || ancestors(registry, parent).contains(&child) {
        log::warn!("refusing to attach {child} under its own descendant {parent}");
        return;
    }
    detach_from_parent(registry, child);

    registry.update(parent, |record| {
        let position = insert_before
            .and_then(|id| record.children.iter().position(|c| *c == id))
            .or_else(|| {
                insert_after
                    .and_then(|id| record.children.iter().position(|c| *c == id))
                    .map(|index| index + 1)
            })
            .unwrap_or(record.children.len());
        record.children.insert(position, child);
    });
    registry.update(child, |record| record.parent = Some(parent));
    log::debug!("attached {child} under {parent}");

    refresh_collapsed_below(registry, child);
}

/// Detach a tab from its parent. Its own children stay attached to it.
pub fn detach_tab(registry: &TabRegistry, tab: TabId) {
    detach_from_parent(registry, tab);
    log::debug!("detached {tab}");
    refresh_collapsed_below(registry, tab);
}

fn detach_from_parent(registry: &TabRegistry, tab: TabId) {
    let old_parent = registry.get(tab).and_then(|record| record.parent);
    if let Some(parent) = old_parent {
        registry.update(parent, |record| {
            record.children.retain(|child| *child != tab);
        });
    }
    registry.update(tab, |record| record.parent = None);
}

/// Collapse or expand a tab's subtree, updating the derived hidden state of
/// every descendant. `manual` marks a user-initiated toggle (broadcast back
/// by the background), which only differs in logging here.
pub fn collapse_expand_subtree(registry: &TabRegistry, tab: TabId, collapsed: bool, manual: bool) {
    if !registry.contains(tab) {
        return;
    }
    let changed = registry
        .get(tab)
        .map(|record| record.subtree_collapsed != collapsed)
        .unwrap_or(false);
    registry.update(tab, |record| record.subtree_collapsed = collapsed);
    if changed {
        log::debug!(
            "subtree of {tab} {} ({})",
            if collapsed { "collapsed" } else { "expanded" },
            if manual { "manual" } else { "broadcast" }
        );
        registry.events().on_collapsed_changed.dispatch(&tab);
    }
    refresh_collapsed_below(registry, tab);
}

/// Apply a single-tab collapsed-state broadcast.
pub fn collapse_expand_tab(registry: &TabRegistry, tab: TabId, collapsed: bool) {
    let changed = registry
        .get(tab)
        .map(|record| record.collapsed != collapsed)
        .unwrap_or(false);
    registry.update(tab, |record| record.collapsed = collapsed);
    if changed {
        registry.events().on_collapsed_changed.dispatch(&tab);
    }
}

/// Wholesale application of a pushed/pulled tree shape onto the registry's
/// current window order. Entries beyond the tab count are ignored, missing
/// entries leave tabs as roots.
pub fn apply_tree_structure(registry: &TabRegistry, structure: &[TreeStructureEntry]) {
    let ids = registry.ids();

    // Reset all links first; the pushed shape is authoritative.
    for id in &ids {
        registry.update(*id, |record| {
            record.parent = None;
            record.children.clear();
        });
    }

    for (index, entry) in structure.iter().enumerate().take(ids.len()) {
        let id = ids[index];
        registry.update(id, |record| record.subtree_collapsed = entry.collapsed);
        if let Some(parent_index) = entry.parent {
            // Parents always precede children in a serialized structure.
            if parent_index < index {
                let parent = ids[parent_index];
                registry.update(parent, |record| record.children.push(id));
                registry.update(id, |record| record.parent = Some(parent));
            } else {
                log::warn!("tree structure entry {index} points forward to {parent_index}");
            }
        }
    }

    refresh_all_collapsed(registry);
    log::debug!(
        "applied tree structure of {} entries to {} tabs",
        structure.len(),
        ids.len()
    );
}

/// Recompute the derived `collapsed` flag for every tab from its ancestors.
pub fn refresh_all_collapsed(registry: &TabRegistry) {
    for id in registry.ids() {
        let hidden = has_collapsed_ancestor(registry, id);
        let changed = registry
            .get(id)
            .map(|record| record.collapsed != hidden)
            .unwrap_or(false);
        registry.update(id, |record| record.collapsed = hidden);
        if changed {
            registry.events().on_collapsed_changed.dispatch(&id);
        }
    }
}

/// Recompute derived collapsed flags for `tab` and everything below it.
fn refresh_collapsed_below(registry: &TabRegistry, tab: TabId) {
    let mut affected = vec![tab];
    affected.extend(descendants(registry, tab));
    for id in affected {
        let hidden = has_collapsed_ancestor(registry, id);
        let changed = registry
            .get(id)
            .map(|record| record.collapsed != hidden)
            .unwrap_or(false);
        registry.update(id, |record| record.collapsed = hidden);
        if changed {
            registry.events().on_collapsed_changed.dispatch(&id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tab::NativeTab;
    use arbor_config::WindowId;

    fn registry_with_tabs(count: i64) -> TabRegistry {
        let registry = TabRegistry::new(WindowId(1));
        for i in 0..count {
            registry.insert_native(&NativeTab::new(
                TabId(i),
                WindowId(1),
                i as usize,
                format!("https://example.com/{i}"),
            ));
        }
        registry
    }

    #[test]
    fn test_attach_and_detach_maintain_links() {
        let registry = registry_with_tabs(3);
        attach_tab_to(&registry, TabId(1), TabId(0), None, None);
        attach_tab_to(&registry, TabId(2), TabId(0), None, None);

        assert_eq!(registry.get(TabId(0)).unwrap().children, vec![TabId(1), TabId(2)]);
        assert_eq!(registry.get(TabId(1)).unwrap().parent, Some(TabId(0)));

        detach_tab(&registry, TabId(1));
        assert_eq!(registry.get(TabId(0)).unwrap().children, vec![TabId(2)]);
        assert!(registry.get(TabId(1)).unwrap().is_root());
    }

    #[test]
    fn test_attach_respects_insert_before() {
        let registry = registry_with_tabs(4);
        attach_tab_to(&registry, TabId(1), TabId(0), None, None);
        attach_tab_to(&registry, TabId(2), TabId(0), None, None);
        attach_tab_to(&registry, TabId(3), TabId(0), Some(TabId(2)), None);

        assert_eq!(
            registry.get(TabId(0)).unwrap().children,
            vec![TabId(1), TabId(3), TabId(2)]
        );
    }

    #[test]
    fn test_attach_rejects_cycles() {
        let registry = registry_with_tabs(2);
        attach_tab_to(&registry, TabId(1), TabId(0), None, None);
        attach_tab_to(&registry, TabId(0), TabId(1), None, None);

        assert_eq!(registry.get(TabId(0)).unwrap().parent, None);
    }

    #[test]
    fn test_collapse_subtree_hides_descendants() {
        let registry = registry_with_tabs(3);
        attach_tab_to(&registry, TabId(1), TabId(0), None, None);
        attach_tab_to(&registry, TabId(2), TabId(1), None, None);

        collapse_expand_subtree(&registry, TabId(0), true, false);

        assert!(registry.get(TabId(0)).unwrap().subtree_collapsed);
        assert!(!registry.get(TabId(0)).unwrap().collapsed);
        assert!(registry.get(TabId(1)).unwrap().collapsed);
        assert!(registry.get(TabId(2)).unwrap().collapsed);

        collapse_expand_subtree(&registry, TabId(0), false, false);
        assert!(!registry.get(TabId(1)).unwrap().collapsed);
        assert!(!registry.get(TabId(2)).unwrap().collapsed);
    }

    #[test]
    fn test_nested_collapse_survives_outer_expand() {
        let registry = registry_with_tabs(3);
        attach_tab_to(&registry, TabId(1), TabId(0), None, None);
        attach_tab_to(&registry, TabId(2), TabId(1), None, None);

        collapse_expand_subtree(&registry, TabId(1), true, false);
        collapse_expand_subtree(&registry, TabId(0), true, false);
        collapse_expand_subtree(&registry, TabId(0), false, false);

        assert!(!registry.get(TabId(1)).unwrap().collapsed);
        assert!(
            registry.get(TabId(2)).unwrap().collapsed,
            "grandchild stays hidden under its collapsed parent"
        );
    }

    #[test]
    fn test_apply_tree_structure() {
        let registry = registry_with_tabs(4);
        let structure = vec![
            TreeStructureEntry { parent: None, collapsed: false },
            TreeStructureEntry { parent: Some(0), collapsed: true },
            TreeStructureEntry { parent: Some(1), collapsed: false },
            TreeStructureEntry { parent: None, collapsed: false },
        ];
        apply_tree_structure(&registry, &structure);

        assert_eq!(registry.get(TabId(1)).unwrap().parent, Some(TabId(0)));
        assert_eq!(registry.get(TabId(2)).unwrap().parent, Some(TabId(1)));
        assert!(registry.get(TabId(1)).unwrap().subtree_collapsed);
        assert!(
            registry.get(TabId(2)).unwrap().collapsed,
            "child of a collapsed subtree is hidden"
        );
        assert!(registry.get(TabId(3)).unwrap().is_root());
    }
}
