//! Tests for NodeStore
//!
//! Covers label assignment, size bookkeeping, conflict negotiation during
//! insert/move/rename, display-order navigation, detach/restore/purge, and
//! the document boundary.

#[cfg(test)]
mod tests {
    use crate::config::TreeConfig;
    use crate::error::TreeError;
    use crate::models::{NodeAttributes, NodeId, NodeTemplate, TreeDocument};
    use crate::store::{NodeStore, Placement};
    use crate::surface::{PromptResponse, ScriptedPrompt};
    use std::collections::HashSet;

    fn unique_store() -> NodeStore {
        let mut store = NodeStore::new(&TreeConfig::default());
        store.set_unique_text(true);
        store
    }

    fn folder(text: &str) -> NodeAttributes {
        NodeAttributes::new(text)
            .with_values(vec![
                String::new(),
                String::new(),
                "Folder".to_string(),
                String::new(),
            ])
            .with_open(true)
    }

    fn item(text: &str) -> NodeAttributes {
        NodeAttributes::new(text).with_values(vec![
            String::new(),
            String::new(),
            "Item".to_string(),
            String::new(),
        ])
    }

    fn add(store: &mut NodeStore, parent: Option<NodeId>, attrs: NodeAttributes) -> NodeId {
        let mut prompt = ScriptedPrompt::silent();
        store
            .insert(parent, None, attrs, &mut prompt)
            .unwrap()
            .id()
            .unwrap()
    }

    /// ```text
    /// A (open)
    ///   a1
    ///   B (closed)
    ///     b1
    ///     b2
    /// C (open)
    ///   c1
    /// ```
    struct Fixture {
        store: NodeStore,
        a: NodeId,
        a1: NodeId,
        b: NodeId,
        b1: NodeId,
        b2: NodeId,
        c: NodeId,
        c1: NodeId,
    }

    fn fixture() -> Fixture {
        let mut store = unique_store();
        let a = add(&mut store, None, folder("A"));
        let a1 = add(&mut store, Some(a), item("a1"));
        let b = add(&mut store, Some(a), folder("B").with_open(false));
        let b1 = add(&mut store, Some(b), item("b1"));
        let b2 = add(&mut store, Some(b), item("b2"));
        let c = add(&mut store, None, folder("C"));
        let c1 = add(&mut store, Some(c), item("c1"));
        Fixture {
            store,
            a,
            a1,
            b,
            b1,
            b2,
            c,
            c1,
        }
    }

    fn all_labels(store: &NodeStore) -> Vec<String> {
        store
            .preorder()
            .into_iter()
            .map(|id| store.label(id).unwrap().to_string())
            .collect()
    }

    // ========================================================================
    // Labels and bookkeeping
    // ========================================================================

    #[test]
    fn test_labels_follow_parent_path() {
        let f = fixture();
        assert_eq!(f.store.label(f.a), Some("0"));
        assert_eq!(f.store.label(f.a1), Some("0_0"));
        assert_eq!(f.store.label(f.b), Some("0_1"));
        assert_eq!(f.store.label(f.b2), Some("0_1_1"));
        assert_eq!(f.store.label(f.c1), Some("1_0"));
    }

    #[test]
    fn test_label_mirrored_into_label_column() {
        let f = fixture();
        assert_eq!(f.store.values(f.b1).unwrap()[0], "0_1_0");
    }

    #[test]
    fn test_insert_reuses_smallest_free_suffix() {
        let mut f = fixture();
        f.store.delete(&[f.a1]);
        let fresh = add(&mut f.store, Some(f.a), item("a2"));

        // "0_0" was freed by the delete; the new node is appended but takes it
        assert_eq!(f.store.label(fresh), Some("0_0"));
        assert_eq!(f.store.index_of(fresh), Some(1));
    }

    #[test]
    fn test_labels_unique_after_mixed_edits() {
        let mut f = fixture();
        let mut prompt = ScriptedPrompt::silent();
        f.store.move_node(f.b1, Some(f.c), Some(0), &mut prompt).unwrap();
        f.store.delete(&[f.a1]);
        add(&mut f.store, Some(f.a), item("z"));
        add(&mut f.store, Some(f.c), item("y"));

        let labels = all_labels(&f.store);
        let distinct: HashSet<&String> = labels.iter().collect();
        assert_eq!(distinct.len(), labels.len());
    }

    #[test]
    fn test_sizes_track_descendants() {
        let mut f = fixture();
        assert_eq!(f.store.subtree_size(f.a), Some(4));
        assert_eq!(f.store.subtree_size(f.b), Some(2));
        assert_eq!(f.store.len(), 7);

        f.store.delete(&[f.b]);
        assert_eq!(f.store.subtree_size(f.a), Some(1));
        assert_eq!(f.store.len(), 4);
        assert!(!f.store.contains(f.b1));
    }

    #[test]
    fn test_insert_at_index() {
        let mut f = fixture();
        let mut prompt = ScriptedPrompt::silent();
        let first = f
            .store
            .insert(Some(f.a), Some(0), item("first"), &mut prompt)
            .unwrap()
            .id()
            .unwrap();
        assert_eq!(f.store.children(Some(f.a)).unwrap()[0], first);
    }

    #[test]
    fn test_insert_under_unknown_parent_fails() {
        let mut store = unique_store();
        let mut prompt = ScriptedPrompt::silent();
        let result = store.insert(Some(NodeId::new()), None, item("x"), &mut prompt);
        assert!(matches!(result, Err(TreeError::InvalidParent { .. })));
    }

    // ========================================================================
    // Conflict negotiation
    // ========================================================================

    #[test]
    fn test_duplicate_insert_prompts_and_renames() {
        let mut store = unique_store();
        add(&mut store, None, folder("Folder A"));

        let mut prompt = ScriptedPrompt::new([PromptResponse::rename("Folder A (1)")]);
        let placement = store
            .insert(None, None, folder("Folder A"), &mut prompt)
            .unwrap();

        let id = placement.id().unwrap();
        assert_eq!(store.text(id), Some("Folder A (1)"));
        assert_eq!(prompt.requests().len(), 1);
        let names: Vec<&str> = store.roots().iter().map(|r| store.text(*r).unwrap()).collect();
        assert_eq!(names, vec!["Folder A", "Folder A (1)"]);
    }

    #[test]
    fn test_duplicate_insert_skip_and_cancel() {
        let mut store = unique_store();
        add(&mut store, None, item("x"));

        let mut prompt = ScriptedPrompt::new([PromptResponse::Skip]);
        assert_eq!(
            store.insert(None, None, item("x"), &mut prompt).unwrap(),
            Placement::Skipped
        );

        let mut prompt = ScriptedPrompt::new([PromptResponse::Cancel]);
        assert!(store
            .insert(None, None, item("x"), &mut prompt)
            .unwrap()
            .is_cancelled());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_duplicates_allowed_without_unique_column() {
        let mut store = NodeStore::new(&TreeConfig::default());
        add(&mut store, None, item("x"));
        add(&mut store, None, item("x"));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_same_name_allowed_under_different_parents() {
        let mut f = fixture();
        let mut prompt = ScriptedPrompt::silent();
        let placement = f
            .store
            .insert(Some(f.c), None, item("a1"), &mut prompt)
            .unwrap();
        assert!(placement.id().is_some());
        assert!(prompt.requests().is_empty());
    }

    #[test]
    fn test_rename_conflicts_with_sibling_only() {
        let mut f = fixture();

        // Renaming to its own name is not a conflict
        let mut prompt = ScriptedPrompt::silent();
        f.store.rename(f.a1, "a1", &mut prompt).unwrap();
        assert!(prompt.requests().is_empty());

        let mut prompt = ScriptedPrompt::new([PromptResponse::rename("a1 renamed")]);
        f.store.rename(f.a1, "B", &mut prompt).unwrap();
        assert_eq!(f.store.text(f.a1), Some("a1 renamed"));
    }

    // ========================================================================
    // Move
    // ========================================================================

    #[test]
    fn test_move_relabels_and_updates_sizes() {
        let mut f = fixture();
        let mut prompt = ScriptedPrompt::silent();
        f.store.move_node(f.b, Some(f.c), None, &mut prompt).unwrap();

        assert_eq!(f.store.parent(f.b), Some(f.c));
        assert_eq!(f.store.label(f.b), Some("1_1"));
        assert_eq!(f.store.label(f.b2), Some("1_1_1"));
        assert_eq!(f.store.subtree_size(f.a), Some(1));
        assert_eq!(f.store.subtree_size(f.c), Some(4));
    }

    #[test]
    fn test_move_under_own_descendant_is_rejected() {
        let mut f = fixture();
        let mut prompt = ScriptedPrompt::silent();
        let result = f.store.move_node(f.a, Some(f.b1), None, &mut prompt);
        assert!(matches!(result, Err(TreeError::CircularReference { .. })));

        let result = f.store.move_node(f.a, Some(f.a), None, &mut prompt);
        assert!(matches!(result, Err(TreeError::CircularReference { .. })));
    }

    #[test]
    fn test_move_index_is_after_removal() {
        let mut f = fixture();
        let mut prompt = ScriptedPrompt::silent();
        // [a1, B] -> move a1 to index 1 of the list without it -> [B, a1]
        f.store.move_node(f.a1, Some(f.a), Some(1), &mut prompt).unwrap();
        assert_eq!(f.store.children(Some(f.a)).unwrap(), &[f.b, f.a1]);
    }

    #[test]
    fn test_move_conflict_cancel_leaves_node_in_place() {
        let mut f = fixture();
        add(&mut f.store, Some(f.c), item("a1"));
        let mut prompt = ScriptedPrompt::new([PromptResponse::Cancel]);
        let placement = f.store.move_node(f.a1, Some(f.c), None, &mut prompt).unwrap();

        assert!(placement.is_cancelled());
        assert_eq!(f.store.parent(f.a1), Some(f.a));
    }

    // ========================================================================
    // Reindex
    // ========================================================================

    #[test]
    fn test_reindex_compacts_labels() {
        let mut f = fixture();
        f.store.delete(&[f.a1]);
        assert_eq!(f.store.label(f.b), Some("0_1"));

        let changed = f.store.reindex(Some(f.a)).unwrap();
        assert_eq!(f.store.label(f.b), Some("0_0"));
        assert_eq!(f.store.label(f.b1), Some("0_0_0"));
        assert!(changed.contains(&("0_1".to_string(), "0_0".to_string())));
        assert_eq!(f.store.find_by_label("0_0_1"), Some(f.b2));
    }

    #[test]
    fn test_reindex_preserves_attributes_and_order() {
        let mut f = fixture();
        let before: Vec<(String, bool)> = f
            .store
            .preorder()
            .into_iter()
            .map(|id| (f.store.text(id).unwrap().to_string(), f.store.is_open(id)))
            .collect();

        f.store.reindex(None).unwrap();

        let after: Vec<(String, bool)> = f
            .store
            .preorder()
            .into_iter()
            .map(|id| (f.store.text(id).unwrap().to_string(), f.store.is_open(id)))
            .collect();
        assert_eq!(before, after);
        assert!(f.store.reindex(None).unwrap().is_empty());
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    #[test]
    fn test_display_order_skips_collapsed_children() {
        let f = fixture();
        assert_eq!(
            f.store.display_order(),
            vec![f.a, f.a1, f.b, f.c, f.c1]
        );
        assert_eq!(f.store.preorder().len(), 7);
        assert!(!f.store.is_shown(f.b1));
    }

    #[test]
    fn test_next_and_prev_follow_display_order() {
        let f = fixture();
        let order = f.store.display_order();
        for pair in order.windows(2) {
            assert_eq!(f.store.next(pair[0]), Some(pair[1]));
            assert_eq!(f.store.prev(pair[1]), Some(pair[0]));
        }
        assert_eq!(f.store.next(f.c1), None);
        assert_eq!(f.store.prev(f.a), None);
    }

    #[test]
    fn test_prev_descends_into_open_previous_sibling() {
        let mut f = fixture();
        f.store.set_open(f.b, true).unwrap();
        assert_eq!(f.store.prev(f.c), Some(f.b2));
        assert_eq!(f.store.next(f.b2), Some(f.c));
    }

    #[test]
    fn test_top_level_of_drops_selected_descendants() {
        let f = fixture();
        let picked: HashSet<NodeId> = [f.b2, f.a, f.c1].into_iter().collect();
        assert_eq!(f.store.top_level_of(&picked), vec![f.a, f.c1]);
    }

    // ========================================================================
    // Delete / detach / restore
    // ========================================================================

    #[test]
    fn test_delete_dedupes_and_ignores_unknown() {
        let mut f = fixture();
        let removed = f.store.delete(&[f.b1, f.b, NodeId::new()]);
        assert_eq!(removed, 3);
        assert_eq!(f.store.children(Some(f.a)).unwrap(), &[f.a1]);
    }

    #[test]
    fn test_detach_and_restore_round_trip() {
        let mut f = fixture();
        let (parent, index) = f.store.detach(f.b).unwrap();
        assert_eq!((parent, index), (Some(f.a), 1));
        assert!(!f.store.is_attached(f.b1));
        assert!(f.store.contains(f.b1));
        assert_eq!(f.store.subtree_size(f.a), Some(1));

        f.store.restore(f.b, parent, index).unwrap();
        assert_eq!(f.store.parent(f.b), Some(f.a));
        assert_eq!(f.store.index_of(f.b), Some(1));
        assert_eq!(f.store.label(f.b), Some("0_1"));
        assert_eq!(f.store.subtree_size(f.a), Some(4));
        assert!(f.store.detached_roots().is_empty());
    }

    #[test]
    fn test_restore_relabels_on_collision() {
        let mut f = fixture();
        f.store.detach(f.a1).unwrap();
        let squatter = add(&mut f.store, Some(f.a), item("new"));
        assert_eq!(f.store.label(squatter), Some("0_0"));

        f.store.restore(f.a1, Some(f.a), 0).unwrap();
        assert_ne!(f.store.label(f.a1), Some("0_0"));
        let labels = all_labels(&f.store);
        let distinct: HashSet<&String> = labels.iter().collect();
        assert_eq!(distinct.len(), labels.len());
    }

    #[test]
    fn test_reattach_negotiates_names() {
        let mut f = fixture();
        f.store.detach(f.a1).unwrap();
        add(&mut f.store, Some(f.c), item("a1"));

        let mut prompt = ScriptedPrompt::new([PromptResponse::Skip]);
        let placement = f.store.reattach(f.a1, Some(f.c), None, &mut prompt).unwrap();
        assert_eq!(placement, Placement::Skipped);
        assert!(f.store.is_detached_root(f.a1));

        let mut prompt = ScriptedPrompt::new([PromptResponse::rename("a1 moved")]);
        f.store.reattach(f.a1, Some(f.c), None, &mut prompt).unwrap();
        assert_eq!(f.store.parent(f.a1), Some(f.c));
        assert_eq!(f.store.text(f.a1), Some("a1 moved"));
    }

    #[test]
    fn test_purge_requires_detached_root() {
        let mut f = fixture();
        assert!(f.store.purge(f.b).is_err());

        f.store.detach(f.b).unwrap();
        let removed = f.store.purge(f.b).unwrap();
        assert_eq!(removed.len(), 3);
        assert_eq!(f.store.arena_len(), 4);
    }

    // ========================================================================
    // Copies and documents
    // ========================================================================

    #[test]
    fn test_deep_copy_nests_under_nearest_marked_ancestor() {
        let f = fixture();
        // A and b2 marked, B is not: b2 hangs directly under A's copy
        let marked: HashSet<NodeId> = [f.a, f.b2, f.c1].into_iter().collect();
        let templates = f.store.deep_copy(&marked, Some("01/01/2025 00:00:00"));

        assert_eq!(templates.len(), 2);
        assert_eq!(templates[0].attrs.text, "A");
        assert_eq!(templates[0].children.len(), 1);
        assert_eq!(templates[0].children[0].attrs.text, "b2");
        assert_eq!(templates[0].children[0].attrs.values[1], "01/01/2025 00:00:00");
        assert_eq!(templates[1].attrs.text, "c1");
    }

    #[test]
    fn test_insert_subtree_uses_fresh_ids() {
        let mut f = fixture();
        let marked: HashSet<NodeId> = [f.b, f.b1, f.b2].into_iter().collect();
        let template = f.store.deep_copy(&marked, None).remove(0);
        assert_eq!(template.node_count(), 3);

        let mut prompt = ScriptedPrompt::silent();
        let copy = f
            .store
            .insert_subtree(Some(f.c), None, &template, &mut prompt)
            .unwrap()
            .id()
            .unwrap();

        let copies = f.store.descendants(copy);
        assert_eq!(copies.len(), 2);
        assert!(!copies.contains(&f.b1) && !copies.contains(&f.b2));
        assert_ne!(copy, f.b);
        assert_eq!(f.store.subtree_size(f.c), Some(4));
    }

    #[test]
    fn test_insert_subtree_checks_only_its_root() {
        let mut store = unique_store();
        let template = NodeTemplate::new(folder("dup"))
            .with_children(vec![NodeTemplate::new(item("x")), NodeTemplate::new(item("x"))]);
        let mut prompt = ScriptedPrompt::silent();
        store.insert_subtree(None, None, &template, &mut prompt).unwrap();
        assert_eq!(store.len(), 3);
        assert!(prompt.requests().is_empty());
    }

    #[test]
    fn test_document_round_trip() {
        let document = TreeDocument::sample("01/02/2024 10:00:00");
        let store = NodeStore::from_document(&document, &TreeConfig::default());

        assert!(store.unique_text());
        assert_eq!(store.len(), document.node_count());

        let restored = NodeStore::from_document(&store.to_document(), &TreeConfig::default());
        let exported = restored.to_document();
        assert_eq!(exported.data.len(), document.data.len());
        for (left, right) in exported.data.iter().zip(store.to_document().data.iter()) {
            assert_eq!(left, right);
        }
        assert_eq!(exported.headings, document.headings);
    }

    #[test]
    fn test_leaves_export_without_children_key() {
        let f = fixture();
        let document = f.store.to_document();
        let json = serde_json::to_value(&document).unwrap();
        let a1 = &json["data"][0]["children"][0];
        assert!(a1.get("children").is_none());
        assert_eq!(a1["text"], "a1");
    }

    #[test]
    fn test_detached_nodes_are_not_exported() {
        let mut f = fixture();
        f.store.detach(f.c).unwrap();
        assert_eq!(f.store.to_document().data.len(), 1);
    }

    #[test]
    fn test_container_kind() {
        let f = fixture();
        assert!(f.store.is_container(None));
        assert!(f.store.is_container(Some(f.a)));
        assert!(!f.store.is_container(Some(f.a1)));
        assert_eq!(f.store.kind(f.a1), Some("Item"));
    }

    #[test]
    fn test_dump_indents_by_depth() {
        let f = fixture();
        let dump = f.store.dump();
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines[0], ". A [0]");
        assert_eq!(lines[3], "... b1 [0_1_0]");
        assert_eq!(lines.len(), 7);
    }

    #[test]
    fn test_graft_under_unknown_parent_leaves_arena_untouched() {
        let mut f = fixture();
        let before = f.store.arena_len();
        let mut template = NodeTemplate::new(folder("Orphan"));
        template.children.push(NodeTemplate::new(item("child")));

        let err = f.store.graft(Some(NodeId::new()), None, &template).unwrap_err();
        assert!(matches!(err, TreeError::InvalidParent { .. }));
        assert_eq!(f.store.arena_len(), before);

        let id = f.store.graft(Some(f.c), None, &template).unwrap();
        assert_eq!(f.store.parent(id), Some(f.c));
        assert_eq!(f.store.subtree_size(id), Some(1));
        assert_eq!(f.store.arena_len(), before + 2);
    }
}
