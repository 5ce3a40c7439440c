// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Naiad-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Naiad and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

use super::{History, RedoUndoAction};

fn rename_action(n: usize) -> RedoUndoAction {
    RedoUndoAction::UpdateDiagramName {
        redo: format!("name-{n}"),
        undo: format!("name-{}", n.saturating_sub(1)),
    }
}

#[test]
fn record_clears_redo_stack() {
    let mut history = History::new();
    history.record(rename_action(1));
    history.record(rename_action(2));

    let undone = history.pop_undo().expect("entry");
    history.push_redo(undone);
    assert!(history.can_redo());

    history.record(rename_action(3));
    assert!(!history.can_redo());
    assert_eq!(history.undo_depth(), 2);
}

#[test]
fn replay_pushes_do_not_clear_redo() {
    let mut history = History::new();
    history.record(rename_action(1));
    history.record(rename_action(2));

    let undone = history.pop_undo().expect("entry");
    history.push_redo(undone);

    let redone = history.pop_redo().expect("entry");
    history.push_undo(redone);
    assert_eq!(history.undo_depth(), 2);
    assert_eq!(history.redo_depth(), 0);

    // Undo both, redo one: the remaining redo entry must survive.
    let a = history.pop_undo().expect("entry");
    history.push_redo(a);
    let b = history.pop_undo().expect("entry");
    history.push_redo(b);
    let redone = history.pop_redo().expect("entry");
    history.push_undo(redone);
    assert_eq!(history.redo_depth(), 1);
}

#[test]
fn capped_history_drops_oldest_entry() {
    let mut history = History::with_capacity(3);
    for n in 1..=5 {
        history.record(rename_action(n));
    }
    assert_eq!(history.undo_depth(), 3);

    // The newest entries survive: 5, 4, 3.
    let top = history.pop_undo().expect("entry");
    match top {
        RedoUndoAction::UpdateDiagramName { redo, .. } => assert_eq!(redo, "name-5"),
        other => panic!("unexpected action: {}", other.kind()),
    }
    history.pop_undo().expect("entry");
    let oldest = history.pop_undo().expect("entry");
    match oldest {
        RedoUndoAction::UpdateDiagramName { redo, .. } => assert_eq!(redo, "name-3"),
        other => panic!("unexpected action: {}", other.kind()),
    }
    assert!(!history.can_undo());
}

#[test]
fn clear_empties_both_stacks() {
    let mut history = History::new();
    history.record(rename_action(1));
    let undone = history.pop_undo().expect("entry");
    history.push_redo(undone);
    history.record(rename_action(2));

    history.clear();
    assert!(!history.can_undo());
    assert!(!history.can_redo());
}

#[test]
fn pop_on_empty_stacks_is_none() {
    let mut history = History::new();
    assert_eq!(history.pop_undo(), None);
    assert_eq!(history.pop_redo(), None);
}
