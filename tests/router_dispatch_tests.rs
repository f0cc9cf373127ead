//! Message dispatch: window scoping, parsing tolerance, registry effects and
//! response shapes.

mod common;

use arbor_sidebar::{BlockReason, Message, Response, TabId, WindowId};
use common::{harness, harness_with, window_tabs, MockBackground, MockConfirmer, MockTabs};
use serde_json::json;
use std::sync::atomic::Ordering;

async fn seeded(window: i64, count: i64) -> common::TestHarness {
    let h = harness(window, window_tabs(window, count));
    h.session.init().await.expect("init should succeed");
    h
}

#[tokio::test]
async fn test_unknown_message_type_is_ignored() {
    let h = seeded(1, 2).await;
    let response = h
        .session
        .handle_raw_message(&json!({ "type": "somebody-elses-command", "tab": 0 }))
        .await;
    assert!(response.is_none());
    assert_eq!(h.session.registry().len(), 2, "registry untouched");
}

#[tokio::test]
async fn test_messages_for_other_windows_are_dropped() {
    let h = seeded(1, 3).await;
    let response = h
        .session
        .handle_message(Message::AttachTabTo {
            window_id: WindowId(2),
            child: TabId(1),
            parent: TabId(0),
            insert_before: None,
            insert_after: None,
        })
        .await;
    assert!(response.is_none());
    assert!(
        h.session.registry().get(TabId(1)).unwrap().is_root(),
        "foreign-window attach must not touch the tree"
    );
    assert!(h.session.pending_changes().is_empty());
}

#[tokio::test]
async fn test_ping_acks_only_own_window() {
    let h = seeded(1, 1).await;
    let own = h
        .session
        .handle_message(Message::PingToSidebar {
            window_id: WindowId(1),
        })
        .await;
    assert_eq!(own, Some(Response::Bool(true)));

    let other = h
        .session
        .handle_message(Message::PingToSidebar {
            window_id: WindowId(9),
        })
        .await;
    assert!(other.is_none());
}

#[tokio::test]
async fn test_attach_and_detach_update_tree() {
    let h = seeded(1, 3).await;
    h.session
        .handle_message(Message::AttachTabTo {
            window_id: WindowId(1),
            child: TabId(1),
            parent: TabId(0),
            insert_before: None,
            insert_after: None,
        })
        .await;
    assert_eq!(
        h.session.registry().get(TabId(1)).unwrap().parent,
        Some(TabId(0))
    );

    h.session
        .handle_message(Message::DetachTab {
            window_id: WindowId(1),
            tab: TabId(1),
        })
        .await;
    assert!(h.session.registry().get(TabId(1)).unwrap().is_root());
}

#[tokio::test]
async fn test_move_response_lists_moved_tabs_in_call_order() {
    let h = seeded(1, 4).await;
    let response = h
        .session
        .handle_message(Message::MoveTabsBefore {
            window_id: WindowId(1),
            tabs: vec![TabId(3), TabId(1), TabId(99)],
            next_tab: Some(TabId(0)),
        })
        .await;
    assert_eq!(response, Some(Response::Tabs(vec![TabId(3), TabId(1)])));
    assert_eq!(
        h.session.registry().ids(),
        vec![TabId(3), TabId(1), TabId(0), TabId(2)]
    );
}

#[tokio::test]
async fn test_remove_tabs_internally_orphans_children() {
    let h = seeded(1, 3).await;
    h.session
        .handle_message(Message::AttachTabTo {
            window_id: WindowId(1),
            child: TabId(1),
            parent: TabId(0),
            insert_before: None,
            insert_after: None,
        })
        .await;

    h.session
        .handle_message(Message::RemoveTabsInternally {
            window_id: WindowId(1),
            tabs: vec![TabId(0)],
        })
        .await;

    let registry = h.session.registry();
    assert!(!registry.contains(TabId(0)));
    assert!(registry.is_removed(TabId(0)));
    assert!(
        registry.get(TabId(1)).unwrap().is_root(),
        "children of a removed tab become roots"
    );
}

#[tokio::test]
async fn test_broadcast_tab_state_applies_globally() {
    let h = seeded(1, 2).await;
    h.session
        .handle_message(Message::BroadcastTabState {
            tabs: vec![TabId(0), TabId(1)],
            add: vec!["loading".to_string()],
            remove: vec![],
        })
        .await;
    assert!(h
        .session
        .registry()
        .get(TabId(1))
        .unwrap()
        .states
        .contains("loading"));

    h.session
        .handle_message(Message::BroadcastTabState {
            tabs: vec![TabId(1)],
            add: vec![],
            remove: vec!["loading".to_string()],
        })
        .await;
    assert!(!h
        .session
        .registry()
        .get(TabId(1))
        .unwrap()
        .states
        .contains("loading"));
}

#[tokio::test]
async fn test_favicon_update_is_applied() {
    let h = seeded(1, 1).await;
    h.session
        .handle_message(Message::NotifyTabFaviconUpdated {
            tab: TabId(0),
            fav_icon_url: Some("https://example.com/favicon.ico".to_string()),
        })
        .await;
    assert_eq!(
        h.session.registry().get(TabId(0)).unwrap().fav_icon_url,
        Some("https://example.com/favicon.ico".to_string())
    );
}

#[tokio::test]
async fn test_remote_block_messages_gate_user_operations() {
    let h = seeded(1, 1).await;
    assert!(!h.session.blocker().is_blocked());

    h.session
        .handle_message(Message::BlockUserOperations {
            window_id: WindowId(1),
        })
        .await;
    assert!(h.session.blocker().is_blocked());
    assert_eq!(
        h.session.blocker().active_reasons(),
        vec![BlockReason::RemoteOperation]
    );

    h.session
        .handle_message(Message::UnblockUserOperations {
            window_id: WindowId(1),
        })
        .await;
    assert!(!h.session.blocker().is_blocked());
}

#[tokio::test]
async fn test_restoring_notifications_drive_counter() {
    let h = seeded(1, 1).await;
    h.session.handle_message(Message::NotifyTabRestoring).await;
    h.session.handle_message(Message::NotifyTabRestoring).await;
    assert_eq!(h.session.restoring().count(), 2);

    h.session.handle_message(Message::NotifyTabRestored).await;
    h.session.handle_message(Message::NotifyTabRestored).await;
    assert!(!h.session.restoring().has_restoring_tabs());
}

#[tokio::test]
async fn test_close_confirmation_records_timestamp_on_yes() {
    let h = seeded(1, 3).await;
    assert!(h.config.get().last_confirmed_to_close_tabs.is_none());

    let confirmed = h.session.confirm_to_close_tabs(3).await;
    assert!(confirmed);
    assert_eq!(h.confirmer.asked.load(Ordering::SeqCst), 1);
    assert!(h.config.get().last_confirmed_to_close_tabs.is_some());
}

#[tokio::test]
async fn test_close_confirmation_refusal_leaves_config_alone() {
    let h = harness_with(
        1,
        MockBackground::ready(),
        MockTabs::with_tabs(window_tabs(1, 3)),
        MockConfirmer::answering(false),
    );
    h.session.init().await.unwrap();

    let confirmed = h.session.confirm_to_close_tabs(3).await;
    assert!(!confirmed);
    assert!(h.config.get().last_confirmed_to_close_tabs.is_none());
}

#[tokio::test]
async fn test_single_tab_close_skips_confirmation() {
    let h = seeded(1, 3).await;
    assert!(h.session.confirm_to_close_tabs(1).await);
    assert_eq!(h.confirmer.asked.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_disabled_warning_skips_confirmation() {
    let h = seeded(1, 3).await;
    h.config.update(|config| config.warn_on_close_tabs = false);
    assert!(h.session.confirm_to_close_tabs(3).await);
    assert_eq!(h.confirmer.asked.load(Ordering::SeqCst), 0);
}
