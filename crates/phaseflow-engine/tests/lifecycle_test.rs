//! Node lifecycle through a running graph: skip, first run, hygiene.

mod common;

use common::{Fixture, PRIVACY_FLAG, advance_to_scan, check_gate, run, signal};
use phaseflow_core::bus::{BACK, CONTINUE};
use phaseflow_core::collaborator::Control;
use phaseflow_core::flag::FlagKey;
use phaseflow_core::id::NodeId;
use phaseflow_engine::{ActivationState, FlowStatus};
use phaseflow_test_support::{Call, RecordingFlagStore, hidden, shown};

fn id(s: &str) -> NodeId {
    NodeId::new(s)
}

fn continue_enabled(enabled: bool) -> Call {
    Call::SetControlEnabled {
        view: "legal_panel".to_owned(),
        control: Control::Continue,
        enabled,
    }
}

#[test]
fn test_first_run_gates_continue_and_persists_flag_once() {
    // Arrange
    let fx = Fixture::new();
    let mut graph = fx.onboarding();

    // Act / Assert: legal is presented with continue disabled
    graph.tick(common::FRAME);
    assert_eq!(graph.node_state(&id("legal")), Some(ActivationState::Running));
    assert_eq!(graph.is_skipped(&id("legal")), Some(false));
    assert!(fx.stubs.log.contains(&shown("legal_panel")));
    assert!(fx.stubs.log.contains(&continue_enabled(false)));

    // continue before the checkbox does nothing
    signal(&graph, CONTINUE);
    run(&mut graph, 3);
    assert_eq!(graph.active_node(), Some(&id("legal")));
    assert!(fx.store.writes().is_empty());

    // checking the box enables continue
    check_gate(&graph, true);
    graph.tick(common::FRAME);
    assert!(fx.stubs.log.contains(&continue_enabled(true)));

    // continue now exits: fade out, persist, hand off
    signal(&graph, CONTINUE);
    let status = graph.tick(common::FRAME);

    assert_eq!(status, FlowStatus::Running { node: id("safety") });
    assert_eq!(graph.node_state(&id("legal")), Some(ActivationState::Inactive));
    assert_eq!(fx.store.value(PRIVACY_FLAG), 1);
    assert_eq!(fx.store.writes(), vec![(FlagKey::new(PRIVACY_FLAG), 1)]);
    assert_eq!(fx.journaled("flow.flag_persisted"), 1);
    let log = fx.stubs.log.clone();
    assert!(log.position(&hidden("legal_panel")) < log.position(&shown("safety_panel")));
}

#[test]
fn test_rerun_with_seeded_flag_skips_legal_entirely() {
    // Arrange
    let fx = Fixture::with_store(RecordingFlagStore::seeded(&[(PRIVACY_FLAG, 1)]));
    let mut graph = fx.onboarding();

    // Act
    let status = graph.tick(common::FRAME);

    // Assert
    assert_eq!(status, FlowStatus::Running { node: id("safety") });
    assert_eq!(graph.is_skipped(&id("legal")), Some(true));
    assert!(!fx.stubs.log.contains(&shown("legal_panel")));
    assert_eq!(
        fx.stubs.log.count(|c| matches!(c, Call::SetControlEnabled { .. })),
        0
    );
    assert!(fx.store.writes().is_empty());
    assert_eq!(fx.journaled("flow.flag_persisted"), 0);
}

#[test]
fn test_uncheck_after_check_disables_continue_again() {
    // Arrange
    let fx = Fixture::new();
    let mut graph = fx.onboarding();
    graph.tick(common::FRAME);

    // Act
    check_gate(&graph, true);
    graph.tick(common::FRAME);
    check_gate(&graph, false);
    graph.tick(common::FRAME);
    signal(&graph, CONTINUE);
    graph.tick(common::FRAME);

    // Assert
    assert_eq!(graph.active_node(), Some(&id("legal")));
    let enabled_calls: Vec<Call> = fx
        .stubs
        .log
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::SetControlEnabled { .. }))
        .collect();
    assert_eq!(
        enabled_calls,
        vec![
            continue_enabled(false),
            continue_enabled(true),
            continue_enabled(false)
        ]
    );
}

#[test]
fn test_back_exits_without_persisting() {
    // Arrange
    let fx = Fixture::new();
    let mut graph = fx.onboarding();
    graph.tick(common::FRAME);

    // Act
    signal(&graph, BACK);
    let status = graph.tick(common::FRAME);

    // Assert
    assert_eq!(status, FlowStatus::Finished { node: id("done") });
    assert!(fx.store.writes().is_empty());
    assert_eq!(fx.journaled("flow.experience_finished"), 1);
}

#[test]
fn test_only_the_active_node_holds_subscriptions() {
    // Arrange
    let fx = Fixture::new();
    let mut graph = fx.onboarding();

    // Act
    advance_to_scan(&mut graph);
    signal(&graph, common::LOCALIZED);
    graph.tick(common::FRAME);

    // Assert
    assert_eq!(graph.active_node(), Some(&id("found")));
    for node in ["legal", "safety", "scan"] {
        assert_eq!(graph.node(&id(node)).map(|n| n.subscription_count()), Some(0));
    }
    let found = graph.node(&id("found")).map(|n| n.subscription_count());
    assert_eq!(found, Some(graph.subscription_count()));
}

#[test]
fn test_reentered_node_receives_each_signal_once() {
    // Arrange
    let fx = Fixture::new();
    fx.stubs.probes.set("near_anchor", true);
    let mut graph = fx.onboarding();
    advance_to_scan(&mut graph);

    // Act: scan → recover → scan, twice
    for _ in 0..2 {
        signal(&graph, common::LOST);
        graph.tick(common::FRAME);
        assert_eq!(graph.active_node(), Some(&id("recover")));
        signal(&graph, CONTINUE);
        graph.tick(common::FRAME);
        assert_eq!(graph.active_node(), Some(&id("scan")));
    }
    let subscriptions = graph.subscription_count();
    signal(&graph, common::LOCALIZED);
    graph.tick(common::FRAME);

    // Assert
    assert_eq!(subscriptions, 4);
    assert_eq!(graph.active_node(), Some(&id("found")));
    assert_eq!(fx.journaled("flow.signal_ignored"), 0);
}

#[test]
fn test_exactly_one_node_active_every_frame() {
    // Arrange
    let fx = Fixture::new();
    fx.stubs.fader.set_mode(phaseflow_test_support::CompletionMode::Manual);
    let mut graph = fx.onboarding();

    // Act / Assert
    for frame in 0..40 {
        if frame == 5 {
            check_gate(&graph, true);
            signal(&graph, CONTINUE);
        }
        if frame == 20 {
            signal(&graph, CONTINUE);
        }
        graph.tick(common::FRAME);
        assert_eq!(graph.active_count(), 1, "frame {frame}");
        if frame % 3 == 0 {
            fx.stubs.fader.finish_all();
        }
    }
    assert_eq!(graph.active_node(), Some(&id("scan")));
}

#[test]
fn test_shutdown_releases_everything() {
    // Arrange
    let fx = Fixture::new();
    let mut graph = fx.onboarding();
    graph.tick(common::FRAME);

    // Act
    graph.shutdown();
    graph.shutdown();

    // Assert
    assert_eq!(graph.subscription_count(), 0);
    assert_eq!(graph.active_count(), 0);
    assert_eq!(graph.tick(common::FRAME), FlowStatus::Idle);
    assert!(fx.stubs.log.contains(&hidden("legal_panel")));
    assert!(!fx.stubs.log.contains(&Call::SessionStop));
}

#[test]
fn test_shutdown_in_immersive_node_stops_session() {
    // Arrange
    let fx = Fixture::new();
    let mut graph = fx.onboarding();
    advance_to_scan(&mut graph);
    graph.tick(common::FRAME);
    assert_eq!(graph.active_node(), Some(&id("scan")));

    // Act
    graph.shutdown();
    graph.shutdown();

    // Assert
    let log = &fx.stubs.log;
    let hide = log.position(&hidden("scan_prompt"));
    let camera_off = log.position(&Call::CameraActive(false));
    let stop = log.position(&Call::SessionStop);
    assert!(hide.is_some());
    assert!(hide < camera_off);
    assert!(camera_off < stop);
    assert_eq!(log.count(|c| *c == Call::SessionStop), 1);
}

#[test]
fn test_start_after_shutdown_stays_idle() {
    let fx = Fixture::new();
    let mut graph = fx.onboarding();
    graph.tick(common::FRAME);
    graph.shutdown();

    graph.start();

    assert_eq!(graph.active_count(), 0);
    assert_eq!(graph.tick(common::FRAME), FlowStatus::Idle);
}
