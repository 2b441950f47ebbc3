//! Integration tests for asset requests and the registry sets.

use proxyforge_core::{AssetKind, AssetState, KindFilter};
use proxyforge_project::ProjectEvent;

use crate::support::{project_with, Events, ManualLoader, ScriptedEngine, TIMEOUT};

const A: &str = "file:///media/a.mp4";
const B: &str = "file:///media/b.mp4";

// ── Requests ───────────────────────────────────────────────────

#[test]
fn create_twice_issues_one_request() {
    let loader = ManualLoader::new();
    loader.hold(true);
    let mut project = project_with(&loader, &ScriptedEngine::new(), None);

    assert!(project.create_asset(A, AssetKind::UriClip));
    assert!(!project.create_asset(A, AssetKind::UriClip));
    assert_eq!(loader.requests_for(A), 1);

    loader.declare(A);
    assert!(loader.release(A));
    assert!(project.wait_idle(TIMEOUT));
    assert!(!project.create_asset(A, AssetKind::UriClip));
    assert_eq!(loader.requests_for(A), 1);
}

#[test]
fn loaded_asset_is_added_and_announced() {
    let loader = ManualLoader::new();
    loader.declare(A);
    let mut project = project_with(&loader, &ScriptedEngine::new(), None);
    let events = Events::attach(&project);

    project.create_asset(A, AssetKind::UriClip);
    assert_eq!(project.asset_state(A), Some(AssetState::Loading));
    assert!(project.get_asset(A, KindFilter::Any).is_none());

    assert!(project.wait_idle(TIMEOUT));
    assert_eq!(project.asset_state(A), Some(AssetState::Loaded));
    let asset = project.get_asset(A, KindFilter::Any).expect("asset loaded");
    assert_eq!(asset.kind(), AssetKind::UriClip);
    assert!(project.loading_assets().is_empty());
    assert_eq!(
        events.snapshot(),
        vec![ProjectEvent::AssetAdded(asset)]
    );
}

#[test]
fn completions_in_any_order_settle() {
    let loader = ManualLoader::new();
    loader.hold(true);
    loader.declare(A);
    loader.declare(B);
    let mut project = project_with(&loader, &ScriptedEngine::new(), None);

    project.create_asset(A, AssetKind::UriClip);
    project.create_asset(B, AssetKind::UriClip);
    assert_eq!(project.loading_assets().len(), 2);

    assert!(loader.release(B));
    project.dispatch_pending();
    assert_eq!(project.asset_state(B), Some(AssetState::Loaded));
    assert_eq!(project.asset_state(A), Some(AssetState::Loading));
    assert!(!project.is_idle());

    assert!(loader.release(A));
    assert!(project.wait_idle(TIMEOUT));
    let ids: Vec<String> = project
        .list_assets(KindFilter::Any)
        .iter()
        .map(|a| a.id().to_string())
        .collect();
    assert_eq!(ids, vec![B.to_string(), A.to_string()]);
}

#[test]
fn kind_filter_narrows_lookups() {
    let loader = ManualLoader::new();
    loader.declare(A);
    loader.declare("Opening");
    let mut project = project_with(&loader, &ScriptedEngine::new(), None);

    project.create_asset(A, AssetKind::UriClip);
    project.create_asset("Opening", AssetKind::TitleClip);
    assert!(project.wait_idle(TIMEOUT));

    assert_eq!(project.list_assets(KindFilter::Any).len(), 2);
    assert_eq!(project.list_assets(KindFilter::FileBacked).len(), 1);
    assert!(project.get_asset("Opening", KindFilter::FileBacked).is_none());
    assert!(project.get_asset("Opening", AssetKind::TitleClip).is_some());
}

// ── Removal ────────────────────────────────────────────────────

#[test]
fn remove_announces_once() {
    let loader = ManualLoader::new();
    loader.declare(A);
    let mut project = project_with(&loader, &ScriptedEngine::new(), None);
    project.create_asset(A, AssetKind::UriClip);
    assert!(project.wait_idle(TIMEOUT));
    let events = Events::attach(&project);

    assert!(project.remove_asset(A));
    assert!(!project.remove_asset(A));
    assert_eq!(project.asset_state(A), None);
    assert_eq!(
        events.count(|e| matches!(e, ProjectEvent::AssetRemoved(a) if a.id() == A)),
        1
    );
}

#[test]
fn removed_asset_can_be_requested_again() {
    let loader = ManualLoader::new();
    loader.declare(A);
    let mut project = project_with(&loader, &ScriptedEngine::new(), None);
    project.create_asset(A, AssetKind::UriClip);
    assert!(project.wait_idle(TIMEOUT));

    project.remove_asset(A);
    assert!(project.create_asset(A, AssetKind::UriClip));
    assert!(project.wait_idle(TIMEOUT));
    assert_eq!(loader.requests_for(A), 2);
    assert_eq!(project.asset_state(A), Some(AssetState::Loaded));
}
