//! Integration tests for proxy generation and timeline substitution.

use proxyforge_core::{uri, AssetKind, AssetState, KindFilter};
use proxyforge_media::EncodingProfile;
use proxyforge_project::{Project, ProjectError, ProjectEvent, ProxyState, StartOutcome};
use proxyforge_timeline::{shared, Clip, JsonFormatter, SharedTimeline, Timeline};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::support::{
    import, media_files, project_with, pump_until, Events, ManualLoader, ScriptedEngine, TIMEOUT,
};

// ── Helpers ────────────────────────────────────────────────────

fn proxy_of(id: &str) -> String {
    format!("{id}.proxy")
}

fn timeline_of(ids: &[String]) -> SharedTimeline {
    let mut tl = Timeline::new("Edit");
    for (i, id) in ids.iter().enumerate() {
        tl.add_clip(
            0,
            Clip::new(uri::basename(id), id.as_str(), AssetKind::UriClip, Duration::from_secs(2))
                .at(Duration::from_secs(2 * i as u64)),
        );
    }
    shared(tl)
}

fn bound_ids(timeline: &SharedTimeline) -> Vec<String> {
    timeline.read().clips().map(|c| c.asset_id().to_string()).collect()
}

fn part_files(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .expect("failed to list dir")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".part"))
        .collect()
}

fn started(events: &Events) -> usize {
    events.count(|e| matches!(e, ProjectEvent::ProxiesCreationStarted))
}

fn created(events: &Events) -> usize {
    events.count(|e| matches!(e, ProjectEvent::ProxiesCreated))
}

type Fixture = (tempfile::TempDir, Vec<String>, Arc<ManualLoader>, Arc<ScriptedEngine>, Project);

/// Import `names` from a fresh directory into a project with a proxy profile.
fn setup(names: &[&str]) -> Fixture {
    let tmp = tempfile::tempdir().expect("failed to create tempdir");
    let ids = media_files(tmp.path(), names);
    let loader = ManualLoader::new();
    let engine = ScriptedEngine::new();
    let mut project = project_with(&loader, &engine, Some(EncodingProfile::h264_proxy()));
    import(&mut project, &ids);
    (tmp, ids, loader, engine, project)
}

// ── Bulk creation ──────────────────────────────────────────────

#[test]
fn every_asset_gets_one_proxy_in_order() {
    let (tmp, ids, loader, engine, mut project) = setup(&["a.mp4", "b.mp4", "c.mp4"]);
    let bound = timeline_of(&ids[..2]);
    let unbound = timeline_of(&ids[..1]);
    assert!(project.use_proxies_for_timeline(&bound, true));
    let generation = bound.read().generation();
    let events = Events::attach(&project);

    assert_eq!(project.start_proxy_creation(), StartOutcome::Started);
    assert!(project.wait_idle(TIMEOUT));

    assert_eq!(project.proxy_state(), ProxyState::Created);
    assert_eq!(engine.launched_sources(), ids);
    assert_eq!(started(&events), 1);
    assert_eq!(created(&events), 1);
    assert!(events.position(|e| matches!(e, ProjectEvent::ProxiesCreationStarted))
        < events.position(|e| matches!(e, ProjectEvent::ProxiesCreated)));

    for id in &ids {
        let proxy = project.proxy_for(id).expect("proxy registered");
        assert_eq!(proxy.id(), proxy_of(id));
        assert_eq!(proxy.parent(), Some(id.as_str()));
        assert_eq!(project.asset_state(proxy.id()), Some(AssetState::Proxy));
        assert!(loader.reloads().contains(&proxy_of(id)));
    }
    assert_eq!(project.list_proxies(KindFilter::Any).len(), 3);
    assert!(project.proxy_errors().is_empty());
    assert!(part_files(tmp.path()).is_empty());

    assert_eq!(bound_ids(&bound), vec![proxy_of(&ids[0]), proxy_of(&ids[1])]);
    assert!(bound.read().generation() > generation);
    assert_eq!(bound_ids(&unbound), vec![ids[0].clone()]);
}

#[test]
fn start_while_stepping_is_refused() {
    let (_tmp, ids, _loader, engine, mut project) = setup(&["a.mp4", "b.mp4", "c.mp4"]);
    engine.block(&ids[1]);
    let events = Events::attach(&project);

    assert_eq!(project.start_proxy_creation(), StartOutcome::Started);
    assert!(pump_until(&mut project, |p| {
        p.active_job().is_some() && engine.launches().len() == 2
    }));
    assert_eq!(project.proxy_state(), ProxyState::Stepping);
    assert_eq!(project.start_proxy_creation(), StartOutcome::AlreadyStarted);

    engine.unblock(&ids[1]);
    assert!(project.wait_idle(TIMEOUT));
    assert_eq!(started(&events), 1);
    assert_eq!(created(&events), 1);
    assert_eq!(engine.launched_sources(), ids);
    assert_eq!(project.start_proxy_creation(), StartOutcome::AlreadyStarted);
}

#[test]
fn existing_proxies_are_reused() {
    let tmp = tempfile::tempdir().expect("failed to create tempdir");
    let ids = media_files(tmp.path(), &["a.mp4", "b.mp4"]);
    media_files(tmp.path(), &["a.mp4.proxy"]);
    let loader = ManualLoader::new();
    let engine = ScriptedEngine::new();
    let mut project = project_with(&loader, &engine, Some(EncodingProfile::h264_proxy()));
    import(&mut project, &ids);

    project.start_proxy_creation();
    assert!(project.wait_idle(TIMEOUT));

    assert_eq!(engine.launched_sources(), vec![ids[1].clone()]);
    assert_eq!(project.proxy_for(&ids[0]).map(|p| p.id().to_string()), Some(proxy_of(&ids[0])));
    assert!(!loader.reloads().contains(&proxy_of(&ids[0])));
    assert_eq!(project.proxy_state(), ProxyState::Created);
}

#[test]
fn proxy_named_assets_are_not_queued() {
    let (_tmp, ids, _loader, engine, mut project) = setup(&["a.mp4", "b.mp4.proxy"]);

    project.start_proxy_creation();
    assert!(project.wait_idle(TIMEOUT));

    assert_eq!(engine.launched_sources(), vec![ids[0].clone()]);
    assert!(project.proxy_for(&ids[1]).is_none());
}

#[test]
fn failures_skip_to_the_next_asset() {
    let (tmp, ids, _loader, engine, mut project) = setup(&["a.mp4", "b.mp4", "c.mp4"]);
    engine.fail(&ids[1]);
    engine.refuse(&ids[2]);
    let events = Events::attach(&project);

    project.start_proxy_creation();
    assert!(project.wait_idle(TIMEOUT));

    assert_eq!(project.proxy_state(), ProxyState::Created);
    assert!(project.proxy_for(&ids[0]).is_some());
    assert!(project.proxy_for(&ids[1]).is_none());
    assert!(project.proxy_for(&ids[2]).is_none());

    let failed: Vec<&str> = project.proxy_errors().iter().map(|f| f.asset_id.as_str()).collect();
    assert_eq!(failed, vec![ids[1].as_str(), ids[2].as_str()]);
    assert_eq!(events.count(|e| matches!(e, ProjectEvent::ProxyFailed { .. })), 2);
    assert_eq!(created(&events), 1);
    assert!(part_files(tmp.path()).is_empty());
}

#[test]
fn nothing_happens_without_profile() {
    let tmp = tempfile::tempdir().expect("failed to create tempdir");
    let ids = media_files(tmp.path(), &["a.mp4"]);
    let loader = ManualLoader::new();
    let engine = ScriptedEngine::new();
    let mut project = project_with(&loader, &engine, None);
    import(&mut project, &ids);
    let events = Events::attach(&project);

    assert_eq!(project.start_proxy_creation(), StartOutcome::NoProfile);
    assert!(project.wait_idle(TIMEOUT));
    assert_eq!(project.proxy_state(), ProxyState::Idle);
    assert!(events.snapshot().is_empty());
    assert!(engine.launches().is_empty());
}

#[test]
fn start_waits_for_loading_assets() {
    let tmp = tempfile::tempdir().expect("failed to create tempdir");
    let ids = media_files(tmp.path(), &["a.mp4", "b.mp4"]);
    let loader = ManualLoader::new();
    let engine = ScriptedEngine::new();
    let mut project = project_with(&loader, &engine, Some(EncodingProfile::h264_proxy()));
    let events = Events::attach(&project);

    loader.hold(true);
    for id in &ids {
        project.create_asset(id, AssetKind::UriClip);
    }
    assert_eq!(project.start_proxy_creation(), StartOutcome::Deferred);
    assert_eq!(started(&events), 0);

    loader.hold(false);
    for id in &ids {
        assert!(loader.release(id));
    }
    assert!(project.wait_idle(TIMEOUT));

    assert_eq!(started(&events), 1);
    assert_eq!(project.proxy_state(), ProxyState::Created);
    assert_eq!(engine.launched_sources(), ids);
}

// ── Pause and cancel ───────────────────────────────────────────

#[test]
fn pause_holds_the_active_job() {
    let (_tmp, ids, _loader, engine, mut project) = setup(&["a.mp4", "b.mp4"]);
    engine.block(&ids[0]);
    let events = Events::attach(&project);

    project.start_proxy_creation();
    assert!(pump_until(&mut project, |p| p.active_job().is_some()));
    project.pause_proxy_creation().expect("pause failed");
    assert_eq!(project.proxy_state(), ProxyState::Paused);
    assert_eq!(events.count(|e| matches!(e, ProjectEvent::ProxiesCreationPaused)), 1);
    assert!(pump_until(&mut project, |_| engine.saw_pause()));

    assert!(matches!(
        project.pause_proxy_creation(),
        Err(ProjectError::InvalidState { state: ProxyState::Paused, .. })
    ));
    assert_eq!(project.start_proxy_creation(), StartOutcome::Resumed);
    assert_eq!(project.proxy_state(), ProxyState::Stepping);

    engine.unblock(&ids[0]);
    assert!(project.wait_idle(TIMEOUT));
    assert_eq!(project.proxy_state(), ProxyState::Created);
    assert_eq!(project.list_proxies(KindFilter::Any).len(), 2);
    assert_eq!(started(&events), 1);
}

#[test]
fn pause_needs_a_running_job() {
    let (_tmp, ids, loader, _engine, mut project) = setup(&["a.mp4"]);
    assert!(matches!(
        project.pause_proxy_creation(),
        Err(ProjectError::InvalidState { state: ProxyState::Idle, .. })
    ));

    // the existing-proxy probe is held, so the step has no job yet
    loader.hold(true);
    project.start_proxy_creation();
    assert_eq!(project.proxy_state(), ProxyState::Stepping);
    assert!(matches!(project.pause_proxy_creation(), Err(ProjectError::NoActiveJob)));

    loader.hold(false);
    assert!(loader.release(&proxy_of(&ids[0])));
    assert!(project.wait_idle(TIMEOUT));
    assert_eq!(project.proxy_state(), ProxyState::Created);
}

#[test]
fn cancel_keeps_finished_proxies() {
    let (tmp, ids, _loader, engine, mut project) = setup(&["a.mp4", "b.mp4", "c.mp4"]);
    engine.block(&ids[1]);
    let events = Events::attach(&project);

    project.start_proxy_creation();
    assert!(pump_until(&mut project, |p| {
        p.active_job().is_some() && engine.launches().len() == 2
    }));
    project.cancel_proxy_creation().expect("cancel failed");
    assert_eq!(project.proxy_state(), ProxyState::Cancelled);
    assert!(project.wait_idle(TIMEOUT));

    assert_eq!(events.count(|e| matches!(e, ProjectEvent::ProxiesCreationCancelled)), 1);
    assert_eq!(created(&events), 0);
    assert!(project.proxy_for(&ids[0]).is_some());
    assert!(project.proxy_for(&ids[1]).is_none());
    assert!(project.proxy_for(&ids[2]).is_none());
    assert_eq!(engine.launches().len(), 2);
    assert!(part_files(tmp.path()).is_empty());
    assert!(!tmp.path().join("b.mp4.proxy").exists());
    assert!(matches!(
        project.cancel_proxy_creation(),
        Err(ProjectError::InvalidState { operation: "cancel", .. })
    ));

    // a restart only works on what is still missing
    engine.unblock(&ids[1]);
    assert_eq!(project.start_proxy_creation(), StartOutcome::Started);
    assert!(project.wait_idle(TIMEOUT));
    assert_eq!(project.proxy_state(), ProxyState::Created);
    assert_eq!(
        engine.launched_sources(),
        vec![ids[0].clone(), ids[1].clone(), ids[1].clone(), ids[2].clone()]
    );
}

#[test]
fn cancel_while_paused_discards_the_job() {
    let (tmp, ids, _loader, engine, mut project) = setup(&["a.mp4", "b.mp4"]);
    engine.block(&ids[0]);
    let events = Events::attach(&project);

    project.start_proxy_creation();
    assert!(pump_until(&mut project, |p| p.active_job().is_some()));
    project.pause_proxy_creation().expect("pause failed");
    assert!(pump_until(&mut project, |_| engine.saw_pause()));
    assert_eq!(part_files(tmp.path()).len(), 1);

    project.cancel_proxy_creation().expect("cancel failed");
    assert_eq!(project.proxy_state(), ProxyState::Cancelled);
    assert_eq!(project.active_job(), None);
    assert!(project.wait_idle(TIMEOUT));

    assert_eq!(events.count(|e| matches!(e, ProjectEvent::ProxiesCreationCancelled)), 1);
    assert_eq!(created(&events), 0);
    assert!(project.list_proxies(KindFilter::Any).is_empty());
    assert_eq!(engine.launched_sources(), vec![ids[0].clone()]);
    assert!(part_files(tmp.path()).is_empty());
    assert!(!tmp.path().join("a.mp4.proxy").exists());
}

#[test]
fn restart_waits_for_cancelled_job() {
    let (tmp, ids, _loader, engine, mut project) = setup(&["a.mp4", "b.mp4"]);
    engine.block(&ids[0]);
    engine.teardown(Duration::from_millis(150));
    let events = Events::attach(&project);

    project.start_proxy_creation();
    assert!(pump_until(&mut project, |p| p.active_job().is_some()));
    project.cancel_proxy_creation().expect("cancel failed");
    engine.unblock(&ids[0]);

    // the cancelled pipeline is still shutting down
    assert_eq!(project.start_proxy_creation(), StartOutcome::Deferred);
    assert!(matches!(project.request_proxy_for(&ids[1]), Err(ProjectError::JobActive)));
    project.dispatch_pending();
    assert!(project.wait_idle(TIMEOUT));

    assert_eq!(engine.peak_running(), 1);
    assert_eq!(project.proxy_state(), ProxyState::Created);
    assert_eq!(started(&events), 2);
    assert_eq!(created(&events), 1);
    assert!(project.proxy_errors().is_empty());
    for id in &ids {
        assert_eq!(project.proxy_for(id).map(|p| p.id().to_string()), Some(proxy_of(id)));
    }
    assert_eq!(
        engine.launched_sources(),
        vec![ids[0].clone(), ids[0].clone(), ids[1].clone()]
    );
    assert!(part_files(tmp.path()).is_empty());
}

// ── Single-asset requests ──────────────────────────────────────

#[test]
fn single_proxy_uses_asset_profile() {
    let tmp = tempfile::tempdir().expect("failed to create tempdir");
    let ids = media_files(tmp.path(), &["a.mp4", "b.mp4"]);
    let loader = ManualLoader::new();
    let engine = ScriptedEngine::new();
    let mut project = project_with(&loader, &engine, None);
    import(&mut project, &ids);
    project.set_asset_proxy_profile(&ids[0], Some(EncodingProfile::prores_proxy()));

    assert!(matches!(
        project.request_proxy_for("file:///nowhere.mp4"),
        Err(ProjectError::UnknownAsset(_))
    ));
    assert!(matches!(
        project.request_proxy_for(&ids[1]),
        Err(ProjectError::NoProxyProfile(_))
    ));

    let job = project.request_proxy_for(&ids[0]).expect("request failed");
    assert_eq!(project.active_job(), Some(job));
    assert!(matches!(project.request_proxy_for(&ids[0]), Err(ProjectError::JobActive)));
    assert!(project.wait_idle(TIMEOUT));

    assert_eq!(project.proxy_state(), ProxyState::Idle);
    assert_eq!(project.active_job(), None);
    assert!(project.proxy_for(&ids[0]).is_some());
    assert_eq!(engine.launches()[0].profile.name, "prores-proxy");
}

#[test]
fn bulk_start_waits_for_single_job() {
    let (_tmp, ids, _loader, engine, mut project) = setup(&["a.mp4", "b.mp4"]);
    engine.block(&ids[0]);

    project.request_proxy_for(&ids[0]).expect("request failed");
    assert_eq!(project.start_proxy_creation(), StartOutcome::Deferred);

    engine.unblock(&ids[0]);
    assert!(project.wait_idle(TIMEOUT));
    assert_eq!(project.proxy_state(), ProxyState::Created);
    assert_eq!(engine.launched_sources(), ids);
    assert!(project.proxy_for(&ids[1]).is_some());
}

// ── Documents ──────────────────────────────────────────────────

#[test]
fn loading_a_document_creates_proxies() {
    let tmp = tempfile::tempdir().expect("failed to create tempdir");
    let ids = media_files(tmp.path(), &["a.mp4", "b.mp4"]);
    let doc = uri::path_to_file_uri(&tmp.path().join("edit.json"));

    let loader = ManualLoader::new();
    let engine = ScriptedEngine::new();
    let mut authoring = project_with(&loader, &engine, None);
    authoring
        .save(&timeline_of(&ids), &doc, &JsonFormatter, false)
        .expect("save failed");

    let mut project = Project::with_backends(Some(&doc), loader.clone(), engine.clone());
    project.set_proxy_profile(Some(EncodingProfile::h264_proxy()));
    let events = Events::attach(&project);
    let timeline = shared(Timeline::default());
    project.use_proxies_for_timeline(&timeline, true);

    project.load(&timeline, &JsonFormatter).expect("load failed");
    assert!(project.wait_idle(TIMEOUT));

    let loaded = events.position(|e| matches!(e, ProjectEvent::Loaded { .. }));
    let started = events.position(|e| matches!(e, ProjectEvent::ProxiesCreationStarted));
    assert!(loaded.is_some());
    assert!(loaded < started);
    assert_eq!(project.proxy_state(), ProxyState::Created);
    assert_eq!(bound_ids(&timeline), vec![proxy_of(&ids[0]), proxy_of(&ids[1])]);
    assert!(!timeline.read().has_pending_changes());
}
