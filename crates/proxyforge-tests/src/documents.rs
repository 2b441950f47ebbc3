//! Integration tests for saving and loading project documents.

use proxyforge_core::{uri, AssetKind, AssetState};
use proxyforge_project::{Project, ProjectError, ProjectEvent};
use proxyforge_timeline::{shared, Clip, JsonFormatter, Timeline, TimelineError};
use std::time::Duration;

use crate::support::{project_with, Events, ManualLoader, ScriptedEngine, TIMEOUT};

fn edit() -> Timeline {
    let mut tl = Timeline::new("Cut 1");
    tl.add_clip(
        0,
        Clip::new("a", "file:///media/a.mp4", AssetKind::UriClip, Duration::from_secs(4)),
    );
    tl.add_clip(
        1,
        Clip::new("title", "Opening", AssetKind::TitleClip, Duration::from_secs(2))
            .at(Duration::from_secs(1)),
    );
    tl
}

#[test]
fn anonymous_project_adopts_saved_location() {
    let tmp = tempfile::tempdir().expect("failed to create tempdir");
    let doc = tmp.path().join("cut.json");
    let mut project = project_with(&ManualLoader::new(), &ScriptedEngine::new(), None);
    assert_eq!(project.uri(), None);

    let timeline = shared(edit());
    project
        .save(&timeline, &doc.to_string_lossy(), &JsonFormatter, false)
        .expect("save failed");

    assert!(doc.exists());
    assert_eq!(project.uri(), Some(uri::path_to_file_uri(&doc).as_str()));
    assert_eq!(timeline.read().project(), Some(project.id()));
}

#[test]
fn save_refuses_to_overwrite() {
    let tmp = tempfile::tempdir().expect("failed to create tempdir");
    let doc = uri::path_to_file_uri(&tmp.path().join("cut.json"));
    let mut project = project_with(&ManualLoader::new(), &ScriptedEngine::new(), None);
    let timeline = shared(edit());

    project.save(&timeline, &doc, &JsonFormatter, false).expect("save failed");
    let err = project.save(&timeline, &doc, &JsonFormatter, false).unwrap_err();
    assert!(matches!(err, ProjectError::Timeline(TimelineError::AlreadyExists(_))));
    project.save(&timeline, &doc, &JsonFormatter, true).expect("overwrite failed");
}

#[test]
fn save_rejects_bad_locations() {
    let mut project = project_with(&ManualLoader::new(), &ScriptedEngine::new(), None);
    let timeline = shared(edit());

    let err = project
        .save(&timeline, "https://example.com/cut.json", &JsonFormatter, false)
        .unwrap_err();
    assert!(matches!(err, ProjectError::Timeline(TimelineError::UnsupportedUri(_))));
    assert_eq!(project.uri(), None);
}

#[test]
fn document_round_trips_through_projects() {
    let tmp = tempfile::tempdir().expect("failed to create tempdir");
    let doc = uri::path_to_file_uri(&tmp.path().join("cut.json"));
    let mut authoring = project_with(&ManualLoader::new(), &ScriptedEngine::new(), None);
    let original = edit();
    let clip_ids: Vec<_> = original.clips().map(|c| c.id).collect();
    authoring
        .save(&shared(original), &doc, &JsonFormatter, false)
        .expect("save failed");

    let loader = ManualLoader::new();
    loader.declare("file:///media/a.mp4");
    loader.declare("Opening");
    let mut project = Project::with_backends(Some(&doc), loader.clone(), ScriptedEngine::new());
    let events = Events::attach(&project);
    let timeline = shared(Timeline::default());
    project.load(&timeline, &JsonFormatter).expect("load failed");
    assert!(project.wait_idle(TIMEOUT));

    let tl = timeline.read();
    assert_eq!(tl.name, "Cut 1");
    assert_eq!(tl.layers().len(), 2);
    let loaded_ids: Vec<_> = tl.clips().map(|c| c.id).collect();
    assert_eq!(loaded_ids, clip_ids);
    assert_eq!(project.asset_state("file:///media/a.mp4"), Some(AssetState::Loaded));
    assert_eq!(project.asset_state("Opening"), Some(AssetState::Loaded));
    assert_eq!(loader.requests_for("file:///media/a.mp4"), 1);
    assert_eq!(events.count(|e| matches!(e, ProjectEvent::Loaded { .. })), 1);
}

#[test]
fn missing_document_fails_to_load() {
    let tmp = tempfile::tempdir().expect("failed to create tempdir");
    let doc = uri::path_to_file_uri(&tmp.path().join("absent.json"));
    let mut project = Project::with_backends(Some(&doc), ManualLoader::new(), ScriptedEngine::new());
    let events = Events::attach(&project);

    let timeline = shared(Timeline::default());
    let err = project.load(&timeline, &JsonFormatter).unwrap_err();
    assert!(matches!(err, ProjectError::Timeline(TimelineError::Io(_))));
    assert!(project.wait_idle(TIMEOUT));
    assert!(events.snapshot().is_empty());
}
