use std::sync::Arc;

use acmi_replay_cli::report::{self, run_playback};
use acmi_replay_core::{
    load_path, Config, EntityKind, PlaybackController, PlaybackEvent, PlaybackState,
};
use acmi_test_fixtures::recordings;

fn engagement() -> Arc<acmi_replay_core::Recording> {
    let path = recordings::path("engagement").unwrap();
    Arc::new(load_path(path, &Config::default()).unwrap())
}

#[test]
fn playback_runs_to_the_end() {
    let mut pc = PlaybackController::new(engagement(), &Config::default().playback);
    pc.set_speed(5.0).unwrap();
    pc.play();
    let steps = run_playback(&mut pc, 1.0, 100);

    let times: Vec<f64> = steps.iter().map(|s| s.frame.time).collect();
    assert_eq!(times, vec![0.0, 5.0, 10.0, 15.0, 20.0, 25.0, 30.0]);
    assert!(steps[0].events.contains(&PlaybackEvent::Started));
    assert_eq!(
        steps.last().unwrap().events,
        vec![PlaybackEvent::Ended { time: 30.0 }]
    );
    assert_eq!(pc.state(), PlaybackState::Paused);

    let names: Vec<&str> = steps
        .iter()
        .flat_map(|s| s.recording_events.iter().map(|e| e.name.as_str()))
        .collect();
    assert_eq!(names, vec!["LeftArea", "Destroyed"]);
}

#[test]
fn max_ticks_bounds_output() {
    let mut pc = PlaybackController::new(engagement(), &Config::default().playback);
    pc.play();
    let steps = run_playback(&mut pc, 0.5, 3);
    assert_eq!(steps.len(), 4);
    assert_eq!(steps[3].frame.time, 1.5);
    assert_eq!(pc.state(), PlaybackState::Playing);
}

#[test]
fn rendered_frame_lists_visible_entities() {
    let rec = engagement();
    let mut pc = PlaybackController::new(Arc::clone(&rec), &Config::default().playback);
    pc.set_visibility(EntityKind::Aircraft, false);
    let text = report::render_frame(&pc.frame_at(12.5));
    assert!(text.starts_with("#12.50 (1 visible)"));
    assert!(text.contains("missile"));
    assert!(text.contains("name=AIM-120C"));

    let rows = report::entity_rows(&rec, Some(22.0));
    let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["101", "301"]);
}
