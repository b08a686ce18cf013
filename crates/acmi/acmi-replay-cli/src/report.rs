//! Text and JSON views of recordings, entities, diagnostics and frames.

use std::collections::BTreeMap;
use std::fmt::{self, Write};

use serde::Serialize;

use acmi_replay_core::{
    Diagnostic, Entity, EntityKind, Frame, GlobalEvent, PlaybackController, PlaybackEvent, Recording,
    Snapshot,
};

#[derive(Clone, Debug, Serialize)]
pub struct Summary {
    pub title: Option<String>,
    pub author: Option<String>,
    pub file_version: Option<String>,
    pub reference_time: String,
    pub start: f64,
    pub end: f64,
    pub duration: f64,
    pub entities: BTreeMap<&'static str, usize>,
    pub snapshots: usize,
    pub events: usize,
    pub diagnostics: usize,
}

pub fn summary(rec: &Recording) -> Summary {
    let h = rec.header();
    let mut entities = BTreeMap::new();
    for e in rec.registry().iter() {
        *entities.entry(e.kind().name()).or_insert(0) += 1;
    }
    Summary {
        title: h.title().map(str::to_string),
        author: h.author().map(str::to_string),
        file_version: h.file_version.clone(),
        reference_time: h.reference_time.to_rfc3339(),
        start: rec.start(),
        end: rec.end(),
        duration: rec.duration(),
        entities,
        snapshots: rec.registry().store().total_snapshots(),
        events: rec.events().len(),
        diagnostics: rec.diagnostics().total(),
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "title:      {}", self.title.as_deref().unwrap_or("-"))?;
        writeln!(f, "author:     {}", self.author.as_deref().unwrap_or("-"))?;
        writeln!(f, "version:    {}", self.file_version.as_deref().unwrap_or("-"))?;
        writeln!(f, "reference:  {}", self.reference_time)?;
        writeln!(
            f,
            "time:       {:.2}s .. {:.2}s ({:.2}s)",
            self.start, self.end, self.duration
        )?;
        let kinds: Vec<String> = self
            .entities
            .iter()
            .map(|(k, n)| format!("{n} {k}"))
            .collect();
        writeln!(f, "entities:   {}", kinds.join(", "))?;
        writeln!(f, "snapshots:  {}", self.snapshots)?;
        writeln!(f, "events:     {}", self.events)?;
        write!(f, "diagnostics: {}", self.diagnostics)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntityRow {
    pub id: String,
    pub kind: EntityKind,
    pub name: Option<String>,
    pub created_at: f64,
    pub removed_at: Option<f64>,
    pub snapshots: usize,
}

/// One row per incarnation, or only the entities alive at `at`.
pub fn entity_rows(rec: &Recording, at: Option<f64>) -> Vec<EntityRow> {
    let reg = rec.registry();
    let mut entities: Vec<&Entity> = reg
        .iter()
        .filter(|e| at.map_or(true, |t| e.alive_at(t)))
        .collect();
    entities.sort_by(|a, b| a.id.cmp(&b.id).then(a.created_at().total_cmp(&b.created_at())));
    entities
        .into_iter()
        .map(|e| EntityRow {
            id: e.id.to_string(),
            kind: e.kind(),
            name: e.name().map(str::to_string),
            created_at: e.created_at(),
            removed_at: e.removed_at(),
            snapshots: reg.track(e.key).map_or(0, |t| t.len()),
        })
        .collect()
}

pub fn render_entities(rows: &[EntityRow]) -> String {
    let mut out = String::new();
    for r in rows {
        let removed = r.removed_at.map_or_else(|| "-".to_string(), |t| format!("{t:.2}"));
        let _ = writeln!(
            out,
            "{:>8}  {:<9}  {:<16}  {:>8.2}  {:>8}  {:>6}",
            r.id,
            r.kind.name(),
            r.name.as_deref().unwrap_or("-"),
            r.created_at,
            removed,
            r.snapshots
        );
    }
    out
}

pub fn render_diagnostics(diags: &[Diagnostic], dropped: usize) -> String {
    let mut out = String::new();
    for d in diags {
        let _ = writeln!(out, "{d}\n    {}", d.raw);
    }
    if dropped > 0 {
        let _ = writeln!(out, "... and {dropped} more");
    }
    out
}

pub fn render_snapshot(s: &Snapshot) -> String {
    let mut out = format!(
        "t={:.3} lon={:.6} lat={:.6} alt={:.1} enu=({:.1}, {:.1}, {:.1})",
        s.time, s.geo.lon, s.geo.lat, s.geo.alt, s.position[0], s.position[1], s.position[2]
    );
    if let Some(o) = s.orientation {
        let _ = write!(out, " rpy=({:.1}, {:.1}, {:.1})", o.roll, o.pitch, o.yaw);
    }
    if let Some(name) = s.attrs.name.as_deref() {
        let _ = write!(out, " name={name}");
    }
    out
}

pub fn render_frame(frame: &Frame) -> String {
    let mut out = format!("#{:.2} ({} visible)\n", frame.time, frame.len());
    for (id, entry) in &frame.entries {
        let _ = writeln!(
            out,
            "  {id:>8} {:<9} trail={:<4} {}",
            entry.kind.name(),
            entry.trail.len(),
            render_snapshot(&entry.snapshot)
        );
    }
    out
}

pub fn render_events(events: &[GlobalEvent]) -> String {
    let mut out = String::new();
    for e in events {
        let ids: Vec<String> = e.ids.iter().map(|i| i.to_string()).collect();
        let _ = writeln!(out, "  ! {} [{}] {}", e.name, ids.join(","), e.text);
    }
    out
}

/// One playback step as reported by `play`.
#[derive(Clone, Debug, Serialize)]
pub struct Step {
    pub frame: Frame,
    pub events: Vec<PlaybackEvent>,
    pub recording_events: Vec<GlobalEvent>,
}

/// Tick the controller until it leaves Playing or `max_ticks` is reached, collecting frames.
/// The first step is the frame at the starting cursor, with the events stamped at that time;
/// later steps carry the events in `(previous cursor, cursor]`.
pub fn run_playback(pc: &mut PlaybackController, step: f64, max_ticks: usize) -> Vec<Step> {
    let rec = pc.recording().clone();
    let mut steps = vec![Step {
        frame: pc.frame(),
        events: pc.take_events(),
        recording_events: rec.events_at(pc.cursor()).to_vec(),
    }];
    for _ in 0..max_ticks {
        if pc.state() != acmi_replay_core::PlaybackState::Playing {
            break;
        }
        let before = pc.cursor();
        pc.tick(step);
        steps.push(Step {
            frame: pc.frame(),
            events: pc.take_events(),
            recording_events: rec.events_between(before, pc.cursor()).to_vec(),
        });
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use acmi_replay_core::{load_str, Config};

    const TEXT: &str = "FileType=text/acmi/tacview\nFileVersion=2.1\n0,Title=Unit\n#0\n\
        A,T=1|2|3,Type=Air+FixedWing,Name=Hornet\n10,T=1|2|3,Type=Misc+Explosion\n\
        0,Event=Bookmark|Fight's on\n#2\n-10\n";

    #[test]
    fn summary_counts_kinds() {
        let rec = load_str(TEXT, &Config::default()).unwrap();
        let s = summary(&rec);
        assert_eq!(s.title.as_deref(), Some("Unit"));
        assert_eq!(s.entities.get("aircraft"), Some(&1));
        assert_eq!(s.entities.get("explosion"), Some(&1));
        assert!(s.to_string().contains("1 aircraft, 1 explosion"));
    }

    #[test]
    fn entity_rows_sort_by_numeric_id() {
        let rec = load_str(TEXT, &Config::default()).unwrap();
        let rows = entity_rows(&rec, None);
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "10"]);
        assert_eq!(rows[1].removed_at, Some(2.0));
        assert_eq!(entity_rows(&rec, Some(2.0)).len(), 1);
        assert!(render_entities(&rows).contains("Hornet"));
    }

    #[test]
    fn entity_rows_order_wide_ids_numerically() {
        let rec = load_str(
            "FileType=text/acmi/tacview\nFileVersion=2.1\n#0\n\
             FFFFFFFFFFFFFFFF,Name=Last\n100,Name=Mid\n2,Name=First\n#1\n-2\n2,Name=Again\n",
            &Config::default(),
        )
        .unwrap();
        let rows = entity_rows(&rec, None);
        let order: Vec<(&str, f64)> = rows.iter().map(|r| (r.id.as_str(), r.created_at)).collect();
        assert_eq!(
            order,
            vec![("2", 0.0), ("2", 1.0), ("100", 0.0), ("FFFFFFFFFFFFFFFF", 0.0)]
        );
    }

    #[test]
    fn first_step_reports_events_at_start() {
        let rec = load_str(TEXT, &Config::default()).unwrap();
        let mut pc = PlaybackController::new(std::sync::Arc::new(rec), &Default::default());
        pc.play();
        let steps = run_playback(&mut pc, 1.0, 10);
        assert_eq!(steps[0].recording_events.len(), 1);
        assert_eq!(steps[0].recording_events[0].name, "Bookmark");
        assert!(steps[1..].iter().all(|s| s.recording_events.is_empty()));
        assert_eq!(steps.last().unwrap().frame.time, 2.0);
    }
}
