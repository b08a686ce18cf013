use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use serde::Serialize;

use acmi_replay_cli::args::{Cli, Command};
use acmi_replay_cli::report;
use acmi_replay_core::{load_path, Config, ObjectId, PlaybackController, Recording};

fn main() -> Result<()> {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .parse_default_env()
        .init();

    let cfg = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            Config::from_json_str(&text).map_err(|e| anyhow!("{}: {e}", path.display()))?
        }
        None => Config::default(),
    };
    log::debug!("config: {cfg:?}");

    match &cli.command {
        Command::Summary { file } => {
            let rec = open(file, &cfg)?;
            let s = report::summary(&rec);
            emit(cli.json, &s, || s.to_string())
        }
        Command::Entities { file, at } => {
            let rec = open(file, &cfg)?;
            let rows = report::entity_rows(&rec, *at);
            emit(cli.json, &rows, || report::render_entities(&rows))
        }
        Command::Diagnostics { file } => {
            let rec = open(file, &cfg)?;
            let diags = rec.diagnostics();
            emit(cli.json, diags, || {
                report::render_diagnostics(diags.entries(), diags.dropped())
            })
        }
        Command::Query {
            file,
            id,
            at,
            trail,
        } => {
            let rec = open(file, &cfg)?;
            let oid = ObjectId::parse_hex(id).ok_or_else(|| anyhow!("invalid object id '{id}'"))?;
            let Some(snapshot) = rec.query(oid, *at) else {
                bail!("object {oid} has no recorded position");
            };
            let path = rec.trajectory(oid, *at, *trail);
            #[derive(Serialize)]
            struct QueryResult<'a> {
                snapshot: &'a acmi_replay_core::Snapshot,
                trail: &'a [acmi_replay_core::Snapshot],
            }
            let result = QueryResult {
                snapshot: &snapshot,
                trail: &path,
            };
            emit(cli.json, &result, || {
                let mut out = report::render_snapshot(&snapshot);
                for s in &path {
                    out.push_str("\n  ");
                    out.push_str(&report::render_snapshot(s));
                }
                out
            })
        }
        Command::Play {
            file,
            from,
            step,
            speed,
            trail,
            hide,
            max_ticks,
        } => {
            let rec = Arc::new(open(file, &cfg)?);
            let mut pc = PlaybackController::new(rec, &cfg.playback);
            if let Some(s) = speed {
                pc.set_speed(*s)?;
            }
            if let Some(d) = trail {
                pc.set_trail_duration(*d)?;
            }
            for kind in hide {
                pc.set_visibility(*kind, false);
            }
            if let Some(t) = from {
                pc.seek(*t);
            }
            pc.play();
            let steps = report::run_playback(&mut pc, *step, *max_ticks);
            if cli.json {
                for s in &steps {
                    println!("{}", serde_json::to_string(s)?);
                }
            } else {
                for s in &steps {
                    print!("{}", report::render_frame(&s.frame));
                    print!("{}", report::render_events(&s.recording_events));
                }
            }
            Ok(())
        }
    }
}

fn open(path: &Path, cfg: &Config) -> Result<Recording> {
    let rec = load_path(path, cfg).with_context(|| format!("failed to load {}", path.display()))?;
    if !rec.diagnostics().is_empty() {
        log::info!(
            "{}: {} lines skipped (see `diagnostics`)",
            path.display(),
            rec.diagnostics().total()
        );
    }
    Ok(rec)
}

fn emit<T: Serialize + ?Sized>(json: bool, value: &T, text: impl FnOnce() -> String) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text().trim_end());
    }
    Ok(())
}
