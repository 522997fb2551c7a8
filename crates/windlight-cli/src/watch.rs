use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;
use tracing::{debug, info, warn};
use windlight::{CompileOutput, Session};

use crate::Settings;
use crate::error::{CliError, CliResult};

/// Quiet period that groups bursts of filesystem events into one rebuild
const DEBOUNCE: Duration = Duration::from_millis(50);

/// Paths to watch for a compile result, each with its recursion mode
fn watch_targets(output: &CompileOutput) -> BTreeMap<PathBuf, RecursiveMode> {
    let mut targets = BTreeMap::new();

    for source in output.sources.iter().filter(|s| !s.negated && s.base.is_dir()) {
        targets.insert(source.base.clone(), RecursiveMode::Recursive);
    }

    for dependency in &output.dependencies {
        let covered = targets
            .iter()
            .any(|(dir, mode)| *mode == RecursiveMode::Recursive && dependency.starts_with(dir));
        if !covered {
            targets.insert(dependency.clone(), RecursiveMode::NonRecursive);
        }
    }

    targets
}

/// Whether `event` should trigger a rebuild
fn is_relevant(event: &Event, output_file: Option<&Path>) -> bool {
    if matches!(event.kind, EventKind::Access(_)) {
        return false;
    }

    // Writing the output must not retrigger a build
    match output_file {
        Some(output_file) => event.paths.iter().any(|path| path != output_file),
        None => !event.paths.is_empty(),
    }
}

/// Keep `watcher` pointed at exactly `targets`
fn sync_targets(
    watcher: &mut RecommendedWatcher,
    current: &mut BTreeMap<PathBuf, RecursiveMode>,
    targets: BTreeMap<PathBuf, RecursiveMode>,
) -> CliResult<()> {
    for path in current.keys() {
        if !targets.contains_key(path) {
            if let Err(e) = watcher.unwatch(path) {
                debug!(path = %path.display(), error = %e, "unwatch failed");
            }
        }
    }

    for (path, mode) in &targets {
        if current.get(path) != Some(mode) {
            watcher.watch(path, *mode)?;
        }
    }

    *current = targets;
    Ok(())
}

/// Rebuilds through one session, writing the output only when the CSS changes
struct Rebuilder<'a> {
    session: &'a mut Session,
    settings: &'a Settings,
    last_css: String,
}

impl Rebuilder<'_> {
    /// Run one rebuild. A failed compile is logged and yields `None`.
    fn rebuild(&mut self) -> CliResult<Option<CompileOutput>> {
        let rebuilt = self
            .settings
            .request()
            .and_then(|request| self.session.run(&request).map_err(CliError::from));
        let output = match rebuilt {
            Ok(output) => output,
            Err(e) => {
                warn!("rebuild failed: {e}");
                return Ok(None);
            }
        };

        if output.css != self.last_css {
            crate::write_output(self.settings.output.as_deref(), &output.css)?;
            self.last_css = output.css.clone();
            info!("rebuilt");
        } else {
            debug!("output unchanged");
        }

        Ok(Some(output))
    }
}

/// Call `on_change` once per burst of events that contains a relevant one.
/// Returns when the sending side of `events` is dropped.
fn event_loop(
    events: &mpsc::Receiver<notify::Result<Event>>,
    output_file: Option<&Path>,
    mut on_change: impl FnMut() -> CliResult<()>,
) -> CliResult<()> {
    let relevant = |event: notify::Result<Event>| match event {
        Ok(event) => is_relevant(&event, output_file),
        Err(e) => {
            warn!("watch error: {e}");
            false
        }
    };

    while let Ok(event) = events.recv() {
        let mut changed = relevant(event);
        while let Ok(event) = events.recv_timeout(DEBOUNCE) {
            changed |= relevant(event);
        }

        if changed {
            on_change()?;
        }
    }

    Ok(())
}

/// Rebuild through `session` whenever an input, import or scanned file changes.
///
/// Reusing the session keeps its memo, so rebuilds that generate the same CSS
/// skip the transform engine. Rebuild errors are logged and watching continues.
pub fn watch(session: &mut Session, settings: &Settings, first: CompileOutput) -> CliResult<()> {
    let output_file = settings.output.as_deref().map(std::path::absolute).transpose()?;

    let (tx, rx) = mpsc::channel::<notify::Result<Event>>();
    let mut watcher = notify::recommended_watcher(tx)?;
    let mut current = BTreeMap::new();
    sync_targets(&mut watcher, &mut current, watch_targets(&first))?;
    info!(paths = current.len(), "watching for changes");

    let mut rebuilder = Rebuilder { session, settings, last_css: first.css };
    event_loop(&rx, output_file.as_deref(), || {
        if let Some(output) = rebuilder.rebuild()? {
            sync_targets(&mut watcher, &mut current, watch_targets(&output))?;
        }
        Ok(())
    })
}
