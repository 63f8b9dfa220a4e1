use canvas_contracts::history::HistoryLedger;
use canvas_contracts::runs::{GenerationRun, ImageRequestItem, ItemStatus, RunStatus};
use canvas_contracts::settings::Settings;
use canvas_engine::{NoticeLevel, OrchestratorEvent, SessionSnapshot};

const PROGRESS_BAR_WIDTH: usize = 24;

/// Turns orchestrator notifications into terminal lines, printing a status
/// line only when the run status or progress actually moved.
#[derive(Debug, Default)]
pub struct ProgressRenderer {
    last_status: Option<(u64, RunStatus)>,
    last_progress: f64,
}

impl ProgressRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(&mut self, event: &OrchestratorEvent) -> Vec<String> {
        match event {
            OrchestratorEvent::Notice(notice) => {
                let tag = match notice.level {
                    NoticeLevel::Success => "ok",
                    NoticeLevel::Warning => "warn",
                    NoticeLevel::Error => "error",
                };
                vec![format!("[{tag}] {}", notice.message)]
            }
            OrchestratorEvent::StateChanged(snapshot) => self.render_snapshot(snapshot),
        }
    }

    fn render_snapshot(&mut self, snapshot: &SessionSnapshot) -> Vec<String> {
        let run = &snapshot.run;
        let key = (run.run_id, run.status);
        let status_changed = self.last_status != Some(key);
        let progress_changed = run.progress_percent != self.last_progress;
        if !status_changed && !progress_changed {
            return Vec::new();
        }
        self.last_status = Some(key);
        self.last_progress = run.progress_percent;

        let mut lines = Vec::new();
        if let Some(line) = status_line(run) {
            lines.push(line);
        }
        if run.status == RunStatus::Generating {
            lines.push(progress_bar(run.progress_percent));
        }
        if status_changed && run.status.is_terminal() {
            lines.extend(snapshot.items.iter().enumerate().map(|(idx, item)| item_line(idx, item)));
        }
        lines
    }
}

pub fn status_line(run: &GenerationRun) -> Option<String> {
    match run.status {
        RunStatus::Idle => None,
        RunStatus::Starting => Some("Initializing generation...".to_string()),
        RunStatus::Generating => Some(format!(
            "Generating images: {}%",
            run.progress_percent.round() as u32
        )),
        RunStatus::Completed => Some(format!(
            "Generation completed in {:.1}s",
            run.elapsed_seconds().unwrap_or_default()
        )),
        RunStatus::Failed => Some(format!(
            "Generation failed: {}. Please try again.",
            run.error_message.as_deref().unwrap_or("Unknown error")
        )),
    }
}

pub fn progress_bar(percent: f64) -> String {
    let filled = ((percent.clamp(0.0, 100.0) / 100.0) * PROGRESS_BAR_WIDTH as f64).round() as usize;
    format!(
        "[{}{}]",
        "#".repeat(filled),
        "-".repeat(PROGRESS_BAR_WIDTH - filled)
    )
}

pub fn item_line(idx: usize, item: &ImageRequestItem) -> String {
    let state = match item.status() {
        ItemStatus::Pending => "loading",
        ItemStatus::Loaded => "loaded",
        ItemStatus::Failed => "failed to load",
    };
    format!("  [{}] {state} (seed {})", idx + 1, item.seed())
}

pub fn settings_lines(settings: &Settings) -> Vec<String> {
    let mut lines = vec![
        format!("Dimensions: {}x{}", settings.width, settings.height),
        format!("Seed: {}", settings.seed),
        format!("Model: {}", settings.model),
        format!("Enhancement: {}", on_off(settings.enhance)),
        format!("No logo: {}", on_off(settings.nologo)),
        format!("Private: {}", on_off(settings.private)),
    ];
    lines.extend(
        settings
            .validate()
            .into_iter()
            .map(|problem| format!("warning: {problem}")),
    );
    lines
}

pub fn history_lines(history: &HistoryLedger) -> Vec<String> {
    if history.is_empty() {
        return vec!["No generations yet.".to_string()];
    }
    history
        .entries()
        .iter()
        .enumerate()
        .map(|(idx, entry)| {
            let seeds = entry
                .metadata
                .iter()
                .map(|meta| meta.seed.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            let plural = if entry.images.len() == 1 { "" } else { "s" };
            format!(
                "{}. {} ({} image{plural}; seeds {seeds})",
                idx + 1,
                entry.prompt,
                entry.images.len()
            )
        })
        .collect()
}

fn on_off(value: bool) -> &'static str {
    if value {
        "on"
    } else {
        "off"
    }
}
