use crate::models::{Activity, ActivityStatus, ImportReport, JobId};
use futures_util::{Stream, StreamExt};
use tracing::{debug, info, warn};

/// Progress of a running job. `value()` reports `-1.0` for indeterminate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Progress {
    Indeterminate,
    Percent(f64),
}

impl Progress {
    fn from_activity(activity: &Activity) -> Self {
        match activity.progress {
            Some(p) if p >= 0.0 => Progress::Percent(p.min(100.0)),
            _ => Progress::Indeterminate,
        }
    }

    pub fn value(&self) -> f64 {
        match self {
            Progress::Indeterminate => -1.0,
            Progress::Percent(p) => *p,
        }
    }
}

/// What to show when the job has finished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportOutcome {
    /// Finished without a report
    Complete,
    /// Report with no errors
    Success(ImportReport),
    /// Report with at least one error
    PartialFailure(ImportReport),
}

impl ImportOutcome {
    fn from_report(report: Option<&ImportReport>) -> Self {
        match report {
            None => ImportOutcome::Complete,
            Some(r) if r.has_errors() => ImportOutcome::PartialFailure(r.clone()),
            Some(r) => ImportOutcome::Success(r.clone()),
        }
    }

    pub fn report(&self) -> Option<&ImportReport> {
        match self {
            ImportOutcome::Complete => None,
            ImportOutcome::Success(r) | ImportOutcome::PartialFailure(r) => Some(r),
        }
    }

    /// At most `limit` error lines, plus how many were left out.
    pub fn visible_errors(&self, limit: usize) -> (&[String], usize) {
        match self {
            ImportOutcome::PartialFailure(r) => {
                let shown = r.errors.len().min(limit);
                (&r.errors[..shown], r.errors.len() - shown)
            }
            _ => (&[], 0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub status: ActivityStatus,
    pub outcome: ImportOutcome,
}

/// What the importing step currently shows.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorView {
    Running {
        progress: Progress,
        title: Option<String>,
        subtitle: Option<String>,
    },
    Finished(Completion),
}

/// Follows one import job until it reaches a terminal status.
///
/// The first terminal activity is latched; anything observed afterwards is
/// dropped so a late `in_progress` snapshot cannot undo a finished report.
#[derive(Debug, Clone)]
pub struct ImportMonitor {
    job: JobId,
    latest: Option<Activity>,
    finished: Option<Activity>,
}

impl ImportMonitor {
    pub fn new(job: JobId) -> Self {
        Self {
            job,
            latest: None,
            finished: None,
        }
    }

    pub fn job(&self) -> &JobId {
        &self.job
    }

    pub fn latest(&self) -> Option<&Activity> {
        self.latest.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_some()
    }

    /// Records an activity snapshot. Returns true if this one finished the job.
    pub fn observe(&mut self, activity: Activity) -> bool {
        if self.finished.is_some() {
            debug!("Ignoring activity update for finished job {}", self.job);
            return false;
        }
        if activity.id != self.job.0 {
            debug!("Ignoring activity {} while watching job {}", activity.id, self.job);
            return false;
        }

        let terminal = activity.status.is_terminal();
        if terminal {
            info!("Import job {} {}", self.job, activity.status);
            if let (Some(start), Some(end)) = (activity.started_at, activity.completed_at) {
                info!("Import took {}s", (end - start).num_seconds());
            }
            self.finished = Some(activity.clone());
        }
        self.latest = Some(activity);
        terminal
    }

    pub fn completion(&self) -> Option<Completion> {
        self.finished.as_ref().map(|a| Completion {
            status: a.status,
            outcome: ImportOutcome::from_report(a.report()),
        })
    }

    pub fn view(&self) -> MonitorView {
        if let Some(completion) = self.completion() {
            return MonitorView::Finished(completion);
        }
        match &self.latest {
            Some(a) => MonitorView::Running {
                progress: Progress::from_activity(a),
                title: a.title.clone(),
                subtitle: a.subtitle.clone(),
            },
            None => MonitorView::Running {
                progress: Progress::Indeterminate,
                title: None,
                subtitle: None,
            },
        }
    }

    /// Consumes `updates` until the job finishes or the stream ends.
    /// Read errors are logged and skipped; retrying is the stream's job.
    pub async fn watch<S, F>(&mut self, updates: S, mut on_update: F) -> Option<Completion>
    where
        S: Stream<Item = anyhow::Result<Activity>>,
        F: FnMut(&MonitorView),
    {
        if self.is_finished() {
            return self.completion();
        }

        futures_util::pin_mut!(updates);
        while let Some(update) = updates.next().await {
            match update {
                Ok(activity) => {
                    let done = self.observe(activity);
                    on_update(&self.view());
                    if done {
                        return self.completion();
                    }
                }
                Err(e) => warn!("Failed to read progress for job {}: {:#}", self.job, e),
            }
        }

        warn!("Progress feed for job {} ended before the job finished", self.job);
        None
    }
}
