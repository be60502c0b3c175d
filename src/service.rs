//! Triage service loop
//!
//! Drives a `TriagePipeline` from three inputs: events from the source,
//! user commands, and analyzer completions. All pipeline mutations happen on
//! the loop's task; only the analyzer call runs on a spawned task, and its
//! result comes back through a channel tagged with the candidate id.

use crate::aggregator::AggregateStats;
use crate::ai::{AnalysisCompletion, AnalysisRequest, AnalysisState, AnalyzerBackend};
use crate::error::AnalysisError;
use crate::events::{EventDraft, LogEvent};
use crate::triage::TriagePipeline;
use log::{debug, info, warn};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// User command accepted by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ApplyFix,
    Dismiss,
    Status,
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "a" | "apply" => Ok(Command::ApplyFix),
            "d" | "dismiss" => Ok(Command::Dismiss),
            "s" | "status" => Ok(Command::Status),
            "q" | "quit" | "exit" => Ok(Command::Quit),
            other => Err(format!("unknown command '{}'", other)),
        }
    }
}

/// Output side of the service
#[cfg_attr(test, mockall::automock)]
pub trait Presenter: Send {
    /// A new event was stored
    fn event(&mut self, event: &LogEvent);
    /// The analysis state changed or was requested
    fn analysis(&mut self, state: &AnalysisState);
    /// Aggregate counters were requested or changed by a fix
    fn dashboard(&mut self, stats: &AggregateStats);
}

pub struct TriageService<P: Presenter> {
    pipeline: TriagePipeline,
    backend: Arc<dyn AnalyzerBackend>,
    presenter: P,
    analysis_timeout: Option<Duration>,
}

impl<P: Presenter> TriageService<P> {
    pub fn new(pipeline: TriagePipeline, backend: Arc<dyn AnalyzerBackend>, presenter: P) -> Self {
        Self {
            pipeline,
            backend,
            presenter,
            analysis_timeout: None,
        }
    }

    /// Bound every analyzer call; an expired call fails the analysis
    pub fn with_analysis_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.analysis_timeout = timeout;
        self
    }

    pub fn pipeline(&self) -> &TriagePipeline {
        &self.pipeline
    }

    /// Run until `Quit`, a shutdown signal, or the shutdown sender is dropped
    ///
    /// A closed event channel does not stop the loop; commands are still
    /// served. Returns the pipeline in its final state.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<EventDraft>,
        mut commands: mpsc::Receiver<Command>,
        mut shutdown: watch::Receiver<bool>,
    ) -> TriagePipeline {
        let (completion_tx, mut completion_rx) = mpsc::channel::<AnalysisCompletion>(8);
        let mut events_open = true;
        let mut commands_open = true;

        info!(
            "Triage service running with {} backend (analysis timeout: {:?})",
            self.backend.name(),
            self.analysis_timeout
        );

        if *shutdown.borrow() {
            return self.pipeline;
        }

        loop {
            tokio::select! {
                biased;

                Some(completion) = completion_rx.recv() => {
                    self.handle_completion(completion);
                }
                draft = events.recv(), if events_open => match draft {
                    Some(draft) => self.handle_event(draft, &completion_tx),
                    None => {
                        info!("Event source closed");
                        events_open = false;
                    }
                },
                command = commands.recv(), if commands_open => match command {
                    Some(Command::Quit) => {
                        info!("Quit requested");
                        break;
                    }
                    Some(command) => self.handle_command(command),
                    None => {
                        debug!("Command channel closed");
                        commands_open = false;
                    }
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Shutdown signal received");
                        break;
                    }
                }
            }
        }

        let stats = self.pipeline.stats();
        let selector = self.pipeline.selector();
        info!(
            "Triage service stopped: {} events, {} errors ({} analyzed, {} skipped while busy), {} fixes",
            stats.total_events,
            stats.error_count,
            selector.promoted_count(),
            selector.skipped_count(),
            stats.remediation_count
        );
        self.pipeline
    }

    fn handle_event(&mut self, draft: EventDraft, completions: &mpsc::Sender<AnalysisCompletion>) {
        let report = self.pipeline.ingest(draft);
        self.presenter.event(&report.event);

        if let Some(request) = report.promoted {
            self.presenter.analysis(self.pipeline.state());
            self.spawn_analysis(request, completions.clone());
        }
    }

    fn spawn_analysis(&self, request: AnalysisRequest, completions: mpsc::Sender<AnalysisCompletion>) {
        let backend = Arc::clone(&self.backend);
        let timeout = self.analysis_timeout;

        tokio::spawn(async move {
            let result = match timeout {
                Some(limit) => {
                    match tokio::time::timeout(limit, request.execute(backend.as_ref())).await {
                        Ok(result) => result,
                        Err(_) => {
                            warn!(
                                "Analysis of {} exceeded {:?}",
                                request.candidate_id(),
                                limit
                            );
                            Err(AnalysisError::Timeout)
                        }
                    }
                }
                None => request.execute(backend.as_ref()).await,
            };

            if completions.send(request.complete(result)).await.is_err() {
                debug!(
                    "Service stopped before analysis of {} finished",
                    request.candidate_id()
                );
            }
        });
    }

    fn handle_completion(&mut self, completion: AnalysisCompletion) {
        if self.pipeline.complete_analysis(completion) {
            self.presenter.analysis(self.pipeline.state());
        }
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::ApplyFix => match self.pipeline.apply_fix() {
                Some(fix) => {
                    self.presenter.event(&fix);
                    self.presenter.analysis(self.pipeline.state());
                    self.presenter.dashboard(&self.pipeline.stats());
                }
                None => info!(
                    "Nothing to apply: analysis is {}",
                    self.pipeline.state().label()
                ),
            },
            Command::Dismiss => {
                if self.pipeline.dismiss() {
                    self.presenter.analysis(self.pipeline.state());
                } else {
                    info!(
                        "Nothing to dismiss: analysis is {}",
                        self.pipeline.state().label()
                    );
                }
            }
            Command::Status => {
                self.presenter.analysis(self.pipeline.state());
                self.presenter.dashboard(&self.pipeline.stats());
            }
            // Handled by the loop
            Command::Quit => {}
        }
    }
}
