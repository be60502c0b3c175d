//! Terminal front end: renders pipeline output and reads user commands

use crate::aggregator::AggregateStats;
use crate::ai::AnalysisState;
use crate::events::LogEvent;
use crate::service::{Command, Presenter};
use log::{debug, warn};
use std::io::{BufRead, Write};
use std::thread;
use tokio::sync::mpsc;

pub const HELP: &str = "commands: [a]pply fix, [d]ismiss, [s]tatus, [q]uit";

/// Presenter writing plain text lines to any writer
pub struct ConsolePresenter<W: Write + Send> {
    out: W,
}

impl ConsolePresenter<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> ConsolePresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_lines(&mut self, lines: &[String]) {
        for line in lines {
            if let Err(e) = writeln!(self.out, "{}", line) {
                warn!("Failed to write console output: {}", e);
                return;
            }
        }
        if let Err(e) = self.out.flush() {
            warn!("Failed to flush console output: {}", e);
        }
    }
}

/// One event as `LEVEL HH:MM:SS source: message`
pub fn format_event(event: &LogEvent) -> String {
    format!(
        "{:<5} {} {}: {}",
        event.level.as_str(),
        event.timestamp.format("%H:%M:%S"),
        event.source,
        event.message
    )
}

/// Analysis panel for the current state
pub fn format_analysis(state: &AnalysisState) -> Vec<String> {
    match state {
        AnalysisState::Idle => vec!["[analysis] monitoring, no active fault".to_string()],
        AnalysisState::Pending { candidate } => vec![format!(
            "[analysis] analyzing {} from {}...",
            candidate.id, candidate.source
        )],
        AnalysisState::Ready { candidate, outcome }
        | AnalysisState::Failed { candidate, outcome } => {
            let mut lines = vec![
                format!("[analysis] {} ({})", outcome.classification, state.label()),
                format!("  detected:   {}", candidate.message),
                format!("  root cause: {}", outcome.root_cause),
                format!("  impact:     {}", outcome.impact),
                format!("  suggestion: {}", outcome.remediation.description),
            ];
            if let Some(command) = &outcome.remediation.command {
                lines.push(format!("  command:    {}", command));
            }
            lines.push(format!(
                "  [a] {}  [d] Dismiss",
                outcome.remediation.action_label
            ));
            lines
        }
    }
}

/// Status dashboard line
pub fn format_dashboard(stats: &AggregateStats) -> String {
    format!(
        "[status] health {:.1}% | processed {} | errors {} | fixes {}",
        stats.health_percent(),
        stats.total_events,
        stats.error_count,
        stats.remediation_count
    )
}

impl<W: Write + Send> Presenter for ConsolePresenter<W> {
    fn event(&mut self, event: &LogEvent) {
        self.write_lines(&[format_event(event)]);
    }

    fn analysis(&mut self, state: &AnalysisState) {
        self.write_lines(&format_analysis(state));
    }

    fn dashboard(&mut self, stats: &AggregateStats) {
        self.write_lines(&[format_dashboard(stats)]);
    }
}

/// Read commands line by line until `Quit`, EOF, or the service goes away
///
/// Blocking; run it on a dedicated thread. Nothing is read after `Quit`.
pub fn read_commands<R: BufRead>(input: R, commands: &mpsc::Sender<Command>) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to read command: {}", e);
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<Command>() {
            Ok(command) => {
                if commands.blocking_send(command).is_err() {
                    debug!("Service stopped, no longer reading commands");
                    return;
                }
                if command == Command::Quit {
                    return;
                }
            }
            Err(e) => eprintln!("{} ({})", e, HELP),
        }
    }
    debug!("stdin closed");
}

/// Read commands from stdin on a plain OS thread
///
/// The thread is never joined: a read blocked on stdin must not hold the
/// process open once the service has stopped.
pub fn spawn_command_reader(
    commands: mpsc::Sender<Command>,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("command-reader".to_string())
        .spawn(move || read_commands(std::io::stdin().lock(), &commands))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AnalysisOutcome, Remediation};
    use crate::events::{EventId, Level};
    use chrono::{TimeZone, Utc};
    use std::io::{BufReader, Cursor, Read};

    fn event(level: Level, source: &str, message: &str) -> LogEvent {
        LogEvent {
            id: EventId(4),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 14, 5, 9).unwrap(),
            level,
            source: source.to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_format_event() {
        let line = format_event(&event(
            Level::Info,
            "api-gateway",
            "Request received: GET /v1/products",
        ));
        assert_eq!(
            line,
            "INFO  14:05:09 api-gateway: Request received: GET /v1/products"
        );
    }

    #[test]
    fn test_format_analysis_ready_with_command() {
        let state = AnalysisState::Ready {
            candidate: event(Level::Error, "checkout-service", "Timeout"),
            outcome: AnalysisOutcome::new(
                "Service Timeout",
                "payment-gateway is slow",
                "Checkouts fail",
                Remediation {
                    description: "Increase the timeout".to_string(),
                    action_label: "Increase Timeout".to_string(),
                    command: Some("kubectl edit configmap checkout".to_string()),
                },
            ),
        };

        let lines = format_analysis(&state);
        assert_eq!(lines[0], "[analysis] Service Timeout (ready)");
        assert!(lines.iter().any(|l| l.contains("kubectl edit configmap checkout")));
        assert_eq!(lines.last().unwrap(), "  [a] Increase Timeout  [d] Dismiss");
    }

    #[test]
    fn test_format_analysis_failed_has_no_command_line() {
        let state = AnalysisState::Failed {
            candidate: event(Level::Error, "db-connector", "down"),
            outcome: AnalysisOutcome::fallback(),
        };

        let lines = format_analysis(&state);
        assert_eq!(lines[0], "[analysis] Analysis Failed (failed)");
        assert!(!lines.iter().any(|l| l.contains("command:")));
    }

    #[test]
    fn test_format_dashboard() {
        let stats = AggregateStats {
            total_events: 8,
            error_count: 1,
            remediation_count: 2,
        };
        assert_eq!(
            format_dashboard(&stats),
            "[status] health 87.5% | processed 8 | errors 1 | fixes 2"
        );
        assert_eq!(
            format_dashboard(&AggregateStats::default()),
            "[status] health 100.0% | processed 0 | errors 0 | fixes 0"
        );
    }

    #[test]
    fn test_presenter_writes_to_buffer() {
        let mut presenter = ConsolePresenter::new(Vec::new());
        presenter.event(&event(Level::Error, "db-connector", "down"));
        presenter.analysis(&AnalysisState::Idle);
        presenter.dashboard(&AggregateStats::default());

        let output = String::from_utf8(presenter.into_inner()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ERROR 14:05:09 db-connector"));
        assert_eq!(lines[1], "[analysis] monitoring, no active fault");
    }

    #[test]
    fn test_read_commands_parses_lines_and_stops_at_quit() {
        let (tx, mut rx) = mpsc::channel(16);
        let input = Cursor::new("s\n\n  apply \nreboot\nq\nd\n");

        read_commands(input, &tx);

        assert_eq!(rx.try_recv().unwrap(), Command::Status);
        assert_eq!(rx.try_recv().unwrap(), Command::ApplyFix);
        assert_eq!(rx.try_recv().unwrap(), Command::Quit);
        // Input after quit is left unread
        assert!(rx.try_recv().is_err());
    }

    /// Input that fails the test if read past the bytes before it
    struct Unreachable;

    impl Read for Unreachable {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            panic!("input read after quit");
        }
    }

    #[test]
    fn test_reader_returns_after_quit_without_further_reads() {
        let (tx, mut rx) = mpsc::channel(16);
        let input = BufReader::new(Cursor::new("q\n").chain(Unreachable));

        let handle = thread::spawn(move || read_commands(input, &tx));
        handle.join().unwrap();

        assert_eq!(rx.try_recv().unwrap(), Command::Quit);
    }

    #[test]
    fn test_reader_stops_when_service_is_gone() {
        let (tx, rx) = mpsc::channel(16);
        drop(rx);
        let input = BufReader::new(Cursor::new("s\n").chain(Unreachable));

        read_commands(input, &tx);
    }

    #[test]
    fn test_reader_stops_at_eof() {
        let (tx, mut rx) = mpsc::channel(16);
        read_commands(Cursor::new("d"), &tx);

        assert_eq!(rx.try_recv().unwrap(), Command::Dismiss);
        assert!(rx.try_recv().is_err());
    }
}
