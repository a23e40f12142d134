//! Pipeline behind the `marbles` binary: parse a diagram, run it through a
//! chain of operators, and report what came out.

use std::cell::RefCell;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::rc::Rc;
use std::str::FromStr;

use crate::diagram::{self, DiagramError};
use crate::recorder::LogEntry;
use crate::scheduler::{RunError, Scheduler, VirtualTime};
use crate::stream::{Event, Stream};

/// One operator in a command-line pipeline, written `name:argument`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorSpec {
    Delay(VirtualTime),
    Throttle(VirtualTime),
    Debounce(VirtualTime),
    Take(usize),
}

/// Error returned when an operator spec can't be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorSpecError {
    /// No `:argument` part.
    MissingArgument(String),
    /// Operator name not recognized.
    UnknownOperator(String),
    /// Argument is not a non-negative integer.
    InvalidArgument { operator: String, value: String },
}

impl std::fmt::Display for OperatorSpecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingArgument(spec) => {
                write!(f, "operator '{spec}' needs an argument, e.g. delay:40")
            }
            Self::UnknownOperator(name) => write!(
                f,
                "unknown operator '{name}' (expected delay, throttle, debounce or take)"
            ),
            Self::InvalidArgument { operator, value } => {
                write!(f, "invalid argument '{value}' for {operator}")
            }
        }
    }
}

impl std::error::Error for OperatorSpecError {}

impl FromStr for OperatorSpec {
    type Err = OperatorSpecError;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let Some((name, argument)) = spec.split_once(':') else {
            return Err(OperatorSpecError::MissingArgument(spec.to_string()));
        };
        let invalid = || OperatorSpecError::InvalidArgument {
            operator: name.to_string(),
            value: argument.to_string(),
        };

        match name {
            "delay" => argument.parse().map(Self::Delay).map_err(|_| invalid()),
            "throttle" => argument.parse().map(Self::Throttle).map_err(|_| invalid()),
            "debounce" => argument.parse().map(Self::Debounce).map_err(|_| invalid()),
            "take" => argument.parse().map(Self::Take).map_err(|_| invalid()),
            other => Err(OperatorSpecError::UnknownOperator(other.to_string())),
        }
    }
}

impl OperatorSpec {
    #[must_use]
    pub fn apply(self, scheduler: &Scheduler, stream: Stream<char>) -> Stream<char> {
        match self {
            Self::Delay(k) => stream.compose(scheduler.delay(k)),
            Self::Throttle(p) => stream.compose(scheduler.throttle(p)),
            Self::Debounce(p) => stream.compose(scheduler.debounce(p)),
            Self::Take(n) => stream.take(n),
        }
    }
}

/// Error returned by the command-line pipeline.
#[derive(Debug)]
pub enum CliError {
    Diagram(DiagramError),
    Run(RunError),
    /// The drained pipeline never completed or errored, so there is no log.
    Incomplete,
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Diagram(e) => write!(f, "malformed diagram: {e}"),
            Self::Run(e) => write!(f, "run failed: {e}"),
            Self::Incomplete => write!(f, "pipeline output never terminated"),
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Json(e) => write!(f, "JSON error: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Diagram(e) => Some(e),
            Self::Run(e) => Some(e),
            Self::Incomplete => None,
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
        }
    }
}

impl From<DiagramError> for CliError {
    fn from(e: DiagramError) -> Self {
        Self::Diagram(e)
    }
}

impl From<RunError> for CliError {
    fn from(e: RunError) -> Self {
        Self::Run(e)
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

/// What a pipeline produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutput {
    /// The recorded log, encoded with the scheduler's interval.
    pub diagram: String,
    pub log: Vec<LogEntry<char>>,
}

/// Parse `diagram`, apply `operators` in order, and drain the scheduler.
///
/// # Errors
///
/// Returns an error if the diagram is malformed or the output stream never
/// terminates.
pub async fn run_pipeline(
    scheduler: &Scheduler,
    diagram: &str,
    operators: &[OperatorSpec],
) -> Result<PipelineOutput, CliError> {
    let mut stream = scheduler.diagram(diagram)?;
    for operator in operators {
        stream = operator.apply(scheduler, stream);
    }

    let captured = Rc::new(RefCell::new(None));
    #[allow(clippy::disallowed_methods)] // Rc clone shares the capture slot
    let slot = Rc::clone(&captured);
    let _ = scheduler
        .record(&stream)
        .subscribe(move |event: &Event<Vec<LogEntry<char>>>| {
            if let Event::Next(log) = event {
                *slot.borrow_mut() = Some(log.clone());
            }
        });

    scheduler.run().await?;

    let log = captured.borrow_mut().take().ok_or(CliError::Incomplete)?;
    tracing::debug!("pipeline produced {} log entries", log.len());
    Ok(PipelineOutput {
        diagram: diagram::encode(&log, scheduler.config().interval),
        log,
    })
}

/// Render a log as pretty-printed JSON.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn to_json(log: &[LogEntry<char>]) -> Result<String, CliError> {
    Ok(serde_json::to_string_pretty(log)?)
}

/// Write a log as pretty-printed JSON to `path`.
///
/// # Errors
///
/// Returns an error if the file can't be created or written.
pub fn write_json(path: &Path, log: &[LogEntry<char>]) -> Result<(), CliError> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, log)?;
    writer.flush()?;
    tracing::info!("wrote {} log entries to {}", log.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeConfig;
    use crate::scheduler::ImmediateTaskQueue;
    use crate::time_source::SimulatedTimeSource;

    fn scheduler() -> Scheduler {
        Scheduler::with_parts(
            TimeConfig::default(),
            ImmediateTaskQueue,
            SimulatedTimeSource::new(0),
        )
    }

    #[test]
    fn test_parse_operator_specs() {
        assert_eq!("delay:40".parse::<OperatorSpec>(), Ok(OperatorSpec::Delay(40)));
        assert_eq!("throttle:20".parse::<OperatorSpec>(), Ok(OperatorSpec::Throttle(20)));
        assert_eq!("debounce:60".parse::<OperatorSpec>(), Ok(OperatorSpec::Debounce(60)));
        assert_eq!("take:2".parse::<OperatorSpec>(), Ok(OperatorSpec::Take(2)));
    }

    #[test]
    fn test_parse_operator_spec_errors() {
        assert_eq!(
            "delay".parse::<OperatorSpec>(),
            Err(OperatorSpecError::MissingArgument("delay".to_string()))
        );
        assert_eq!(
            "map:1".parse::<OperatorSpec>(),
            Err(OperatorSpecError::UnknownOperator("map".to_string()))
        );
        let error = "take:-1".parse::<OperatorSpec>().unwrap_err();
        assert_eq!(error.to_string(), "invalid argument '-1' for take");
    }

    #[tokio::test]
    async fn test_pipeline_applies_operators_in_order() {
        let scheduler = scheduler();
        let output = run_pipeline(
            &scheduler,
            "-a-b-c|",
            &[OperatorSpec::Take(2), OperatorSpec::Delay(40)],
        )
        .await
        .unwrap();

        assert_eq!(output.diagram, "---a-(b|)");
        assert_eq!(output.log.len(), 3);
    }

    #[tokio::test]
    async fn test_pipeline_reports_malformed_diagram() {
        let scheduler = scheduler();
        let error = run_pipeline(&scheduler, "-(a", &[]).await.unwrap_err();
        assert!(matches!(
            error,
            CliError::Diagram(DiagramError::UnclosedGroup { index: 1 })
        ));
    }

    #[tokio::test]
    async fn test_pipeline_without_terminal_is_incomplete() {
        let scheduler = scheduler();
        let error = run_pipeline(&scheduler, "-a-b", &[]).await.unwrap_err();
        assert!(matches!(error, CliError::Incomplete));
    }

    #[tokio::test]
    async fn test_write_json_round_trips_through_file() {
        let scheduler = scheduler();
        let output = run_pipeline(&scheduler, "a|", &[]).await.unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        write_json(&path, &output.log).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: Vec<LogEntry<char>> = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed, output.log);
        assert_eq!(contents, to_json(&output.log).unwrap());
    }
}
