//! Tokenizing scanner for simulation log output.
//!
//! Logs are interpreted line by line: each line is classified into a
//! [`Token`], and tokens drive an explicit state machine with a
//! transition table. The scan produces a [`LogReport`]: a verdict plus
//! the derived metrics the wrapper writes back onto the record.
//!
//! Recognized line shapes (the built-in suite grammar):
//!
//! ```text
//! solver started ...                  start banner
//! running on 4 compute nodes          node count
//! queued as job 81234                 queue job id
//! entering time loop ...              loop start
//! iteration 17 ...                    iteration tick
//! output size: 2.5G                   output footprint
//! solver finished, elapsed 1:02:03    success marker
//! solver aborted ...                  failure marker
//! ```

use std::path::Path;

use crate::domain::models::JobField;
use crate::infrastructure::fs::record::JobRecord;
use crate::infrastructure::fs::util::parse_size_kb;

/// Named scanner states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Before the start banner.
    Preamble,
    /// Banner seen, run in flight.
    Running,
    /// Success marker seen.
    Finished,
    /// Failure marker seen.
    Aborted,
}

/// One classified log line.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    StartBanner,
    NodeCount(u32),
    JobId(String),
    LoopStart,
    IterationTick,
    OutputSize(u64),
    SuccessMarker { elapsed_secs: Option<f64> },
    FailureMarker,
    Other,
}

/// Token discriminant, used as the transition-table key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    StartBanner,
    NodeCount,
    JobId,
    LoopStart,
    IterationTick,
    OutputSize,
    SuccessMarker,
    FailureMarker,
    Other,
}

impl Token {
    fn kind(&self) -> TokenKind {
        match self {
            Self::StartBanner => TokenKind::StartBanner,
            Self::NodeCount(_) => TokenKind::NodeCount,
            Self::JobId(_) => TokenKind::JobId,
            Self::LoopStart => TokenKind::LoopStart,
            Self::IterationTick => TokenKind::IterationTick,
            Self::OutputSize(_) => TokenKind::OutputSize,
            Self::SuccessMarker { .. } => TokenKind::SuccessMarker,
            Self::FailureMarker => TokenKind::FailureMarker,
            Self::Other => TokenKind::Other,
        }
    }
}

/// Transition table. Pairs absent from the table leave the state
/// unchanged.
const TRANSITIONS: &[(ScanState, TokenKind, ScanState)] = &[
    (ScanState::Preamble, TokenKind::StartBanner, ScanState::Running),
    (ScanState::Preamble, TokenKind::FailureMarker, ScanState::Aborted),
    (ScanState::Running, TokenKind::SuccessMarker, ScanState::Finished),
    (ScanState::Running, TokenKind::FailureMarker, ScanState::Aborted),
];

fn step(state: ScanState, kind: TokenKind) -> ScanState {
    TRANSITIONS
        .iter()
        .find(|(from, on, _)| *from == state && *on == kind)
        .map_or(state, |(_, _, to)| *to)
}

/// Verdict and derived metrics of one scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogReport {
    /// 0 = success, 1 = never finished, 2 = aborted.
    pub verdict: i32,
    /// Solver-reported elapsed time, from the success marker line.
    pub elapsed_secs: Option<f64>,
    pub compute_nodes: Option<u32>,
    pub iterations: u32,
    pub loops: u32,
    pub output_size_kb: Option<u64>,
    pub job_id: Option<String>,
}

impl LogReport {
    /// Write the metrics onto a record. Only determined values are set.
    pub fn apply_to(&self, record: &mut JobRecord) {
        if let Some(elapsed) = self.elapsed_secs {
            record.set(JobField::AppDurationSecs, elapsed);
        }
        if let Some(nodes) = self.compute_nodes {
            record.set(JobField::Nodes, nodes);
        }
        if self.iterations > 0 {
            record.set(JobField::Iterations, self.iterations);
        }
        if self.loops > 0 {
            record.set(JobField::Loops, self.loops);
        }
        if let Some(kb) = self.output_size_kb {
            record.set(JobField::OutputSizeKb, kb);
        }
        if let Some(ref id) = self.job_id {
            record.set(JobField::JobId, id);
        }
    }
}

/// Marker strings an adapter may override for its suite.
#[derive(Debug, Clone)]
pub struct ScanMarkers {
    pub start: &'static str,
    pub success: &'static str,
    pub failure: &'static str,
}

impl Default for ScanMarkers {
    fn default() -> Self {
        Self {
            start: "solver started",
            success: "solver finished",
            failure: "solver aborted",
        }
    }
}

/// The scanner itself: stateless between scans, cheap to share.
#[derive(Debug, Clone, Default)]
pub struct LogScanner {
    markers: ScanMarkers,
}

impl LogScanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_markers(markers: ScanMarkers) -> Self {
        Self { markers }
    }

    /// Scan log text and produce a report.
    pub fn scan_str(&self, text: &str) -> LogReport {
        let mut state = ScanState::Preamble;
        let mut report = LogReport::default();

        for line in text.lines() {
            let token = self.tokenize(line);
            // Metrics only count once the run is actually in flight.
            if state == ScanState::Running {
                match &token {
                    Token::NodeCount(n) => report.compute_nodes = Some(*n),
                    Token::JobId(id) => report.job_id = Some(id.clone()),
                    Token::LoopStart => report.loops += 1,
                    Token::IterationTick => report.iterations += 1,
                    Token::OutputSize(kb) => report.output_size_kb = Some(*kb),
                    Token::SuccessMarker { elapsed_secs } => {
                        report.elapsed_secs = *elapsed_secs;
                    }
                    _ => {}
                }
            }
            state = step(state, token.kind());
        }

        report.verdict = match state {
            ScanState::Finished => 0,
            ScanState::Aborted => 2,
            ScanState::Preamble | ScanState::Running => 1,
        };
        report
    }

    /// Scan a log file from disk.
    pub async fn scan_file(&self, path: &Path) -> std::io::Result<LogReport> {
        let text = tokio::fs::read_to_string(path).await?;
        Ok(self.scan_str(&text))
    }

    /// Solver-reported elapsed seconds, or `None` when the log never
    /// reached its success marker.
    pub async fn extract_duration(&self, path: &Path) -> Option<f64> {
        let report = self.scan_file(path).await.ok()?;
        if report.verdict == 0 {
            report.elapsed_secs
        } else {
            None
        }
    }

    fn tokenize(&self, line: &str) -> Token {
        if line.contains(self.markers.success) {
            let elapsed_secs = line
                .split("elapsed")
                .nth(1)
                .and_then(|rest| rest.split_whitespace().next())
                .and_then(parse_hms);
            return Token::SuccessMarker { elapsed_secs };
        }
        if line.contains(self.markers.failure) {
            return Token::FailureMarker;
        }
        if line.contains(self.markers.start) {
            return Token::StartBanner;
        }
        if let Some(rest) = line.strip_prefix("running on ") {
            if let Some(n) = rest.split_whitespace().next().and_then(|w| w.parse().ok()) {
                return Token::NodeCount(n);
            }
        }
        if let Some(rest) = line.strip_prefix("queued as job ") {
            if let Some(id) = rest.split_whitespace().next() {
                return Token::JobId(id.to_string());
            }
        }
        if line.starts_with("entering time loop") {
            return Token::LoopStart;
        }
        if line.starts_with("iteration ") {
            return Token::IterationTick;
        }
        if let Some(rest) = line.strip_prefix("output size:") {
            if let Some(kb) = parse_size_kb(rest) {
                return Token::OutputSize(kb);
            }
        }
        Token::Other
    }
}

/// Parse an `H:MM:SS` clock into seconds.
pub fn parse_hms(text: &str) -> Option<f64> {
    let mut parts = text.trim().splitn(3, ':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if !(0.0..60.0).contains(&minutes) || !(0.0..60.0).contains(&seconds) {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}
