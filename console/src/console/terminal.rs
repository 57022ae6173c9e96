//! Line-oriented terminal surface
//!
//! Prints log lines incrementally by id, so a paint only writes what is new
//! since the previous paint, followed by a status bar whenever a new sample
//! arrived. Messages raised between two log lines are held until the earlier
//! line is printed, so the output keeps arrival order.

use std::collections::VecDeque;
use std::io::Write;

use chrono::{DateTime, Utc};
use colored::Colorize;

use crate::console::events::{LogStream, StatusChange};
use crate::console::surface::{ConsoleSurface, ConsoleView};
use crate::transport::ConnectionState;

const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Writes the console to any `Write` sink, usually stdout
pub struct TerminalSurface<W: Write> {
    out: W,
    last_printed: Option<u64>,
    last_sample: Option<DateTime<Utc>>,
    /// Messages waiting for the log line they follow, keyed by the id of
    /// the line they precede
    pending: VecDeque<(u64, String)>,
    write_failed: bool,
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_printed: None,
            last_sample: None,
            pending: VecDeque::new(),
            write_failed: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, line: &str) {
        if let Err(e) = writeln!(self.out, "{}", line) {
            if !self.write_failed {
                tracing::warn!("Console output failed: {}", e);
                self.write_failed = true;
            }
        }
    }

    /// Id of the next log line this surface will print
    fn expected(&self) -> u64 {
        self.last_printed.map(|id| id + 1).unwrap_or(0)
    }

    /// Print `line` now if every log line before `at` is already on screen,
    /// otherwise hold it until they are
    fn message(&mut self, at: u64, line: String) {
        if self.pending.is_empty() && at <= self.expected() {
            self.emit(&line);
        } else {
            self.pending.push_back((at, line));
        }
    }

    /// Print held messages that precede line `id`
    fn flush_before(&mut self, id: u64) {
        while self.pending.front().is_some_and(|(at, _)| *at <= id) {
            if let Some((_, line)) = self.pending.pop_front() {
                self.emit(&line);
            }
        }
    }

    fn flush_all(&mut self) {
        while let Some((_, line)) = self.pending.pop_front() {
            self.emit(&line);
        }
    }

    fn paint_logs(&mut self, view: &ConsoleView<'_>) {
        let expected = self.expected();
        if let Some(first) = view.logs.first_id() {
            if first > expected {
                let skipped = first - expected;
                self.emit(&format!("… {} earlier line(s) not shown", skipped).dimmed().to_string());
            }
        }

        let entries = match self.last_printed {
            Some(id) => view.logs.since(id),
            None => view.logs.snapshot(),
        };

        for entry in entries {
            self.flush_before(entry.id);
            let line = match entry.stream {
                LogStream::Stdout => entry.text.normal(),
                LogStream::Stderr => entry.text.red(),
            };
            self.emit(&line.to_string());
            self.last_printed = Some(entry.id);
        }

        // Whatever is left followed the newest line, or lines that were
        // cleared before they could be shown
        self.flush_all();
    }

    fn paint_status_bar(&mut self, view: &ConsoleView<'_>) {
        let Some(sample) = view.metrics.latest() else {
            return;
        };
        if self.last_sample == Some(sample.received_at) {
            return;
        }
        self.last_sample = Some(sample.received_at);

        let label = if view.is_online() {
            "Online".green().bold()
        } else {
            "Offline".red().bold()
        };

        let cpu: Vec<f64> = view.metrics.history().map(|point| point.cpu).collect();
        let mem: Vec<f64> = view.metrics.history().map(|point| point.mem).collect();
        let memory_percent = view
            .metrics
            .memory_percent()
            .map(|percent| format!(" ({}%)", percent.round()))
            .unwrap_or_default();

        let bar = format!(
            "[{}] {}  CPU {}% {}  RAM {} MB{} {}",
            label,
            view.address(),
            sample.cpu_percent,
            sparkline(&cpu, 100.0).purple(),
            sample.memory_used_mb,
            memory_percent,
            sparkline(&mem, sample.memory_max_mb).cyan(),
        );
        self.emit(&bar);
    }
}

impl<W: Write> ConsoleSurface for TerminalSurface<W> {
    fn paint(&mut self, view: &ConsoleView<'_>) {
        self.paint_logs(view);
        self.paint_status_bar(view);
        let _ = self.out.flush();
    }

    fn diagnostic(&mut self, at: u64, raw: &str) {
        self.message(at, format!("[unparsed] {}", raw).yellow().to_string());
    }

    fn status_changed(&mut self, at: u64, status: &StatusChange) {
        let line = format!("● server is {} at {}", status.label(), status.address);
        let line = if status.running { line.green() } else { line.red() };
        self.message(at, line.to_string());
    }

    fn connection_changed(&mut self, at: u64, state: ConnectionState) {
        let line = match state {
            ConnectionState::Open => "○ stream connected".green(),
            ConnectionState::Connecting => "○ connecting…".dimmed(),
            ConnectionState::Disconnected => "○ stream offline".red(),
            ConnectionState::Closing => "○ closing".dimmed(),
        };
        self.message(at, line.to_string());
    }

    fn notice(&mut self, at: u64, message: &str) {
        self.message(at, format!("» {}", message).blue().to_string());
    }
}

/// Render `values` as block characters scaled against `ceiling`
///
/// The ceiling grows to the largest value so spikes never overflow.
pub fn sparkline(values: &[f64], ceiling: f64) -> String {
    let top = values.iter().copied().fold(ceiling, f64::max);
    if top <= 0.0 {
        return SPARK_LEVELS[0].to_string().repeat(values.len());
    }

    values
        .iter()
        .map(|value| {
            let ratio = (value.max(0.0) / top).min(1.0);
            let level = (ratio * (SPARK_LEVELS.len() - 1) as f64).round() as usize;
            SPARK_LEVELS[level]
        })
        .collect()
}
