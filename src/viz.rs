//! Visualizer contract and a best-effort terminal renderer.
//!
//! The core hands a visualizer the read-only, sum-normalized magnitude
//! array once per processed block and reads back a stop request. Rendering
//! details are entirely the collaborator's concern; the core only requires
//! that [`render`](Visualizer::render) returns quickly.

use std::io::{self, Write};
use std::time::{Duration, Instant};

/// A magnitude consumer polled once per processed block.
pub trait Visualizer {
    /// Consumes one magnitude snapshot (length `n/2 + 1`, summing to 1.0
    /// unless the block was silent). Returns `true` to request a stop.
    ///
    /// Must not block: visualization is best-effort and may skip frames,
    /// never delay device transfers.
    fn render(&mut self, spectrum: &[f64]) -> bool;
}

/// Renders the spectrum as ANSI bar columns on stdout.
///
/// Frames arriving faster than the refresh interval are skipped, keeping
/// the audio path free of terminal I/O latency. Stop requests come from the
/// process signal handler, not from here.
pub struct TerminalVisualizer {
    columns: usize,
    rows: usize,
    refresh: Duration,
    last_render: Instant,
}

impl TerminalVisualizer {
    /// Creates a renderer with the default 80x20 character grid.
    #[must_use]
    pub fn new() -> Self {
        Self::with_size(80, 20)
    }

    /// Creates a renderer drawing `columns` x `rows` characters.
    #[must_use]
    pub fn with_size(columns: usize, rows: usize) -> Self {
        Self {
            columns,
            rows,
            refresh: Duration::from_millis(50),
            last_render: Instant::now() - Duration::from_secs(1),
        }
    }

    /// Folds the bins into one height per column, in rows.
    fn column_heights(&self, spectrum: &[f64]) -> Vec<usize> {
        let bins_per_column = (spectrum.len() / self.columns).max(1);
        // Normalized magnitudes are tiny per bin; scale a column sum of
        // bins so a dominant narrow peak still fills the grid.
        let gain = self.rows as f64 * 8.0;
        spectrum
            .chunks(bins_per_column)
            .take(self.columns)
            .map(|chunk| {
                let sum: f64 = chunk.iter().sum();
                ((sum * gain) as usize).min(self.rows)
            })
            .collect()
    }
}

impl Default for TerminalVisualizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Visualizer for TerminalVisualizer {
    fn render(&mut self, spectrum: &[f64]) -> bool {
        if self.last_render.elapsed() < self.refresh {
            return false; // skip the frame rather than slow the pipeline
        }
        self.last_render = Instant::now();

        let heights = self.column_heights(spectrum);
        let mut frame = String::with_capacity((self.columns + 8) * self.rows);
        frame.push_str("\x1b[H"); // cursor home, redraw in place
        for row in (1..=self.rows).rev() {
            for &h in &heights {
                frame.push(if h >= row { '#' } else { ' ' });
            }
            frame.push_str("\x1b[K\n");
        }

        // Terminal trouble is not a reason to stop the audio path.
        let _ = io::stdout().write_all(frame.as_bytes());
        let _ = io::stdout().flush();
        false
    }
}
