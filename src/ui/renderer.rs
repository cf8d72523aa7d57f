//! Styled span rendering
//!
//! Projects the screen buffer into styled text spans for a GUI host and
//! diffs against the previous frame, so the host only rebuilds the lines
//! that actually changed.

use crate::config::Config;
use crate::core::term::state::{Color, Row, ScreenBuffer};

/// A run of consecutive cells sharing one style.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Span {
    pub text: String,
    pub fg: Color,
    pub bold: bool,
}

/// One changed line: its absolute index over history plus the visible grid,
/// and the full set of spans to display for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineUpdate {
    pub line: usize,
    pub spans: Vec<Span>,
}

/// Incremental renderer. Keeps the spans emitted for each line and reports
/// only lines whose spans differ from the cached frame.
///
/// Absolute line indices are stable while the history ring is below its
/// limit, so lines already in history never need re-rendering. Once the
/// ring starts evicting, indices shift and every line is rescanned.
pub struct SpanRenderer {
    cache: Vec<Vec<Span>>,
    bright_black_fg: bool,
}

impl Default for SpanRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl SpanRenderer {
    pub fn new() -> Self {
        Self {
            cache: Vec::new(),
            bright_black_fg: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            cache: Vec::new(),
            bright_black_fg: config.bright_black_fg,
        }
    }

    /// Forget the cached frame. The next [`SpanRenderer::render`] reports
    /// every line, for hosts rebuilding their view from scratch.
    pub fn reset(&mut self) {
        self.cache.clear();
    }

    /// Diff the screen against the cached frame and return the lines that
    /// changed, in ascending line order.
    pub fn render(&mut self, screen: &ScreenBuffer) -> Vec<LineUpdate> {
        let total = screen.total_lines();
        let history = screen.history_len();

        // History rows are immutable and keep their index until the ring is
        // full; the cached prefix can be trusted as-is. After eviction
        // starts, every index shifts and the whole surface is rescanned.
        let start = if history < screen.history_limit() {
            self.cache.len().min(history)
        } else {
            0
        };

        self.cache.truncate(total);

        let mut updates = Vec::new();
        for index in start..total {
            let Some(row) = screen.line(index) else {
                break;
            };
            let spans = self.row_spans(row);
            if self.cache.get(index) == Some(&spans) {
                continue;
            }
            if index < self.cache.len() {
                self.cache[index] = spans.clone();
            } else {
                self.cache.push(spans.clone());
            }
            updates.push(LineUpdate { line: index, spans });
        }
        updates
    }

    /// Merge a row's cells into maximal runs of identical style.
    fn row_spans(&self, row: &Row) -> Vec<Span> {
        let mut spans: Vec<Span> = Vec::new();
        for cell in &row.cells {
            let fg = self.map_color(cell.fg);
            match spans.last_mut() {
                Some(span) if span.fg == fg && span.bold == cell.bold => {
                    span.text.push(cell.ch);
                }
                _ => spans.push(Span {
                    text: cell.ch.to_string(),
                    fg,
                    bold: cell.bold,
                }),
            }
        }
        spans
    }

    fn map_color(&self, color: Color) -> Color {
        if self.bright_black_fg && color == Color::Black {
            Color::White
        } else {
            color
        }
    }
}
