//! Terminal screen state
//!
//! The authoritative cell grid, cursor, and bounded scroll history. Mutated
//! only by the escape-sequence parser; the renderer reads.

use std::collections::VecDeque;
use unicode_width::UnicodeWidthChar;

/// Default number of history rows retained after scrolling off the top.
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

/// One of the basic 8/16 ANSI foreground colors, or the terminal default.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Color {
    #[default]
    Default,
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    BrightBlack,
    BrightRed,
    BrightGreen,
    BrightYellow,
    BrightBlue,
    BrightMagenta,
    BrightCyan,
    BrightWhite,
}

impl Color {
    /// Map an SGR foreground parameter (30-37, 90-97) to a color.
    pub fn from_sgr(param: u16) -> Option<Self> {
        let color = match param {
            30 => Color::Black,
            31 => Color::Red,
            32 => Color::Green,
            33 => Color::Yellow,
            34 => Color::Blue,
            35 => Color::Magenta,
            36 => Color::Cyan,
            37 => Color::White,
            90 => Color::BrightBlack,
            91 => Color::BrightRed,
            92 => Color::BrightGreen,
            93 => Color::BrightYellow,
            94 => Color::BrightBlue,
            95 => Color::BrightMagenta,
            96 => Color::BrightCyan,
            97 => Color::BrightWhite,
            _ => return None,
        };
        Some(color)
    }
}

/// A single cell: one code point plus its style.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    pub ch: char,
    pub fg: Color,
    pub bold: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::Default,
            bold: false,
        }
    }
}

impl Cell {
    pub fn new(ch: char, fg: Color, bold: bool) -> Self {
        Self { ch, fg, bold }
    }

    /// Same style as this cell, blank character.
    pub fn blank(&self) -> Self {
        Self {
            ch: ' ',
            fg: self.fg,
            bold: self.bold,
        }
    }
}

/// A fixed-width row of cells.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(cols: u16) -> Self {
        Self {
            cells: vec![Cell::default(); cols as usize],
        }
    }

    pub fn resize(&mut self, new_cols: u16) {
        self.cells.resize(new_cols as usize, Cell::default());
    }

    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            *cell = Cell::default();
        }
    }

    /// Row content as plain text, trailing blanks included.
    pub fn text(&self) -> String {
        self.cells.iter().map(|c| c.ch).collect()
    }
}

/// Cursor position, 0-indexed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cursor {
    pub row: u16,
    pub col: u16,
}

/// Screen buffer: visible grid plus bounded scroll history.
///
/// History and the visible grid are two explicit sequences; a renderer reads
/// them as one surface through [`ScreenBuffer::line`], where absolute index
/// `i` is history row `i` for `i < history_len`, visible row
/// `i - history_len` otherwise. Absolute indices are stable: a row keeps its
/// index when it scrolls from the grid into history.
pub struct ScreenBuffer {
    cols: u16,
    rows: Vec<Row>,
    history: VecDeque<Row>,
    history_limit: usize,
    pub cursor: Cursor,
}

impl ScreenBuffer {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self::with_history_limit(cols, rows, DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_history_limit(cols: u16, rows: u16, history_limit: usize) -> Self {
        Self {
            cols,
            rows: (0..rows).map(|_| Row::new(cols)).collect(),
            history: VecDeque::new(),
            history_limit,
            cursor: Cursor::default(),
        }
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    pub fn visible_rows(&self) -> u16 {
        self.rows.len() as u16
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// Total lines in the rendering surface (history + visible).
    pub fn total_lines(&self) -> usize {
        self.history.len() + self.rows.len()
    }

    /// Line by absolute index across history and the visible grid.
    pub fn line(&self, index: usize) -> Option<&Row> {
        if index < self.history.len() {
            self.history.get(index)
        } else {
            self.rows.get(index - self.history.len())
        }
    }

    pub fn visible_line(&self, row: u16) -> Option<&Row> {
        self.rows.get(row as usize)
    }

    /// Write a character at the cursor with the given style and advance,
    /// wrapping to the next row and scrolling past the last one.
    pub fn put_char(&mut self, ch: char, fg: Color, bold: bool) {
        let width = ch.width().unwrap_or(0) as u16;
        if width == 0 {
            // Combining/zero-width input would corrupt the grid; drop it.
            return;
        }

        // Widened compare: col + width can exceed u16 when cols is at the
        // type's maximum.
        if u32::from(self.cursor.col) + u32::from(width) > u32::from(self.cols) {
            self.cursor.col = 0;
            self.linefeed();
        }

        let (row, col) = (self.cursor.row as usize, self.cursor.col as usize);
        let Some(line) = self.rows.get_mut(row) else {
            // Transient pty/screen resize mismatch; tolerate and drop.
            return;
        };
        if col >= line.cells.len() {
            return;
        }

        line.cells[col] = Cell::new(ch, fg, bold);
        // Wide characters occupy a second, blank cell of the same style.
        if width == 2 && col + 1 < line.cells.len() {
            line.cells[col + 1] = line.cells[col].blank();
        }
        self.cursor.col = self.cursor.col.saturating_add(width);
    }

    /// Carriage return: cursor to column 0.
    pub fn carriage_return(&mut self) {
        self.cursor.col = 0;
    }

    /// Line feed: cursor down, scrolling the top row into history when the
    /// cursor is already on the last row.
    pub fn linefeed(&mut self) {
        if self.cursor.row + 1 >= self.visible_rows() {
            self.scroll_up();
        } else {
            self.cursor.row += 1;
        }
    }

    /// Backspace: cursor left, stopping at column 0.
    pub fn backspace(&mut self) {
        self.cursor.col = self.cursor.col.saturating_sub(1);
    }

    /// Horizontal tab: next 8-column tab stop, clamped to the last column.
    pub fn horizontal_tab(&mut self) {
        let next = ((self.cursor.col / 8) + 1) * 8;
        self.cursor.col = next.min(self.cols.saturating_sub(1));
    }

    /// Move the top row into history and append a blank row at the bottom.
    fn scroll_up(&mut self) {
        if self.rows.is_empty() {
            return;
        }
        let scrolled = self.rows.remove(0);
        self.push_to_history(scrolled);
        self.rows.push(Row::new(self.cols));
    }

    fn push_to_history(&mut self, row: Row) {
        if self.history_limit == 0 {
            return;
        }
        if self.history.len() >= self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(row);
    }

    pub fn cursor_up(&mut self, n: u16) {
        self.cursor.row = self.cursor.row.saturating_sub(n.max(1));
    }

    pub fn cursor_down(&mut self, n: u16) {
        let max = self.visible_rows().saturating_sub(1);
        self.cursor.row = (self.cursor.row + n.max(1)).min(max);
    }

    pub fn cursor_forward(&mut self, n: u16) {
        let max = self.cols.saturating_sub(1);
        self.cursor.col = (self.cursor.col + n.max(1)).min(max);
    }

    pub fn cursor_backward(&mut self, n: u16) {
        self.cursor.col = self.cursor.col.saturating_sub(n.max(1));
    }

    /// Absolute cursor position from 1-indexed CSI parameters, clamped.
    pub fn cursor_position(&mut self, row: u16, col: u16) {
        self.cursor.row = row
            .saturating_sub(1)
            .min(self.visible_rows().saturating_sub(1));
        self.cursor.col = col.saturating_sub(1).min(self.cols.saturating_sub(1));
    }

    /// Erase in display (CSI J): 0 = cursor to end, 1 = start to cursor,
    /// 2/3 = entire screen. Cells revert to the default cell.
    pub fn erase_in_display(&mut self, mode: u16) {
        let cursor_row = self.cursor.row as usize;
        match mode {
            0 => {
                self.erase_in_line(0);
                for row in self.rows.iter_mut().skip(cursor_row + 1) {
                    row.clear();
                }
            }
            1 => {
                for row in self.rows.iter_mut().take(cursor_row) {
                    row.clear();
                }
                self.erase_in_line(1);
            }
            2 | 3 => {
                for row in &mut self.rows {
                    row.clear();
                }
            }
            _ => {}
        }
    }

    /// Erase in line (CSI K): 0 = cursor to end, 1 = start through cursor,
    /// 2 = entire line.
    pub fn erase_in_line(&mut self, mode: u16) {
        let col = self.cursor.col as usize;
        let Some(row) = self.rows.get_mut(self.cursor.row as usize) else {
            return;
        };
        let len = row.cells.len();
        let range = match mode {
            0 => col.min(len)..len,
            1 => 0..(col + 1).min(len),
            2 => 0..len,
            _ => return,
        };
        for cell in &mut row.cells[range] {
            *cell = Cell::default();
        }
    }

    /// Resize the grid. Rows pushed off the top migrate into history before
    /// reallocation; content that still fits is preserved.
    pub fn resize(&mut self, rows: u16, cols: u16) {
        while self.rows.len() > rows as usize {
            let scrolled = self.rows.remove(0);
            self.push_to_history(scrolled);
            self.cursor.row = self.cursor.row.saturating_sub(1);
        }
        while self.rows.len() < rows as usize {
            self.rows.push(Row::new(cols));
        }

        self.cols = cols;
        for row in &mut self.rows {
            row.resize(cols);
        }
        for row in &mut self.history {
            row.resize(cols);
        }

        self.cursor.row = self.cursor.row.min(rows.saturating_sub(1));
        self.cursor.col = self.cursor.col.min(cols.saturating_sub(1));
    }
}
