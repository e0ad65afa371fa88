//! Screen emulator adapter.
//!
//! Thin contract over the `vt100` terminal emulator: feed raw bytes,
//! resize, and read back the rendered grid as fixed-width lines. This is
//! the only module that knows the emulator's native dimension order; the
//! public convention everywhere is (rows, cols).

use unicode_width::UnicodeWidthStr;

/// Emulated terminal screen the editor renders into.
pub struct Screen {
    parser: vt100::Parser,
}

impl Screen {
    pub fn new(rows: u16, cols: u16) -> Self {
        // vt100's native order is (rows, cols) as well; no scrollback,
        // the bridge only ever mirrors the visible grid.
        Self {
            parser: vt100::Parser::new(rows, cols, 0),
        }
    }

    /// Feed decoded output bytes, in the exact order they were read.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.parser.process(bytes);
    }

    /// Current geometry as (rows, cols).
    pub fn size(&self) -> (u16, u16) {
        self.parser.screen().size()
    }

    /// Change the grid shape. Content preservation is the emulator's
    /// own policy.
    pub fn resize(&mut self, rows: u16, cols: u16) {
        self.parser.screen_mut().set_size(rows, cols);
    }

    /// The rendered screen: exactly `rows` lines, each padded to a
    /// display width of exactly `cols`.
    pub fn display_lines(&self) -> Vec<String> {
        let screen = self.parser.screen();
        let (rows, cols) = screen.size();
        (0..rows)
            .map(|row| {
                let mut line = String::with_capacity(cols as usize);
                for col in 0..cols {
                    let Some(cell) = screen.cell(row, col) else {
                        line.push(' ');
                        continue;
                    };
                    // The cell after a wide character carries no content
                    // of its own; the wide cell already covers its width.
                    if cell.is_wide_continuation() {
                        continue;
                    }
                    if cell.has_contents() {
                        line.push_str(&cell.contents());
                    } else {
                        line.push(' ');
                    }
                }
                let width = UnicodeWidthStr::width(line.as_str());
                for _ in width..cols as usize {
                    line.push(' ');
                }
                line
            })
            .collect()
    }
}
