//! Terminal renderer for the headless front-end
//!
//! Writes what changed since the last render: tree rows, the script list,
//! notices, the selection label and new console lines. Colors come from the
//! active theme and are dropped when the output is not a terminal.

use std::io::{self, Write};

use crate::app::{Launcher, Notice, NoticeLevel};
use crate::console::ConsoleCursor;
use crate::file_tree::{LoadState, TreeRow};
use crate::scripts::{RowKind, ScriptRow};
use crate::theme::{paint, paint_on, HexColor, Theme};

pub struct TerminalView<W: Write> {
    out: W,
    color: bool,
    console_cursor: ConsoleCursor,
}

impl<W: Write> TerminalView<W> {
    pub fn new(out: W, color: bool) -> Self {
        TerminalView {
            out,
            color,
            console_cursor: ConsoleCursor::default(),
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn fg(&self, text: &str, color: HexColor) -> String {
        if self.color {
            paint(text, color)
        } else {
            text.to_string()
        }
    }

    /// Write everything that changed since the previous call
    pub fn render(&mut self, launcher: &mut Launcher) -> io::Result<()> {
        let changes = launcher.take_changes();
        let theme = *launcher.theme();

        if changes.theme {
            let name = if theme.dark { "dark" } else { "light" };
            writeln!(self.out, "{}", self.fg(&format!("[theme] {}", name), theme.colors.muted))?;
        }

        if changes.tree {
            writeln!(self.out, "{}", self.fg("[tree]", theme.colors.muted))?;
            for row in launcher.tree().visible_rows() {
                writeln!(self.out, "{}", self.fg(&format_tree_row(&row), theme.colors.text))?;
            }
        }

        if changes.scripts {
            let folder = launcher
                .current_folder()
                .map(|f| f.display().to_string())
                .unwrap_or_default();
            writeln!(
                self.out,
                "{}",
                self.fg(&format!("[scripts] {}", folder), theme.colors.muted)
            )?;
            for row in launcher.script_rows() {
                let line = format_script_row(&row, launcher.selected_name().as_deref());
                writeln!(self.out, "{}", self.fg(&line, script_row_color(&row, &theme)))?;
            }
        }

        for notice in launcher.take_notices() {
            let color = match notice.level {
                NoticeLevel::Info => theme.colors.text,
                NoticeLevel::Warning => theme.colors.warning,
                NoticeLevel::Error => theme.colors.error,
            };
            writeln!(self.out, "{}", self.fg(&format_notice(&notice), color))?;
        }

        self.render_console(launcher, &theme)?;

        if changes.selection {
            let color = if launcher.selection_running() {
                theme.colors.running
            } else if launcher.selected().is_some() {
                theme.colors.selected
            } else {
                theme.colors.muted
            };
            let label = format!("[selection] {}", launcher.selection_label());
            writeln!(self.out, "{}", self.fg(&label, color))?;
        }

        self.out.flush()
    }

    fn render_console(&mut self, launcher: &Launcher, theme: &Theme) -> io::Result<()> {
        let (lines, cleared, next) = launcher.console().read_since(self.console_cursor);
        self.console_cursor = next;
        if cleared {
            writeln!(self.out, "{}", self.fg("[console cleared]", theme.colors.muted))?;
        }
        for line in lines {
            if self.color {
                let text = paint_on(
                    line,
                    theme.colors.console_text,
                    theme.colors.console_background,
                );
                writeln!(self.out, "{}", text)?;
            } else {
                writeln!(self.out, "{}", line)?;
            }
        }
        Ok(())
    }
}

fn script_row_color(row: &ScriptRow, theme: &Theme) -> HexColor {
    match row.kind {
        RowKind::Script => theme.colors.list_text,
        RowKind::Placeholder => theme.colors.muted,
        RowKind::Denied => theme.colors.error,
    }
}

/// Indented tree row with an open/closed marker
pub fn format_tree_row(row: &TreeRow) -> String {
    let marker = match (row.is_open, row.load_state) {
        (_, LoadState::Loading) => "…",
        (true, _) => "▾",
        (false, _) => "▸",
    };
    format!("{}{} {}", "  ".repeat(row.depth), marker, row.name)
}

/// Script row, with `>` marking the selected script
pub fn format_script_row(row: &ScriptRow, selected: Option<&str>) -> String {
    let mark = if row.is_selectable() && selected == Some(row.label.as_str()) {
        '>'
    } else {
        ' '
    };
    format!("{} {}", mark, row.label)
}

/// Single-line notice; message line breaks become ` | `
pub fn format_notice(notice: &Notice) -> String {
    let level = match notice.level {
        NoticeLevel::Info => "info",
        NoticeLevel::Warning => "warning",
        NoticeLevel::Error => "error",
    };
    let message: Vec<&str> = notice
        .message
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    format!("[{}] {}: {}", level, notice.title, message.join(" | "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::LauncherOptions;
    use crate::file_tree::NodeId;
    use std::fs;
    use tempfile::TempDir;

    fn row(name: &str, depth: usize, is_open: bool, load_state: LoadState) -> TreeRow {
        TreeRow {
            id: NodeId::default(),
            name: name.to_string(),
            depth,
            is_open,
            load_state,
        }
    }

    #[test]
    fn test_tree_row_markers() {
        assert_eq!(format_tree_row(&row("/", 0, true, LoadState::Loaded)), "▾ /");
        assert_eq!(format_tree_row(&row("home", 1, false, LoadState::Unknown)), "  ▸ home");
        assert_eq!(format_tree_row(&row("big", 2, true, LoadState::Loading)), "    … big");
    }

    #[test]
    fn test_script_row_selection_mark() {
        let script = ScriptRow {
            label: "a.py".to_string(),
            kind: RowKind::Script,
        };
        assert_eq!(format_script_row(&script, Some("a.py")), "> a.py");
        assert_eq!(format_script_row(&script, Some("b.py")), "  a.py");
    }

    #[test]
    fn test_notice_is_single_line() {
        let notice = Notice {
            level: NoticeLevel::Warning,
            title: "Already Running".to_string(),
            message: "This script is already running!\njob.py".to_string(),
        };
        assert_eq!(
            format_notice(&notice),
            "[warning] Already Running: This script is already running! | job.py"
        );
    }

    #[test]
    fn test_render_writes_only_changes() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("hello.py"), "").unwrap();
        let (tx, _rx) = async_channel::unbounded();
        let mut launcher = Launcher::new(
            tx,
            LauncherOptions {
                prefs_path: dir.path().join("prefs.json"),
                tree_roots: Some(vec![dir.path().to_path_buf()]),
                initial_folder: Some(dir.path().to_path_buf()),
                ..Default::default()
            },
        );
        launcher.select_script("hello.py");

        let mut view = TerminalView::new(Vec::new(), false);
        view.render(&mut launcher).unwrap();
        let first = String::from_utf8(view.into_inner()).unwrap();
        assert!(first.contains("[theme] light"));
        assert!(first.contains("> hello.py"));
        assert!(first.contains("[selection] Selected: hello.py"));
        assert!(!first.contains('\x1b'));

        let mut view = TerminalView::new(Vec::new(), false);
        view.render(&mut launcher).unwrap();
        assert!(view.into_inner().is_empty());
    }
}
