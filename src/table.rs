//! Plain-text preview of a profiled sample.

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::field::Field;

/// Columns as a two-line header (name, then type) above the sample rows.
/// Rows shorter than the column list are padded with blanks; extra cells are
/// not shown.
pub fn render_preview(columns: &[Field], rows: &[Vec<String>]) -> String {
    let names = columns.iter().map(|c| c.name.clone()).collect::<Vec<_>>();
    let types = columns
        .iter()
        .map(|c| c.field_type.as_str().to_string())
        .collect::<Vec<_>>();

    let mut widths = names
        .iter()
        .zip(&types)
        .map(|(name, ty)| display_width(name).max(display_width(ty)).max(3))
        .collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(widths.len()) {
            widths[idx] = widths[idx].max(display_width(&sanitize_cell(cell)));
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(&names, &widths));
    let _ = writeln!(output, "{}", format_row(&types, &widths));
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&rule, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut line = widths
        .iter()
        .enumerate()
        .map(|(idx, width)| {
            let cell = values
                .get(idx)
                .map(|value| sanitize_cell(value))
                .unwrap_or(Cow::Borrowed(""));
            let padding = width.saturating_sub(display_width(&cell));
            format!("{cell}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}
