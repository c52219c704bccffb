use unicode_segmentation::UnicodeSegmentation;
use unicode_width::UnicodeWidthStr;

const ELLIPSIS: char = '\u{2026}';

/// Width in terminal cells. Control characters (tabs, newlines) count as one
/// cell each since listings replace them with spaces.
pub fn display_width(s: &str) -> usize {
    s.graphemes(true).map(grapheme_width).sum()
}

fn grapheme_width(g: &str) -> usize {
    if g.chars().all(char::is_control) {
        return 1;
    }
    UnicodeWidthStr::width(g)
}

/// Cut `s` to at most `max_cells` cells, ending with `…` when anything was
/// dropped. Never splits a grapheme cluster.
pub fn truncate_to_width(s: &str, max_cells: usize) -> String {
    if display_width(s) <= max_cells {
        return s.to_string();
    }
    if max_cells == 0 {
        return String::new();
    }
    let budget = max_cells - 1;
    let mut used = 0;
    let mut out = String::new();
    for g in s.graphemes(true) {
        let w = grapheme_width(g);
        if used + w > budget {
            break;
        }
        used += w;
        out.push_str(g);
    }
    out.push(ELLIPSIS);
    out
}

/// Pad with spaces to exactly `cells` wide (after truncating).
pub fn pad_to_width(s: &str, cells: usize) -> String {
    let mut out = truncate_to_width(s, cells);
    let width = display_width(&out);
    out.extend(std::iter::repeat_n(' ', cells.saturating_sub(width)));
    out
}

/// One-line preview of a multi-line text: first non-blank line, whitespace
/// runs collapsed, truncated to `max_cells`. A text with more lines gets `…`.
pub fn preview(text: &str, max_cells: usize) -> String {
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    let Some(first) = lines.next() else {
        return String::new();
    };
    let mut line = first.split_whitespace().collect::<Vec<_>>().join(" ");
    if lines.next().is_some() {
        line.push(' ');
        line.push(ELLIPSIS);
    }
    truncate_to_width(&line, max_cells)
}
