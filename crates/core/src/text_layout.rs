//! Text measurement and wrapping for notation boxes
//!
//! Widths are estimated from an average glyph width rather than real font
//! metrics. The same estimate sizes the on-screen box and the exported text, so
//! the two stay consistent.

/// Configuration for wrapping text into a fixed-width column
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutConfig {
    /// Font size in points
    pub font_size: f64,

    /// Column width in points
    pub max_width: f64,

    /// Line height multiplier (typically 1.2 for normal spacing)
    pub line_height_multiplier: f64,

    /// Average character width ratio (relative to font size)
    pub char_width_ratio: f64,
}

impl LayoutConfig {
    pub fn new(font_size: f64, max_width: f64) -> Self {
        Self { font_size, max_width, line_height_multiplier: 1.2, char_width_ratio: 0.6 }
    }

    pub fn line_height(&self) -> f64 {
        self.font_size * self.line_height_multiplier
    }

    /// How many characters fit on one line; never less than one.
    pub fn chars_per_line(&self) -> usize {
        let avg_char_width = self.font_size * self.char_width_ratio;
        if avg_char_width <= 0.0 {
            return usize::MAX;
        }
        ((self.max_width / avg_char_width).floor() as usize).max(1)
    }
}

/// Wraps text to the configured column. Explicit newlines start new lines and
/// blank lines are kept.
pub fn wrap(text: &str, config: &LayoutConfig) -> Vec<String> {
    let chars_per_line = config.chars_per_line();
    text.split('\n')
        .flat_map(|paragraph| wrap_text(paragraph.trim_end_matches('\r'), chars_per_line))
        .collect()
}

/// Wrap text into multiple lines, respecting word boundaries
///
/// Greedy: words are kept together when they fit, and words longer than a
/// line are split across lines. Always returns at least one line.
pub fn wrap_text(text: &str, chars_per_line: usize) -> Vec<String> {
    let chars_per_line = chars_per_line.max(1);
    let mut lines = Vec::new();
    let mut current_line = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();

        if current_len > 0 && current_len + 1 + word_len <= chars_per_line {
            current_line.push(' ');
            current_line.push_str(word);
            current_len += 1 + word_len;
            continue;
        }

        if current_len > 0 {
            lines.push(std::mem::take(&mut current_line));
            current_len = 0;
        }

        if word_len <= chars_per_line {
            current_line.push_str(word);
            current_len = word_len;
            continue;
        }

        // Word is too long, split it
        let chars: Vec<char> = word.chars().collect();
        let mut chunks = chars.chunks(chars_per_line).peekable();
        while let Some(chunk) = chunks.next() {
            let piece: String = chunk.iter().collect();
            if chunks.peek().is_some() {
                lines.push(piece);
            } else {
                current_len = chunk.len();
                current_line = piece;
            }
        }
    }

    if current_len > 0 || lines.is_empty() {
        lines.push(current_line);
    }

    lines
}
