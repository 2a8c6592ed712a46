//! Drawing vocabulary for content burned into exported pages.
//!
//! Coordinates are PDF user space relative to the lower-left corner of the
//! page's MediaBox (y grows upward), in points.

use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite;

/// Name of the standard font registered in every overlay's resources.
pub(crate) const OVERLAY_FONT: &str = "AnnotF1";

const KAPPA: f32 = 0.552_284_8;

/// Normalized RGB color (0.0 to 1.0 per channel).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0.0, g: 0.0, b: 0.0 };

    pub fn from_u8(r: u8, g: u8, b: u8) -> Self {
        Self { r: r as f32 / 255.0, g: g as f32 / 255.0, b: b as f32 / 255.0 }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Filled rectangle with constant fill alpha.
    FillRect { x: f32, y: f32, width: f32, height: f32, color: Rgb, opacity: f32 },
    /// Stroked rectangle outline.
    StrokeRect { x: f32, y: f32, width: f32, height: f32, color: Rgb, line_width: f32 },
    /// Filled and stroked circle.
    Circle { cx: f32, cy: f32, radius: f32, fill: Rgb, stroke: Rgb, line_width: f32 },
    /// Lines of Helvetica text. `y` is the baseline of the first line.
    Text { x: f32, y: f32, size: f32, line_height: f32, color: Rgb, lines: Vec<String> },
}

/// Everything drawn onto one page, plus an optional new page size.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageOverlay {
    pub page_index: u32,
    /// New MediaBox extent, keeping the existing lower-left origin.
    pub resize: Option<(f32, f32)>,
    pub commands: Vec<DrawCommand>,
}

impl PageOverlay {
    pub fn new(page_index: u32) -> Self {
        Self { page_index, ..Default::default() }
    }

    pub fn is_empty(&self) -> bool {
        self.resize.is_none() && self.commands.is_empty()
    }
}

/// Content stream for an overlay together with the fill alphas it references.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EncodedOverlay {
    pub content: Vec<u8>,
    /// Graphics-state resource name to fill alpha.
    pub alpha_states: BTreeMap<String, f32>,
}

pub(crate) fn encode_commands(commands: &[DrawCommand]) -> Result<EncodedOverlay, std::fmt::Error> {
    let mut stream = String::new();
    let mut alpha_states: BTreeMap<String, f32> = BTreeMap::new();

    for command in commands {
        match command {
            DrawCommand::FillRect { x, y, width, height, color, opacity } => {
                let opacity = opacity.clamp(0.0, 1.0);
                let state = format!("GSa{}", (opacity * 1000.0).round() as u32);
                alpha_states.entry(state.clone()).or_insert(opacity);

                writeln!(stream, "q /{state} gs")?;
                writeln!(stream, "{} rg", rgb_operands(*color))?;
                writeln!(stream, "{} re f Q", rect_operands(*x, *y, *width, *height))?;
            }
            DrawCommand::StrokeRect { x, y, width, height, color, line_width } => {
                writeln!(stream, "q {} RG {} w", rgb_operands(*color), num(*line_width))?;
                writeln!(stream, "{} re S Q", rect_operands(*x, *y, *width, *height))?;
            }
            DrawCommand::Circle { cx, cy, radius, fill, stroke, line_width } => {
                let (cx, cy, r) = (*cx, *cy, *radius);
                let k = r * KAPPA;

                writeln!(
                    stream,
                    "q {} rg {} RG {} w",
                    rgb_operands(*fill),
                    rgb_operands(*stroke),
                    num(*line_width)
                )?;
                writeln!(stream, "{} {} m", num(cx + r), num(cy))?;
                // Four quarter arcs, counter-clockwise from the rightmost point.
                for curve in [
                    [cx + r, cy + k, cx + k, cy + r, cx, cy + r],
                    [cx - k, cy + r, cx - r, cy + k, cx - r, cy],
                    [cx - r, cy - k, cx - k, cy - r, cx, cy - r],
                    [cx + k, cy - r, cx + r, cy - k, cx + r, cy],
                ] {
                    let operands: Vec<String> = curve.into_iter().map(num).collect();
                    writeln!(stream, "{} c", operands.join(" "))?;
                }
                writeln!(stream, "b Q")?;
            }
            DrawCommand::Text { x, y, size, line_height, color, lines } => {
                if lines.is_empty() {
                    continue;
                }
                writeln!(
                    stream,
                    "q BT {} rg /{OVERLAY_FONT} {} Tf {} TL",
                    rgb_operands(*color),
                    num(*size),
                    num(*line_height)
                )?;
                writeln!(stream, "{} {} Td", num(*x), num(*y))?;
                for (index, line) in lines.iter().enumerate() {
                    if index > 0 {
                        writeln!(stream, "T*")?;
                    }
                    writeln!(stream, "({}) Tj", escape_text(line))?;
                }
                writeln!(stream, "ET Q")?;
            }
        }
    }

    Ok(EncodedOverlay { content: stream.into_bytes(), alpha_states })
}

fn rgb_operands(color: Rgb) -> String {
    format!("{} {} {}", num(color.r), num(color.g), num(color.b))
}

fn rect_operands(x: f32, y: f32, width: f32, height: f32) -> String {
    format!("{} {} {} {}", num(x), num(y), num(width), num(height))
}

/// Formats a number with at most three decimals and no trailing zeros.
fn num(value: f32) -> String {
    if !value.is_finite() {
        return "0".to_owned();
    }
    let rounded = (value * 1000.0).round() / 1000.0;
    let text = format!("{rounded:.3}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    match text {
        "-0" | "" => "0".to_owned(),
        other => other.to_owned(),
    }
}

/// Escapes a string for a PDF literal in WinAnsi encoding. Characters outside
/// Latin-1 become `?`; non-ASCII Latin-1 is written as octal escapes.
fn escape_text(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '(' | ')' | '\\' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            ' '..='~' => escaped.push(ch),
            '\u{a0}'..='\u{ff}' => {
                let _ = write!(escaped, "\\{:03o}", ch as u32);
            }
            '\t' => escaped.push(' '),
            _ => escaped.push('?'),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content_text(commands: &[DrawCommand]) -> String {
        let encoded = encode_commands(commands).expect("encoding should succeed");
        String::from_utf8(encoded.content).expect("content should be ascii")
    }

    #[test]
    fn formats_numbers_compactly() {
        assert_eq!(num(10.0), "10");
        assert_eq!(num(0.5), "0.5");
        assert_eq!(num(1.0 / 3.0), "0.333");
        assert_eq!(num(-0.0001), "0");
        assert_eq!(num(f32::NAN), "0");
    }

    #[test]
    fn fill_rect_registers_alpha_state() {
        let commands = vec![
            DrawCommand::FillRect {
                x: 1.0,
                y: 2.0,
                width: 3.0,
                height: 4.0,
                color: Rgb::BLACK,
                opacity: 0.548,
            },
            DrawCommand::FillRect {
                x: 5.0,
                y: 6.0,
                width: 7.0,
                height: 8.0,
                color: Rgb::BLACK,
                opacity: 0.548,
            },
        ];
        let encoded = encode_commands(&commands).expect("encoding should succeed");

        assert_eq!(encoded.alpha_states.len(), 1);
        assert_eq!(encoded.alpha_states.get("GSa548"), Some(&0.548));

        let text = String::from_utf8(encoded.content).expect("ascii");
        assert!(text.contains("/GSa548 gs"));
        assert!(text.contains("1 2 3 4 re f Q"));
    }

    #[test]
    fn circle_is_four_bezier_segments() {
        let text = content_text(&[DrawCommand::Circle {
            cx: 10.0,
            cy: 10.0,
            radius: 5.0,
            fill: Rgb::from_u8(255, 0, 0),
            stroke: Rgb::BLACK,
            line_width: 1.0,
        }]);

        assert!(text.starts_with("q 1 0 0 rg 0 0 0 RG 1 w\n15 10 m\n"));
        assert_eq!(text.matches(" c\n").count(), 4);
        assert!(text.ends_with("b Q\n"));
    }

    #[test]
    fn text_lines_are_escaped_and_stepped() {
        let text = content_text(&[DrawCommand::Text {
            x: 12.0,
            y: 40.0,
            size: 10.0,
            line_height: 10.0,
            color: Rgb::BLACK,
            lines: vec!["Annotated: [ (a) ]".to_owned(), "caf\u{e9} \u{4e2d}".to_owned()],
        }]);

        assert!(text.contains(&format!("/{OVERLAY_FONT} 10 Tf 10 TL")));
        assert!(text.contains("(Annotated: [ \\(a\\) ]) Tj\nT*\n(caf\\351 ?) Tj"));
    }

    #[test]
    fn empty_text_is_skipped() {
        let text = content_text(&[DrawCommand::Text {
            x: 0.0,
            y: 0.0,
            size: 10.0,
            line_height: 10.0,
            color: Rgb::BLACK,
            lines: Vec::new(),
        }]);
        assert!(text.is_empty());
    }
}
