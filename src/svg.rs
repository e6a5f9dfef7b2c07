use crate::colors::language_color;
use crate::stats::{AggregateStats, LanguageTally};

const CARD_WIDTH: f64 = 420.0;
const PADDING_X: f64 = 25.0;
const FONT_FAMILY: &str = "Segoe UI, Ubuntu, sans-serif";

const STATS_TOP: f64 = 50.0;
const STATS_ROW_HEIGHT: f64 = 30.0;

const TOP_LANGUAGES: usize = 10;
const BAR_Y: f64 = 45.0;
const BAR_HEIGHT: f64 = 8.0;
const BAR_WIDTH: f64 = CARD_WIDTH - 2.0 * PADDING_X;
const LABELS_TOP: f64 = 70.0;
const LABEL_ROW_HEIGHT: f64 = 25.0;

const BOTTOM_PADDING: f64 = 20.0;

// White on transparent, for dark profile pages
const TITLE_COLOR: &str = "#ffffff";
const TEXT_COLOR: &str = "#ffffff";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardOptions {
    pub title: String,
}

// Document model

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Start,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Text {
    pub x: f64,
    pub y: f64,
    pub content: String,
    pub size: u32,
    pub fill: String,
    pub bold: bool,
    pub anchor: Anchor,
}

impl Text {
    fn new(x: f64, y: f64, content: impl Into<String>, size: u32, fill: &str) -> Self {
        Self {
            x,
            y,
            content: content.into(),
            size,
            fill: fill.to_string(),
            bold: false,
            anchor: Anchor::Start,
        }
    }

    fn bold(mut self) -> Self {
        self.bold = true;
        self
    }

    fn anchored_end(mut self) -> Self {
        self.anchor = Anchor::End;
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Text(Text),
    Rect {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
        fill: String,
        rx: f64,
    },
    Circle {
        cx: f64,
        cy: f64,
        r: f64,
        fill: String,
    },
    /// Children positioned relative to `(x, y)`.
    Group {
        x: f64,
        y: f64,
        children: Vec<Element>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub width: f64,
    pub height: f64,
    pub elements: Vec<Element>,
}

impl Document {
    pub fn to_svg(&self) -> String {
        let (w, h) = (num(self.width), num(self.height));
        let mut out = format!(
            "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{w}\" height=\"{h}\" viewBox=\"0 0 {w} {h}\" fill=\"none\">\n"
        );
        for element in &self.elements {
            write_element(&mut out, element, 1);
        }
        out.push_str("</svg>\n");
        out
    }

    /// All text content in document order, groups included.
    #[cfg(test)]
    pub fn texts(&self) -> Vec<&Text> {
        fn walk<'a>(elements: &'a [Element], out: &mut Vec<&'a Text>) {
            for e in elements {
                match e {
                    Element::Text(t) => out.push(t),
                    Element::Group { children, .. } => walk(children, out),
                    _ => {}
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.elements, &mut out);
        out
    }
}

fn write_element(out: &mut String, element: &Element, depth: usize) {
    let indent = "    ".repeat(depth);
    match element {
        Element::Text(t) => {
            let mut attrs = format!(
                "x=\"{}\" y=\"{}\" fill=\"{}\" font-size=\"{}\" font-family=\"{FONT_FAMILY}\"",
                num(t.x),
                num(t.y),
                t.fill,
                t.size
            );
            if t.anchor == Anchor::End {
                attrs.push_str(" text-anchor=\"end\"");
            }
            if t.bold {
                attrs.push_str(" font-weight=\"bold\"");
            }
            out.push_str(&format!(
                "{indent}<text {attrs}>{}</text>\n",
                escape_xml(&t.content)
            ));
        }
        Element::Rect {
            x,
            y,
            width,
            height,
            fill,
            rx,
        } => out.push_str(&format!(
            "{indent}<rect x=\"{}\" y=\"{}\" width=\"{}\" height=\"{}\" fill=\"{fill}\" rx=\"{}\"/>\n",
            num(*x),
            num(*y),
            num(*width),
            num(*height),
            num(*rx)
        )),
        Element::Circle { cx, cy, r, fill } => out.push_str(&format!(
            "{indent}<circle cx=\"{}\" cy=\"{}\" r=\"{}\" fill=\"{fill}\"/>\n",
            num(*cx),
            num(*cy),
            num(*r)
        )),
        Element::Group { x, y, children } => {
            out.push_str(&format!(
                "{indent}<g transform=\"translate({}, {})\">\n",
                num(*x),
                num(*y)
            ));
            for child in children {
                write_element(out, child, depth + 1);
            }
            out.push_str(&format!("{indent}</g>\n"));
        }
    }
}

/// Formats a coordinate with at most two decimals, trailing zeros trimmed.
fn num(v: f64) -> String {
    let s = format!("{v:.2}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Abbreviates large numbers: `1234` -> `1.2k`, `2_500_000` -> `2.5M`.
///
/// Values that would round up to `1000.0k` are shown in millions instead.
pub fn format_number(n: u64) -> String {
    let tenths_of_k = (n as f64 / 100.0).round() as u64;
    if n >= 1_000_000 || tenths_of_k >= 10_000 {
        format!("{:.1}M", n as f64 / 1_000_000.0)
    } else if n >= 1_000 {
        format!("{:.1}k", n as f64 / 1_000.0)
    } else {
        n.to_string()
    }
}

// Statistics card

pub fn render_stats_card(stats: &AggregateStats, options: &CardOptions) -> Document {
    let rows = [
        ("⭐", "Total Stars Earned", stats.stars),
        ("📝", "Total Commits", stats.commits),
        ("🔀", "Total PRs", stats.pull_requests),
        ("❗", "Total Issues", stats.issues),
        ("±", "Lines of Code Changed", stats.lines_changed),
    ];

    let mut elements = vec![Element::Text(
        Text::new(PADDING_X, 30.0, options.title.as_str(), 18, TITLE_COLOR).bold(),
    )];

    for (i, (icon, label, value)) in rows.iter().enumerate() {
        elements.push(Element::Group {
            x: 0.0,
            y: STATS_TOP + i as f64 * STATS_ROW_HEIGHT,
            children: vec![
                Element::Text(Text::new(PADDING_X, 0.0, *icon, 14, TEXT_COLOR)),
                Element::Text(Text::new(50.0, 0.0, format!("{label}:"), 14, TEXT_COLOR)),
                Element::Text(
                    Text::new(
                        CARD_WIDTH - 30.0,
                        0.0,
                        format_number(*value),
                        14,
                        TEXT_COLOR,
                    )
                    .anchored_end()
                    .bold(),
                ),
            ],
        });
    }

    Document {
        width: CARD_WIDTH,
        height: STATS_TOP + rows.len() as f64 * STATS_ROW_HEIGHT + BOTTOM_PADDING,
        elements,
    }
}

// Languages card

#[derive(Debug, Clone, PartialEq)]
pub struct LanguageShare {
    pub name: String,
    pub bytes: u64,
    /// Share of the displayed languages, not of the whole tally.
    pub percent: f64,
    pub color: &'static str,
}

/// The top languages with their share of the top-N byte total.
///
/// Empty when there is no language data.
pub fn language_shares(languages: &LanguageTally) -> Vec<LanguageShare> {
    if languages.is_empty() {
        return Vec::new();
    }

    let top = languages.top(TOP_LANGUAGES);
    let total: u64 = top.iter().map(|(_, bytes)| bytes).sum();
    if total == 0 {
        return Vec::new();
    }

    top.into_iter()
        .map(|(name, bytes)| LanguageShare {
            name: name.to_string(),
            bytes,
            percent: bytes as f64 * 100.0 / total as f64,
            color: language_color(name),
        })
        .collect()
}

pub fn render_languages_card(languages: &LanguageTally) -> Document {
    let shares = language_shares(languages);

    let mut elements = vec![Element::Text(
        Text::new(PADDING_X, 30.0, "Most Used Languages", 18, TITLE_COLOR).bold(),
    )];

    if shares.is_empty() {
        elements.push(Element::Text(Text::new(
            PADDING_X,
            60.0,
            "No language data",
            12,
            TEXT_COLOR,
        )));
        return Document {
            width: CARD_WIDTH,
            height: LABELS_TOP + BOTTOM_PADDING,
            elements,
        };
    }

    let total: u64 = shares.iter().map(|s| s.bytes).sum();
    let mut x_offset = PADDING_X;
    for share in &shares {
        let width = share.bytes as f64 * BAR_WIDTH / total as f64;
        elements.push(Element::Rect {
            x: x_offset,
            y: BAR_Y,
            width,
            height: BAR_HEIGHT,
            fill: share.color.to_string(),
            rx: 1.0,
        });
        x_offset += width;
    }

    let col_width = BAR_WIDTH / 2.0;
    for (i, share) in shares.iter().enumerate() {
        let (row, col) = (i / 2, i % 2);
        elements.push(Element::Group {
            x: PADDING_X + col as f64 * col_width,
            y: LABELS_TOP + row as f64 * LABEL_ROW_HEIGHT,
            children: vec![
                Element::Circle {
                    cx: 6.0,
                    cy: -4.0,
                    r: 6.0,
                    fill: share.color.to_string(),
                },
                Element::Text(Text::new(
                    18.0,
                    0.0,
                    format!("{} {:.2}%", share.name, share.percent),
                    12,
                    TEXT_COLOR,
                )),
            ],
        });
    }

    let rows = shares.len().div_ceil(2);
    Document {
        width: CARD_WIDTH,
        height: LABELS_TOP + rows as f64 * LABEL_ROW_HEIGHT + BOTTOM_PADDING,
        elements,
    }
}
