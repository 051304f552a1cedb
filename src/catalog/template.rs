// src/catalog/template.rs

use std::fmt;

/// The closed set of placeholders a URL pattern may carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    Year,
    Month,
    Day,
    DatasetName,
}

impl Placeholder {
    const ALL: [Placeholder; 4] = [
        Placeholder::Year,
        Placeholder::Month,
        Placeholder::Day,
        Placeholder::DatasetName,
    ];

    /// Token text without the surrounding braces.
    pub fn token(self) -> &'static str {
        match self {
            Placeholder::Year => "YYYY",
            Placeholder::Month => "MM",
            Placeholder::Day => "DD",
            Placeholder::DatasetName => "dataset-name",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.token() == token)
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.token())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(Placeholder),
}

/// Values substituted into a template for one grid cell.
#[derive(Debug, Clone, Copy)]
pub struct Bindings<'a> {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub dataset_key: &'a str,
}

impl Bindings<'_> {
    fn write_slot(&self, slot: Placeholder, out: &mut String) {
        use std::fmt::Write;
        // writing into a String cannot fail
        let _ = match slot {
            Placeholder::Year => write!(out, "{:04}", self.year),
            Placeholder::Month => write!(out, "{:02}", self.month),
            Placeholder::Day => write!(out, "{:02}", self.day),
            Placeholder::DatasetName => {
                out.push_str(self.dataset_key);
                Ok(())
            }
        };
    }
}

/// A URL pattern split once into literal text and named slots.
///
/// Braced text that is not one of the known tokens stays literal, and
/// substituted values are never scanned again, so a dataset key such as
/// `"x{MM}"` is emitted verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlTemplate {
    raw: String,
    segments: Vec<Segment>,
}

impl UrlTemplate {
    pub fn parse(pattern: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = pattern;

        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after
                .find('}')
                .and_then(|close| Placeholder::from_token(&after[..close]).map(|p| (p, close)))
            {
                Some((slot, close)) => {
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Slot(slot));
                    rest = &after[close + 1..];
                }
                None => {
                    literal.push('{');
                    rest = after;
                }
            }
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Self {
            raw: pattern.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn has(&self, slot: Placeholder) -> bool {
        self.segments.iter().any(|s| *s == Segment::Slot(slot))
    }

    pub fn render(&self, bindings: &Bindings<'_>) -> String {
        let mut out = String::with_capacity(self.raw.len() + 16);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(slot) => bindings.write_slot(*slot, &mut out),
            }
        }
        out
    }
}

impl From<&str> for UrlTemplate {
    fn from(pattern: &str) -> Self {
        Self::parse(pattern)
    }
}

impl From<String> for UrlTemplate {
    fn from(pattern: String) -> Self {
        Self::parse(&pattern)
    }
}
