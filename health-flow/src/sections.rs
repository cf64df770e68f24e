//! Splits generated free text into titled bullet lists.
//!
//! The format is a contract shared with the prompt templates: each heading
//! literal on its own line, followed by lines starting with the bullet
//! marker. Parsing tolerates drift (lead-in prose under a heading, bullets
//! wrapped across lines) but stays lossy: text that belongs to no known
//! heading is dropped, never reported.

use serde::{Deserialize, Serialize};

pub const BULLET_MARKER: char = '*';

pub const BLOOD_REPORT_HEADINGS: &[&str] = &[
    "Results Interpretation",
    "What It Means for Health",
    "Next Steps/Questions for Provider",
];

/// The blood report layout shared by the renderer and the parser.
pub const BLOOD_REPORT_FORMAT: SectionFormat = SectionFormat {
    headings: BLOOD_REPORT_HEADINGS,
    marker: BULLET_MARKER,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedSection {
    pub title: String,
    pub bullets: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionFormat {
    pub headings: &'static [&'static str],
    pub marker: char,
}

impl SectionFormat {
    /// Partition `text` into sections keyed by the known headings.
    ///
    /// Output order is the order in which each heading first appears. A
    /// heading that occurs again appends to its first section. Sections
    /// with no bullets are omitted.
    pub fn parse(&self, text: &str) -> Vec<ParsedSection> {
        let text = unescape_newlines(text);
        let occurrences = self.heading_occurrences(&text);

        let mut sections: Vec<ParsedSection> = Vec::new();
        for (i, &(start, heading)) in occurrences.iter().enumerate() {
            let body_start = start + heading.len();
            let body_end = occurrences
                .get(i + 1)
                .map(|&(next, _)| next)
                .unwrap_or(text.len());
            let bullets = self.bullets(&text[body_start..body_end]);

            match sections.iter_mut().find(|s| s.title == heading) {
                Some(section) => section.bullets.extend(bullets),
                None => sections.push(ParsedSection {
                    title: heading.to_string(),
                    bullets,
                }),
            }
        }

        sections.retain(|s| !s.bullets.is_empty());
        sections
    }

    /// Write sections back out in the canonical layout.
    pub fn render(&self, sections: &[ParsedSection]) -> String {
        let mut out = String::new();
        for section in sections {
            out.push_str(&section.title);
            out.push('\n');
            for bullet in &section.bullets {
                out.push(self.marker);
                out.push(' ');
                out.push_str(bullet);
                out.push('\n');
            }
        }
        out
    }

    /// Byte offsets of every heading occurrence, sorted, without overlaps.
    fn heading_occurrences(&self, text: &str) -> Vec<(usize, &'static str)> {
        let mut found: Vec<(usize, &'static str)> = self
            .headings
            .iter()
            .flat_map(|&heading| text.match_indices(heading).map(move |(i, _)| (i, heading)))
            .collect();
        found.sort_by_key(|&(start, heading)| (start, std::cmp::Reverse(heading.len())));

        let mut kept: Vec<(usize, &'static str)> = Vec::with_capacity(found.len());
        let mut covered_until = 0;
        for (start, heading) in found {
            if start < covered_until {
                continue;
            }
            covered_until = start + heading.len();
            kept.push((start, heading));
        }
        kept
    }

    /// Bullets of one section body.
    ///
    /// Lines before the first bullet are lead-in and skipped. After a bullet,
    /// a non-marker line that is indented or starts in lower case continues
    /// that bullet; any other non-marker line is an unknown heading and ends
    /// the section, so content under it is not attached here.
    fn bullets(&self, body: &str) -> Vec<String> {
        let mut lines = body.split('\n');
        let mut bullets = Vec::new();

        // Remainder of the heading line: anything before the first marker is
        // decoration such as ':' or '**'.
        if let Some((_, rest)) = lines.next().and_then(|l| l.split_once(self.marker)) {
            self.push_fragments(rest, &mut bullets);
        }

        for raw in lines {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with(self.marker) {
                self.push_fragments(line, &mut bullets);
                continue;
            }
            let Some(last) = bullets.last_mut() else {
                continue;
            };
            if !is_continuation(raw) {
                break;
            }
            // Marker fragments inside a wrapped line still start new bullets.
            let mut fragments = line.split(self.marker).map(str::trim);
            if let Some(head) = fragments.next().filter(|f| !f.is_empty()) {
                last.push(' ');
                last.push_str(head);
            }
            bullets.extend(fragments.filter(|f| !f.is_empty()).map(str::to_string));
        }
        bullets
    }

    fn push_fragments(&self, line: &str, bullets: &mut Vec<String>) {
        bullets.extend(
            line.split(self.marker)
                .map(str::trim)
                .filter(|fragment| !fragment.is_empty())
                .map(str::to_string),
        );
    }
}

fn is_continuation(raw: &str) -> bool {
    raw.starts_with(char::is_whitespace)
        || raw
            .trim_start()
            .starts_with(|c: char| !c.is_uppercase() && c != '#')
}

/// Models sometimes emit escaped newlines inside JSON strings. Text that
/// already has real line breaks is left alone so literal `\n` survives.
fn unescape_newlines(text: &str) -> std::borrow::Cow<'_, str> {
    if text.contains('\n') || !text.contains("\\n") {
        std::borrow::Cow::Borrowed(text)
    } else {
        std::borrow::Cow::Owned(text.replace("\\n", "\n"))
    }
}

/// Parse with the default bullet marker.
pub fn parse_sections(text: &str, headings: &'static [&'static str]) -> Vec<ParsedSection> {
    SectionFormat {
        headings,
        marker: BULLET_MARKER,
    }
    .parse(text)
}
