//! Changelog section lookup by version.
//!
//! Release notes live in a markdown changelog where every release gets its
//! own heading. Both ATX (`## 1.2.3`) and setext (`1.2.3` underlined with
//! `===` or `---`) heading forms are recognized.

use crate::version;

/// A changelog section: the heading text and the body up to the next heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Changeset {
    pub name: String,
    pub body: String,
}

#[derive(Debug)]
struct Heading {
    /// Trimmed heading text.
    text: String,
    /// Index of the first body line (past the heading and any underline).
    body_start: usize,
    /// Index of the heading line itself.
    line: usize,
}

/// Locate the changelog section whose heading parses to the same version as
/// `tag`. Returns `None` when the tag is not a version or no section matches.
pub fn find_changeset(markdown: &str, tag: &str) -> Option<Changeset> {
    let target = version::parse(tag)?;
    let lines: Vec<&str> = markdown.lines().collect();
    let headings = collect_headings(&lines);

    for (index, heading) in headings.iter().enumerate() {
        let Some(found) = version::parse(&heading.text) else {
            continue;
        };
        if found != target {
            continue;
        }

        let body_end = headings
            .get(index + 1)
            .map(|next| next.line)
            .unwrap_or(lines.len());
        let body = lines[heading.body_start..body_end].join("\n");

        return Some(Changeset {
            name: heading.text.clone(),
            body: body.trim().to_string(),
        });
    }

    None
}

fn collect_headings(lines: &[&str]) -> Vec<Heading> {
    let mut headings = Vec::new();
    let mut skip_next = false;

    for (index, line) in lines.iter().enumerate() {
        if skip_next {
            skip_next = false;
            continue;
        }

        if let Some(text) = line.strip_prefix("## ") {
            headings.push(Heading {
                text: text.trim().to_string(),
                body_start: index + 1,
                line: index,
            });
            continue;
        }

        // Setext form: a non-empty line followed by an underline of = or -.
        if !line.trim().is_empty() && !line.starts_with('#') {
            if let Some(next) = lines.get(index + 1) {
                if is_underline(next) {
                    headings.push(Heading {
                        text: line.trim().to_string(),
                        body_start: index + 2,
                        line: index,
                    });
                    skip_next = true;
                }
            }
        }
    }

    headings
}

fn is_underline(line: &str) -> bool {
    let trimmed = line.trim_end();
    trimmed.len() >= 3
        && (trimmed.chars().all(|c| c == '=') || trimmed.chars().all(|c| c == '-'))
}
