//! Glob search over a formatted snapshot.
//!
//! A query is one or more terms separated by `|`. Within a term `*` matches
//! any run of characters, `?` matches one character and `\` escapes the next
//! character. A term matches a line when it matches any substring of the
//! line's content (role, name, uid, attributes), ignoring case.

use regex::Regex;

use super::format::{format_lines, FormattedLine};
use super::snapshot::Snapshot;

const GAP_MARKER: &str = "...";

#[derive(Debug, Clone)]
pub struct SearchQuery {
    terms: Vec<Regex>,
}

impl SearchQuery {
    /// `None` when the query holds no usable term.
    pub fn parse(query: &str) -> Option<Self> {
        let terms: Vec<Regex> = split_terms(query)
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .filter_map(|t| Regex::new(&glob_to_regex(t)).ok())
            .collect();
        if terms.is_empty() {
            None
        } else {
            Some(Self { terms })
        }
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.terms.iter().any(|re| re.is_match(text))
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }
}

/// Split on `|` that is not escaped. Escapes are kept for the glob pass.
fn split_terms(query: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut current = String::new();
    let mut chars = query.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                current.push('\\');
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            '|' => terms.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    terms.push(current);
    terms
}

fn glob_to_regex(term: &str) -> String {
    let mut pattern = String::from("(?i)");
    let mut chars = term.chars();
    while let Some(c) = chars.next() {
        match c {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            '\\' => match chars.next() {
                Some(next) => pattern.push_str(&regex::escape(&next.to_string())),
                None => pattern.push_str(&regex::escape("\\")),
            },
            _ => pattern.push_str(&regex::escape(&c.to_string())),
        }
    }
    pattern
}

/// Matching lines plus `context_levels` lines either side, in document order.
/// Overlapping windows are merged; separate groups are divided by `...`.
pub fn search_snapshot(snapshot: &Snapshot, query: &str, context_levels: usize) -> Option<String> {
    let query = SearchQuery::parse(query)?;
    let lines = format_lines(snapshot);
    search_lines(&lines, &query, context_levels)
}

fn search_lines(lines: &[FormattedLine], query: &SearchQuery, context_levels: usize) -> Option<String> {
    let mut included = vec![false; lines.len()];
    let mut any = false;
    for (i, line) in lines.iter().enumerate() {
        if query.is_match(&line.content) {
            any = true;
            let lo = i.saturating_sub(context_levels);
            let hi = i.saturating_add(context_levels).min(lines.len() - 1);
            for flag in &mut included[lo..=hi] {
                *flag = true;
            }
        }
    }
    if !any {
        return None;
    }

    let mut output = String::new();
    let mut previous: Option<usize> = None;
    for (i, line) in lines.iter().enumerate() {
        if !included[i] {
            continue;
        }
        if let Some(p) = previous {
            if i > p + 1 {
                output.push_str(GAP_MARKER);
                output.push('\n');
            }
        }
        output.push_str(&line.render());
        output.push('\n');
        previous = Some(i);
    }
    Some(output)
}
