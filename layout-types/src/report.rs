//! Hierarchical textual report written by jobs and operations

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

/// A titled block of output lines with nested child reports
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    pub lines: Vec<String>,
    pub status: Option<String>,
    pub children: Vec<Report>,
}

impl Report {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Append one output line
    pub fn line(&mut self, text: impl Into<String>) {
        let text = text.into();
        tracing::debug!(report = %self.title, "{text}");
        self.lines.push(text);
    }

    /// Start a nested report and return it for writing
    pub fn child(&mut self, title: impl Into<String>) -> &mut Report {
        let index = self.children.len();
        self.children.push(Report::new(title));
        &mut self.children[index]
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = Some(status.into());
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.children.is_empty()
    }

    /// Render as indented plain text
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        self.render(&mut out, 0);
        out
    }

    fn render(&self, out: &mut String, depth: usize) {
        let indent = "  ".repeat(depth);
        if !self.title.is_empty() {
            let _ = match &self.status {
                Some(status) => writeln!(out, "{indent}{}: {status}", self.title),
                None => writeln!(out, "{indent}{}", self.title),
            };
        }
        for line in &self.lines {
            let _ = writeln!(out, "{indent}  {line}");
        }
        for child in &self.children {
            child.render(out, depth + 1);
        }
    }
}
