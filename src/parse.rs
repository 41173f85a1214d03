//! Minimal codelab markdown reader.
//!
//! Understands just enough of the codelab markdown layout for republishing:
//!
//! ```text
//! id: my-codelab
//! summary: What you will build
//! categories: web, android
//!
//! # Title
//!
//! ## First step
//! Text with ![an image](img/screen.png)
//! ```
//!
//! Header lines are `key: value` pairs before the title. Every `## ` heading
//! starts a step. Anything else is kept verbatim in the step body.

use std::sync::OnceLock;

use regex::Regex;

use crate::contract::{Codelab, Step};
use crate::meta::Meta;

pub(crate) fn image_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"!\[[^\]]*\]\(\s*([^)\s]+)(?:\s+"[^"]*")?\s*\)"#).expect("valid image regex")
    })
}

fn list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Image references in `text`, in order of appearance.
pub fn image_refs(text: &str) -> Vec<String> {
    image_regex()
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

/// Parses a codelab markdown document.
pub fn parse_markdown(text: &str) -> Codelab {
    let mut meta = Meta::default();
    let mut steps: Vec<Step> = Vec::new();
    let mut in_header = true;

    for line in text.lines() {
        if let Some(title) = line.strip_prefix("## ") {
            in_header = false;
            steps.push(Step {
                title: title.trim().to_string(),
                ..Default::default()
            });
            continue;
        }
        if let Some(title) = line.strip_prefix("# ") {
            in_header = false;
            meta.title = title.trim().to_string();
            continue;
        }
        if in_header {
            if let Some((key, value)) = line.split_once(':') {
                let value = value.trim();
                match key.trim().to_ascii_lowercase().as_str() {
                    "id" => meta.id = value.to_string(),
                    "summary" => meta.summary = value.to_string(),
                    "authors" | "author" => meta.authors = value.to_string(),
                    "categories" | "category" => meta.category = list(value),
                    "tags" => meta.tags = list(value),
                    "status" => meta.status = list(value),
                    "feedback link" | "feedback" => meta.feedback = value.to_string(),
                    "url" => meta.url = value.to_string(),
                    _ => {}
                }
            }
            continue;
        }
        if let Some(step) = steps.last_mut() {
            step.body.push_str(line);
            step.body.push('\n');
        }
    }

    for step in &mut steps {
        step.body = step.body.trim().to_string();
        step.images = image_refs(&step.body);
    }
    Codelab { meta, steps }
}
