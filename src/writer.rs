//! Default output writer: `index.html` (or `index.md`) plus `codelab.json`.
//!
//! The rendering here is intentionally plain; it exists so the binary produces
//! a browsable export. The metadata record is always written last, after the
//! content, so a directory with a fresh record also has fresh content.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::contract::{BoxError, Codelab, OutputWriter};
use crate::meta::{write_meta, ContextMeta};

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Renders a codelab as a single HTML page.
pub fn render_html(codelab: &Codelab, record: &ContextMeta) -> String {
    let ctx = &record.context;
    let mut html = String::new();
    html.push_str("<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str(&format!("<title>{}</title>\n", escape(&codelab.meta.title)));
    if !ctx.prefix.is_empty() {
        html.push_str(&format!("<base href=\"{}\">\n", escape(&ctx.prefix)));
    }
    html.push_str("</head>\n<body>\n");
    html.push_str(&format!(
        "<google-codelab id=\"{}\" title=\"{}\" codelab-ga=\"{}\">\n",
        escape(&codelab.meta.id),
        escape(&codelab.meta.title),
        escape(&ctx.main_ga),
    ));
    for step in &codelab.steps {
        html.push_str(&format!(
            "<google-codelab-step label=\"{}\">\n",
            escape(&step.title)
        ));
        for image in &step.images {
            html.push_str(&format!("<img src=\"{}\">\n", escape(image)));
        }
        html.push_str(&format!("<pre>{}</pre>\n", escape(&step.body)));
        html.push_str("</google-codelab-step>\n");
    }
    html.push_str("</google-codelab>\n</body>\n</html>\n");
    html
}

/// Renders a codelab back to codelab markdown.
pub fn render_markdown(codelab: &Codelab) -> String {
    let meta = &codelab.meta;
    let mut md = format!("id: {}\n", meta.id);
    if !meta.summary.is_empty() {
        md.push_str(&format!("summary: {}\n", meta.summary));
    }
    if !meta.category.is_empty() {
        md.push_str(&format!("categories: {}\n", meta.category.join(", ")));
    }
    md.push_str(&format!("\n# {}\n", meta.title));
    for step in &codelab.steps {
        md.push_str(&format!("\n## {}\n{}\n", step.title, step.body));
    }
    md
}

/// Writes rendered content and the metadata record into the codelab directory.
#[derive(Debug, Default)]
pub struct FsOutputWriter;

#[async_trait]
impl OutputWriter for FsOutputWriter {
    async fn write(
        &self,
        dir: &Path,
        codelab: &Codelab,
        record: &ContextMeta,
    ) -> Result<(), BoxError> {
        tokio::fs::create_dir_all(dir).await?;
        let (name, content) = match record.context.format.as_str() {
            "md" | "markdown" => ("index.md", render_markdown(codelab)),
            _ => ("index.html", render_html(codelab, record)),
        };
        tokio::fs::write(dir.join(name), content).await?;
        let (meta_dir, meta_record) = (dir.to_path_buf(), record.clone());
        let meta = tokio::task::spawn_blocking(move || write_meta(&meta_dir, &meta_record)).await??;
        debug!(dir = %dir.display(), file = name, meta = %meta.display(), "Wrote codelab output");
        Ok(())
    }
}
