//! Markdown rendering of a [`ReportDocument`].
//!
//! Rendering never fails: blocks that cannot be shown are replaced by a
//! bracketed placeholder so the rest of the report still reads.

use dossier_core::document::{ContentBlock, ReportDocument};
use dossier_core::knowledge::AssetStore;
use std::fmt::Write;
use std::path::Path;
use tracing::warn;

/// Render `doc` as Markdown under a top-level `title`.
pub fn render_markdown(doc: &ReportDocument, title: &str, assets: &dyn AssetStore) -> String {
    let mut out = format!("# {title}\n");

    for section in doc.sections() {
        let _ = write!(out, "\n## {}\n", heading(section.title()));
        for block in section.blocks() {
            out.push('\n');
            out.push_str(&render_block(block, assets));
            out.push('\n');
        }
    }

    out
}

/// `risk_factors and outcomes` → `Risk Factors And Outcomes`.
pub fn heading(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut prev_letter = false;
    for ch in title.replace('_', " ").chars() {
        if ch.is_alphabetic() {
            if prev_letter {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_letter = true;
        } else {
            out.push(ch);
            prev_letter = false;
        }
    }
    out
}

fn render_block(block: &ContentBlock, assets: &dyn AssetStore) -> String {
    match block {
        ContentBlock::Text { content } if content.trim().is_empty() => "[Content missing]".into(),
        ContentBlock::Text { content } => content.trim_end().to_string(),
        ContentBlock::Image { path, caption } => match locate_image(path, assets) {
            Some(found) => format!("![{caption}]({found})\n\n*Figure: {caption}*"),
            None => {
                warn!(path = %path, "Image path not found");
                format!("[Image not found: {caption}]")
            }
        },
        ContentBlock::Table { rows, caption } => render_table(rows, caption),
    }
}

fn locate_image(path: &str, assets: &dyn AssetStore) -> Option<String> {
    if path.is_empty() {
        return None;
    }
    if Path::new(path).is_file() {
        return Some(path.to_string());
    }
    assets
        .exists(path)
        .then(|| assets.resolve(path).display().to_string())
}

fn render_table(rows: &[Vec<String>], caption: &str) -> String {
    let width = rows.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        warn!(caption, "Invalid or empty table data");
        return format!("[Invalid or empty table data: {caption}]");
    }

    let mut out = format!("*Table: {caption}*\n\n");
    for (i, row) in rows.iter().enumerate() {
        let cells: Vec<String> = (0..width)
            .map(|c| row.get(c).map(|s| escape_cell(s)).unwrap_or_default())
            .collect();
        let _ = writeln!(out, "| {} |", cells.join(" | "));
        if i == 0 {
            let _ = writeln!(out, "|{}", " --- |".repeat(width));
        }
    }
    out.truncate(out.trim_end().len());
    out
}

fn escape_cell(cell: &str) -> String {
    cell.replace('|', "\\|").replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::StubAssets;
    use dossier_core::document::ReportBuilder;

    fn no_assets() -> StubAssets {
        StubAssets { present: vec![] }
    }

    #[test]
    fn headings_use_title_case() {
        assert_eq!(heading("risk_factors"), "Risk Factors");
        assert_eq!(heading("EXECUTIVE summary"), "Executive Summary");
        assert_eq!(heading("Extracted_Content_3"), "Extracted Content 3");
        assert_eq!(heading("nafld's 2nd-stage"), "Nafld'S 2Nd-Stage");
    }

    #[test]
    fn renders_sections_in_order() {
        let mut builder = ReportBuilder::new();
        builder.append("intro", ContentBlock::text("Hello"));
        builder.append("Outro", ContentBlock::text("  "));
        let doc = builder.build().unwrap();

        let md = render_markdown(&doc, "My Report", &no_assets());
        assert_eq!(
            md,
            "# My Report\n\n## Intro\n\nHello\n\n## Outro\n\n[Content missing]\n"
        );
    }

    #[test]
    fn images_resolve_or_fall_back() {
        let assets = StubAssets {
            present: vec!["FlowChart.png".into()],
        };
        let found = render_block(&ContentBlock::image("FlowChart.png", "Flow"), &assets);
        assert_eq!(found, "![Flow](/assets/FlowChart.png)\n\n*Figure: Flow*");

        let missing = render_block(&ContentBlock::image("nope.png", "Ghost"), &assets);
        assert_eq!(missing, "[Image not found: Ghost]");
    }

    #[test]
    fn existing_absolute_image_is_used_directly() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("fig.png");
        std::fs::write(&file, b"png").unwrap();
        let path = file.display().to_string();

        let md = render_block(&ContentBlock::image(path.clone(), "Fig"), &no_assets());
        assert!(md.starts_with(&format!("![Fig]({path})")));
    }

    #[test]
    fn tables_are_padded() {
        let rows = vec![
            vec!["Year".to_string(), "Count".to_string()],
            vec!["2020".to_string()],
            vec!["a|b".to_string(), "x\ny".to_string()],
        ];
        let md = render_block(&ContentBlock::table(rows, "Stats"), &no_assets());
        assert_eq!(
            md,
            "*Table: Stats*\n\n| Year | Count |\n| --- | --- |\n| 2020 |  |\n| a\\|b | x y |"
        );
    }

    #[test]
    fn empty_table_is_placeholder() {
        let md = render_block(
            &ContentBlock::table(vec![vec![]], "Empty"),
            &no_assets(),
        );
        assert_eq!(md, "[Invalid or empty table data: Empty]");
    }
}
