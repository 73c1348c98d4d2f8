use std::io::Read;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use super::{Block, ExtractError, Extraction};

/// `.docx`: iterate paragraphs and tables in document order (spec §4.A).
/// A paragraph whose style name contains "heading" becomes a heading block;
/// "list" becomes a text block prefixed by `"- "`; tables render to a
/// canonical pipe-table string with `|` escaped inside cells. Heading/table
/// blocks carry forward the `section_header` of the last heading seen.
pub fn extract_docx(path: &Path) -> Result<Extraction, ExtractError> {
    let file = std::fs::File::open(path).map_err(|e| ExtractError::ParseError(e.to_string()))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| ExtractError::ParseError(e.to_string()))?;
    let mut doc_xml = String::new();
    zip.by_name("word/document.xml")
        .map_err(|e| ExtractError::ParseError(format!("missing word/document.xml: {e}")))?
        .read_to_string(&mut doc_xml)
        .map_err(|e| ExtractError::ParseError(e.to_string()))?;

    let blocks = parse_document_xml(&doc_xml)?;
    Ok(Extraction {
        blocks,
        total_pages: None,
    })
}

#[derive(Default)]
struct Paragraph {
    style: Option<String>,
    has_num_pr: bool,
    runs: Vec<String>,
}

fn parse_document_xml(xml: &str) -> Result<Vec<Block>, ExtractError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut blocks = Vec::new();
    let mut current_section_header: Option<String> = None;

    // Table parsing state
    let mut in_table = false;
    let mut table_rows: Vec<Vec<String>> = Vec::new();
    let mut in_row = false;
    let mut row_cells: Vec<String> = Vec::new();
    let mut in_cell = false;
    let mut cell_text = String::new();

    // Paragraph parsing state (used both standalone and inside table cells)
    let mut in_paragraph = false;
    let mut para = Paragraph::default();
    let mut in_run_text = false;

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => break,
            Ok(Event::Start(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                match local {
                    "tbl" => {
                        in_table = true;
                        table_rows.clear();
                    }
                    "tr" if in_table => {
                        in_row = true;
                        row_cells.clear();
                    }
                    "tc" if in_row => {
                        in_cell = true;
                        cell_text.clear();
                    }
                    "p" => {
                        in_paragraph = true;
                        para = Paragraph::default();
                    }
                    "pStyle" => {
                        if let Some(val) = attr_val(&e, "val") {
                            para.style = Some(val);
                        }
                    }
                    "numPr" => {
                        para.has_num_pr = true;
                    }
                    "t" => {
                        in_run_text = true;
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(t)) => {
                if in_run_text && in_paragraph {
                    let text = t.unescape().unwrap_or_default().into_owned();
                    para.runs.push(text);
                }
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                let local = local_name(name.as_ref());
                match local {
                    "t" => in_run_text = false,
                    "p" => {
                        in_paragraph = false;
                        let text = para.runs.join("");
                        if in_cell {
                            cell_text.push_str(&text);
                        } else if !text.trim().is_empty() {
                            let style_lower = para.style.clone().unwrap_or_default().to_ascii_lowercase();
                            if style_lower.contains("heading") {
                                let level = style_lower
                                    .chars()
                                    .rev()
                                    .take_while(|c| c.is_ascii_digit())
                                    .collect::<String>()
                                    .chars()
                                    .rev()
                                    .collect::<String>()
                                    .parse::<u32>()
                                    .unwrap_or(1)
                                    .clamp(1, 6);
                                current_section_header = Some(text.clone());
                                blocks.push(Block::heading(text, level));
                            } else if style_lower.contains("list") || para.has_num_pr {
                                let mut b = Block::text(format!("- {text}"));
                                b.section_header = current_section_header.clone();
                                blocks.push(b);
                            } else {
                                let mut b = Block::text(text);
                                b.section_header = current_section_header.clone();
                                blocks.push(b);
                            }
                        }
                    }
                    "tc" if in_cell => {
                        in_cell = false;
                        row_cells.push(cell_text.replace('|', "\\|").trim().to_string());
                    }
                    "tr" if in_row => {
                        in_row = false;
                        table_rows.push(std::mem::take(&mut row_cells));
                    }
                    "tbl" if in_table => {
                        in_table = false;
                        if !table_rows.is_empty() {
                            let rendered = render_pipe_table(&table_rows);
                            let mut b = Block::table(rendered);
                            b.section_header = current_section_header.clone();
                            blocks.push(b);
                        }
                    }
                    _ => {}
                }
            }
            Err(e) => return Err(ExtractError::ParseError(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(blocks)
}

fn render_pipe_table(rows: &[Vec<String>]) -> String {
    let mut out = String::new();
    for (i, row) in rows.iter().enumerate() {
        out.push_str("| ");
        out.push_str(&row.join(" | "));
        out.push_str(" |\n");
        if i == 0 {
            out.push_str("|");
            for _ in row {
                out.push_str(" --- |");
            }
            out.push('\n');
        }
    }
    out
}

fn local_name(qualified: &[u8]) -> &str {
    let s = std::str::from_utf8(qualified).unwrap_or("");
    s.rsplit(':').next().unwrap_or(s)
}

fn attr_val(e: &quick_xml::events::BytesStart, name: &str) -> Option<String> {
    e.attributes().flatten().find_map(|a| {
        let key = local_name(a.key.as_ref());
        if key == name {
            Some(String::from_utf8_lossy(&a.value).into_owned())
        } else {
            None
        }
    })
}
