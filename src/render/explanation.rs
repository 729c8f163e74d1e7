//! Splits the business explanation's lightweight markdown into blocks.

use serde::Serialize;

pub const NO_EXPLANATION: &str = "No business explanation available.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Block {
    Heading { level: u8, text: String },
    ListItem { text: String },
    Paragraph { text: String },
}

fn heading(line: &str) -> Option<Block> {
    let hashes = line.chars().take_while(|c| *c == '#').count();
    if (1..=6).contains(&hashes) && line[hashes..].starts_with(' ') {
        Some(Block::Heading { level: hashes as u8, text: line[hashes..].trim().to_string() })
    } else {
        None
    }
}

fn list_item(line: &str) -> Option<Block> {
    if let Some(rest) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
        return Some(Block::ListItem { text: rest.trim().to_string() });
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        if let Some(rest) = line[digits..].strip_prefix(". ") {
            return Some(Block::ListItem { text: rest.trim().to_string() });
        }
    }
    None
}

fn flush(para: &mut Vec<&str>, out: &mut Vec<Block>) {
    if !para.is_empty() {
        out.push(Block::Paragraph { text: para.join(" ") });
        para.clear();
    }
}

pub fn blocks(text: Option<&str>) -> Vec<Block> {
    let text = text.map(str::trim).unwrap_or_default();
    if text.is_empty() {
        return vec![Block::Paragraph { text: NO_EXPLANATION.to_string() }];
    }

    let mut out = Vec::new();
    let mut para: Vec<&str> = Vec::new();

    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            flush(&mut para, &mut out);
        } else if let Some(block) = heading(line).or_else(|| list_item(line)) {
            flush(&mut para, &mut out);
            out.push(block);
        } else {
            para.push(line);
        }
    }
    flush(&mut para, &mut out);
    out
}
