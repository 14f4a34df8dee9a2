use std::fs;
use std::io;
use std::path::Path;

/// One line of source text with its 1-based position, kept so parse
/// errors can point back at the file.
#[derive(Debug, Clone)]
pub struct Line {
    pub number: usize,
    pub text: String,
}

/// A contiguous run of non-blank lines.
pub type Block = Vec<Line>;

pub fn lines(path: &Path) -> io::Result<Vec<Line>> {
    let raw = fs::read_to_string(path)?;
    Ok(raw
        .lines()
        .enumerate()
        .map(|(i, text)| Line {
            number: i + 1,
            text: text.to_string(),
        })
        .collect())
}

/// Filter out comment lines.
pub fn remove_comments(lines: impl IntoIterator<Item = Line>) -> impl Iterator<Item = Line> {
    lines.into_iter().filter(|line| !line.text.starts_with('#'))
}

/// Group lines into blocks separated by one or more blank lines.
pub fn blocks(lines: impl IntoIterator<Item = Line>) -> Vec<Block> {
    let mut out = Vec::new();
    let mut block = Block::new();
    for line in lines {
        if line.text.trim().is_empty() {
            if !block.is_empty() {
                out.push(std::mem::take(&mut block));
            }
        } else {
            block.push(line);
        }
    }
    if !block.is_empty() {
        out.push(block);
    }
    out
}
