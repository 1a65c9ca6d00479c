//! Structure-aware document chunking.
//!
//! Text is scanned line by line. Markdown headings of level 1-3 start a new
//! chunk once the current one holds at least `major_break_ratio` of the
//! target size. When a chunk would overflow, it is cut at the best boundary
//! found in the accumulated lines (paragraph, then sentence, then end of a
//! list) and the trailing lines of the emitted chunk are carried into the
//! next one, up to `chunk_overlap` chars.
//!
//! Sizes are measured in chars; each line counts one extra for its newline.

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::error::{Error, Result};
use crate::types::{Chunk, ChunkKind, Meta, Section};

const SENTENCE_ENDINGS: [char; 6] = ['.', '!', '?', '。', '！', '？'];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    /// Fraction of `chunk_size` a chunk must reach before a major heading closes it.
    pub major_break_ratio: f32,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 1000, chunk_overlap: 200, major_break_ratio: 0.3 }
    }
}

impl ChunkingConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self { chunk_size, chunk_overlap, ..Self::default() }
    }

    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be greater than 0".into()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if !(0.0..=1.0).contains(&self.major_break_ratio) {
            return Err(Error::InvalidConfig("major_break_ratio must lie within [0, 1]".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum LineKind {
    Heading(Section),
    TableRow,
    ListItem,
    Blank,
    Text,
}

#[derive(Debug)]
struct Line<'a> {
    text: &'a str,
    kind: LineKind,
    chars: usize,
}

impl<'a> Line<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, kind: classify_line(text), chars: text.chars().count() }
    }

    fn size(&self) -> usize {
        self.chars + 1
    }

    fn is_blank(&self) -> bool {
        self.kind == LineKind::Blank
    }

    fn is_list_item(&self) -> bool {
        self.kind == LineKind::ListItem
    }

    fn heading(&self) -> Option<&Section> {
        match &self.kind {
            LineKind::Heading(section) => Some(section),
            _ => None,
        }
    }

    fn is_major_break(&self) -> bool {
        self.heading().is_some_and(|s| s.level <= 3)
    }

    fn ends_sentence(&self) -> bool {
        self.text.trim_end().ends_with(&SENTENCE_ENDINGS[..])
    }
}

fn classify_line(line: &str) -> LineKind {
    let stripped = line.trim();
    if stripped.is_empty() {
        return LineKind::Blank;
    }

    let hashes = stripped.chars().take_while(|c| *c == '#').count();
    if (1..=6).contains(&hashes) {
        let rest = &stripped[hashes..];
        if rest.starts_with(char::is_whitespace) {
            let level = u8::try_from(hashes).unwrap_or(6);
            return LineKind::Heading(Section { level, title: rest.trim().to_string() });
        }
    }

    let table_row = stripped.len() >= 2 && stripped.starts_with('|') && stripped.ends_with('|');
    let table_rule = stripped.chars().all(|c| matches!(c, '-' | '|' | ':'));
    if table_row || table_rule {
        return LineKind::TableRow;
    }

    if is_bullet(stripped) || is_numbered(stripped) {
        return LineKind::ListItem;
    }

    LineKind::Text
}

fn is_bullet(stripped: &str) -> bool {
    let mut chars = stripped.chars();
    matches!(chars.next(), Some('-' | '*' | '+')) && chars.next().is_some_and(char::is_whitespace)
}

fn is_numbered(stripped: &str) -> bool {
    let digits = stripped.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 {
        return false;
    }
    let mut rest = stripped[digits..].chars();
    rest.next() == Some('.') && rest.next().is_some_and(char::is_whitespace)
}

/// Best place to cut `lines`, as the number of leading lines to emit. Only
/// positions within `target` chars are considered. Returns 0 when no
/// favourable boundary exists.
fn find_split_point(lines: &[Line<'_>], target: usize) -> usize {
    let (mut paragraph, mut sentence, mut list_end) = (0, 0, 0);
    let mut size = 0;
    for (i, line) in lines.iter().enumerate() {
        size += line.size();
        if size > target {
            break;
        }
        if line.is_blank() {
            continue;
        }
        if i > 0 && lines[i - 1].is_blank() {
            paragraph = i;
        }
        if line.ends_sentence() {
            sentence = i + 1;
        }
        if line.is_list_item() && lines.get(i + 1).is_some_and(|next| !next.is_list_item()) {
            list_end = i + 1;
        }
    }
    if paragraph > 0 {
        paragraph
    } else if sentence > 0 {
        sentence
    } else {
        list_end
    }
}

/// Number of trailing lines whose combined size fits in `overlap`.
fn overlap_lines(lines: &[Line<'_>], overlap: usize) -> usize {
    let mut size = 0;
    let mut count = 0;
    for line in lines.iter().rev() {
        if size + line.size() > overlap {
            break;
        }
        size += line.size();
        count += 1;
    }
    count
}

fn classify_chunk(lines: &[Line<'_>]) -> ChunkKind {
    let non_blank: Vec<&Line<'_>> = lines.iter().filter(|l| !l.is_blank()).collect();
    let Some(first) = non_blank.first() else {
        return ChunkKind::Text;
    };
    if first.heading().is_some() {
        return ChunkKind::Heading;
    }
    let total = non_blank.len();
    let tables = non_blank.iter().filter(|l| l.kind == LineKind::TableRow).count();
    let lists = non_blank.iter().filter(|l| l.is_list_item()).count();
    if tables * 2 >= total {
        return ChunkKind::Table;
    }
    if lists * 2 >= total {
        return ChunkKind::List;
    }

    let first_idx = lines.iter().position(|l| !l.is_blank()).unwrap_or(0);
    let last_idx = lines.iter().rposition(|l| !l.is_blank()).unwrap_or(0);
    if lines[first_idx..last_idx].iter().any(Line::is_blank) {
        ChunkKind::Paragraph
    } else {
        ChunkKind::Text
    }
}

/// Splits documents into chunks. Cheap to clone; holds only its config.
#[derive(Debug, Clone)]
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    pub fn new(config: ChunkingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        self.split_text(&document.id, &document.content, &document.metadata)
    }

    /// Split raw text belonging to `doc_id`. Every chunk inherits `metadata`.
    pub fn split_text(&self, doc_id: &str, content: &str, metadata: &Meta) -> Vec<Chunk> {
        if content.trim().is_empty() {
            return Vec::new();
        }

        let lines: Vec<Line<'_>> = content.split('\n').map(Line::new).collect();
        let mut chunks = if content.chars().count() <= self.config.chunk_size {
            let section = lines.iter().find(|l| !l.is_blank()).and_then(|l| l.heading()).cloned();
            vec![Chunk {
                id: Chunk::make_id(doc_id, 0),
                doc_id: doc_id.to_string(),
                text: content.trim().to_string(),
                chunk_index: 0,
                total_chunks: 1,
                kind: ChunkKind::CompleteDocument,
                section,
                line_count: lines.len(),
                metadata: metadata.clone(),
            }]
        } else {
            let mut splitter = Splitter::new(&self.config, doc_id, metadata, &lines);
            splitter.run();
            splitter.chunks
        };

        let total = chunks.len();
        for chunk in &mut chunks {
            chunk.total_chunks = total;
        }
        tracing::debug!(doc_id, chunks = total, "document split");
        chunks
    }
}

/// Working state of one structure-aware split. The pending chunk is always
/// the contiguous line range `start..i`; lines before `fresh` were already
/// emitted and are only carried as overlap.
struct Splitter<'c, 'l> {
    config: &'c ChunkingConfig,
    doc_id: &'c str,
    metadata: &'c Meta,
    lines: &'l [Line<'l>],
    prefix: Vec<usize>,
    last_heading: Vec<Option<usize>>,
    chunks: Vec<Chunk>,
}

impl<'c, 'l> Splitter<'c, 'l> {
    fn new(config: &'c ChunkingConfig, doc_id: &'c str, metadata: &'c Meta, lines: &'l [Line<'l>]) -> Self {
        let mut prefix = Vec::with_capacity(lines.len() + 1);
        prefix.push(0);
        let mut last_heading = Vec::with_capacity(lines.len());
        let mut seen = None;
        for (i, line) in lines.iter().enumerate() {
            prefix.push(prefix[i] + line.size());
            if line.heading().is_some() {
                seen = Some(i);
            }
            last_heading.push(seen);
        }
        Self { config, doc_id, metadata, lines, prefix, last_heading, chunks: Vec::new() }
    }

    fn size(&self, start: usize, end: usize) -> usize {
        self.prefix[end] - self.prefix[start]
    }

    fn run(&mut self) {
        let chunk_size = self.config.chunk_size;
        #[allow(clippy::cast_precision_loss)]
        let major_min = chunk_size as f32 * self.config.major_break_ratio;
        let lines = self.lines;
        let (mut start, mut fresh) = (0usize, 0usize);

        for (i, line) in lines.iter().enumerate() {
            if line.chars > chunk_size {
                self.emit(start, i, fresh);
                self.emit(i, i + 1, i);
                start = i + 1;
                fresh = i + 1;
                continue;
            }

            #[allow(clippy::cast_precision_loss)]
            let pending = self.size(start, i) as f32;
            if line.is_major_break() && i > start && pending >= major_min {
                self.emit(start, i, fresh);
                start = i;
                fresh = i;
                continue;
            }

            while self.size(start, i) + line.size() > chunk_size && i > fresh {
                let split = find_split_point(&lines[start..i], chunk_size);
                let end = if start + split > fresh { start + split } else { i };
                self.emit(start, end, fresh);
                let carry = overlap_lines(&lines[start..end], self.config.chunk_overlap).min(end - start - 1);
                start = end - carry;
                fresh = end;
            }
            // carried overlap gives way when it cannot share a chunk with this line
            while start < fresh && self.size(start, i) + line.size() > chunk_size {
                start += 1;
            }
        }
        self.emit(start, lines.len(), fresh);
    }

    fn section_for(&self, start: usize) -> Option<Section> {
        self.last_heading[start].and_then(|idx| self.lines[idx].heading()).cloned()
    }

    fn emit(&mut self, start: usize, end: usize, fresh: usize) {
        if start >= end || self.lines[fresh.max(start)..end].iter().all(Line::is_blank) {
            return;
        }
        let span = &self.lines[start..end];
        let text = span.iter().map(|l| l.text).collect::<Vec<_>>().join("\n");
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        let index = self.chunks.len();
        let chunk = Chunk {
            id: Chunk::make_id(self.doc_id, index),
            doc_id: self.doc_id.to_string(),
            text: text.to_string(),
            chunk_index: index,
            total_chunks: 0,
            kind: classify_chunk(span),
            section: self.section_for(start),
            line_count: span.len(),
            metadata: self.metadata.clone(),
        };
        self.chunks.push(chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(text: &str) -> Vec<Line<'_>> {
        text.split('\n').map(Line::new).collect()
    }

    #[test]
    fn classifies_markdown_structure() {
        assert_eq!(
            classify_line("## Treatment options"),
            LineKind::Heading(Section { level: 2, title: "Treatment options".into() })
        );
        assert_eq!(classify_line("####### too deep"), LineKind::Text);
        assert_eq!(classify_line("#hashtag"), LineKind::Text);
        assert_eq!(classify_line("| a | b |"), LineKind::TableRow);
        assert_eq!(classify_line("|---|:---:|"), LineKind::TableRow);
        assert_eq!(classify_line("  - item"), LineKind::ListItem);
        assert_eq!(classify_line("12. twelfth"), LineKind::ListItem);
        assert_eq!(classify_line("12.5 percent"), LineKind::Text);
        assert_eq!(classify_line("   "), LineKind::Blank);
        assert_eq!(classify_line("plain words"), LineKind::Text);
    }

    #[test]
    fn split_point_prefers_paragraph_boundary() {
        let ls = lines("One sentence.\nStill going\n\nNew paragraph here\nmore");
        assert_eq!(find_split_point(&ls, 1000), 3);
    }

    #[test]
    fn split_point_falls_back_to_sentence_then_list() {
        let ls = lines("first line ends.\nsecond line does not");
        assert_eq!(find_split_point(&ls, 1000), 1);

        let ls = lines("- a\n- b\nafter the list\nstill text");
        assert_eq!(find_split_point(&ls, 1000), 2);

        let ls = lines("no boundary\nanywhere here");
        assert_eq!(find_split_point(&ls, 1000), 0);
    }

    #[test]
    fn split_point_ignores_boundaries_beyond_target() {
        let ls = lines("aaaa\nbbbb.\ncccc.");
        // "aaaa\n" + "bbbb.\n" = 11 chars; the third line does not fit in 12
        assert_eq!(find_split_point(&ls, 12), 2);
        assert_eq!(find_split_point(&ls, 5), 0);
    }

    #[test]
    fn overlap_walks_backwards_within_budget() {
        let ls = lines("0123456789\nabcd\nxyz");
        assert_eq!(overlap_lines(&ls, 4), 1);
        assert_eq!(overlap_lines(&ls, 9), 2);
        assert_eq!(overlap_lines(&ls, 3), 0);
        assert_eq!(overlap_lines(&ls, 100), 3);
    }

    #[test]
    fn chunk_kind_reflects_dominant_structure() {
        assert_eq!(classify_chunk(&lines("# Title\ntext")), ChunkKind::Heading);
        assert_eq!(classify_chunk(&lines("| a |\n| b |\nnote")), ChunkKind::Table);
        assert_eq!(classify_chunk(&lines("- a\n- b\nnote")), ChunkKind::List);
        assert_eq!(classify_chunk(&lines("one\n\ntwo")), ChunkKind::Paragraph);
        assert_eq!(classify_chunk(&lines("\none\ntwo\n")), ChunkKind::Text);
    }
}
