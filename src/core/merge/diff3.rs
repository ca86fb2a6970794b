use std::collections::HashMap;
use std::fmt::Write;

use crate::errors::error::Error;

/// Width of conflict markers when no extension is requested.
pub const DEFAULT_MARKER_SIZE: usize = 7;

/// Split a string into lines with their endings preserved.
struct LinesWithEndings<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> LinesWithEndings<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, position: 0 }
    }
}

impl<'a> Iterator for LinesWithEndings<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        if self.position >= self.input.len() {
            return None;
        }

        let start = self.position;
        while self.position < self.input.len() && !self.input[self.position..].starts_with('\n') {
            self.position += 1;
        }
        if self.position < self.input.len() {
            self.position += 1;
        }

        Some(&self.input[start..self.position])
    }
}

#[derive(Debug, PartialEq)]
enum EditType {
    Eql,
    Add,
    Del,
}

#[derive(Debug)]
struct Edit {
    r#type: EditType,
    a_line: Option<LineInfo>,
    b_line: Option<LineInfo>,
}

#[derive(Debug)]
struct LineInfo {
    number: usize,
    content: String,
}

/// Line-by-line diff used only to build the match sets between the original
/// and each derived version.
fn diff(a: &str, b: &str) -> Vec<Edit> {
    let a_lines: Vec<_> = a.lines().collect();
    let b_lines: Vec<_> = b.lines().collect();

    let mut result = Vec::new();
    let mut i = 0;
    let mut j = 0;

    while i < a_lines.len() || j < b_lines.len() {
        if i < a_lines.len() && j < b_lines.len() && a_lines[i] == b_lines[j] {
            result.push(Edit {
                r#type: EditType::Eql,
                a_line: Some(LineInfo {
                    number: i,
                    content: a_lines[i].to_string(),
                }),
                b_line: Some(LineInfo {
                    number: j,
                    content: b_lines[j].to_string(),
                }),
            });
            i += 1;
            j += 1;
        } else if j < b_lines.len() && (i >= a_lines.len() || a_lines[i] != b_lines[j]) {
            result.push(Edit {
                r#type: EditType::Add,
                a_line: None,
                b_line: Some(LineInfo {
                    number: j,
                    content: b_lines[j].to_string(),
                }),
            });
            j += 1;
        } else if i < a_lines.len() {
            result.push(Edit {
                r#type: EditType::Del,
                a_line: Some(LineInfo {
                    number: i,
                    content: a_lines[i].to_string(),
                }),
                b_line: None,
            });
            i += 1;
        }
    }

    result
}

/// Which side wins a conflicting chunk instead of emitting markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeFavor {
    Ours,
    Theirs,
}

/// Three-way merge of original (o), ours (a) and theirs (b).
pub fn merge(o: &str, a: &str, b: &str, favor: Option<MergeFavor>) -> Result<MergeResult, Error> {
    let o: Vec<_> = LinesWithEndings::new(o).map(|l| l.to_string()).collect();
    let a: Vec<_> = LinesWithEndings::new(a).map(|l| l.to_string()).collect();
    let b: Vec<_> = LinesWithEndings::new(b).map(|l| l.to_string()).collect();

    let diff3 = Diff3::new(o, a, b, favor);
    diff3.merge()
}

type MatchSet = HashMap<usize, usize>;

#[derive(Debug)]
struct Diff3 {
    o: Vec<String>,
    a: Vec<String>,
    b: Vec<String>,
    favor: Option<MergeFavor>,
    chunks: Vec<Chunk>,
    line_o: usize,
    line_a: usize,
    line_b: usize,
    match_a: MatchSet,
    match_b: MatchSet,
}

impl Diff3 {
    fn new(o: Vec<String>, a: Vec<String>, b: Vec<String>, favor: Option<MergeFavor>) -> Self {
        Self {
            o,
            a,
            b,
            favor,
            chunks: Vec::new(),
            line_o: 0,
            line_a: 0,
            line_b: 0,
            match_a: HashMap::new(),
            match_b: HashMap::new(),
        }
    }

    fn merge(mut self) -> Result<MergeResult, Error> {
        self.setup();
        self.generate_chunks();
        Ok(MergeResult::new(self.chunks))
    }

    fn setup(&mut self) {
        self.chunks = Vec::new();
        self.line_o = 0;
        self.line_a = 0;
        self.line_b = 0;

        self.match_a = self.match_set(&self.a);
        self.match_b = self.match_set(&self.b);
    }

    fn match_set(&self, file: &[String]) -> MatchSet {
        let mut matches = HashMap::new();

        let o_content = self.o.join("");
        let file_content = file.join("");

        for edit in diff(&o_content, &file_content) {
            if edit.r#type == EditType::Eql {
                if let (Some(a_line), Some(b_line)) = (edit.a_line, edit.b_line) {
                    matches.insert(a_line.number, b_line.number);
                }
            }
        }

        matches
    }

    #[allow(clippy::unnecessary_unwrap)]
    fn generate_chunks(&mut self) {
        loop {
            let i = self.find_next_mismatch();

            if let Some(i) = i {
                if i == 1 {
                    let (o, a, b) = self.find_next_match();

                    if a.is_some() && b.is_some() {
                        self.emit_chunk(o, a.unwrap(), b.unwrap());
                    } else {
                        self.emit_final_chunk();
                        return;
                    }
                } else {
                    self.emit_chunk(self.line_o + i, self.line_a + i, self.line_b + i);
                }
            } else {
                self.emit_final_chunk();
                return;
            }
        }
    }

    fn find_next_mismatch(&self) -> Option<usize> {
        let mut i = 1;

        while self.in_bounds(i)
            && self.matches(&self.match_a, self.line_a, i)
            && self.matches(&self.match_b, self.line_b, i)
        {
            i += 1;
        }

        if self.in_bounds(i) {
            Some(i)
        } else {
            None
        }
    }

    fn in_bounds(&self, i: usize) -> bool {
        self.line_o + i <= self.o.len()
            || self.line_a + i <= self.a.len()
            || self.line_b + i <= self.b.len()
    }

    fn matches(&self, matches: &MatchSet, offset: usize, i: usize) -> bool {
        matches.get(&(self.line_o + i)) == Some(&(offset + i))
    }

    fn find_next_match(&self) -> (usize, Option<usize>, Option<usize>) {
        let mut o = self.line_o + 1;

        while o <= self.o.len() && !(self.match_a.contains_key(&o) && self.match_b.contains_key(&o))
        {
            o += 1;
        }

        (
            o,
            self.match_a.get(&o).copied(),
            self.match_b.get(&o).copied(),
        )
    }

    fn emit_chunk(&mut self, o: usize, a: usize, b: usize) {
        let o_lines = self.o[self.line_o..o - 1].to_vec();
        let a_lines = self.a[self.line_a..a - 1].to_vec();
        let b_lines = self.b[self.line_b..b - 1].to_vec();

        self.write_chunk(&o_lines, &a_lines, &b_lines);

        self.line_o = o - 1;
        self.line_a = a - 1;
        self.line_b = b - 1;
    }

    fn emit_final_chunk(&mut self) {
        let o_lines = self.o[self.line_o..].to_vec();
        let a_lines = self.a[self.line_a..].to_vec();
        let b_lines = self.b[self.line_b..].to_vec();

        self.write_chunk(&o_lines, &a_lines, &b_lines);
    }

    fn write_chunk(&mut self, o: &[String], a: &[String], b: &[String]) {
        if a == o || a == b {
            self.chunks.push(Chunk::Clean { lines: b.to_vec() });
        } else if b == o {
            self.chunks.push(Chunk::Clean { lines: a.to_vec() });
        } else {
            // All three differ; a favor variant silently resolves the chunk.
            match self.favor {
                Some(MergeFavor::Ours) => self.chunks.push(Chunk::Clean { lines: a.to_vec() }),
                Some(MergeFavor::Theirs) => self.chunks.push(Chunk::Clean { lines: b.to_vec() }),
                None => self.chunks.push(Chunk::Conflict {
                    o_lines: o.to_vec(),
                    a_lines: a.to_vec(),
                    b_lines: b.to_vec(),
                }),
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum Chunk {
    Clean {
        lines: Vec<String>,
    },
    Conflict {
        o_lines: Vec<String>,
        a_lines: Vec<String>,
        b_lines: Vec<String>,
    },
}

impl Chunk {
    pub fn to_string(
        &self,
        a_name: Option<&str>,
        b_name: Option<&str>,
        marker_size: usize,
    ) -> String {
        match self {
            Chunk::Clean { lines } => lines.join(""),
            Chunk::Conflict {
                o_lines: _,
                a_lines,
                b_lines,
            } => {
                fn separator(text: &mut String, r#char: &str, name: Option<&str>, size: usize) {
                    text.push_str(&r#char.repeat(size));
                    if let Some(name) = name {
                        write!(text, " {}", name).unwrap();
                    }
                    text.push('\n');
                }

                let mut text = String::new();
                separator(&mut text, "<", a_name, marker_size);
                for line in a_lines {
                    text.push_str(line);
                }
                separator(&mut text, "=", None, marker_size);
                for line in b_lines {
                    text.push_str(line);
                }
                separator(&mut text, ">", b_name, marker_size);

                text
            }
        }
    }
}

#[derive(Debug)]
pub struct MergeResult {
    chunks: Vec<Chunk>,
}

impl MergeResult {
    fn new(chunks: Vec<Chunk>) -> Self {
        Self { chunks }
    }

    pub fn is_clean(&self) -> bool {
        !self
            .chunks
            .iter()
            .any(|chunk| matches!(chunk, Chunk::Conflict { .. }))
    }

    pub fn to_string(
        &self,
        a_name: Option<&str>,
        b_name: Option<&str>,
        marker_size: usize,
    ) -> String {
        self.chunks
            .iter()
            .map(|chunk| chunk.to_string(a_name, b_name, marker_size))
            .collect::<Vec<_>>()
            .join("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_overlapping_edits_merge_clean() {
        let o = "1\n2\n3\n";
        let a = "1changed\n2\n3\n";
        let b = "1\n2\n3changed\n";
        let result = merge(o, a, b, None).unwrap();
        assert!(result.is_clean());
        assert_eq!(
            result.to_string(Some("ours"), Some("theirs"), DEFAULT_MARKER_SIZE),
            "1changed\n2\n3changed\n"
        );
    }

    #[test]
    fn add_add_produces_markers() {
        let result = merge("", "x\n", "y\n", None).unwrap();
        assert!(!result.is_clean());
        let text = result.to_string(Some("ours"), Some("theirs"), DEFAULT_MARKER_SIZE);
        assert_eq!(text, "<<<<<<< ours\nx\n=======\ny\n>>>>>>> theirs\n");
    }

    #[test]
    fn marker_size_is_configurable() {
        let result = merge("", "x\n", "y\n", None).unwrap();
        let text = result.to_string(Some("a"), Some("b"), 14);
        assert!(text.starts_with(&"<".repeat(14)));
        assert!(text.contains(&"=".repeat(14)));
    }

    #[test]
    fn favor_ours_resolves_conflicts() {
        let result = merge("", "x\n", "y\n", Some(MergeFavor::Ours)).unwrap();
        assert!(result.is_clean());
        assert_eq!(result.to_string(None, None, DEFAULT_MARKER_SIZE), "x\n");
    }

    #[test]
    fn one_side_unchanged_takes_other() {
        let o = "a\nb\n";
        let result = merge(o, o, "a\nB\n", None).unwrap();
        assert!(result.is_clean());
        assert_eq!(result.to_string(None, None, DEFAULT_MARKER_SIZE), "a\nB\n");
    }
}
