use bimap::BiMap;
use std::path::{Path, PathBuf};

use crate::correlation::CorrelationIndex;
use crate::csv;
use crate::error::{read_file, Result};
use crate::line::{self, DisassemblyLine, FunctionalUnit};

/// Parsed disassembly of one entry point on one target GPU.
///
/// Loading is all-or-nothing: a bad row leaves the store empty and unloaded.
/// Once loaded, the store is never re-parsed.
#[derive(Debug, Default)]
pub struct EntrypointDisassemblyStore {
    path: Option<PathBuf>,
    lines: Vec<DisassemblyLine>,
    correlation: CorrelationIndex,
    labels: BiMap<String, usize>,
    loaded: bool,
}

impl EntrypointDisassemblyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_csv(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if self.loaded {
            tracing::debug!(path = %path.display(), "already loaded");
            return Ok(());
        }
        let text = read_file(path)?;
        self.load_from_str(path, &text)
    }

    /// Parse CSV text as if read from `path`. Row 1 is the header.
    pub fn load_from_str(&mut self, path: impl AsRef<Path>, text: &str) -> Result<()> {
        let path = path.as_ref();
        if self.loaded {
            return Ok(());
        }

        let mut lines = Vec::new();
        for (idx, raw) in text.lines().enumerate().skip(1) {
            let raw = raw.trim_end_matches('\r');
            if raw.trim().is_empty() {
                continue;
            }
            let parsed = csv::tokenize(raw).and_then(|tokens| line::parse_row(&tokens));
            match parsed {
                Ok(line) => lines.push(line),
                Err(e) => return Err(e.at_line(path, idx + 1)),
            }
        }

        let correlation = CorrelationIndex::build(&lines);
        let mut labels = BiMap::new();
        for (idx, line) in lines.iter().enumerate() {
            if let DisassemblyLine::Label(label) = line {
                labels.insert(label_key(&label.name).to_string(), idx);
            }
        }

        tracing::debug!(
            path = %path.display(),
            lines = lines.len(),
            labels = labels.len(),
            bounds = ?correlation.entrypoint_bounds(),
            "loaded disassembly"
        );

        self.path = Some(path.to_path_buf());
        self.lines = lines;
        self.correlation = correlation;
        self.labels = labels;
        self.loaded = true;
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn correlation(&self) -> &CorrelationIndex {
        &self.correlation
    }

    pub fn lines(&self) -> &[DisassemblyLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn instruction_at(&self, index: usize) -> Option<&DisassemblyLine> {
        self.lines.get(index)
    }

    pub fn instruction_count(&self) -> usize {
        self.lines.iter().filter(|l| !l.is_label()).count()
    }

    pub fn is_label_line(&self, index: usize) -> bool {
        self.lines.get(index).is_some_and(DisassemblyLine::is_label)
    }
}

// Correlation queries
impl EntrypointDisassemblyStore {
    pub fn disassembly_lines_for_source(&self, source: u32) -> &[usize] {
        self.correlation.disassembly_lines_for_source(source)
    }

    pub fn source_line_for_disassembly_line(&self, index: usize) -> Option<u32> {
        self.correlation.source_line_for_disassembly_line(index)
    }

    pub fn is_source_line_in_entrypoint(&self, source: u32) -> bool {
        self.correlation.is_source_line_in_entrypoint(source)
    }

    pub fn is_disassembly_line_correlated(&self, index: usize) -> bool {
        self.correlation.is_disassembly_line_correlated(index)
    }

    pub fn entrypoint_bounds(&self) -> Option<(u32, u32)> {
        self.correlation.entrypoint_bounds()
    }
}

// Label navigation
impl EntrypointDisassemblyStore {
    /// Line index of the label `name`. A trailing `:` is ignored.
    pub fn label_line(&self, name: &str) -> Option<usize> {
        self.labels.get_by_left(label_key(name)).copied()
    }

    pub fn label_name(&self, index: usize) -> Option<&str> {
        self.labels.get_by_right(&index).map(String::as_str)
    }

    pub fn is_branch_operand(&self, index: usize) -> bool {
        self.lines
            .get(index)
            .and_then(DisassemblyLine::as_instruction)
            .is_some_and(|inst| inst.functional_unit == FunctionalUnit::Branch)
    }

    /// Label line a branch instruction jumps to.
    pub fn branch_target(&self, index: usize) -> Option<usize> {
        let inst = self.lines.get(index)?.as_instruction()?;
        if inst.functional_unit != FunctionalUnit::Branch {
            return None;
        }
        self.label_line(inst.operands.trim())
    }
}

fn label_key(name: &str) -> &str {
    let name = name.trim();
    name.strip_suffix(':').unwrap_or(name)
}
