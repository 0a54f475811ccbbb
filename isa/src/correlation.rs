use indexmap::IndexMap;

use crate::line::DisassemblyLine;

/// Bidirectional mapping between input source lines and disassembly line indices
/// of one entry point on one target GPU.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrelationIndex {
    // source line -> disassembly line indices, in file order
    forward: IndexMap<u32, Vec<usize>>,
    // disassembly line index -> source line
    reverse: Vec<Option<u32>>,
    bounds: Option<(u32, u32)>,
}

impl CorrelationIndex {
    pub fn build(lines: &[DisassemblyLine]) -> Self {
        let mut index = CorrelationIndex {
            forward: IndexMap::new(),
            reverse: vec![None; lines.len()],
            bounds: None,
        };

        for (idx, line) in lines.iter().enumerate() {
            let Some(source) = line.source_line() else {
                continue;
            };
            tracing::trace!(line = idx, source, "correlated");
            index.forward.entry(source).or_default().push(idx);
            index.reverse[idx] = Some(source);
            index.bounds = Some(match index.bounds {
                None => (source, source),
                Some((start, end)) => (start.min(source), end.max(source)),
            });
        }
        index
    }

    /// Disassembly lines generated for `source`; empty if none.
    pub fn disassembly_lines_for_source(&self, source: u32) -> &[usize] {
        self.forward
            .get(&source)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn source_line_for_disassembly_line(&self, index: usize) -> Option<u32> {
        self.reverse.get(index).copied().flatten()
    }

    pub fn is_source_line_in_entrypoint(&self, source: u32) -> bool {
        match self.bounds {
            Some((start, end)) => (start..=end).contains(&source),
            None => false,
        }
    }

    pub fn is_disassembly_line_correlated(&self, index: usize) -> bool {
        self.source_line_for_disassembly_line(index).is_some()
    }

    /// Lowest and highest correlated source line.
    pub fn entrypoint_bounds(&self) -> Option<(u32, u32)> {
        self.bounds
    }

    /// Correlated source lines in order of first appearance.
    pub fn source_lines(&self) -> impl Iterator<Item = u32> + '_ {
        self.forward.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::line::{FunctionalUnit, InstructionLine, LabelLine};

    fn inst(source: Option<u32>) -> DisassemblyLine {
        DisassemblyLine::Instruction(InstructionLine {
            address: String::new(),
            opcode: "s_nop".to_string(),
            operands: "0".to_string(),
            functional_unit: FunctionalUnit::ScalarAlu,
            cycles: "4".to_string(),
            binary_encoding: String::new(),
            source_line: source,
        })
    }

    fn label(name: &str) -> DisassemblyLine {
        DisassemblyLine::Label(LabelLine {
            name: name.to_string(),
        })
    }

    #[test]
    fn insertion_order() {
        let index = CorrelationIndex::build(&[inst(Some(11)), inst(Some(10)), inst(Some(11))]);
        assert_eq!(index.disassembly_lines_for_source(11), &[0, 2]);
        assert_eq!(index.disassembly_lines_for_source(10), &[1]);
        assert_eq!(index.source_lines().collect::<Vec<_>>(), vec![11, 10]);
    }

    #[test]
    fn bidirectional() {
        let lines = vec![label("entry:"), inst(Some(3)), inst(None), inst(Some(7)), inst(Some(3))];
        let index = CorrelationIndex::build(&lines);
        for source in index.source_lines() {
            for &idx in index.disassembly_lines_for_source(source) {
                assert_eq!(index.source_line_for_disassembly_line(idx), Some(source));
            }
        }
        for idx in 0..lines.len() {
            if let Some(source) = index.source_line_for_disassembly_line(idx) {
                assert!(index.disassembly_lines_for_source(source).contains(&idx));
            }
        }
        assert!(!index.is_disassembly_line_correlated(0));
        assert!(!index.is_disassembly_line_correlated(2));
        assert!(index.is_disassembly_line_correlated(3));
        assert!(!index.is_disassembly_line_correlated(99));
    }

    #[test]
    fn bounds() {
        let index = CorrelationIndex::build(&[inst(Some(20)), inst(Some(5)), inst(None), inst(Some(9))]);
        assert_eq!(index.entrypoint_bounds(), Some((5, 20)));
        assert!(index.is_source_line_in_entrypoint(5));
        assert!(index.is_source_line_in_entrypoint(12));
        assert!(index.is_source_line_in_entrypoint(20));
        assert!(!index.is_source_line_in_entrypoint(4));
        assert!(!index.is_source_line_in_entrypoint(21));
        // in range but no instructions
        assert!(index.disassembly_lines_for_source(12).is_empty());
    }

    #[test]
    fn nothing_correlated() {
        let index = CorrelationIndex::build(&[label("a:"), inst(None)]);
        assert!(index.is_empty());
        assert_eq!(index.entrypoint_bounds(), None);
        assert!(!index.is_source_line_in_entrypoint(0));
        assert!(index.disassembly_lines_for_source(0).is_empty());
    }
}
