use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use strum::{Display, EnumString};

use crate::error::{Error, Result};

// ----------------------------------------------------------------------------
// Output files

/// Kind of a compiler output file, named after its session metadata tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
pub enum OutputFileKind {
    #[strum(to_string = "ISA", serialize = "Isa")]
    IsaDisassemblyText,
    #[strum(to_string = "CSV_ISA", serialize = "CsvIsa")]
    IsaDisassemblyCsv,
    #[strum(to_string = "ResourceUsage", serialize = "ResUsage")]
    ResourceUsageCsv,
    /// Listed, never parsed.
    #[strum(to_string = "LiveReg")]
    LiveRegisterReport,
}

/// Output tags the compiler driver writes that are not tracked.
const IGNORED_TAGS: [&str; 2] = ["LiveRegSgpr", "CFG"];

impl OutputFileKind {
    /// Classify an output tag. `Ok(None)` for known tags that are not tracked.
    pub fn from_tag(tag: &str) -> Result<Option<Self>> {
        if IGNORED_TAGS.contains(&tag) {
            return Ok(None);
        }
        OutputFileKind::from_str(tag)
            .map(Some)
            .map_err(|_| Error::UnknownOutputTag(tag.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputFile {
    pub path: PathBuf,
    pub kind: OutputFileKind,
}

// ----------------------------------------------------------------------------
// Entries

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display)]
pub enum PipelineType {
    Graphics,
    Compute,
}

/// What an entry point is, by metadata flavour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    /// Kernel or shader of a program build, e.g. `OpenCL_Kernel` or `DX12_Pixel`.
    Kernel {
        kind: String,
        long_name: Option<String>,
    },
    /// Stage of a pipeline build, e.g. `Vert` or `Comp`.
    Stage {
        stage: String,
        pipeline: PipelineType,
    },
}

impl EntryKind {
    /// Kind text as written in the metadata.
    pub fn name(&self) -> &str {
        match self {
            EntryKind::Kernel { kind, .. } => kind,
            EntryKind::Stage { stage, .. } => stage,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutputEntry {
    pub target_gpu: String,
    pub input_file: PathBuf,
    pub entry_point: String,
    pub kind: EntryKind,
    pub outputs: Vec<OutputFile>,
}

impl BuildOutputEntry {
    pub fn output(&self, kind: OutputFileKind) -> Option<&Path> {
        self.outputs
            .iter()
            .find(|o| o.kind == kind)
            .map(|o| o.path.as_path())
    }

    pub fn matches(&self, input_file: &Path, entry_point: &str) -> bool {
        self.input_file == input_file && self.entry_point == entry_point
    }
}

// ----------------------------------------------------------------------------
// Collection

/// Build output entries grouped by target GPU, in first-seen GPU order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildOutputCollection {
    by_gpu: IndexMap<String, Vec<BuildOutputEntry>>,
}

impl BuildOutputCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: BuildOutputEntry) {
        self.by_gpu
            .entry(entry.target_gpu.clone())
            .or_default()
            .push(entry);
    }

    pub fn target_gpus(&self) -> impl Iterator<Item = &str> {
        self.by_gpu.keys().map(String::as_str)
    }

    pub fn entries_for(&self, gpu: &str) -> &[BuildOutputEntry] {
        self.by_gpu.get(gpu).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn entries(&self) -> impl Iterator<Item = &BuildOutputEntry> {
        self.by_gpu.values().flatten()
    }

    pub fn entry(&self, gpu: &str, input_file: &Path, entry_point: &str) -> Option<&BuildOutputEntry> {
        self.entries_for(gpu)
            .iter()
            .find(|e| e.matches(input_file, entry_point))
    }

    /// Distinct input files in first-seen order.
    pub fn input_files(&self) -> Vec<&Path> {
        let mut files: Vec<&Path> = Vec::new();
        for entry in self.entries() {
            if !files.contains(&entry.input_file.as_path()) {
                files.push(&entry.input_file);
            }
        }
        files
    }

    /// Drop every entry of `input_file`. GPUs left without entries are dropped too.
    /// Returns the number of removed entries.
    pub fn remove_input_file(&mut self, input_file: &Path) -> usize {
        let mut removed = 0;
        for entries in self.by_gpu.values_mut() {
            let before = entries.len();
            entries.retain(|e| e.input_file != input_file);
            removed += before - entries.len();
        }
        self.by_gpu.retain(|_, entries| !entries.is_empty());
        removed
    }

    pub fn len(&self) -> usize {
        self.by_gpu.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_gpu.is_empty()
    }
}
