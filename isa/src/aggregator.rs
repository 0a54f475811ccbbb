use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::Result;
use crate::output::{BuildOutputCollection, BuildOutputEntry, OutputFileKind};
use crate::session::read_session_metadata;
use crate::store::EntrypointDisassemblyStore;
use crate::usage::{load_resource_usage, ResourceUsageAnalyzer, ResourceUsageRecord, ResourceUsageReport};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct EntryKey {
    gpu: String,
    input_file: PathBuf,
    entry_point: String,
}

impl EntryKey {
    fn new(gpu: &str, input_file: &Path, entry_point: &str) -> Self {
        EntryKey {
            gpu: gpu.to_string(),
            input_file: input_file.to_path_buf(),
            entry_point: entry_point.to_string(),
        }
    }
}

/// Build results of one project, with lazily loaded per-entry data.
///
/// Disassembly and resource usage are parsed the first time they are asked
/// for and kept until the next build or until their input file is removed.
#[derive(Debug, Default)]
pub struct BuildOutputAggregator {
    analyzer: ResourceUsageAnalyzer,
    outputs: BuildOutputCollection,
    disassembly: HashMap<EntryKey, EntrypointDisassemblyStore>,
    usage: HashMap<EntryKey, Option<ResourceUsageRecord>>,
}

impl BuildOutputAggregator {
    pub fn new(config: Config) -> Self {
        BuildOutputAggregator {
            analyzer: ResourceUsageAnalyzer::new(&config),
            ..Default::default()
        }
    }

    /// Read the build outputs listed by a session metadata file.
    ///
    /// `target` is the GPU of a pipeline build, whose metadata names none.
    pub fn ingest_session_metadata(path: impl AsRef<Path>, target: Option<&str>) -> Result<BuildOutputCollection> {
        read_session_metadata(path, target).map(|s| s.into_outputs())
    }

    /// Replace every previous build result.
    pub fn update_build_output(&mut self, outputs: BuildOutputCollection) {
        tracing::info!(
            entries = outputs.len(),
            dropped = self.outputs.len(),
            "replacing build output"
        );
        self.outputs = outputs;
        self.disassembly.clear();
        self.usage.clear();
    }

    /// Forget every entry of `input_file` and anything loaded for it.
    pub fn remove_input_file_entries(&mut self, input_file: impl AsRef<Path>) -> usize {
        let input_file = input_file.as_ref();
        let removed = self.outputs.remove_input_file(input_file);
        self.disassembly.retain(|key, _| key.input_file != input_file);
        self.usage.retain(|key, _| key.input_file != input_file);
        tracing::info!(file = %input_file.display(), removed, "purged build output");
        removed
    }

    pub fn clear(&mut self) {
        self.update_build_output(BuildOutputCollection::new());
    }

    pub fn analyzer(&self) -> &ResourceUsageAnalyzer {
        &self.analyzer
    }

    pub fn outputs(&self) -> &BuildOutputCollection {
        &self.outputs
    }

    pub fn target_gpus(&self) -> Vec<&str> {
        self.outputs.target_gpus().collect()
    }

    pub fn entries_for(&self, gpu: &str) -> &[BuildOutputEntry] {
        self.outputs.entries_for(gpu)
    }

    pub fn input_files(&self) -> Vec<&Path> {
        self.outputs.input_files()
    }

    pub fn entry(&self, gpu: &str, input_file: impl AsRef<Path>, entry_point: &str) -> Option<&BuildOutputEntry> {
        self.outputs.entry(gpu, input_file.as_ref(), entry_point)
    }

    pub fn is_loaded(&self, gpu: &str, input_file: impl AsRef<Path>, entry_point: &str) -> bool {
        let key = EntryKey::new(gpu, input_file.as_ref(), entry_point);
        self.disassembly.get(&key).is_some_and(|s| s.is_loaded())
    }

    /// Disassembly of one entry point, loaded on first use.
    ///
    /// `Ok(None)` when the entry is unknown or lists no disassembly CSV.
    pub fn disassembly(
        &mut self,
        gpu: &str,
        input_file: impl AsRef<Path>,
        entry_point: &str,
    ) -> Result<Option<&EntrypointDisassemblyStore>> {
        let input_file = input_file.as_ref();
        let Some(path) = self.output_path(gpu, input_file, entry_point, OutputFileKind::IsaDisassemblyCsv) else {
            return Ok(None);
        };

        let key = EntryKey::new(gpu, input_file, entry_point);
        let store = self.disassembly.entry(key.clone()).or_default();
        if let Err(e) = store.load_from_csv(&path) {
            self.disassembly.remove(&key);
            return Err(e);
        }
        Ok(self.disassembly.get(&key))
    }

    /// Resource usage of one entry point, parsed on first use.
    ///
    /// `Ok(None)` means no data: the entry lists no statistics file, the
    /// listed file was never written, or it has no row for `gpu`.
    pub fn resource_usage(
        &mut self,
        gpu: &str,
        input_file: impl AsRef<Path>,
        entry_point: &str,
    ) -> Result<Option<&ResourceUsageRecord>> {
        let input_file = input_file.as_ref();
        let key = EntryKey::new(gpu, input_file, entry_point);
        if !self.usage.contains_key(&key) {
            if self.outputs.entry(gpu, input_file, entry_point).is_none() {
                return Ok(None);
            }
            let record = self.read_usage(gpu, input_file, entry_point)?;
            self.usage.insert(key.clone(), record);
        }
        Ok(self.usage.get(&key).and_then(Option::as_ref))
    }

    pub fn resource_usage_report(
        &mut self,
        gpu: &str,
        input_file: impl AsRef<Path>,
        entry_point: &str,
    ) -> Result<Option<ResourceUsageReport>> {
        let analyzer = self.analyzer;
        Ok(self
            .resource_usage(gpu, input_file, entry_point)?
            .map(|record| analyzer.report(record)))
    }

    fn output_path(&self, gpu: &str, input_file: &Path, entry_point: &str, kind: OutputFileKind) -> Option<PathBuf> {
        self.outputs
            .entry(gpu, input_file, entry_point)
            .and_then(|e| e.output(kind))
            .map(Path::to_path_buf)
    }

    fn read_usage(&self, gpu: &str, input_file: &Path, entry_point: &str) -> Result<Option<ResourceUsageRecord>> {
        let Some(path) = self.output_path(gpu, input_file, entry_point, OutputFileKind::ResourceUsageCsv) else {
            return Ok(None);
        };
        if !path.exists() {
            tracing::warn!(path = %path.display(), "resource usage file missing");
            return Ok(None);
        }

        let mut records = load_resource_usage(&path)?;
        // one row per device
        match records.iter().position(|r| r.device.eq_ignore_ascii_case(gpu)) {
            Some(pos) => Ok(Some(records.swap_remove(pos))),
            None => {
                tracing::warn!(path = %path.display(), gpu, "no resource usage row for target");
                Ok(None)
            }
        }
    }
}
