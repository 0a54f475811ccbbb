use roxmltree::{Document, Node};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{read_file, Error, Result};
use crate::output::{
    BuildOutputCollection, BuildOutputEntry, EntryKind, OutputFile, OutputFileKind, PipelineType,
};

// ----------------------------------------------------------------------------
// Tags

const ROOT_PROGRAM: [&str; 2] = ["ProgramOutputMetadata", "Metadata"];
const ROOT_PIPELINE: &str = "PipelineOutputMetadata";
const DATA_MODEL: &str = "DataModel";
// Synthetic root around the top-level elements.
const WRAPPER: &str = "SessionDocument";

const BINARY: [&str; 1] = ["Binary"];
const INPUT_FILE: [&str; 1] = ["InputFile"];
const PATH: [&str; 1] = ["Path"];
const ENTRY: [&str; 1] = ["Entry"];
const NAME: [&str; 1] = ["Name"];
const TYPE: [&str; 1] = ["Type"];
const LONG_NAME: [&str; 1] = ["ExtremelyLongName"];
const OUTPUT: [&str; 1] = ["Output"];
const TARGET: [&str; 2] = ["TargetGPU", "Target"];
const PIPELINE: [&str; 1] = ["Pipeline"];
const STAGE: [&str; 1] = ["Stage"];

/// Entry point name of every pipeline stage.
pub const STAGE_ENTRY_POINT: &str = "main";

// ----------------------------------------------------------------------------
// Session metadata

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionMetadata {
    Program {
        binary: PathBuf,
        outputs: BuildOutputCollection,
    },
    Pipeline {
        pipeline: PipelineType,
        outputs: BuildOutputCollection,
    },
}

impl SessionMetadata {
    pub fn outputs(&self) -> &BuildOutputCollection {
        match self {
            SessionMetadata::Program { outputs, .. } => outputs,
            SessionMetadata::Pipeline { outputs, .. } => outputs,
        }
    }

    pub fn into_outputs(self) -> BuildOutputCollection {
        match self {
            SessionMetadata::Program { outputs, .. } => outputs,
            SessionMetadata::Pipeline { outputs, .. } => outputs,
        }
    }
}

/// Read a session metadata file of either flavour.
///
/// Pipeline metadata usually carries no target tag; `target` names the GPU its
/// stages were built for.
pub fn read_session_metadata(path: impl AsRef<Path>, target: Option<&str>) -> Result<SessionMetadata> {
    let path = path.as_ref();
    let text = read_file(path)?;
    parse_session_metadata(path, &text, target)
}

pub fn parse_session_metadata(
    path: impl AsRef<Path>,
    text: &str,
    target: Option<&str>,
) -> Result<SessionMetadata> {
    let path = path.as_ref();
    let wrapped = wrap_top_level(text);
    let doc = Document::parse(&wrapped).map_err(|e| Error::Xml(path.to_path_buf(), e))?;

    let top: Vec<Node> = doc
        .root_element()
        .children()
        .filter(|n| n.is_element() && n.tag_name().name() != DATA_MODEL)
        .collect();
    let metadata = top.iter().find(|n| {
        let tag = n.tag_name().name();
        ROOT_PROGRAM.contains(&tag) || tag == ROOT_PIPELINE
    });

    let session = match metadata {
        Some(&root) if root.tag_name().name() == ROOT_PIPELINE => read_pipeline(root, target)?,
        Some(&root) => read_program(root)?,
        None => {
            let tag = top.first().map(|n| n.tag_name().name()).unwrap_or_default();
            return Err(Error::UnknownRoot(tag.to_string()));
        }
    };

    tracing::debug!(
        path = %path.display(),
        entries = session.outputs().len(),
        gpus = session.outputs().target_gpus().count(),
        "read session metadata"
    );
    Ok(session)
}

// ----------------------------------------------------------------------------
// Program flavour

fn read_program(root: Node) -> Result<SessionMetadata> {
    let binary = PathBuf::from(child_text(root, &BINARY)?);
    let mut outputs = BuildOutputCollection::new();

    for input in elements(root, &INPUT_FILE) {
        let input_file = PathBuf::from(child_text(input, &PATH)?);
        for entry in elements(input, &ENTRY) {
            let name = child_text(entry, &NAME)?;
            let kind = EntryKind::Kernel {
                kind: child_text(entry, &TYPE)?,
                long_name: child(entry, &LONG_NAME).and_then(text),
            };

            let mut found = false;
            for output in elements(entry, &OUTPUT) {
                let (target_gpu, files) = read_output(output, None)?;
                outputs.push(BuildOutputEntry {
                    target_gpu,
                    input_file: input_file.clone(),
                    entry_point: name.clone(),
                    kind: kind.clone(),
                    outputs: files,
                });
                found = true;
            }
            if !found {
                tracing::warn!(entry = %name, file = %input_file.display(), "entry without outputs");
            }
        }
    }

    Ok(SessionMetadata::Program { binary, outputs })
}

// ----------------------------------------------------------------------------
// Pipeline flavour

fn read_pipeline(root: Node, target: Option<&str>) -> Result<SessionMetadata> {
    let node = child(root, &PIPELINE).ok_or_else(|| missing(root, &PIPELINE))?;
    let type_text = child_text(node, &TYPE)?;
    let pipeline = PipelineType::from_str(&type_text).unwrap_or_else(|_| {
        tracing::warn!(pipeline = %type_text, "unrecognized pipeline type, assuming compute");
        PipelineType::Compute
    });

    let mut outputs = BuildOutputCollection::new();
    for stage in elements(node, &STAGE) {
        let stage_name = child_text(stage, &TYPE)?;
        let input = child(stage, &INPUT_FILE).ok_or_else(|| missing(stage, &INPUT_FILE))?;
        let input_file = PathBuf::from(child_text(input, &PATH)?);
        let output = child(stage, &OUTPUT).ok_or_else(|| missing(stage, &OUTPUT))?;
        let (target_gpu, files) = read_output(output, target)?;

        outputs.push(BuildOutputEntry {
            target_gpu,
            input_file,
            entry_point: STAGE_ENTRY_POINT.to_string(),
            kind: EntryKind::Stage {
                stage: stage_name,
                pipeline,
            },
            outputs: files,
        });
    }

    Ok(SessionMetadata::Pipeline { pipeline, outputs })
}

// ----------------------------------------------------------------------------
// Output node

/// Target GPU and listed files of one `<Output>` node. A target tag inside the
/// node wins over `fallback_target`.
fn read_output(output: Node, fallback_target: Option<&str>) -> Result<(String, Vec<OutputFile>)> {
    let mut target = None;
    let mut files = Vec::new();

    for node in output.children().filter(Node::is_element) {
        let tag = node.tag_name().name();
        if TARGET.contains(&tag) {
            target = text(node);
            continue;
        }
        let kind = match OutputFileKind::from_tag(tag) {
            Ok(Some(kind)) => kind,
            Ok(None) => continue,
            Err(e) => {
                tracing::warn!(%e, "skipping output");
                continue;
            }
        };
        match text(node) {
            Some(path) => files.push(OutputFile {
                path: PathBuf::from(path),
                kind,
            }),
            None => tracing::warn!(tag, "empty output file path"),
        }
    }

    let target = target
        .or_else(|| fallback_target.map(str::to_string))
        .ok_or_else(|| missing(output, &TARGET))?;
    Ok((target, files))
}

// ----------------------------------------------------------------------------
// Node helpers

/// Drop the XML declaration and put every top-level element under one wrapper.
fn wrap_top_level(text: &str) -> String {
    let body = text.trim_start_matches('\u{feff}').trim_start();
    let body = match body.strip_prefix("<?xml") {
        Some(rest) => rest.split_once("?>").map_or(rest, |(_, b)| b),
        None => body,
    };
    format!("<{0}>{1}</{0}>", WRAPPER, body)
}

fn text(node: Node) -> Option<String> {
    node.text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

fn child<'a, 'i>(node: Node<'a, 'i>, names: &[&str]) -> Option<Node<'a, 'i>> {
    elements(node, names).next()
}

fn elements<'a, 'i, 'n>(
    node: Node<'a, 'i>,
    names: &'n [&'n str],
) -> impl Iterator<Item = Node<'a, 'i>> + 'n
where
    'a: 'n,
    'i: 'n,
{
    node.children()
        .filter(move |n| n.is_element() && names.contains(&n.tag_name().name()))
}

fn child_text(node: Node, names: &[&'static str]) -> Result<String> {
    child(node, names)
        .and_then(text)
        .ok_or_else(|| missing(node, names))
}

fn missing(parent: Node, names: &[&'static str]) -> Error {
    Error::MissingNode {
        parent: parent.tag_name().name().to_string(),
        node: names[0],
    }
}
