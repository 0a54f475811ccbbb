use color_print::{cformat, cprintln};
use itertools::Itertools;
use std::error::Error as _;
use std::path::Path;

use isa::{BuildOutputEntry, DisassemblyLine, EntryKind, EntrypointDisassemblyStore, ResourceUsageReport, SessionMetadata};

// ----------------------------------------------------------------------------
// Errors

/// Print an error in compiler-diagnostic style, echoing the failing row if any.
pub fn print_error(err: &isa::Error) {
    cprintln!("<red,bold>error</>: {}", err.root());

    let mut source = err.root().source();
    while let Some(cause) = source {
        cprintln!("      <blue>=</> caused by: {}", cause);
        source = cause.source();
    }

    if let isa::Error::AtLine { path, line, .. } = err {
        let raw = std::fs::read_to_string(path)
            .ok()
            .and_then(|text| text.lines().nth(line - 1).map(str::to_string))
            .unwrap_or_default();
        cprintln!("     <blue>--></> <underline>{}:{}</>", path.display(), line);
        cprintln!("      <blue>|</>");
        cprintln!(" <blue>{:>4} |</> {}", line, raw);
        cprintln!("      <blue>|</>");
    }
}

// ----------------------------------------------------------------------------
// Disassembly

pub fn print_disassembly(path: &Path, store: &EntrypointDisassemblyStore, highlight: Option<u32>) {
    let name = path.display().to_string();
    println!(
        "{}+------[{}]{}",
        "-".repeat(19),
        name,
        "-".repeat(45usize.saturating_sub(name.len()))
    );

    for (idx, line) in store.lines().iter().enumerate() {
        let body = match line {
            DisassemblyLine::Label(label) => {
                cformat!("{:19}| {:>5} | <g>{}</>", "", "", label.name)
            }
            DisassemblyLine::Instruction(inst) => {
                let source = inst
                    .source_line
                    .map(|n| n.to_string())
                    .unwrap_or_default();
                let target = store
                    .branch_target(idx)
                    .map(|t| cformat!(" <c>-> {}</>", t))
                    .unwrap_or_default();
                let text = format!("{:<20} {}", inst.opcode, inst.operands);
                let text = if highlight.is_some() && highlight == inst.source_line {
                    cformat!("<y,s>{}</>", text)
                } else {
                    text
                };
                cformat!(
                    "[{:>8}] {:>8} | {:>5} | {}{} <k!>; {} {}</>",
                    inst.address,
                    inst.binary_encoding,
                    source,
                    text,
                    target,
                    inst.functional_unit,
                    inst.cycles
                )
            }
        };
        println!("{}", body);
    }
    println!("-------------------+-----------------------------------------------------");

    let bounds = store
        .entrypoint_bounds()
        .map(|(start, end)| format!("{}..={}", start, end))
        .unwrap_or_else(|| "none".to_string());
    println!(
        "{} lines, {} instructions, source lines {}",
        store.len(),
        store.instruction_count(),
        bounds
    );

    if let Some(source) = highlight {
        let lines = store.disassembly_lines_for_source(source);
        if lines.is_empty() && !store.is_source_line_in_entrypoint(source) {
            cprintln!("source line {}: <k!>outside this entry point</>", source);
        } else {
            cprintln!("source line {}: lines [{}]", source, lines.iter().join(", "));
        }
    }
}

// ----------------------------------------------------------------------------
// Resource usage

pub fn print_usage(report: &ResourceUsageReport) {
    let flag = if report.hazards.overall() {
        cformat!("<r,s>hazard</>")
    } else {
        cformat!("<g>ok</>")
    };
    cprintln!("<s>{}</> [{}]", report.device, flag);
    for (label, value, hazard) in report.sections() {
        if hazard {
            cprintln!("  {:<18} <r>{}</>", label, value);
        } else {
            cprintln!("  {:<18} {}", label, value);
        }
    }
}

// ----------------------------------------------------------------------------
// Session

pub fn print_session_header(path: &Path, session: &SessionMetadata) {
    println!("+-----------------------------------------------+");
    println!("| {:<45} |", path.display());
    println!("+-----------------------------------------------+");
    match session {
        SessionMetadata::Program { binary, .. } => {
            cprintln!("<s>program</>  binary: {}", binary.display());
        }
        SessionMetadata::Pipeline { pipeline, .. } => {
            cprintln!("<s>pipeline</> {}", pipeline);
        }
    }
    println!("targets: {}", session.outputs().target_gpus().join(", "));
}

pub fn print_entry(entry: &BuildOutputEntry) {
    let kind = match &entry.kind {
        EntryKind::Kernel { kind, long_name } => match long_name {
            Some(long) => format!("{} ({})", kind, long),
            None => kind.clone(),
        },
        EntryKind::Stage { stage, pipeline } => format!("{} stage of {} pipeline", stage, pipeline),
    };
    cprintln!(
        "<c>{}</> {} <g>{}</> <k!>{}</>",
        entry.target_gpu,
        entry.input_file.display(),
        entry.entry_point,
        kind
    );
    for output in &entry.outputs {
        println!("    {:<14} {}", output.kind, output.path.display());
    }
}
