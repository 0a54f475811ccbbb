use num_enum::IntoPrimitive;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use strum::{Display, EnumString, IntoStaticStr};

use crate::error::{Error, Result};

// ----------------------------------------------------------------------------
// Functional unit

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    EnumString,
    Display,
)]
pub enum FunctionalUnit {
    #[strum(serialize = "Scalar ALU")]
    ScalarAlu,
    #[strum(serialize = "Scalar Memory")]
    ScalarMemory,
    #[strum(serialize = "Vector Memory")]
    VectorMemory,
    #[strum(serialize = "Vector ALU")]
    VectorAlu,
    #[strum(serialize = "LDS")]
    Lds,
    #[strum(serialize = "GDS/Export")]
    GdsExport,
    #[strum(serialize = "Flow Control")]
    FlowControl,
    #[strum(serialize = "Branch")]
    Branch,
    #[default]
    #[strum(serialize = "Unknown")]
    Unknown,
}

impl FunctionalUnit {
    /// Unrecognized text maps to `Unknown`.
    pub fn parse(text: &str) -> FunctionalUnit {
        let text = text.trim();
        FunctionalUnit::from_str(text).unwrap_or_else(|_| {
            tracing::warn!(unit = text, "unrecognized functional unit");
            FunctionalUnit::Unknown
        })
    }
}

// ----------------------------------------------------------------------------
// Disassembly lines

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstructionLine {
    pub address: String,
    pub opcode: String,
    pub operands: String,
    pub functional_unit: FunctionalUnit,
    pub cycles: String,
    pub binary_encoding: String,
    pub source_line: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelLine {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisassemblyLine {
    Instruction(InstructionLine),
    Label(LabelLine),
}

impl DisassemblyLine {
    pub fn source_line(&self) -> Option<u32> {
        match self {
            DisassemblyLine::Instruction(inst) => inst.source_line,
            DisassemblyLine::Label(_) => None,
        }
    }

    pub fn as_instruction(&self) -> Option<&InstructionLine> {
        match self {
            DisassemblyLine::Instruction(inst) => Some(inst),
            DisassemblyLine::Label(_) => None,
        }
    }

    pub fn is_label(&self) -> bool {
        matches!(self, DisassemblyLine::Label(_))
    }
}

// ----------------------------------------------------------------------------
// Row parser

/// Column order of an instruction row in a disassembly CSV file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, IntoStaticStr)]
#[repr(u8)]
pub enum Column {
    Address,
    SourceLineNumber,
    Opcode,
    Operands,
    FunctionalUnit,
    Cycles,
    BinaryEncoding,
}

impl Column {
    pub const COUNT: usize = 7;

    fn get(self, tokens: &[String]) -> &str {
        let index: u8 = self.into();
        &tokens[index as usize]
    }
}

pub const LABEL_COLUMNS: usize = 1;

pub fn parse_instruction_row(tokens: &[String]) -> Result<InstructionLine> {
    if tokens.len() != Column::COUNT {
        return Err(Error::ColumnCount {
            expected: Column::COUNT.to_string(),
            found: tokens.len(),
        });
    }

    Ok(InstructionLine {
        address: Column::Address.get(tokens).to_string(),
        opcode: Column::Opcode.get(tokens).to_string(),
        operands: Column::Operands.get(tokens).to_string(),
        functional_unit: FunctionalUnit::parse(Column::FunctionalUnit.get(tokens)),
        cycles: Column::Cycles.get(tokens).to_string(),
        binary_encoding: Column::BinaryEncoding.get(tokens).to_string(),
        source_line: parse_source_line(Column::SourceLineNumber.get(tokens))?,
    })
}

pub fn parse_label_row(tokens: &[String]) -> Result<LabelLine> {
    match tokens {
        [name] if name.trim().is_empty() => Err(Error::EmptyLabel),
        [name] => Ok(LabelLine {
            name: name.trim().to_string(),
        }),
        _ => Err(Error::ColumnCount {
            expected: LABEL_COLUMNS.to_string(),
            found: tokens.len(),
        }),
    }
}

/// Dispatch on column count: one column is a label, the full set is an instruction.
pub fn parse_row(tokens: &[String]) -> Result<DisassemblyLine> {
    match tokens.len() {
        LABEL_COLUMNS => parse_label_row(tokens).map(DisassemblyLine::Label),
        Column::COUNT => parse_instruction_row(tokens).map(DisassemblyLine::Instruction),
        found => Err(Error::ColumnCount {
            expected: format!("{} or {}", LABEL_COLUMNS, Column::COUNT),
            found,
        }),
    }
}

/// Empty and `-1` mean the instruction has no source line.
fn parse_source_line(text: &str) -> Result<Option<u32>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    let value: i64 = text.parse().map_err(|_| Error::InvalidNumber {
        column: Column::SourceLineNumber.into(),
        text: text.to_string(),
    })?;
    match value {
        -1 => Ok(None),
        v => u32::try_from(v)
            .map(Some)
            .map_err(|_| Error::InvalidSourceLine(v)),
    }
}
