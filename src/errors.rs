/*
Copyright 2025 Connor Nolan

Licensed under the Apache License, Version 2.0 (the "License");
you may not use this file except in compliance with the License.
You may obtain a copy of the License at

    http://www.apache.org/licenses/LICENSE-2.0

Unless required by applicable law or agreed to in writing, software
distributed under the License is distributed on an "AS IS" BASIS,
WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
See the License for the specific language governing permissions and
limitations under the License.
*/

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Where a diagnostic points: a source line number for the earlier stages,
/// a byte address once the addresser has taken over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Location {
    Line(usize),
    Address(usize),
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Line(n) => write!(f, "line {n}"),
            Location::Address(a) => write!(f, "address {a}"),
        }
    }
}

/// Which definition table an `UnknownAddressName` error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressKind {
    Write,
    Read,
}

impl fmt::Display for AddressKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressKind::Write => write!(f, "write"),
            AddressKind::Read => write!(f, "read"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompileError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("line {line}: '{token}' is not a valid number")]
    InvalidNumberFormat { line: usize, token: String },

    #[error("line {line}: decimal numbers are not supported: '{token}'")]
    DecimalLiteral { line: usize, token: String },

    #[error("{file} line {line}: incomplete row, missing required fields")]
    IncompleteRow { file: String, line: usize },

    #[error("{file} line {line}: invalid {field} '{value}'")]
    InvalidInteger {
        file: String,
        line: usize,
        field: String,
        value: String,
    },

    #[error("{file} line {line}: address 0 is reserved and cannot be defined")]
    ReservedAddress { file: String, line: usize },

    #[error("{file} line {line}: duplicate address {address}")]
    DuplicateAddress {
        file: String,
        line: usize,
        address: u8,
    },

    #[error("{file} line {line}: duplicate name '{name}'")]
    DuplicateName {
        file: String,
        line: usize,
        name: String,
    },

    #[error(
        "{file} line {line}: instruction '{name}' declares length {length} but format '{format}' implies {implied}"
    )]
    InstructionDefInconsistent {
        file: String,
        line: usize,
        name: String,
        length: u8,
        implied: u8,
        format: String,
    },

    #[error("line {line}: unknown instruction '{name}'")]
    UnknownInstruction { line: usize, name: String },

    #[error("line {line}: '{name}' expects {expected} operand(s), got {got}")]
    ArityMismatch {
        line: usize,
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("line {line}: ORG {address} is not an integer, or is missing its trailing ':'")]
    MalformedOrigin { line: usize, address: String },

    #[error("line {line}: ORG address {address} must be strictly greater than the previous ORG {previous} (line {previous_line})")]
    OriginNonMonotonic {
        line: usize,
        address: u32,
        previous: u32,
        previous_line: usize,
    },

    #[error(
        "line {line}: {content_lines} line(s) of content do not fit in the {available} byte(s) available before the next ORG"
    )]
    OriginOverflow {
        line: usize,
        content_lines: usize,
        available: u32,
    },

    #[error("line {line}: data byte {value} is out of range 0..=255")]
    DataByteOutOfRange { line: usize, value: i64 },

    #[error("address {address}: invalid label name '{name}'")]
    InvalidLabelName { address: usize, name: String },

    #[error("address {address}: duplicate label '{name}' (previously defined at address {previous})")]
    DuplicateLabel {
        address: usize,
        name: String,
        previous: usize,
    },

    #[error("address {address}: undefined label '{name}'")]
    UndefinedLabel { address: usize, name: String },

    #[error("address {address}: offset to label '{name}' is out of range (computed {offset})")]
    OffsetOutOfRange {
        address: usize,
        name: String,
        offset: i64,
    },

    #[error("address {address}: unknown {kind} address name '{name}'")]
    UnknownAddressName {
        address: usize,
        kind: AddressKind,
        name: String,
    },
}

impl CompileError {
    /// The short taxonomy tag this error belongs to, per the spec's error taxonomy.
    pub fn kind(&self) -> &'static str {
        match self {
            CompileError::Io(_) => "IO",
            CompileError::InvalidNumberFormat { .. } => "InvalidNumberFormat",
            CompileError::DecimalLiteral { .. } => "DecimalLiteral",
            CompileError::IncompleteRow { .. } => "IncompleteRow",
            CompileError::InvalidInteger { .. } => "InvalidInteger",
            CompileError::ReservedAddress { .. } => "ReservedAddress",
            CompileError::DuplicateAddress { .. } => "DuplicateAddress",
            CompileError::DuplicateName { .. } => "DuplicateName",
            CompileError::InstructionDefInconsistent { .. } => "InstructionDefInconsistent",
            CompileError::UnknownInstruction { .. } => "UnknownInstruction",
            CompileError::ArityMismatch { .. } => "ArityMismatch",
            CompileError::MalformedOrigin { .. } => "ParseSyntax",
            CompileError::OriginNonMonotonic { .. } => "OriginNonMonotonic",
            CompileError::OriginOverflow { .. } => "OriginOverflow",
            CompileError::DataByteOutOfRange { .. } => "DataByteOutOfRange",
            CompileError::InvalidLabelName { .. } => "InvalidLabelName",
            CompileError::DuplicateLabel { .. } => "DuplicateLabel",
            CompileError::UndefinedLabel { .. } => "UndefinedLabel",
            CompileError::OffsetOutOfRange { .. } => "OffsetOutOfRange",
            CompileError::UnknownAddressName { .. } => "UnknownAddressName",
        }
    }

    /// The location this error anchors to, when one can be recovered from its fields.
    pub fn location(&self) -> Option<Location> {
        match self {
            CompileError::Io(_) => None,
            CompileError::InvalidNumberFormat { line, .. }
            | CompileError::DecimalLiteral { line, .. }
            | CompileError::IncompleteRow { line, .. }
            | CompileError::InvalidInteger { line, .. }
            | CompileError::ReservedAddress { line, .. }
            | CompileError::DuplicateAddress { line, .. }
            | CompileError::DuplicateName { line, .. }
            | CompileError::InstructionDefInconsistent { line, .. }
            | CompileError::UnknownInstruction { line, .. }
            | CompileError::ArityMismatch { line, .. }
            | CompileError::MalformedOrigin { line, .. }
            | CompileError::OriginNonMonotonic { line, .. }
            | CompileError::OriginOverflow { line, .. }
            | CompileError::DataByteOutOfRange { line, .. } => Some(Location::Line(*line)),
            CompileError::InvalidLabelName { address, .. }
            | CompileError::DuplicateLabel { address, .. }
            | CompileError::UndefinedLabel { address, .. }
            | CompileError::OffsetOutOfRange { address, .. }
            | CompileError::UnknownAddressName { address, .. } => {
                Some(Location::Address(*address))
            }
        }
    }

    /// Render this error as the structured `{ kind, location, message }` record
    /// described by the external-interfaces section of the spec.
    pub fn to_record(&self) -> ErrorRecord {
        ErrorRecord {
            kind: self.kind().to_string(),
            location: self.location().map(|l| l.to_string()),
            message: self.to_string(),
        }
    }
}

/// The structured error record exposed across the CLI/GUI boundary.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub kind: String,
    pub location: Option<String>,
    pub message: String,
}

pub type StageErrors = Vec<CompileError>;

/// A stage's errors, carried alongside whatever partial output it had built
/// before hitting them. Lets the driver still write a debug dump for the
/// stage that failed (§4.7) instead of discarding its progress.
#[derive(Debug, Clone)]
pub struct StageFailure<T> {
    pub errors: Vec<CompileError>,
    pub partial: T,
}
