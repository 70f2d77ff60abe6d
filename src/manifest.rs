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

//! The project manifest: a flat `key=value` text file describing the
//! target device and naming the project. Unknown keys are preserved in
//! [`ProjectManifest::extra`] rather than rejected, so a project can carry
//! forward-looking or tool-specific settings without upsetting this loader.

use crate::errors::CompileError;
use crate::file_reader::FileReader;
use std::collections::HashMap;
use std::path::Path;

const FILE_LABEL: &str = "manifest";

const DEFAULT_PROGRAM_COUNTER_SIZE: u32 = 13;
const DEFAULT_BUS_WIDTH: u32 = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectManifest {
    pub project_name: String,
    pub read_space: bool,
    pub write_space: bool,
    pub instruction_space: bool,
    pub program_counter_size: u32,
    pub bus_width: u32,
    pub extra: HashMap<String, String>,
}

impl Default for ProjectManifest {
    fn default() -> Self {
        ProjectManifest {
            project_name: String::new(),
            read_space: true,
            write_space: true,
            instruction_space: true,
            program_counter_size: DEFAULT_PROGRAM_COUNTER_SIZE,
            bus_width: DEFAULT_BUS_WIDTH,
            extra: HashMap::new(),
        }
    }
}

impl ProjectManifest {
    pub fn load<R: FileReader>(
        reader: &R,
        path: &Path,
    ) -> Result<ProjectManifest, Vec<CompileError>> {
        let content = reader
            .read_to_string(path)
            .map_err(|e| vec![CompileError::Io(format!("{FILE_LABEL}: {e}"))])?;
        Self::parse(&content)
    }

    /// Parses the manifest's `key=value` lines. Blank lines and lines
    /// without an `=` are skipped; unrecognized keys fall through to
    /// `extra` untouched. A known boolean/int key with a value that doesn't
    /// parse is a hard error (§4.6) rather than a silent default.
    pub fn parse(content: &str) -> Result<ProjectManifest, Vec<CompileError>> {
        let mut manifest = ProjectManifest::default();
        let mut errors = Vec::new();

        for (idx, line) in content.lines().enumerate() {
            let line_num = idx + 1;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "ProjectName" => manifest.project_name = value.to_string(),
                "ReadSpace" => match parse_bool(value) {
                    Ok(b) => manifest.read_space = b,
                    Err(e) => errors.push(invalid_integer(line_num, "ReadSpace", value, e)),
                },
                "WriteSpace" => match parse_bool(value) {
                    Ok(b) => manifest.write_space = b,
                    Err(e) => errors.push(invalid_integer(line_num, "WriteSpace", value, e)),
                },
                "InstructionSpace" => match parse_bool(value) {
                    Ok(b) => manifest.instruction_space = b,
                    Err(e) => errors.push(invalid_integer(line_num, "InstructionSpace", value, e)),
                },
                "ProgramCounterSize" => match value.parse() {
                    Ok(n) => manifest.program_counter_size = n,
                    Err(e) => {
                        errors.push(invalid_integer(line_num, "ProgramCounterSize", value, e))
                    }
                },
                "BusWidth" => match value.parse() {
                    Ok(n) => manifest.bus_width = n,
                    Err(e) => errors.push(invalid_integer(line_num, "BusWidth", value, e)),
                },
                _ => {
                    manifest.extra.insert(key.to_string(), value.to_string());
                }
            }
        }

        if errors.is_empty() {
            Ok(manifest)
        } else {
            Err(errors)
        }
    }
}

fn invalid_integer(
    line: usize,
    field: &str,
    value: &str,
    _cause: impl std::fmt::Display,
) -> CompileError {
    CompileError::InvalidInteger {
        file: FILE_LABEL.to_string(),
        line,
        field: field.to_string(),
        value: value.to_string(),
    }
}

/// `true`/`1`/`yes` and `false`/`0`/`no` (case-insensitively); anything else
/// is a parse error rather than a silent default.
fn parse_bool(value: &str) -> Result<bool, &'static str> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err("not a recognized boolean"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_keys() {
        let manifest = ProjectManifest::parse(
            "ProjectName=Blinker\nReadSpace=false\nProgramCounterSize=16\nBusWidth=16\n",
        )
        .unwrap();
        assert_eq!(manifest.project_name, "Blinker");
        assert!(!manifest.read_space);
        assert!(manifest.write_space);
        assert_eq!(manifest.program_counter_size, 16);
        assert_eq!(manifest.bus_width, 16);
    }

    #[test]
    fn defaults_when_absent() {
        let manifest = ProjectManifest::parse("ProjectName=Bare\n").unwrap();
        assert_eq!(manifest.program_counter_size, DEFAULT_PROGRAM_COUNTER_SIZE);
        assert_eq!(manifest.bus_width, DEFAULT_BUS_WIDTH);
        assert!(manifest.read_space && manifest.write_space && manifest.instruction_space);
    }

    #[test]
    fn preserves_unknown_keys() {
        let manifest = ProjectManifest::parse("ProjectName=X\nClockSpeedHz=4000000\n").unwrap();
        assert_eq!(
            manifest.extra.get("ClockSpeedHz"),
            Some(&"4000000".to_string())
        );
    }

    #[test]
    fn rejects_malformed_boolean() {
        let err = ProjectManifest::parse("ProjectName=X\nReadSpace=maybe\n").unwrap_err();
        assert!(matches!(err[0], CompileError::InvalidInteger { .. }));
    }

    #[test]
    fn rejects_malformed_program_counter_size() {
        let err = ProjectManifest::parse("ProjectName=X\nProgramCounterSize=abc\n").unwrap_err();
        assert!(matches!(err[0], CompileError::InvalidInteger { .. }));
    }
}
