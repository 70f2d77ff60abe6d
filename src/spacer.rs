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

//! Stage 2 — Spacer. Expands every mnemonic line into the physical lines it
//! will occupy once laid out: one line per operand, two for a `16ADD`
//! operand, then the instruction's trailing `leading_nops` zero lines (§4.2).

use crate::errors::{CompileError, StageFailure};
use crate::tables::{DefinitionTables, FormatToken};

const RESERVED_WORDS: [&str; 4] = ["ORG", "DB", "END", "EQU"];

fn is_label_name(name: &str) -> bool {
    !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !RESERVED_WORDS.contains(&name)
}

/// Runs the Spacer stage, expanding `cleaned` (the Parser's output) into the
/// spaced line list the Addresser will place at addresses. On failure, the
/// lines spaced before the error is carried alongside it so a `SPACED` dump
/// can still be written for this stage (§4.7).
pub fn space(cleaned: &str, tables: &DefinitionTables) -> Result<String, StageFailure<String>> {
    let mut errors = Vec::new();
    let mut out_lines = Vec::new();

    for (idx, line) in cleaned.lines().enumerate() {
        let line_num = idx + 1;
        let tokens: Vec<&str> = line.split(' ').collect();
        if tokens.is_empty() || tokens[0].is_empty() {
            continue;
        }
        let first = tokens[0];

        if first == "ORG" {
            match space_origin(line, line_num) {
                Ok(spaced) => out_lines.push(spaced),
                Err(e) => errors.push(e),
            }
            continue;
        }

        if tokens.len() == 1 && first.ends_with(':') {
            let name = &first[..first.len() - 1];
            if is_label_name(name) {
                out_lines.push(line.to_string());
            } else {
                errors.push(CompileError::InvalidLabelName {
                    address: line_num,
                    name: name.to_string(),
                });
            }
            continue;
        }

        if first == "DB" {
            match validate_data_bytes(&tokens, line_num) {
                Ok(()) => out_lines.push(line.to_string()),
                Err(e) => errors.push(e),
            }
            continue;
        }

        if let Some(def) = tables.instruction_by_name(first) {
            let operands = &tokens[1..];
            if operands.len() != def.operands.len() {
                errors.push(CompileError::ArityMismatch {
                    line: line_num,
                    name: first.to_string(),
                    expected: def.operands.len(),
                    got: operands.len(),
                });
                continue;
            }

            out_lines.push(first.to_string());
            for (token, operand) in operands.iter().zip(def.operands.iter()) {
                match operand {
                    FormatToken::Num | FormatToken::Wrt | FormatToken::Read => {
                        out_lines.push(token.to_string());
                    }
                    FormatToken::Addr16 => {
                        out_lines.push(format!("T@{token}"));
                        out_lines.push(format!("B@{token}"));
                    }
                }
            }
            for _ in 0..def.leading_nops {
                out_lines.push("0".to_string());
            }
            continue;
        }

        errors.push(CompileError::UnknownInstruction {
            line: line_num,
            name: first.to_string(),
        });
    }

    if errors.is_empty() {
        Ok(out_lines.join("\n"))
    } else {
        Err(StageFailure {
            errors,
            partial: out_lines.join("\n"),
        })
    }
}

fn space_origin(line: &str, line_num: usize) -> Result<String, CompileError> {
    let malformed = || CompileError::MalformedOrigin {
        line: line_num,
        address: line.to_string(),
    };

    let rest = line.strip_prefix("ORG ").ok_or_else(malformed)?;
    let addr_token = rest.strip_suffix(':').ok_or_else(malformed)?;
    addr_token.parse::<u32>().map_err(|_| malformed())?;

    Ok(line.to_string())
}

/// `DB` is kept verbatim through the Spacer (§4.2) — only its arity is
/// checked here. Byte-range validation and per-byte expansion happen in the
/// Addresser's Pass B placement (§4.3), which is the stage that actually
/// knows each byte's absolute address.
fn validate_data_bytes(tokens: &[&str], line_num: usize) -> Result<(), CompileError> {
    if tokens[1..].is_empty() {
        return Err(CompileError::ArityMismatch {
            line: line_num,
            name: "DB".to_string(),
            expected: 1,
            got: 0,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_reader::MockFileReader;

    fn tables() -> DefinitionTables {
        let mut reader = MockFileReader::default();
        reader.add_file("w.tsv", "5\tPORT\tport\n");
        reader.add_file("r.tsv", "");
        reader.add_file(
            "i.tsv",
            "16\tJMP\t3\t0\tINS_16ADD\tjump\n\
             32\tBR\t2\t0\tINS_NUM\tbranch\n\
             48\tLD\t2\t0\tINS_WRT\tload\n",
        );
        DefinitionTables::load(
            &reader,
            std::path::Path::new("w.tsv"),
            std::path::Path::new("r.tsv"),
            std::path::Path::new("i.tsv"),
        )
        .unwrap()
    }

    #[test]
    fn expands_16add_into_two_lines() {
        let out = space("ORG 0:\nJMP START", &tables()).unwrap();
        assert_eq!(out, "ORG 0:\nJMP\nT@START\nB@START");
    }

    #[test]
    fn expands_leading_nops() {
        let mut reader = MockFileReader::default();
        reader.add_file("w.tsv", "");
        reader.add_file("r.tsv", "");
        reader.add_file("i.tsv", "16\tSTP\t1\t2\tINS\tstop\n");
        let tables = DefinitionTables::load(
            &reader,
            std::path::Path::new("w.tsv"),
            std::path::Path::new("r.tsv"),
            std::path::Path::new("i.tsv"),
        )
        .unwrap();

        let out = space("STP", &tables).unwrap();
        assert_eq!(out, "STP\n0\n0");
    }

    #[test]
    fn rejects_arity_mismatch() {
        let err = space("BR", &tables()).unwrap_err();
        assert!(matches!(err.errors[0], CompileError::ArityMismatch { .. }));
    }

    #[test]
    fn rejects_unknown_instruction() {
        let err = space("FROB 1", &tables()).unwrap_err();
        assert!(matches!(err.errors[0], CompileError::UnknownInstruction { .. }));
    }

    #[test]
    fn failed_instruction_still_keeps_earlier_spaced_lines_for_dumping() {
        let err = space("NOP\nFROB 1", &tables()).unwrap_err();
        assert_eq!(err.partial, "NOP");
    }

    #[test]
    fn keeps_labels_and_data_bytes_verbatim() {
        let out = space("START:\nDB 255 0 128", &tables()).unwrap();
        assert_eq!(out, "START:\nDB 255 0 128");
    }

    #[test]
    fn rejects_data_byte_directive_with_no_operands() {
        let err = space("DB", &tables()).unwrap_err();
        assert!(matches!(err.errors[0], CompileError::ArityMismatch { .. }));
    }
}
