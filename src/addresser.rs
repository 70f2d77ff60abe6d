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

//! Stage 3 — Addresser. The most intricate stage: it turns the spaced line
//! list into a dense address-indexed image, collects label definitions, and
//! resolves every `T@`/`B@`/bare label reference to a numeric cell (§4.3).
//!
//! Three passes, run in order:
//!   A. origin validation — `ORG` addresses must strictly increase and each
//!      gap must fit the content between two origins.
//!   B. placement — lay every line's cell(s) out at absolute addresses.
//!   C. label collection and reference resolution.

use crate::errors::{CompileError, StageFailure};
use crate::tables::DefinitionTables;
use std::collections::HashMap;

/// One byte-address-indexed cell of the addressed image. Intentionally a
/// single `String` type rather than an enum of token kinds during passes A/B
/// — the image only needs structure once pass C starts resolving references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressedImage {
    pub cells: Vec<String>,
}

impl AddressedImage {
    pub fn max_addr(&self) -> usize {
        self.cells.len()
    }
}

/// Runs all three Addresser passes over the Spacer's output. The second
/// element of the success tuple carries info-level notes worth surfacing in
/// the compilation log even though they aren't errors (currently just the
/// default-length-1 fallback described in the spec's design notes).
///
/// On failure, whichever pass reported it, the image built up to that point
/// is carried alongside the errors so an `ADDRESSED` dump can still be
/// written for this stage (§4.7).
pub fn address(
    spaced: &str,
    tables: &DefinitionTables,
) -> Result<(AddressedImage, Vec<String>), StageFailure<AddressedImage>> {
    let lines: Vec<&str> = spaced.lines().collect();

    let origin_result = validate_origins(&lines);

    let placed = match place(&lines) {
        Ok(cells) => cells,
        Err(failure) => {
            let mut errors = origin_result.err().unwrap_or_default();
            errors.extend(failure.errors);
            return Err(StageFailure {
                errors,
                partial: AddressedImage {
                    cells: failure.partial,
                },
            });
        }
    };

    if let Err(errors) = origin_result {
        return Err(StageFailure {
            errors,
            partial: AddressedImage { cells: placed },
        });
    }

    match resolve_labels(placed, tables) {
        Ok((cells, info)) => Ok((AddressedImage { cells }, info)),
        Err(failure) => Err(StageFailure {
            errors: failure.errors,
            partial: AddressedImage {
                cells: failure.partial,
            },
        }),
    }
}

struct OriginLine {
    line_num: usize,
    address: u32,
}

fn parse_origin(line: &str) -> Option<u32> {
    let rest = line.strip_prefix("ORG ")?;
    let addr_token = rest.strip_suffix(':')?;
    addr_token.parse::<u32>().ok()
}

/// Pass A — origin addresses must be strictly increasing, and the content
/// between two consecutive `ORG`s must fit in the gap between them.
/// `OriginNonMonotonic` invalidates every later comparison (there is no
/// longer a trustworthy "previous origin"), so it aborts the pass
/// immediately; `OriginOverflow` does not, so overflow across multiple
/// origin gaps is collected before returning.
fn validate_origins(lines: &[&str]) -> Result<(), Vec<CompileError>> {
    let mut origins: Vec<OriginLine> = Vec::new();
    let mut content_since_last_origin = 0usize;
    let mut errors = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let line_num = idx + 1;
        if line.starts_with("ORG ") {
            if let Some(address) = parse_origin(line) {
                if let Some(prev) = origins.last() {
                    if address <= prev.address {
                        return Err(vec![CompileError::OriginNonMonotonic {
                            line: line_num,
                            address,
                            previous: prev.address,
                            previous_line: prev.line_num,
                        }]);
                    }
                    let available = address - prev.address;
                    if content_since_last_origin as u32 > available {
                        errors.push(CompileError::OriginOverflow {
                            line: prev.line_num,
                            content_lines: content_since_last_origin,
                            available,
                        });
                    }
                }
                origins.push(OriginLine { line_num, address });
                content_since_last_origin = 0;
            }
            continue;
        }
        if !line.is_empty() {
            content_since_last_origin += 1;
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Pass B — lay the spaced lines out at absolute addresses, honoring `ORG`
/// and expanding `DB` into one cell per byte. The image is extended with
/// `"0"` padding up to `cursor` before every placement.
fn place(lines: &[&str]) -> Result<Vec<String>, StageFailure<Vec<String>>> {
    let mut cells: Vec<String> = Vec::new();
    let mut cursor: usize = 0;
    let mut errors = Vec::new();

    for (idx, line) in lines.iter().enumerate() {
        let line_num = idx + 1;

        if let Some(address) = parse_origin(line) {
            cursor = address as usize;
            continue;
        }

        if line.is_empty() {
            extend_to(&mut cells, cursor);
            cells[cursor] = "0".to_string();
            cursor += 1;
            continue;
        }

        let tokens: Vec<&str> = line.split(' ').collect();
        if tokens[0] == "DB" {
            for raw in &tokens[1..] {
                let value: i64 = match raw.parse() {
                    Ok(v) => v,
                    Err(_) => {
                        errors.push(CompileError::DataByteOutOfRange {
                            line: line_num,
                            value: 0,
                        });
                        return Err(StageFailure {
                            errors,
                            partial: cells,
                        });
                    }
                };
                if !(0..=255).contains(&value) {
                    errors.push(CompileError::DataByteOutOfRange {
                        line: line_num,
                        value,
                    });
                    return Err(StageFailure {
                        errors,
                        partial: cells,
                    });
                }
                extend_to(&mut cells, cursor);
                cells[cursor] = value.to_string();
                cursor += 1;
            }
            continue;
        }

        extend_to(&mut cells, cursor);
        cells[cursor] = line.to_string();
        cursor += 1;
    }

    if errors.is_empty() {
        Ok(cells)
    } else {
        Err(StageFailure {
            errors,
            partial: cells,
        })
    }
}

fn extend_to(cells: &mut Vec<String>, cursor: usize) {
    if cells.len() <= cursor {
        cells.resize(cursor + 1, "0".to_string());
    }
}

fn is_label_def(cell: &str) -> Option<&str> {
    if cell.len() > 1 && cell.ends_with(':') && !cell.starts_with("ORG ") {
        Some(&cell[..cell.len() - 1])
    } else {
        None
    }
}

/// Pass C — collects label definitions (shifting the image down one cell
/// per label removed) then resolves `T@`/`B@` and bare references in place.
fn resolve_labels(
    mut cells: Vec<String>,
    tables: &DefinitionTables,
) -> Result<(Vec<String>, Vec<String>), StageFailure<Vec<String>>> {
    let mut labels: HashMap<String, usize> = HashMap::new();
    let mut errors = Vec::new();

    let mut i = 0;
    while i < cells.len() {
        if let Some(name) = is_label_def(&cells[i]) {
            let name = name.to_string();
            if let Some(&previous) = labels.get(&name) {
                errors.push(CompileError::DuplicateLabel {
                    address: i,
                    name,
                    previous,
                });
                cells.remove(i);
                continue;
            }
            labels.insert(name, i);
            cells.remove(i);
            continue;
        }
        i += 1;
    }

    if !errors.is_empty() {
        return Err(StageFailure {
            errors,
            partial: cells,
        });
    }

    for addr in 0..cells.len() {
        if let Err(e) = substitute_prefixed(&mut cells, addr, &labels) {
            errors.push(e);
        }
    }
    if !errors.is_empty() {
        return Err(StageFailure {
            errors,
            partial: cells,
        });
    }

    let mut info = Vec::new();
    for addr in 0..cells.len() {
        match substitute_bare(&mut cells, addr, &labels, tables) {
            Ok(Some(note)) => info.push(note),
            Ok(None) => {}
            Err(e) => errors.push(e),
        }
    }
    if !errors.is_empty() {
        return Err(StageFailure {
            errors,
            partial: cells,
        });
    }

    Ok((cells, info))
}

/// `T@NAME` / `B@NAME` always occupy a whole cell by construction (the
/// Spacer only ever emits them as standalone lines), so this is a
/// whole-cell match rather than a regex substring replace.
fn substitute_prefixed(
    cells: &mut [String],
    addr: usize,
    labels: &HashMap<String, usize>,
) -> Result<(), CompileError> {
    let cell = cells[addr].clone();
    let (prefix, name) = if let Some(n) = cell.strip_prefix("T@") {
        ('T', n)
    } else if let Some(n) = cell.strip_prefix("B@") {
        ('B', n)
    } else {
        return Ok(());
    };

    let target = *labels
        .get(name)
        .ok_or_else(|| CompileError::UndefinedLabel {
            address: addr,
            name: name.to_string(),
        })?;

    let value = if prefix == 'T' {
        (target >> 8) & 0xFF
    } else {
        target & 0xFF
    };
    cells[addr] = value.to_string();
    Ok(())
}

/// A bare label reference is a whole-cell token (the Spacer emits operands
/// one per line) that isn't purely digits, isn't an instruction name, and
/// is present in `labels`. Anything else passes through untouched.
fn substitute_bare(
    cells: &mut [String],
    addr: usize,
    labels: &HashMap<String, usize>,
    tables: &DefinitionTables,
) -> Result<Option<String>, CompileError> {
    let token = cells[addr].clone();

    if token.is_empty() || token.chars().all(|c| c.is_ascii_digit()) {
        return Ok(None);
    }
    if tables.is_instruction_name(&token) {
        return Ok(None);
    }
    let Some(&target) = labels.get(&token) else {
        return Ok(None);
    };

    let here = addr;
    let instr_name = if here > 0 { cells[here - 1].as_str() } else { "" };
    let mut info = None;
    let instr_len = match tables.instruction_by_name(instr_name) {
        Some(def) => def.length as i64,
        None => {
            info = Some(format!(
                "address {addr}: mnemonic '{instr_name}' not found while computing the branch offset for '{token}'; defaulted to length 1"
            ));
            1
        }
    };

    let raw = (target as i64 - (here as i64 + instr_len)).abs();
    let offset = if target as i64 > here as i64 {
        raw + 1
    } else {
        raw - 1
    };

    if !(0..=255).contains(&offset) {
        return Err(CompileError::OffsetOutOfRange {
            address: addr,
            name: token,
            offset,
        });
    }

    cells[addr] = offset.to_string();
    Ok(info)
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
    fn s1_plain_nop() {
        let (img, _) = address("ORG 0:\nNOP", &tables()).unwrap();
        assert_eq!(img.cells, vec!["NOP"]);
    }

    #[test]
    fn s2_forward_16add_jump() {
        let spaced = "ORG 0:\nJMP\nT@START\nB@START\n\n\n\n\n\n\n\nORG 10:\nSTART:\nNOP";
        let (img, _) = address(spaced, &tables()).unwrap();
        assert_eq!(
            img.cells,
            vec!["JMP", "0", "10", "0", "0", "0", "0", "0", "0", "0", "NOP"]
        );
    }

    #[test]
    fn s3_forward_branch_offset() {
        let spaced = "ORG 0:\nBR\nNEXT\nNOP\nNEXT:\nNOP";
        let (img, _) = address(spaced, &tables()).unwrap();
        assert_eq!(img.cells, vec!["BR", "1", "NOP", "NOP"]);
    }

    #[test]
    fn s4_backward_branch_offset() {
        let spaced = "ORG 0:\nHERE:\nNOP\nBR\nHERE";
        let (img, _) = address(spaced, &tables()).unwrap();
        assert_eq!(img.cells, vec!["NOP", "BR", "3"]);
    }

    #[test]
    fn s5_data_bytes_roundtrip() {
        let (img, _) = address("ORG 0:\nDB 255 128 0", &tables()).unwrap();
        assert_eq!(img.cells, vec!["255", "128", "0"]);
    }

    #[test]
    fn rejects_data_byte_out_of_range() {
        let err = address("ORG 0:\nDB 999", &tables()).unwrap_err();
        assert!(matches!(err.errors[0], CompileError::DataByteOutOfRange { .. }));
    }

    #[test]
    fn failed_placement_still_yields_a_partial_image_for_dumping() {
        let err = address("ORG 0:\nNOP\nDB 999", &tables()).unwrap_err();
        assert_eq!(err.partial.cells, vec!["NOP"]);
    }

    #[test]
    fn origin_overflow_counts_one_content_line_per_db_directive_not_per_byte() {
        // A single `DB` directive producing several bytes still counts as one
        // content line against the gap to the next `ORG` (§4.2/§4.3) — the
        // Spacer keeps it verbatim and only Pass B expands it into bytes.
        let (img, _) = address("ORG 0:\nDB 1 2 3\nORG 1:\nNOP", &tables()).unwrap();
        assert_eq!(img.cells.len(), 3);
    }

    #[test]
    fn rejects_nonmonotonic_origins() {
        let err = address("ORG 10:\nNOP\nORG 5:\nNOP", &tables()).unwrap_err();
        assert!(matches!(err.errors[0], CompileError::OriginNonMonotonic { .. }));
    }

    #[test]
    fn rejects_origin_overflow() {
        let err = address("ORG 0:\nNOP\nNOP\nORG 1:\nNOP", &tables()).unwrap_err();
        assert!(matches!(err.errors[0], CompileError::OriginOverflow { .. }));
    }

    #[test]
    fn origin_overflow_failure_still_yields_the_placed_image() {
        let err = address("ORG 0:\nNOP\nNOP\nORG 1:\nNOP", &tables()).unwrap_err();
        assert_eq!(err.partial.cells, vec!["NOP", "NOP"]);
    }

    #[test]
    fn rejects_duplicate_labels() {
        let err = address("LOOP:\nNOP\nLOOP:\nNOP", &tables()).unwrap_err();
        assert!(matches!(err.errors[0], CompileError::DuplicateLabel { .. }));
    }

    #[test]
    fn rejects_undefined_label() {
        let err = address("ORG 0:\nJMP\nT@NOWHERE\nB@NOWHERE", &tables()).unwrap_err();
        assert!(matches!(err.errors[0], CompileError::UndefinedLabel { .. }));
    }

    #[test]
    fn rejects_offset_out_of_range() {
        let mut spaced = String::from("ORG 0:\nBR\nFAR\n");
        for _ in 0..300 {
            spaced.push_str("0\n");
        }
        spaced.push_str("FAR:\nNOP");
        let err = address(&spaced, &tables()).unwrap_err();
        assert!(matches!(err.errors[0], CompileError::OffsetOutOfRange { .. }));
    }
}
