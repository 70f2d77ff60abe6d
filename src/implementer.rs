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

//! Stage 4 — Implementer. Walks the addressed image and substitutes
//! mnemonics and symbolic operand names for their numeric encodings,
//! producing one commented line per byte (§4.4).

use crate::addresser::AddressedImage;
use crate::errors::{AddressKind, CompileError};
use crate::tables::{DefinitionTables, FormatToken};

/// A single emitted byte, plus the decimal value the final ROM image uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImplementedLine {
    pub value: u8,
    pub annotation: Option<String>,
}

impl ImplementedLine {
    pub fn render(&self) -> String {
        match &self.annotation {
            Some(note) => format!("{} //{note}", self.value),
            None => self.value.to_string(),
        }
    }
}

/// Runs the Implementer stage over the Addresser's output.
pub fn implement(
    image: &AddressedImage,
    tables: &DefinitionTables,
) -> Result<Vec<ImplementedLine>, Vec<CompileError>> {
    let cells = &image.cells;
    let mut out = Vec::with_capacity(cells.len());
    let mut errors = Vec::new();
    let mut a = 0usize;

    while a < cells.len() {
        let cell = &cells[a];

        if cell.is_empty() {
            out.push(ImplementedLine {
                value: 0,
                annotation: None,
            });
            a += 1;
            continue;
        }

        let Some(def) = tables.instruction_by_name(cell) else {
            out.push(encode_plain_cell(cell));
            a += 1;
            continue;
        };

        out.push(ImplementedLine {
            value: def.opcode,
            annotation: Some(def.name.clone()),
        });

        let mut cursor = a + 1;
        for operand in &def.operands {
            match operand {
                FormatToken::Num => {
                    out.push(encode_plain_cell(&cells[cursor]));
                    cursor += 1;
                }
                FormatToken::Wrt => {
                    match resolve_address(&cells[cursor], tables, AddressKind::Write, cursor) {
                        Ok((value, name)) => out.push(ImplementedLine {
                            value,
                            annotation: Some(name),
                        }),
                        Err(e) => errors.push(e),
                    }
                    cursor += 1;
                }
                FormatToken::Read => {
                    match resolve_address(&cells[cursor], tables, AddressKind::Read, cursor) {
                        Ok((value, name)) => out.push(ImplementedLine {
                            value,
                            annotation: Some(name),
                        }),
                        Err(e) => errors.push(e),
                    }
                    cursor += 1;
                }
                FormatToken::Addr16 => {
                    let mut hi = encode_plain_cell(&cells[cursor]);
                    hi.annotation = Some("T@16ADD".to_string());
                    out.push(hi);
                    cursor += 1;
                    let mut lo = encode_plain_cell(&cells[cursor]);
                    lo.annotation = Some("B@16ADD".to_string());
                    out.push(lo);
                    cursor += 1;
                }
            }
        }

        a = cursor;
    }

    if errors.is_empty() {
        Ok(out)
    } else {
        Err(errors)
    }
}

/// A numeric cell left untouched by the Addresser: a `DB` byte, an origin
/// padding `"0"`, or a resolved label offset/address byte. The Addresser's
/// invariants (§3) guarantee every such cell parses as a byte by the time
/// the Implementer runs.
fn encode_plain_cell(cell: &str) -> ImplementedLine {
    ImplementedLine {
        value: cell.parse::<u8>().unwrap_or(0),
        annotation: None,
    }
}

fn resolve_address(
    name: &str,
    tables: &DefinitionTables,
    kind: AddressKind,
    addr: usize,
) -> Result<(u8, String), CompileError> {
    let resolved = match kind {
        AddressKind::Write => tables.write_address_by_name(name),
        AddressKind::Read => tables.read_address_by_name(name),
    };
    resolved
        .map(|value| (value, name.to_string()))
        .ok_or_else(|| CompileError::UnknownAddressName {
            address: addr,
            kind,
            name: name.to_string(),
        })
}

/// Renders the implemented lines as the final one-byte-per-line decimal
/// stream described in §6, including the `//` commentary used by the
/// IMPLEMENTED debug dump.
pub fn render(lines: &[ImplementedLine]) -> String {
    lines
        .iter()
        .map(ImplementedLine::render)
        .collect::<Vec<_>>()
        .join("\n")
}

/// The final ROM image: one byte per implemented line, in address order.
pub fn to_bytes(lines: &[ImplementedLine]) -> Vec<u8> {
    lines.iter().map(|l| l.value).collect()
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

    fn img(cells: &[&str]) -> AddressedImage {
        AddressedImage {
            cells: cells.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn s1_encodes_plain_nop() {
        let out = implement(&img(&["NOP"]), &tables()).unwrap();
        assert_eq!(to_bytes(&out), vec![0]);
    }

    #[test]
    fn s2_encodes_16add_jump() {
        let out = implement(
            &img(&["JMP", "0", "10", "0", "0", "0", "0", "0", "0", "0", "NOP"]),
            &tables(),
        )
        .unwrap();
        assert_eq!(to_bytes(&out), vec![16, 0, 10, 0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn s3_encodes_num_branch() {
        let out = implement(&img(&["BR", "1", "NOP", "NOP"]), &tables()).unwrap();
        assert_eq!(to_bytes(&out), vec![32, 1, 0, 0]);
    }

    #[test]
    fn s5_passes_through_data_bytes() {
        let out = implement(&img(&["255", "128", "0"]), &tables()).unwrap();
        assert_eq!(to_bytes(&out), vec![255, 128, 0]);
    }

    #[test]
    fn s6_resolves_write_address_by_name() {
        let out = implement(&img(&["LD", "PORT"]), &tables()).unwrap();
        assert_eq!(to_bytes(&out), vec![48, 5]);
    }

    #[test]
    fn rejects_unknown_address_name() {
        let err = implement(&img(&["LD", "UNKNOWN"]), &tables()).unwrap_err();
        assert!(matches!(err[0], CompileError::UnknownAddressName { .. }));
    }

    #[test]
    fn renders_commented_lines() {
        let out = implement(&img(&["LD", "PORT"]), &tables()).unwrap();
        assert_eq!(render(&out), "48 //LD\n5 //PORT");
    }
}
