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

//! Definition tables: the instruction set and the two address maps that
//! every stage but the parser consults. Loaded once from tab-separated
//! files and kept read-only for the rest of the compile (§3, §4.5).

use crate::errors::CompileError;
use crate::file_reader::FileReader;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// The name every table's reserved address-0 "do nothing" entry carries.
/// A file row that reuses this name is rejected with `DuplicateName` rather
/// than coexisting with the reserved entry under the same name (§2/§6:
/// address 0 is reserved and never file-defined).
const RESERVED_NAME: &str = "NOP";

/// One operand token drawn from an instruction's `format` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FormatToken {
    Num,
    Wrt,
    Read,
    Addr16,
}

impl FormatToken {
    fn from_str(token: &str) -> Option<FormatToken> {
        match token {
            "NUM" => Some(FormatToken::Num),
            "WRT" => Some(FormatToken::Wrt),
            "READ" => Some(FormatToken::Read),
            "16ADD" => Some(FormatToken::Addr16),
            _ => None,
        }
    }

    /// Bytes this operand occupies in the final encoded stream.
    pub fn width(self) -> u8 {
        match self {
            FormatToken::Addr16 => 2,
            _ => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstructionDef {
    pub opcode: u8,
    pub name: String,
    pub length: u8,
    pub leading_nops: u8,
    pub format: String,
    pub operands: Vec<FormatToken>,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressDef {
    pub address: u8,
    pub name: String,
    pub description: String,
}

/// The three definition tables, keyed by address, plus by-name indexes for
/// the reverse lookups the implementer needs.
#[derive(Debug, Default)]
pub struct DefinitionTables {
    pub instructions: HashMap<u8, InstructionDef>,
    pub write_addresses: HashMap<u8, AddressDef>,
    pub read_addresses: HashMap<u8, AddressDef>,
    instructions_by_name: HashMap<String, u8>,
    write_by_name: HashMap<String, u8>,
    read_by_name: HashMap<String, u8>,
}

impl DefinitionTables {
    pub fn load<R: FileReader>(
        reader: &R,
        write_path: &Path,
        read_path: &Path,
        instruction_path: &Path,
    ) -> Result<DefinitionTables, Vec<CompileError>> {
        let mut errors = Vec::new();

        let write_addresses = load_address_table(reader, write_path, "write table", &mut errors);
        let read_addresses = load_address_table(reader, read_path, "read table", &mut errors);
        let instructions = load_instruction_table(reader, instruction_path, &mut errors);

        if !errors.is_empty() {
            return Err(errors);
        }

        let mut write_addresses = write_addresses;
        let mut read_addresses = read_addresses;
        let mut instructions = instructions;

        // Address 0 is always the reserved "do nothing" entry; it is never
        // read from the file (a file that defines it was already rejected
        // above with `ReservedAddress`, and a file row named `RESERVED_NAME`
        // was already rejected with `DuplicateName`).
        write_addresses.entry(0).or_insert_with(|| AddressDef {
            address: 0,
            name: RESERVED_NAME.to_string(),
            description: "do nothing".to_string(),
        });
        read_addresses.entry(0).or_insert_with(|| AddressDef {
            address: 0,
            name: RESERVED_NAME.to_string(),
            description: "do nothing".to_string(),
        });
        instructions.entry(0).or_insert_with(|| InstructionDef {
            opcode: 0,
            name: RESERVED_NAME.to_string(),
            length: 1,
            leading_nops: 0,
            format: "INS".to_string(),
            operands: Vec::new(),
            description: "do nothing".to_string(),
        });

        let instructions_by_name = by_name(&instructions, |d| &d.name);
        let write_by_name = by_name(&write_addresses, |d| &d.name);
        let read_by_name = by_name(&read_addresses, |d| &d.name);

        Ok(DefinitionTables {
            instructions,
            write_addresses,
            read_addresses,
            instructions_by_name,
            write_by_name,
            read_by_name,
        })
    }

    pub fn instruction_by_name(&self, name: &str) -> Option<&InstructionDef> {
        self.instructions_by_name
            .get(name)
            .and_then(|addr| self.instructions.get(addr))
    }

    pub fn write_address_by_name(&self, name: &str) -> Option<u8> {
        self.write_by_name.get(name).copied()
    }

    pub fn read_address_by_name(&self, name: &str) -> Option<u8> {
        self.read_by_name.get(name).copied()
    }

    pub fn is_instruction_name(&self, name: &str) -> bool {
        self.instructions_by_name.contains_key(name)
    }
}

fn by_name<T>(table: &HashMap<u8, T>, name_of: impl Fn(&T) -> &String) -> HashMap<String, u8> {
    table
        .iter()
        .map(|(addr, def)| (name_of(def).clone(), *addr))
        .collect()
}

fn load_address_table<R: FileReader>(
    reader: &R,
    path: &Path,
    file_label: &str,
    errors: &mut Vec<CompileError>,
) -> HashMap<u8, AddressDef> {
    let content = match reader.read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            errors.push(CompileError::Io(format!("{file_label}: {e}")));
            return HashMap::new();
        }
    };

    let mut table = HashMap::new();
    let mut seen_addresses = HashSet::new();
    // "NOP" is the reserved address-0 entry every table gets (see below);
    // pre-seeding it here means a file row also named "NOP" is rejected as
    // a duplicate rather than silently shadowing or racing the reserved one.
    let mut seen_names: HashSet<String> = HashSet::from([RESERVED_NAME.to_string()]);

    for (line_num, line) in content.lines().enumerate() {
        let line_num = line_num + 1;
        if line.trim().is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 2 {
            errors.push(CompileError::IncompleteRow {
                file: file_label.to_string(),
                line: line_num,
            });
            continue;
        }

        let address = match parse_address(parts[0], file_label, line_num, "address", errors) {
            Some(a) => a,
            None => continue,
        };
        if !reserve_and_dedup(address, file_label, line_num, &mut seen_addresses, errors) {
            continue;
        }

        let name = parts[1].to_string();
        if !seen_names.insert(name.clone()) {
            errors.push(CompileError::DuplicateName {
                file: file_label.to_string(),
                line: line_num,
                name,
            });
            continue;
        }

        let description = parts.get(2).map(|s| s.to_string()).unwrap_or_default();
        table.insert(
            address,
            AddressDef {
                address,
                name,
                description,
            },
        );
    }

    table
}

fn load_instruction_table<R: FileReader>(
    reader: &R,
    path: &Path,
    errors: &mut Vec<CompileError>,
) -> HashMap<u8, InstructionDef> {
    let file_label = "instruction table";
    let content = match reader.read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            errors.push(CompileError::Io(format!("{file_label}: {e}")));
            return HashMap::new();
        }
    };

    let mut table = HashMap::new();
    let mut seen_addresses = HashSet::new();
    // See the matching comment in `load_address_table`: "NOP" is reserved
    // for the address-0 entry inserted after loading, so a file row naming
    // an instruction "NOP" is a duplicate, not a second NOP.
    let mut seen_names: HashSet<String> = HashSet::from([RESERVED_NAME.to_string()]);

    for (line_num, line) in content.lines().enumerate() {
        let line_num = line_num + 1;
        if line.trim().is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 5 {
            errors.push(CompileError::IncompleteRow {
                file: file_label.to_string(),
                line: line_num,
            });
            continue;
        }

        let address = match parse_address(parts[0], file_label, line_num, "address", errors) {
            Some(a) => a,
            None => continue,
        };
        if !reserve_and_dedup(address, file_label, line_num, &mut seen_addresses, errors) {
            continue;
        }

        let name = parts[1].to_string();
        if !seen_names.insert(name.clone()) {
            errors.push(CompileError::DuplicateName {
                file: file_label.to_string(),
                line: line_num,
                name,
            });
            continue;
        }

        let length = match parse_u8_field(parts[2], file_label, line_num, "length", errors) {
            Some(v) => v,
            None => continue,
        };
        let leading_nops =
            match parse_u8_field(parts[3], file_label, line_num, "leading_nops", errors) {
                Some(v) => v,
                None => continue,
            };
        let format = parts[4].to_string();
        let description = parts.get(5).map(|s| s.to_string()).unwrap_or_default();

        let operands = match parse_format(&format) {
            Some(ops) => ops,
            None => {
                errors.push(CompileError::InstructionDefInconsistent {
                    file: file_label.to_string(),
                    line: line_num,
                    name,
                    length,
                    implied: 0,
                    format,
                });
                continue;
            }
        };

        let implied = implied_length(&operands);
        if implied != length {
            errors.push(CompileError::InstructionDefInconsistent {
                file: file_label.to_string(),
                line: line_num,
                name,
                length,
                implied,
                format,
            });
            continue;
        }

        table.insert(
            address,
            InstructionDef {
                opcode: address,
                name,
                length,
                leading_nops,
                format,
                operands,
                description,
            },
        );
    }

    table
}

fn implied_length(operands: &[FormatToken]) -> u8 {
    1 + operands.iter().map(|t| t.width()).sum::<u8>()
}

/// Parses `"INS_NUM_16ADD"` into `[Num, Addr16]`, dropping the leading `INS`
/// token. Returns `None` if the format string is malformed (empty, missing
/// the `INS` prefix, or carrying an unrecognized operand token).
fn parse_format(format: &str) -> Option<Vec<FormatToken>> {
    let mut parts = format.split('_');
    if parts.next() != Some("INS") {
        return None;
    }
    parts.map(FormatToken::from_str).collect()
}

fn parse_address(
    raw: &str,
    file_label: &str,
    line_num: usize,
    field: &str,
    errors: &mut Vec<CompileError>,
) -> Option<u8> {
    match raw.parse::<u16>() {
        Ok(value) if value <= 255 => Some(value as u8),
        _ => {
            errors.push(CompileError::InvalidInteger {
                file: file_label.to_string(),
                line: line_num,
                field: field.to_string(),
                value: raw.to_string(),
            });
            None
        }
    }
}

fn parse_u8_field(
    raw: &str,
    file_label: &str,
    line_num: usize,
    field: &str,
    errors: &mut Vec<CompileError>,
) -> Option<u8> {
    match raw.parse::<u8>() {
        Ok(v) => Some(v),
        Err(_) => {
            errors.push(CompileError::InvalidInteger {
                file: file_label.to_string(),
                line: line_num,
                field: field.to_string(),
                value: raw.to_string(),
            });
            None
        }
    }
}

/// Checks the reserved-address-0 rule and within-file duplicate addresses.
/// Returns `false` (and has already recorded an error) when the row should
/// be skipped.
fn reserve_and_dedup(
    address: u8,
    file_label: &str,
    line_num: usize,
    seen_addresses: &mut HashSet<u8>,
    errors: &mut Vec<CompileError>,
) -> bool {
    if address == 0 {
        errors.push(CompileError::ReservedAddress {
            file: file_label.to_string(),
            line: line_num,
        });
        return false;
    }
    if !seen_addresses.insert(address) {
        errors.push(CompileError::DuplicateAddress {
            file: file_label.to_string(),
            line: line_num,
            address,
        });
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_reader::MockFileReader;

    fn reader_with(write: &str, read: &str, inst: &str) -> MockFileReader {
        let mut r = MockFileReader::default();
        r.add_file("w.tsv", write);
        r.add_file("r.tsv", read);
        r.add_file("i.tsv", inst);
        r
    }

    #[test]
    fn loads_minimal_tables() {
        let reader = reader_with(
            "5\tPORT\toutput port\n",
            "",
            "16\tJMP\t3\t0\tINS_16ADD\tjump\n",
        );
        let tables = DefinitionTables::load(
            &reader,
            Path::new("w.tsv"),
            Path::new("r.tsv"),
            Path::new("i.tsv"),
        )
        .unwrap();

        assert_eq!(tables.write_address_by_name("PORT"), Some(5));
        assert_eq!(tables.write_address_by_name("NOP"), Some(0));
        assert!(tables.is_instruction_name("JMP"));
        assert_eq!(tables.instruction_by_name("JMP").unwrap().length, 3);
        assert_eq!(tables.instruction_by_name("NOP").unwrap().opcode, 0);
    }

    #[test]
    fn rejects_instruction_row_named_nop() {
        let reader = reader_with("", "", "16\tNOP\t1\t0\tINS\tduplicate of the reserved nop\n");
        let err = DefinitionTables::load(
            &reader,
            Path::new("w.tsv"),
            Path::new("r.tsv"),
            Path::new("i.tsv"),
        )
        .unwrap_err();
        assert!(matches!(err[0], CompileError::DuplicateName { .. }));
    }

    #[test]
    fn rejects_reserved_address_zero() {
        let reader = reader_with("0\tBAD\tnope\n", "", "");
        let err = DefinitionTables::load(
            &reader,
            Path::new("w.tsv"),
            Path::new("r.tsv"),
            Path::new("i.tsv"),
        )
        .unwrap_err();
        assert!(matches!(err[0], CompileError::ReservedAddress { .. }));
    }

    #[test]
    fn rejects_length_format_mismatch() {
        let reader = reader_with("", "", "10\tBAD\t5\t0\tINS_NUM\tmismatched\n");
        let err = DefinitionTables::load(
            &reader,
            Path::new("w.tsv"),
            Path::new("r.tsv"),
            Path::new("i.tsv"),
        )
        .unwrap_err();
        assert!(matches!(
            err[0],
            CompileError::InstructionDefInconsistent { .. }
        ));
    }

    #[test]
    fn rejects_duplicate_address_and_name() {
        let reader = reader_with("5\tA\tx\n5\tB\ty\n", "", "");
        let err = DefinitionTables::load(
            &reader,
            Path::new("w.tsv"),
            Path::new("r.tsv"),
            Path::new("i.tsv"),
        )
        .unwrap_err();
        assert!(matches!(err[0], CompileError::DuplicateAddress { .. }));
    }
}
