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

//! Stage 1 — Parser. Strips comments and whitespace noise and normalizes
//! every numeric literal to plain decimal text, so every later stage can
//! treat a line as a space-separated list of decimal/mnemonic tokens (§4.1).

use crate::errors::{CompileError, StageFailure};
use regex::Regex;
use std::sync::OnceLock;

fn hex_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^0x[0-9a-fA-F]+$").unwrap())
}

fn bin_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^0b[01]+$").unwrap())
}

fn decimal_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9]+$").unwrap())
}

/// A token is "number-like" when it starts the way a numeric literal would,
/// even if what follows turns out to be malformed. Anything else (a
/// mnemonic, a label, `ORG`, `T@foo`) passes through untouched.
fn looks_numeric(token: &str) -> bool {
    matches!(token.chars().next(), Some(c) if c.is_ascii_digit())
}

/// Runs the Parser stage over a whole source file, returning the cleaned,
/// normalized text (one instruction-ish statement per line) or every error
/// found across the file, alongside the partial cleaned text built up to
/// the point of failure so a `PARSED` dump can still be written (§4.7).
pub fn parse(source: &str) -> Result<String, StageFailure<String>> {
    let mut errors = Vec::new();
    let mut out_lines = Vec::new();

    for (idx, raw_line) in source.lines().enumerate() {
        let line_num = idx + 1;
        match clean_line(raw_line, line_num) {
            Ok(Some(cleaned)) => out_lines.push(cleaned),
            Ok(None) => {}
            Err(mut line_errors) => errors.append(&mut line_errors),
        }
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

/// Cleans a single line: strips a trailing `//` comment, collapses
/// whitespace, and normalizes numeric tokens. Returns `Ok(None)` for a line
/// that is empty once stripped.
fn clean_line(raw_line: &str, line_num: usize) -> Result<Option<String>, Vec<CompileError>> {
    let without_comment = strip_comment(raw_line);
    let despaced = without_comment.replace('\t', " ");

    let tokens: Vec<&str> = despaced.split_whitespace().collect();
    if tokens.is_empty() {
        return Ok(None);
    }

    let mut errors = Vec::new();
    let mut normalized = Vec::with_capacity(tokens.len());

    for token in tokens {
        match normalize_token(token, line_num) {
            Ok(t) => normalized.push(t),
            Err(e) => errors.push(e),
        }
    }

    if errors.is_empty() {
        Ok(Some(normalized.join(" ")))
    } else {
        Err(errors)
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find("//") {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn normalize_token(token: &str, line_num: usize) -> Result<String, CompileError> {
    if !looks_numeric(token) {
        return Ok(token.to_string());
    }

    if hex_re().is_match(token) {
        let value = u64::from_str_radix(&token[2..], 16).map_err(|_| {
            CompileError::InvalidNumberFormat {
                line: line_num,
                token: token.to_string(),
            }
        })?;
        return Ok(value.to_string());
    }

    if bin_re().is_match(token) {
        let value = u64::from_str_radix(&token[2..], 2).map_err(|_| {
            CompileError::InvalidNumberFormat {
                line: line_num,
                token: token.to_string(),
            }
        })?;
        return Ok(value.to_string());
    }

    if decimal_re().is_match(token) {
        return Ok(token.to_string());
    }

    if token.contains('.') {
        return Err(CompileError::DecimalLiteral {
            line: line_num,
            token: token.to_string(),
        });
    }

    Err(CompileError::InvalidNumberFormat {
        line: line_num,
        token: token.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_hex_and_binary() {
        let out = parse("LDI 0xFF\nLDI 0b101\nLDI 42\n").unwrap();
        assert_eq!(out, "LDI 255\nLDI 5\nLDI 42");
    }

    #[test]
    fn strips_comments_and_blank_lines() {
        let out = parse("  // a comment\nLDI 1 // trailing\n\nLDI 2\n").unwrap();
        assert_eq!(out, "LDI 1\nLDI 2");
    }

    #[test]
    fn collapses_tabs_and_repeated_spaces() {
        let out = parse("LDI\t\t1   2\n").unwrap();
        assert_eq!(out, "LDI 1 2");
    }

    #[test]
    fn rejects_decimal_literals() {
        let err = parse("LDI 3.14\n").unwrap_err();
        assert!(matches!(err.errors[0], CompileError::DecimalLiteral { .. }));
    }

    #[test]
    fn rejects_malformed_hex() {
        let err = parse("LDI 0xGG\n").unwrap_err();
        assert!(matches!(err.errors[0], CompileError::InvalidNumberFormat { .. }));
    }

    #[test]
    fn failed_line_still_keeps_earlier_cleaned_lines_for_dumping() {
        let err = parse("LDI 1\nLDI 3.14\n").unwrap_err();
        assert_eq!(err.partial, "LDI 1");
    }

    #[test]
    fn passes_through_labels_and_mnemonics() {
        let out = parse("ORG 10:\nLBL loop\nT@loop\n").unwrap();
        assert_eq!(out, "ORG 10:\nLBL loop\nT@loop");
    }
}
