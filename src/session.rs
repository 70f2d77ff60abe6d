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

//! The driver. A [`Session`] bundles the project paths a compile needs —
//! replacing the original program's process-wide "current project" globals
//! (§9) — and [`compile`] sequences Parser → Spacer → Addresser →
//! Implementer over it, stopping at the first stage that returns errors.
//! Every stage that ran gets its own debug dump, including the one that
//! failed — each stage hands back whatever partial output it had built
//! before hitting an error, so there's always a listing to write (§4.7).

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::addresser;
use crate::errors::{CompileError, ErrorRecord};
use crate::file_reader::{DebugSink, FileReader};
use crate::implementer;
use crate::manifest::ProjectManifest;
use crate::parser;
use crate::spacer;
use crate::tables::DefinitionTables;

/// The paths a single compile needs, resolved once up front instead of read
/// from globals at each call site.
pub struct Session {
    pub project_dir: PathBuf,
    pub manifest_path: PathBuf,
    pub write_table_path: PathBuf,
    pub read_table_path: PathBuf,
    pub instruction_table_path: PathBuf,
    pub source_path: PathBuf,
}

impl Session {
    /// Resolves every path by the CLI's naming convention: each file named
    /// `<ProjectName>.<ext>` inside `project_dir`, read from the manifest's
    /// `ProjectName` key (§6).
    pub fn from_project_name(project_dir: &Path, project_name: &str) -> Session {
        Session {
            project_dir: project_dir.to_path_buf(),
            manifest_path: project_dir.join(format!("{project_name}.manifest")),
            write_table_path: project_dir.join(format!("{project_name}.wadr")),
            read_table_path: project_dir.join(format!("{project_name}.radr")),
            instruction_table_path: project_dir.join(format!("{project_name}.inst")),
            source_path: project_dir.join(format!("{project_name}.asm")),
        }
    }
}

/// An info-level note worth surfacing in the LOG dump even though it isn't
/// an error — e.g. the lenient default-length-1 fallback documented as a
/// divergence point in the spec's design notes.
#[derive(Debug, Clone, Serialize)]
pub struct InfoRecord {
    pub message: String,
}

/// The outcome of a single compile: either the final byte stream, or the
/// accumulated diagnostics from whichever stage failed first. Either way,
/// `info` carries notes the driver or a stage wants surfaced in the LOG.
pub enum CompileOutcome {
    Success {
        bytes: Vec<u8>,
        info: Vec<InfoRecord>,
    },
    Failure {
        errors: Vec<CompileError>,
        info: Vec<InfoRecord>,
    },
}

#[derive(Serialize)]
struct LogDocument {
    timestamp: String,
    errors: Vec<ErrorRecord>,
    info: Vec<String>,
}

/// Runs the full pipeline for `session`, writing debug dumps for every
/// stage that ran (successful or not) through `sink`, and a `LOG` dump
/// stamped with `timestamp` (injected by the caller — the library never
/// reads the system clock, see §9).
pub fn compile<R: FileReader, D: DebugSink>(
    session: &Session,
    reader: &R,
    sink: &D,
    timestamp: &str,
) -> anyhow::Result<CompileOutcome> {
    let manifest = match ProjectManifest::load(reader, &session.manifest_path) {
        Ok(m) => m,
        Err(errors) => {
            // No project name is known yet; label the log with the manifest
            // path's own file stem instead.
            let label = session
                .manifest_path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("project");
            write_log(sink, timestamp, label, &errors, &[])?;
            return Ok(CompileOutcome::Failure {
                errors,
                info: Vec::new(),
            });
        }
    };

    let tables = match DefinitionTables::load(
        reader,
        &session.write_table_path,
        &session.read_table_path,
        &session.instruction_table_path,
    ) {
        Ok(t) => t,
        Err(errors) => {
            write_log(sink, timestamp, &manifest.project_name, &errors, &[])?;
            return Ok(CompileOutcome::Failure {
                errors,
                info: Vec::new(),
            });
        }
    };

    let source = reader.read_to_string(&session.source_path)?;

    let parsed = match parser::parse(&source) {
        Ok(p) => p,
        Err(failure) => {
            sink.write_text("PARSED", &failure.partial)?;
            write_log(sink, timestamp, &manifest.project_name, &failure.errors, &[])?;
            return Ok(CompileOutcome::Failure {
                errors: failure.errors,
                info: Vec::new(),
            });
        }
    };
    sink.write_text("PARSED", &parsed)?;

    let spaced = match spacer::space(&parsed, &tables) {
        Ok(s) => s,
        Err(failure) => {
            sink.write_text("SPACED", &failure.partial)?;
            write_log(sink, timestamp, &manifest.project_name, &failure.errors, &[])?;
            return Ok(CompileOutcome::Failure {
                errors: failure.errors,
                info: Vec::new(),
            });
        }
    };
    sink.write_text("SPACED", &spaced)?;

    let (image, addresser_notes) = match addresser::address(&spaced, &tables) {
        Ok(i) => i,
        Err(failure) => {
            sink.write_text("ADDRESSED", &failure.partial.cells.join("\n"))?;
            write_log(sink, timestamp, &manifest.project_name, &failure.errors, &[])?;
            return Ok(CompileOutcome::Failure {
                errors: failure.errors,
                info: Vec::new(),
            });
        }
    };
    let addressed_dump = image.cells.join("\n");
    sink.write_text("ADDRESSED", &addressed_dump)?;

    let info: Vec<InfoRecord> = addresser_notes
        .into_iter()
        .map(|message| InfoRecord { message })
        .collect();

    let implemented = match implementer::implement(&image, &tables) {
        Ok(lines) => lines,
        Err(errors) => {
            write_log(sink, timestamp, &manifest.project_name, &errors, &info)?;
            return Ok(CompileOutcome::Failure { errors, info });
        }
    };
    sink.write_text("IMPLEMENTED", &implementer::render(&implemented))?;

    write_log(sink, timestamp, &manifest.project_name, &[], &info)?;

    Ok(CompileOutcome::Success {
        bytes: implementer::to_bytes(&implemented),
        info,
    })
}

fn write_log<D: DebugSink>(
    sink: &D,
    timestamp: &str,
    project_name: &str,
    errors: &[CompileError],
    info: &[InfoRecord],
) -> anyhow::Result<()> {
    let records: Vec<ErrorRecord> = errors.iter().map(CompileError::to_record).collect();
    let info_messages: Vec<String> = info.iter().map(|i| i.message.clone()).collect();

    let mut text = format!("[{timestamp}] {project_name}\n");
    if records.is_empty() {
        text.push_str("no errors\n");
    } else {
        for record in &records {
            text.push_str(&format!(
                "{} at {}: {}\n",
                record.kind,
                record.location.as_deref().unwrap_or("?"),
                record.message
            ));
        }
    }
    for message in &info_messages {
        text.push_str(&format!("info: {message}\n"));
    }
    sink.write_text("LOG", &text)?;

    let doc = LogDocument {
        timestamp: timestamp.to_string(),
        errors: records,
        info: info_messages,
    };
    sink.write_json("LOG", &serde_json::to_string_pretty(&doc)?)?;
    Ok(())
}

/// Renders the final byte stream as the one-decimal-per-line text format
/// described in §6.
pub fn render_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| b.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_reader::{MockDebugSink, MockFileReader};

    fn fixture() -> (MockFileReader, Session) {
        let mut reader = MockFileReader::default();
        reader.add_file("proj/demo.manifest", "ProjectName=demo\n");
        reader.add_file("proj/demo.wadr", "5\tPORT\toutput port\n");
        reader.add_file("proj/demo.radr", "");
        reader.add_file("proj/demo.inst", "16\tJMP\t3\t0\tINS_16ADD\tjump\n");
        reader.add_file("proj/demo.asm", "ORG 0:\nNOP\n");

        let session = Session::from_project_name(Path::new("proj"), "demo");
        (reader, session)
    }

    #[test]
    fn compiles_minimal_project_to_bytes() {
        let (reader, session) = fixture();
        let sink = MockDebugSink::default();

        let outcome = compile(&session, &reader, &sink, "2026-01-01T00:00:00Z").unwrap();
        match outcome {
            CompileOutcome::Success { bytes, .. } => assert_eq!(bytes, vec![0]),
            CompileOutcome::Failure { errors, .. } => panic!("expected success, got {errors:?}"),
        }

        assert!(sink.get("PARSED", "txt").is_some());
        assert!(sink.get("SPACED", "txt").is_some());
        assert!(sink.get("ADDRESSED", "txt").is_some());
        assert!(sink.get("IMPLEMENTED", "txt").is_some());
        assert!(sink.get("LOG", "json").is_some());
    }

    #[test]
    fn reports_failure_and_still_dumps_the_failing_stage() {
        let (mut reader, session) = fixture();
        reader.add_file("proj/demo.asm", "ORG 0:\nFROB\n");
        let sink = MockDebugSink::default();

        let outcome = compile(&session, &reader, &sink, "2026-01-01T00:00:00Z").unwrap();
        match outcome {
            CompileOutcome::Failure { errors, .. } => {
                assert!(matches!(errors[0], CompileError::UnknownInstruction { .. }));
            }
            CompileOutcome::Success { .. } => panic!("expected failure"),
        }

        // `FROB` fails in the Spacer itself, so PARSED ran cleanly and SPACED
        // still gets a dump of whatever the Spacer managed to space before
        // hitting the unknown mnemonic (§4.7) — only ADDRESSED/IMPLEMENTED,
        // which never ran, are absent.
        assert!(sink.get("PARSED", "txt").is_some());
        assert!(sink.get("SPACED", "txt").is_some());
        assert!(sink.get("ADDRESSED", "txt").is_none());
        assert!(sink.get("IMPLEMENTED", "txt").is_none());
        assert!(sink.get("LOG", "txt").is_some());
    }

    #[test]
    fn manifest_failure_is_reported_and_logged() {
        let mut reader = MockFileReader::default();
        reader.add_file("proj/demo.manifest", "ProjectName=demo\nReadSpace=maybe\n");
        reader.add_file("proj/demo.wadr", "");
        reader.add_file("proj/demo.radr", "");
        reader.add_file("proj/demo.inst", "16\tJMP\t3\t0\tINS_16ADD\tjump\n");
        reader.add_file("proj/demo.asm", "ORG 0:\nNOP\n");
        let session = Session::from_project_name(Path::new("proj"), "demo");
        let sink = MockDebugSink::default();

        let outcome = compile(&session, &reader, &sink, "2026-01-01T00:00:00Z").unwrap();
        match outcome {
            CompileOutcome::Failure { errors, .. } => {
                assert!(matches!(errors[0], CompileError::InvalidInteger { .. }));
            }
            CompileOutcome::Success { .. } => panic!("expected failure"),
        }
        assert!(sink.get("LOG", "json").is_some());
    }
}
