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

use anyhow::{Context, Result};
use clap::Parser as ClapParser;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{SystemTime, UNIX_EPOCH};
use ucasm::file_reader::{DirDebugSink, OsFileReader};
use ucasm::session::{compile, render_bytes, CompileOutcome, Session};

/// Compile a project at the given path: three definition tables plus an
/// assembly source, all named `<ProjectName>.<ext>` by convention (§6).
#[derive(ClapParser)]
#[clap(version = "0.1.0", author = "Connor Nolan")]
struct Opts {
    /// Directory holding the project's manifest, tables, and source.
    #[clap(short, long)]
    project: PathBuf,
    /// Where to write the final byte image, one decimal per line.
    #[clap(short, long)]
    output: PathBuf,
}

fn project_name(project_dir: &Path) -> Result<String> {
    project_dir
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .with_context(|| format!("cannot derive a project name from {}", project_dir.display()))
}

fn now_timestamp() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    format!("unix:{secs}")
}

fn main() -> Result<ExitCode> {
    let opts: Opts = Opts::parse();

    let name = project_name(&opts.project)?;
    let session = Session::from_project_name(&opts.project, &name);
    let reader = OsFileReader;
    let sink = DirDebugSink::new(&opts.project, &name)
        .with_context(|| format!("failed to prepare debug directory under {}", opts.project.display()))?;

    let outcome = compile(&session, &reader, &sink, &now_timestamp())?;

    match outcome {
        CompileOutcome::Success { bytes, .. } => {
            fs::write(&opts.output, render_bytes(&bytes))
                .with_context(|| format!("failed to write output file: {}", opts.output.display()))?;
            println!(
                "Successfully compiled {} to {}",
                opts.project.display(),
                opts.output.display()
            );
            Ok(ExitCode::SUCCESS)
        }
        CompileOutcome::Failure { errors, .. } => {
            for error in &errors {
                eprintln!("{}: {}", error.kind(), error);
            }
            eprintln!("{} error(s); no output written", errors.len());
            Ok(ExitCode::FAILURE)
        }
    }
}
