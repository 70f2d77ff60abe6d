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

//! Filesystem seams. The pipeline never calls `std::fs` directly outside of
//! these two traits, so the whole driver in [`crate::session`] can be
//! exercised against in-memory fixtures instead of real files.

use anyhow::Result;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

pub trait FileReader {
    fn read_to_string(&self, path: &Path) -> Result<String>;
}

/// Production reader backed by the real filesystem.
pub struct OsFileReader;

impl FileReader for OsFileReader {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        Ok(fs::read_to_string(path)?)
    }
}

/// In-memory reader for tests: no file ever touches disk.
#[derive(Default)]
pub struct MockFileReader {
    files: HashMap<PathBuf, String>,
}

impl MockFileReader {
    pub fn add_file(&mut self, path: &str, content: &str) {
        self.files.insert(PathBuf::from(path), content.to_string());
    }
}

impl FileReader for MockFileReader {
    fn read_to_string(&self, path: &Path) -> Result<String> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("mock file not found: {}", path.display()))
    }
}

/// Where the debug dumps (PARSED/SPACED/ADDRESSED/IMPLEMENTED/LOG) go.
/// A GUI collaborator can swap this for one that feeds its own "Debug" tab.
pub trait DebugSink {
    fn write_text(&self, stage: &str, content: &str) -> Result<()>;
    fn write_json(&self, stage: &str, content: &str) -> Result<()>;
}

/// Production sink: one file per stage under `<project_dir>/Debug/<base_name>_<STAGE>.<ext>`.
pub struct DirDebugSink {
    debug_dir: PathBuf,
    base_name: String,
}

impl DirDebugSink {
    pub fn new(project_dir: &Path, base_name: &str) -> Result<Self> {
        let debug_dir = project_dir.join("Debug");
        fs::create_dir_all(&debug_dir)?;
        Ok(Self {
            debug_dir,
            base_name: base_name.to_string(),
        })
    }

    fn path_for(&self, stage: &str, extension: &str) -> PathBuf {
        self.debug_dir
            .join(format!("{}_{}.{}", self.base_name, stage, extension))
    }
}

impl DebugSink for DirDebugSink {
    fn write_text(&self, stage: &str, content: &str) -> Result<()> {
        fs::write(self.path_for(stage, "txt"), content)?;
        Ok(())
    }

    fn write_json(&self, stage: &str, content: &str) -> Result<()> {
        fs::write(self.path_for(stage, "json"), content)?;
        Ok(())
    }
}

/// In-memory sink for tests: records what would have been written, keyed by
/// `"<stage>.<ext>"`, without creating a `Debug` directory on disk.
#[derive(Default)]
pub struct MockDebugSink {
    written: RefCell<HashMap<String, String>>,
}

impl MockDebugSink {
    pub fn get(&self, stage: &str, extension: &str) -> Option<String> {
        self.written
            .borrow()
            .get(&format!("{stage}.{extension}"))
            .cloned()
    }
}

impl DebugSink for MockDebugSink {
    fn write_text(&self, stage: &str, content: &str) -> Result<()> {
        self.written
            .borrow_mut()
            .insert(format!("{stage}.txt"), content.to_string());
        Ok(())
    }

    fn write_json(&self, stage: &str, content: &str) -> Result<()> {
        self.written
            .borrow_mut()
            .insert(format!("{stage}.json"), content.to_string());
        Ok(())
    }
}
