//! Loadable source units and their raw line text

use crate::core::{Error, ModuleId, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Where a unit's text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOrigin {
    Inline,
    File(PathBuf),
}

/// One source unit of a target program, addressed by 1-based line numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceUnit {
    module: ModuleId,
    origin: SourceOrigin,
    text: String,
}

impl SourceUnit {
    pub fn inline(module: impl Into<ModuleId>, text: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            origin: SourceOrigin::Inline,
            text: text.into(),
        }
    }

    /// Read a unit from disk. Its module identity is the file stem.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let module = ModuleId::from_path(path).ok_or_else(|| {
            Error::load(
                path.display().to_string(),
                None,
                "cannot derive a module name from this path",
            )
        })?;
        let text = fs::read_to_string(path).map_err(|e| Error::file_system(path, e))?;
        Ok(Self {
            module,
            origin: SourceOrigin::File(path.to_path_buf()),
            text,
        })
    }

    /// Replace the module identity, e.g. to use a dotted logical name.
    pub fn with_module(mut self, module: impl Into<ModuleId>) -> Self {
        self.module = module.into();
        self
    }

    pub fn module(&self) -> &ModuleId {
        &self.module
    }

    pub fn origin(&self) -> &SourceOrigin {
        &self.origin
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn line_count(&self) -> usize {
        self.text.lines().count()
    }

    /// Raw text of a 1-based line.
    pub fn line(&self, number: usize) -> Option<&str> {
        number
            .checked_sub(1)
            .and_then(|index| self.text.lines().nth(index))
    }

    /// A fresh copy of this unit. File-backed units are re-read from disk.
    pub fn reload(&self) -> Result<Self> {
        match &self.origin {
            SourceOrigin::Inline => Ok(self.clone()),
            SourceOrigin::File(path) => {
                let text = fs::read_to_string(path).map_err(|e| Error::file_system(path, e))?;
                Ok(Self {
                    module: self.module.clone(),
                    origin: self.origin.clone(),
                    text,
                })
            }
        }
    }
}
