// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Class name resolution for detector outputs

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// Index → class name table
///
/// Unknown indices render as `class_<id>` so a partially labelled model
/// still produces usable output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClassNames {
    names: Vec<String>,
}

impl ClassNames {
    pub fn from_list(names: Vec<String>) -> Self {
        Self { names }
    }

    /// Load a labels file with one class name per line
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read labels file {}", path.display()))?;
        let names: Vec<String> = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        if names.is_empty() {
            anyhow::bail!("Labels file {} contains no class names", path.display());
        }
        Ok(Self { names })
    }

    /// Parse the `names` metadata entry written by Ultralytics ONNX exports
    ///
    /// The value is a Python dict literal such as `{0: 'ant', 1: "bee's"}`.
    /// Returns `None` if nothing could be parsed.
    pub fn from_ultralytics_metadata(raw: &str) -> Option<Self> {
        let body = raw.trim().strip_prefix('{')?.strip_suffix('}')?;
        let mut entries = BTreeMap::new();
        let mut rest = body;

        loop {
            rest = rest.trim_start_matches(|c: char| c == ',' || c.is_whitespace());
            if rest.is_empty() {
                break;
            }

            let colon = rest.find(':')?;
            let index: usize = rest[..colon].trim().parse().ok()?;
            rest = rest[colon + 1..].trim_start();

            let quote = rest.chars().next().filter(|c| *c == '\'' || *c == '"')?;
            let end = rest[1..].find(quote)?;
            entries.insert(index, rest[1..1 + end].to_string());
            rest = &rest[end + 2..];
        }

        if entries.is_empty() {
            return None;
        }

        let len = entries.keys().next_back().map(|k| k + 1).unwrap_or(0);
        let mut names = vec![String::new(); len];
        for (index, name) in entries {
            names[index] = name;
        }
        Some(Self { names })
    }

    pub fn name(&self, class_id: usize) -> String {
        match self.names.get(class_id) {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("class_{}", class_id),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
