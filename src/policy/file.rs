//! File-backed policy source
//!
//! The document is re-read on every fetch, so edits (or an atomic rename by
//! a config-management agent) take effect on the next decision.
//!
//! ```toml
//! "/api/orders/**" = ["ADMIN", "OPS"]
//! "/api/reports/**" = "ADMIN,AUDITOR"
//! ```
//!
//! Files ending in `.json` are parsed as JSON, everything else as TOML.

use crate::error::{PolicyResult, PolicyStoreError};
use crate::policy::snapshot::PolicySnapshot;
use crate::policy::source::PolicySource;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Role list as written in a policy document
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RoleList {
    List(Vec<String>),
    Delimited(String),
}

impl RoleList {
    fn into_roles(self, delimiter: &str) -> Vec<String> {
        match self {
            RoleList::List(roles) => roles,
            RoleList::Delimited(raw) => raw.split(delimiter).map(String::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentFormat {
    Toml,
    Json,
}

impl DocumentFormat {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentFormat::Json,
            _ => DocumentFormat::Toml,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FilePolicySource {
    path: PathBuf,
    format: DocumentFormat,
    delimiter: String,
}

impl FilePolicySource {
    pub fn new(path: impl Into<PathBuf>, delimiter: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            format: DocumentFormat::for_path(&path),
            path,
            delimiter: delimiter.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse(&self, contents: &str) -> PolicyResult<PolicySnapshot> {
        let document: HashMap<String, RoleList> = match self.format {
            DocumentFormat::Toml => {
                toml::from_str(contents).map_err(|e| PolicyStoreError::Document(e.to_string()))?
            }
            DocumentFormat::Json => serde_json::from_str(contents)
                .map_err(|e| PolicyStoreError::Document(e.to_string()))?,
        };

        Ok(PolicySnapshot::from_entries(document.into_iter().map(
            |(pattern, roles)| {
                let roles: Vec<String> = roles
                    .into_roles(&self.delimiter)
                    .into_iter()
                    .map(|r| r.trim().to_string())
                    .filter(|r| !r.is_empty())
                    .collect();
                (pattern, roles)
            },
        )))
    }
}

#[async_trait]
impl PolicySource for FilePolicySource {
    async fn fetch(&self) -> PolicyResult<PolicySnapshot> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        self.parse(&contents)
    }

    fn source_type(&self) -> &'static str {
        "file"
    }
}
