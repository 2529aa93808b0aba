//! `Cargo.toml` edits through `toml_edit`, so only the `[package]` version
//! changes and the rest of the file keeps its formatting.

use std::fmt;
use std::str::FromStr;

use toml_edit::{DocumentMut, Item, Table, Value};

use crate::utils::errors::ManifestError;

pub const DEFAULT_VERSION: &str = "0.0.0";

#[derive(Debug, Clone)]
pub struct Manifest {
    doc: DocumentMut,
}

impl FromStr for Manifest {
    type Err = ManifestError;

    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let doc = content.parse::<DocumentMut>()?;
        if doc.get("package").and_then(Item::as_table).is_none() {
            return Err(ManifestError::NoPackage);
        }
        Ok(Self { doc })
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.doc)
    }
}

impl Manifest {
    fn package(&self) -> Option<&Table> {
        self.doc.get("package").and_then(Item::as_table)
    }

    /// `[package] version`, or `0.0.0` when the key is absent.
    pub fn version(&self) -> Result<String, ManifestError> {
        match self.package().and_then(|package| package.get("version")) {
            None => Ok(DEFAULT_VERSION.to_string()),
            Some(item) => version_str(item).map(str::to_string),
        }
    }

    pub fn name(&self) -> Result<String, ManifestError> {
        self.package()
            .and_then(|package| package.get("name"))
            .and_then(Item::as_str)
            .map(str::to_string)
            .ok_or(ManifestError::MissingName)
    }

    /// Replaces the version value in place, or appends `version` to the end
    /// of the `[package]` table.
    pub fn set_version(&mut self, version: &str) -> Result<(), ManifestError> {
        let package = self
            .doc
            .get_mut("package")
            .and_then(Item::as_table_mut)
            .ok_or(ManifestError::NoPackage)?;

        match package.get_mut("version") {
            Some(item) => {
                version_str(item)?;
                if let Some(value) = item.as_value_mut() {
                    let decor = value.decor().clone();
                    *value = Value::from(version);
                    *value.decor_mut() = decor;
                }
            },
            None => {
                package.insert("version", toml_edit::value(version));
            },
        }
        Ok(())
    }
}

fn version_str(item: &Item) -> Result<&str, ManifestError> {
    if let Some(version) = item.as_str() {
        return Ok(version);
    }
    let inherited = item
        .as_table_like()
        .and_then(|table| table.get("workspace"))
        .is_some();
    if inherited {
        Err(ManifestError::InheritedVersion)
    } else {
        Err(ManifestError::VersionNotString)
    }
}
