//! Loading id kinds and generator settings from a YAML manifest.
//!
//! ```yaml
//! package: pets
//! machine_id: "1"
//! epoch: {year: 2024, month: 1, day: 1}
//! ids:
//!   - name: Cat
//!     prefix: cat-
//!   - name: Dog
//!     prefix: dog-
//! ```
//!
//! Every field is optional. A missing epoch means `1970-01-00`, which normalises
//! to `1969-12-31 00:00:00 UTC`.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Config, Error, Generator, PrefixSource, Result, civil_epoch};

/// Settings and id kinds read from a manifest document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Free-form label for the set of ids, e.g. the consuming package.
    #[serde(default)]
    pub package: String,
    /// Machine id embedded in every id.
    #[serde(default)]
    pub machine_id: String,
    /// Prefix for ids issued without a kind.
    #[serde(default)]
    pub default_prefix: String,
    /// Epoch date; `None` means `1970-01-00`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epoch: Option<CivilDate>,
    /// Declared id kinds, in declaration order.
    #[serde(default)]
    pub ids: Vec<IdKind>,
}

/// A named kind of id and the prefix its ids carry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdKind {
    /// Unique, non-empty kind name.
    pub name: String,
    /// Prefix of every id of this kind.
    #[serde(default)]
    pub prefix: String,
}

impl PrefixSource for IdKind {
    fn prefix(&self) -> String {
        self.prefix.clone()
    }
}

/// A calendar date; fields outside their usual range are normalised by [`civil_epoch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CivilDate {
    /// Astronomical year; `0` is 1 BC.
    pub year: i32,
    /// 1-based; `0` is December of the previous year.
    pub month: i32,
    /// 1-based; `0` is the last day of the previous month.
    pub day: i32,
}

impl Default for CivilDate {
    fn default() -> Self {
        Self {
            year: 1970,
            month: 1,
            day: 0,
        }
    }
}

impl CivilDate {
    /// Midnight UTC of the normalised date.
    pub fn to_utc(self) -> Result<DateTime<Utc>> {
        civil_epoch(self.year, self.month, self.day)
    }
}

impl Manifest {
    /// Parse and validate a manifest.
    ///
    /// # Errors
    /// [`Error::Yaml`] for malformed input, [`Error::EmptyKindName`] or
    /// [`Error::DuplicateKind`] for invalid kinds, [`Error::EpochOutOfRange`]
    /// for an unrepresentable epoch.
    ///
    /// # Example
    /// ```
    /// use tagid::Manifest;
    /// let manifest = Manifest::from_yaml_str("ids: [{name: Cat, prefix: cat-}]").unwrap();
    /// let ids = manifest.generators().unwrap();
    /// assert!(ids["Cat"].new_id().starts_with("cat-"));
    /// ```
    pub fn from_yaml_str(input: &str) -> Result<Self> {
        let manifest: Manifest = serde_yaml::from_str(input)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Read, parse and validate a manifest file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let input = fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest = Self::from_yaml_str(&input)?;
        tracing::debug!(
            path = %path.display(),
            package = %manifest.package,
            kinds = manifest.ids.len(),
            "manifest loaded"
        );
        Ok(manifest)
    }

    fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.ids.len());
        for (index, kind) in self.ids.iter().enumerate() {
            if kind.name.is_empty() {
                return Err(Error::EmptyKindName { index });
            }
            if !seen.insert(kind.name.as_str()) {
                return Err(Error::DuplicateKind(kind.name.clone()));
            }
        }
        self.epoch_date().to_utc()?;
        Ok(())
    }

    /// The configured epoch date, or the `1970-01-00` default.
    pub fn epoch_date(&self) -> CivilDate {
        self.epoch.unwrap_or_default()
    }

    /// Midnight UTC of [`epoch_date`](Self::epoch_date).
    pub fn epoch(&self) -> Result<DateTime<Utc>> {
        self.epoch_date().to_utc()
    }

    /// Look up a kind by name.
    pub fn kind(&self, name: &str) -> Option<&IdKind> {
        self.ids.iter().find(|kind| kind.name == name)
    }

    /// A fresh [`Config`] carrying the manifest's epoch, machine id and default prefix.
    pub fn config(&self) -> Result<Config> {
        Ok(Config::new()
            .with_epoch(self.epoch()?)
            .with_machine_id(self.machine_id.as_str())
            .with_default_prefix(self.default_prefix.as_str()))
    }

    /// One generator per kind, keyed by name, all bound to one new [`Config`].
    pub fn generators(&self) -> Result<BTreeMap<String, Generator>> {
        let config = self.config()?;
        Ok(self
            .ids
            .iter()
            .map(|kind| (kind.name.clone(), config.generator_for(kind)))
            .collect())
    }

    /// Apply the epoch, machine id and default prefix to the process-wide configuration.
    ///
    /// Generators already bound to the process-wide configuration follow the new settings.
    pub fn install(&self) -> Result<()> {
        let epoch = self.epoch()?;
        crate::set_epoch(epoch);
        crate::set_machine_id(self.machine_id.as_str());
        crate::set_default_prefix(self.default_prefix.as_str());
        tracing::debug!(package = %self.package, "manifest installed");
        Ok(())
    }
}
