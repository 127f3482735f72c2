//! Input contracts: the fixed column layouts a set listing may use.
//!
//! A contract says which column holds which field, what to do with a
//! malformed line, how set identity is derived, and whether sets already in
//! the store are reused. Three layouts are built in; others can be supplied
//! as JSON.
//!
//! ```text
//! A  member  label  setName  setType  createdBy     abort, identity = name
//! B  setName setType member  createdBy              skip,  identity = type+name
//! C  member  label   (set from run config)          skip,  identity = type+name, reuse
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ConfigError, ConfigResult};
use crate::models::{Key, SetIdentity};

// =============================================================================
// Contract definition
// =============================================================================

/// What a column carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    Member,
    Label,
    SetName,
    SetType,
    CreatedBy,
    /// Present in the file but not used.
    Ignore,
}

/// What happens to a line with the wrong number of fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedLinePolicy {
    /// Stop the run.
    Abort,
    /// Log it and continue with the next line.
    Skip,
}

/// Which fields make two lines name the same set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetIdentityRule {
    Name,
    TypeAndName,
}

impl SetIdentityRule {
    pub fn identity(&self, type_key: Key, name: &str) -> SetIdentity {
        match self {
            SetIdentityRule::Name => SetIdentity::Name(name.to_string()),
            SetIdentityRule::TypeAndName => SetIdentity::Typed {
                type_key,
                name: name.to_string(),
            },
        }
    }
}

/// What to do when the store already has a set with the same type and name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExistingSetPolicy {
    /// Always allocate a new header.
    #[default]
    Create,
    /// Reuse the stored key and supersede its members.
    Reuse,
}

/// A complete input contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputContract {
    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Field delimiter, shared by input and output files.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Column order; the field count of every line must equal its length.
    pub columns: Vec<Column>,

    pub on_malformed: MalformedLinePolicy,

    pub identity: SetIdentityRule,

    #[serde(default)]
    pub existing_sets: ExistingSetPolicy,
}

fn default_delimiter() -> char {
    '\t'
}

impl InputContract {
    /// Variant A: `member, label, setName, setType, createdBy`.
    pub fn member_first() -> Self {
        Self {
            name: "A".to_string(),
            description: "member, label, set name, set type, created by".to_string(),
            delimiter: default_delimiter(),
            columns: vec![
                Column::Member,
                Column::Label,
                Column::SetName,
                Column::SetType,
                Column::CreatedBy,
            ],
            on_malformed: MalformedLinePolicy::Abort,
            identity: SetIdentityRule::Name,
            existing_sets: ExistingSetPolicy::Create,
        }
    }

    /// Variant B: `setName, setType, member, createdBy`.
    pub fn set_first() -> Self {
        Self {
            name: "B".to_string(),
            description: "set name, set type, member, created by".to_string(),
            delimiter: default_delimiter(),
            columns: vec![
                Column::SetName,
                Column::SetType,
                Column::Member,
                Column::CreatedBy,
            ],
            on_malformed: MalformedLinePolicy::Skip,
            identity: SetIdentityRule::TypeAndName,
            existing_sets: ExistingSetPolicy::Create,
        }
    }

    /// Variant C: `member, label`; the set comes from the run configuration.
    pub fn single_set() -> Self {
        Self {
            name: "C".to_string(),
            description: "member, label; set name/type/creator fixed per run".to_string(),
            delimiter: default_delimiter(),
            columns: vec![Column::Member, Column::Label],
            on_malformed: MalformedLinePolicy::Skip,
            identity: SetIdentityRule::TypeAndName,
            existing_sets: ExistingSetPolicy::Reuse,
        }
    }

    /// All built-in contracts.
    pub fn builtin() -> Vec<Self> {
        vec![Self::member_first(), Self::set_first(), Self::single_set()]
    }

    /// Look up a built-in contract by name (case-insensitive).
    pub fn named(name: &str) -> Option<Self> {
        Self::builtin()
            .into_iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Resolve `name_or_path` as a built-in name, or else as a path to a JSON contract.
    pub fn load(name_or_path: &str) -> ConfigResult<Self> {
        if let Some(contract) = Self::named(name_or_path) {
            return Ok(contract);
        }
        let path = Path::new(name_or_path);
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ContractFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Number of fields every line must have.
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    fn position(&self, column: Column) -> ConfigResult<Option<usize>> {
        let mut found = self.columns.iter().enumerate().filter(|(_, c)| **c == column);
        let first = found.next().map(|(i, _)| i);
        if found.next().is_some() {
            return Err(ConfigError::InvalidContract(format!(
                "column {:?} appears more than once in contract {}",
                column, self.name
            )));
        }
        Ok(first)
    }

    /// Bind the contract to the run's fixed set fields, producing the layout
    /// used for every line.
    ///
    /// Fails if the delimiter cannot be used in a bulk file, if a column is
    /// repeated, or if a set field is neither a column nor supplied in
    /// `defaults`.
    pub fn layout(&self, defaults: &SetDefaults) -> ConfigResult<RowLayout> {
        if !self.delimiter.is_ascii() || self.delimiter == '\n' || self.delimiter == '\r' {
            return Err(ConfigError::InvalidContract(format!(
                "delimiter {:?} of contract {} is not a single-byte field separator",
                self.delimiter, self.name
            )));
        }

        let member = self.position(Column::Member)?.ok_or_else(|| {
            ConfigError::InvalidContract(format!("contract {} has no member column", self.name))
        })?;
        let label = self.position(Column::Label)?;

        let field = |column: Column,
                     fixed: &Option<String>,
                     what: &'static str|
         -> ConfigResult<FieldSource> {
            match (self.position(column)?, fixed) {
                (Some(index), _) => Ok(FieldSource::Column(index)),
                (None, Some(value)) if !value.is_empty() => Ok(FieldSource::Fixed(value.clone())),
                (None, _) => Err(ConfigError::MissingSetting(what)),
            }
        };

        Ok(RowLayout {
            width: self.width(),
            member,
            label,
            set_name: field(Column::SetName, &defaults.set_name, "set name")?,
            set_type: field(Column::SetType, &defaults.set_type, "set type")?,
            created_by: field(Column::CreatedBy, &defaults.created_by, "created by")?,
        })
    }
}

// =============================================================================
// Layout
// =============================================================================

/// Set fields supplied once per run instead of per line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetDefaults {
    pub set_name: Option<String>,
    pub set_type: Option<String>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldSource {
    Column(usize),
    Fixed(String),
}

impl FieldSource {
    fn pick<'a>(&'a self, fields: &'a [String]) -> &'a str {
        match self {
            FieldSource::Column(index) => &fields[*index],
            FieldSource::Fixed(value) => value,
        }
    }
}

/// A contract bound to its run defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowLayout {
    width: usize,
    member: usize,
    label: Option<usize>,
    set_name: FieldSource,
    set_type: FieldSource,
    created_by: FieldSource,
}

/// The fields of one line, by meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputRow<'a> {
    pub member: &'a str,
    pub label: Option<&'a str>,
    pub set_name: &'a str,
    pub set_type: &'a str,
    pub created_by: &'a str,
}

impl RowLayout {
    pub fn width(&self) -> usize {
        self.width
    }

    /// Map a line's fields to their meaning.
    ///
    /// `fields` must already have been checked to hold `width()` values.
    pub fn row<'a>(&'a self, fields: &'a [String]) -> InputRow<'a> {
        InputRow {
            member: &fields[self.member],
            label: self
                .label
                .map(|index| fields[index].as_str())
                .filter(|label| !label.is_empty()),
            set_name: self.set_name.pick(fields),
            set_type: self.set_type.pick(fields),
            created_by: self.created_by.pick(fields),
        }
    }
}
