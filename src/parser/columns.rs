use crate::error::ConfigError;
use crate::model::Field;

/// Fields that can be read from the repeated cell group, by position.
pub const POSITIONAL_FIELDS: &[Field] =
    &[Field::Date, Field::DealType, Field::Value, Field::Volume];

/// Ordered mapping from cell-group position to record field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    fields: Vec<Field>,
}

impl ColumnMap {
    pub fn new(fields: Vec<Field>) -> Result<Self, ConfigError> {
        for (i, field) in fields.iter().enumerate() {
            if !POSITIONAL_FIELDS.contains(field) {
                return Err(ConfigError::Columns(format!(
                    "'{}' cannot be read positionally",
                    field
                )));
            }
            if fields[..i].contains(field) {
                return Err(ConfigError::Columns(format!("'{}' mapped twice", field)));
            }
        }
        Ok(Self { fields })
    }

    /// Parse names as they appear in configuration, e.g. `["date", "deal_type"]`.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, ConfigError> {
        let fields = names
            .iter()
            .map(|n| {
                let name = n.as_ref().trim();
                POSITIONAL_FIELDS
                    .iter()
                    .copied()
                    .find(|f| f.as_str() == name)
                    .ok_or_else(|| ConfigError::Columns(format!("unknown column '{}'", name)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(fields)
    }

    pub fn field_at(&self, position: usize) -> Option<Field> {
        self.fields.get(position).copied()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields at positions `from..`, i.e. the ones a short row never reached.
    pub fn fields_from(&self, from: usize) -> &[Field] {
        self.fields.get(from..).unwrap_or(&[])
    }
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            fields: POSITIONAL_FIELDS.to_vec(),
        }
    }
}
