use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::DocfillError;
use crate::DocfillResult;

/// Template variable name → source column name. `None` entries are skipped.
pub type VariableMapping = BTreeMap<String, Option<String>>;

/// A typed value available to templates.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ContextValue {
	String(String),
	Number(f64),
	Boolean(bool),
	List(Vec<String>),
}

/// Immutable variable bindings for one render.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RenderContext(BTreeMap<String, ContextValue>);

impl RenderContext {
	pub fn new() -> Self {
		Self::default()
	}

	/// Builder-style insert, mostly useful when assembling a context by hand.
	#[must_use]
	pub fn with(mut self, name: impl Into<String>, value: ContextValue) -> Self {
		self.0.insert(name.into(), value);
		self
	}

	pub fn get(&self, name: &str) -> Option<&ContextValue> {
		self.0.get(name)
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &ContextValue)> {
		self.0.iter()
	}
}

impl FromIterator<(String, ContextValue)> for RenderContext {
	fn from_iter<T: IntoIterator<Item = (String, ContextValue)>>(iter: T) -> Self {
		Self(iter.into_iter().collect())
	}
}

/// One row of the data source.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DataRow {
	pub id: String,
	#[serde(default)]
	pub data: BTreeMap<String, Value>,
}

/// Declared type of a data source column.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ColumnType {
	String,
	Number,
	Boolean,
	Date,
	Array { separator: String },
}

impl std::fmt::Display for ColumnType {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let name = match self {
			Self::String => "string",
			Self::Number => "number",
			Self::Boolean => "boolean",
			Self::Date => "date",
			Self::Array { .. } => "array",
		};
		f.write_str(name)
	}
}

/// A column of the data source together with its declared type.
///
/// ```toml
/// [[columns]]
/// name = "Tags"
/// type = "array"
/// separator = ";"
/// ```
///
/// The `arrayMetadata = { separator = ";" }` shape used by data source exports
/// is accepted as well.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawColumn")]
pub struct Column {
	pub name: String,
	pub r#type: ColumnType,
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ColumnKind {
	#[serde(alias = "STRING")]
	String,
	#[serde(alias = "NUMBER")]
	Number,
	#[serde(alias = "BOOLEAN")]
	Boolean,
	#[serde(alias = "DATE")]
	Date,
	#[serde(alias = "ARRAY")]
	Array,
}

#[derive(Debug, Deserialize)]
struct ArrayMetadata {
	separator: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawColumn {
	name: String,
	r#type: ColumnKind,
	#[serde(default)]
	separator: Option<String>,
	#[serde(default)]
	array_metadata: Option<ArrayMetadata>,
}

impl TryFrom<RawColumn> for Column {
	type Error = DocfillError;

	fn try_from(raw: RawColumn) -> Result<Self, Self::Error> {
		let r#type = match raw.r#type {
			ColumnKind::String => ColumnType::String,
			ColumnKind::Number => ColumnType::Number,
			ColumnKind::Boolean => ColumnType::Boolean,
			ColumnKind::Date => ColumnType::Date,
			ColumnKind::Array => {
				let separator = raw
					.separator
					.or_else(|| raw.array_metadata.map(|metadata| metadata.separator))
					.filter(|separator| !separator.is_empty())
					.ok_or_else(|| DocfillError::MissingSeparator(raw.name.clone()))?;
				ColumnType::Array { separator }
			}
		};

		Ok(Self {
			name: raw.name,
			r#type,
		})
	}
}

impl Column {
	pub fn new(name: impl Into<String>, r#type: ColumnType) -> Self {
		Self {
			name: name.into(),
			r#type,
		}
	}

	/// Convert a raw row value into the typed value declared for this column.
	pub fn coerce(&self, raw: &Value) -> DocfillResult<ContextValue> {
		match &self.r#type {
			ColumnType::String | ColumnType::Date => Ok(ContextValue::String(raw_text(raw))),
			ColumnType::Boolean => {
				let value = match raw {
					Value::Bool(value) => *value,
					other => {
						let text = raw_text(other).trim().to_lowercase();
						text == "true" || text == "1"
					}
				};
				Ok(ContextValue::Boolean(value))
			}
			ColumnType::Number => {
				let number = match raw {
					Value::Number(number) => number.as_f64(),
					other => raw_text(other).trim().parse::<f64>().ok(),
				};
				let Some(number) = number else {
					return Err(DocfillError::Coercion {
						column: self.name.clone(),
						value: raw_text(raw),
						expected: self.r#type.to_string(),
					});
				};

				if !number.is_finite() {
					return Err(DocfillError::UnconvertibleFloat {
						column: self.name.clone(),
						value: raw_text(raw),
					});
				}

				Ok(ContextValue::Number(number))
			}
			ColumnType::Array { separator } => {
				let items = match raw {
					Value::Array(values) => values.iter().map(raw_text).collect(),
					other => {
						let text = raw_text(other);
						if text.is_empty() {
							Vec::new()
						} else {
							text.split(separator.as_str()).map(str::to_string).collect()
						}
					}
				};
				Ok(ContextValue::List(items))
			}
		}
	}
}

fn raw_text(value: &Value) -> String {
	match value {
		Value::String(text) => text.clone(),
		Value::Null => String::new(),
		other => other.to_string(),
	}
}

/// Build the render context for one row.
///
/// Mapping entries without a column, columns missing from the row and
/// columns missing from the column table are skipped. A value that cannot be
/// coerced to its column type fails the whole row.
pub fn build_context(
	row: &DataRow,
	columns: &[Column],
	mapping: &VariableMapping,
) -> DocfillResult<RenderContext> {
	let mut values = BTreeMap::new();

	for (variable, column_name) in mapping {
		let Some(column_name) = column_name.as_deref().filter(|name| !name.is_empty()) else {
			continue;
		};
		let Some(raw) = row.data.get(column_name) else {
			continue;
		};
		let Some(column) = columns.iter().find(|column| column.name == column_name) else {
			tracing::debug!(
				variable = variable.as_str(),
				column = column_name,
				"column has no declared type, skipping"
			);
			continue;
		};

		values.insert(variable.clone(), column.coerce(raw)?);
	}

	Ok(RenderContext(values))
}
