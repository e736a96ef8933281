use std::collections::BTreeMap;
use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use crate::Column;
use crate::DocfillError;
use crate::DocfillResult;
use crate::TemplateEngine;
use crate::TemplateFormat;
use crate::VariableMapping;

/// Supported config file locations in discovery order (highest precedence
/// first).
pub const CONFIG_FILE_CANDIDATES: [&str; 3] =
	["docfill.toml", ".docfill.toml", ".config/docfill.toml"];

/// Placeholder in [`OutputConfig::file_name`] replaced by the row id.
pub const ROW_ID_PLACEHOLDER: &str = "{id}";

/// Project configuration read from `docfill.toml`.
///
/// ```toml
/// workers = 4
///
/// [template]
/// path = "templates/certificate.docx"
///
/// [[columns]]
/// name = "Name"
/// type = "string"
///
/// [variables]
/// name = "Name"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DocfillConfig {
	/// Maximum number of rows rendered at the same time. Defaults to the
	/// number of available cores.
	#[serde(default)]
	pub workers: Option<usize>,
	pub template: TemplateConfig,
	/// Declared types of the data source columns.
	#[serde(default)]
	pub columns: Vec<Column>,
	/// Template variable name → data source column name. An empty column name
	/// leaves the variable unmapped.
	#[serde(default)]
	pub variables: BTreeMap<String, String>,
	#[serde(default)]
	pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TemplateConfig {
	/// Path to the template, relative to the project root. Absolute paths
	/// and paths leaving the root through `..` are rejected.
	pub path: PathBuf,
	/// `docx`, `pptx` or a MIME type. Inferred from the file extension, then
	/// from the package contents, when absent.
	#[serde(default)]
	pub format: Option<TemplateFormat>,
	/// Template language of the directives. Defaults to Liquid.
	#[serde(default)]
	pub engine: TemplateEngine,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
	/// Directory rendered documents are written to, relative to the project
	/// root.
	#[serde(default = "default_output_dir")]
	pub dir: PathBuf,
	/// File stem of each rendered document. `{id}` is replaced with the row
	/// id.
	#[serde(default = "default_file_name")]
	pub file_name: String,
	/// Convert rendered documents to PDF.
	#[serde(default)]
	pub pdf: bool,
}

impl Default for OutputConfig {
	fn default() -> Self {
		Self {
			dir: default_output_dir(),
			file_name: default_file_name(),
			pdf: false,
		}
	}
}

fn default_output_dir() -> PathBuf {
	PathBuf::from("out")
}

fn default_file_name() -> String {
	format!("document-{ROW_ID_PLACEHOLDER}")
}

impl DocfillConfig {
	/// Resolve the config path from known discovery candidates.
	#[must_use]
	pub fn resolve_path(root: &Path) -> Option<PathBuf> {
		CONFIG_FILE_CANDIDATES
			.iter()
			.map(|candidate| root.join(candidate))
			.find(|path| path.is_file())
	}

	/// Load the config from the first discovered config file at `root`.
	/// Returns `None` if the file does not exist.
	pub fn load(root: &Path) -> DocfillResult<Option<DocfillConfig>> {
		let Some(config_path) = Self::resolve_path(root) else {
			return Ok(None);
		};

		let content = std::fs::read_to_string(&config_path)?;
		let config = Self::parse(&content)?;
		tracing::debug!(path = %config_path.display(), "loaded config");

		Ok(Some(config))
	}

	/// Like [`DocfillConfig::load`], but a missing config file is an error.
	pub fn load_required(root: &Path) -> DocfillResult<DocfillConfig> {
		Self::load(root)?.ok_or_else(|| DocfillError::MissingConfig(root.display().to_string()))
	}

	pub fn parse(content: &str) -> DocfillResult<DocfillConfig> {
		let config: DocfillConfig =
			toml::from_str(content).map_err(|e| DocfillError::ConfigParse(e.to_string()))?;

		let inside_root = config
			.template
			.path
			.components()
			.all(|component| matches!(component, Component::Normal(_) | Component::CurDir));
		if !inside_root || config.template.path.as_os_str().is_empty() {
			return Err(DocfillError::ConfigParse(format!(
				"`template.path` must be a relative path inside the project root, got `{}`",
				config.template.path.display()
			)));
		}

		Ok(config)
	}

	/// The `[variables]` table as a mapping, with empty column names unmapped.
	pub fn variable_mapping(&self) -> VariableMapping {
		self.variables
			.iter()
			.map(|(variable, column)| {
				let column = Some(column.trim())
					.filter(|column| !column.is_empty())
					.map(str::to_string);
				(variable.clone(), column)
			})
			.collect()
	}

	/// The configured format, falling back to the template's file extension.
	pub fn template_format(&self) -> Option<TemplateFormat> {
		self.template
			.format
			.or_else(|| TemplateFormat::from_path(&self.template.path))
	}
}

impl OutputConfig {
	/// File name of the document rendered for `row_id`.
	pub fn file_name_for(&self, row_id: &str, extension: &str) -> String {
		let stem = self.file_name.replace(ROW_ID_PLACEHOLDER, &sanitize(row_id));
		format!("{stem}.{extension}")
	}
}

fn sanitize(row_id: &str) -> String {
	row_id
		.chars()
		.map(|c| {
			if c.is_alphanumeric() || matches!(c, '-' | '_' | '.') {
				c
			} else {
				'_'
			}
		})
		.collect()
}
