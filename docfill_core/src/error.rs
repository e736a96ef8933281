use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum DocfillError {
	#[error(transparent)]
	#[diagnostic(code(docfill::io_error))]
	Io(#[from] std::io::Error),

	#[error("failed to parse config file: {0}")]
	#[diagnostic(
		code(docfill::config_parse),
		help("check that docfill.toml is valid TOML with [template], [[columns]] and [variables] sections")
	)]
	ConfigParse(String),

	#[error("no config file found under `{0}`")]
	#[diagnostic(
		code(docfill::missing_config),
		help("create a docfill.toml in the project root")
	)]
	MissingConfig(String),

	#[error("unsupported template format: `{0}`")]
	#[diagnostic(
		code(docfill::unsupported_format),
		help("supported formats: docx, pptx, and the Google Docs / Google Slides export types")
	)]
	UnsupportedFormat(String),

	#[error("failed to read document package: {0}")]
	#[diagnostic(code(docfill::package))]
	Package(String),

	#[error("malformed xml in `{part}`: {reason}")]
	#[diagnostic(code(docfill::xml))]
	Xml { part: String, reason: String },

	#[error("document package has no `{0}` part")]
	#[diagnostic(
		code(docfill::missing_part),
		help("make sure the template was saved as a .docx or .pptx file")
	)]
	MissingPart(String),

	#[error("document structure changed while rendering: expected {expected} paragraph(s), found {found}")]
	#[diagnostic(code(docfill::structure_mismatch))]
	StructureMismatch { expected: usize, found: usize },

	#[error("template evaluation failed: {0}")]
	#[diagnostic(code(docfill::template_render))]
	TemplateRender(String),

	#[error("cannot coerce `{value}` in column `{column}` to {expected}")]
	#[diagnostic(
		code(docfill::coercion),
		help("fix the value in the data source or change the column type")
	)]
	Coercion {
		column: String,
		value: String,
		expected: String,
	},

	#[error("unconvertible float value in column `{column}`: {value}")]
	#[diagnostic(
		code(docfill::unconvertible_float),
		help("NaN and Infinity are not valid numbers")
	)]
	UnconvertibleFloat { column: String, value: String },

	#[error("array column `{0}` has no separator")]
	#[diagnostic(
		code(docfill::missing_separator),
		help("add `separator = \",\"` to the column definition")
	)]
	MissingSeparator(String),

	#[error("failed to fetch template `{key}`: {reason}")]
	#[diagnostic(code(docfill::fetch))]
	Fetch { key: String, reason: String },

	#[error("concurrent fetch of template `{0}` did not complete")]
	#[diagnostic(
		code(docfill::fetch_aborted),
		help("the download this request was waiting on failed; request the template again")
	)]
	FetchAborted(String),

	#[error("failed to start render workers: {0}")]
	#[diagnostic(code(docfill::worker_pool), help("lower `workers` in docfill.toml"))]
	WorkerPool(String),
}

pub type DocfillResult<T> = Result<T, DocfillError>;
pub type AnyError = Box<dyn std::error::Error>;
pub type AnyEmptyResult = Result<(), AnyError>;
pub type AnyResult<T> = Result<T, AnyError>;
