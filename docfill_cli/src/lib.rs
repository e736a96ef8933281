use std::path::PathBuf;

use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;

#[derive(Parser)]
#[command(
	author,
	version,
	about = "Fill office document templates with rows of data.",
	long_about = "docfill renders .docx and .pptx templates containing Liquid directives \
	              ({{ name }}, {% if premium %} ... {% endif %}) once per data row.\n\nDirectives \
	              may span formatting runs and whole paragraphs; everything outside them keeps \
	              its formatting.\n\nQuick start:\n  docfill init     Create a docfill.toml\n  \
	              docfill inspect  Show how a template is split into paragraphs\n  docfill \
	              render   Render every row of a JSON file"
)]
pub struct DocfillCli {
	#[command(subcommand)]
	pub command: Option<Commands>,

	/// Path to the project root directory.
	#[arg(long, short, global = true)]
	pub path: Option<PathBuf>,

	/// Enable verbose output.
	#[arg(long, short, global = true, default_value_t = false)]
	pub verbose: bool,

	/// Disable colored output.
	#[arg(long, global = true, default_value_t = false)]
	pub no_color: bool,
}

#[derive(Subcommand)]
pub enum Commands {
	/// Create a sample `docfill.toml` in the project root.
	///
	/// If a config file already exists this command is a no-op and exits
	/// successfully.
	Init,
	/// Render one document per data row.
	///
	/// Reads the template, column types and variable mapping from
	/// `docfill.toml`, renders every row of the rows file in parallel and
	/// writes the results to the output directory. Rows that fail are
	/// reported and do not stop the others; the exit code is non-zero when any
	/// row failed.
	Render {
		/// JSON file holding an array of `{ "id": ..., "data": { ... } }` rows.
		#[arg(long, short)]
		rows: PathBuf,

		/// Convert every rendered document to PDF with LibreOffice. The
		/// `soffice` binary is taken from `SOFFICE_PATH` when set.
		#[arg(long, default_value_t = false)]
		pdf: bool,

		/// Maximum number of rows rendered at the same time. Overrides
		/// `workers` in `docfill.toml`.
		#[arg(long)]
		workers: Option<usize>,

		/// Output format for render results. Use `text` for human-readable
		/// output or `json` for programmatic consumption.
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,
	},
	/// Print every paragraph of a template in render order.
	///
	/// Shows the runs each paragraph is split into and the change in block
	/// depth its control tags cause. Useful for finding directives that a
	/// word processor split across formatting runs.
	Inspect {
		/// The `.docx` or `.pptx` template to inspect.
		template: PathBuf,

		/// Output format for inspect results. Use `text` for human-readable
		/// output or `json` for programmatic consumption.
		#[arg(long, value_enum, default_value_t = OutputFormat::Text)]
		format: OutputFormat,
	},
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
	/// Human-readable text output with colors and formatting.
	Text,
	/// JSON output for programmatic consumption.
	Json,
}
