use std::path::Path;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;

use clap::Parser;
use docfill_cli::Commands;
use docfill_cli::DocfillCli;
use docfill_cli::OutputFormat;
use docfill_core::CONFIG_FILE_CANDIDATES;
use docfill_core::DataRow;
use docfill_core::DirectorySource;
use docfill_core::DocfillConfig;
use docfill_core::RenderJob;
use docfill_core::Renderer;
use docfill_core::RowOutcome;
use docfill_core::TemplateCache;
use docfill_core::TemplateFormat;
use docfill_core::TemplatePackage;
use docfill_core::consolidate_runs;
use docfill_core::scope;
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

static USE_COLOR: std::sync::atomic::AtomicBool = std::sync::atomic::AtomicBool::new(true);

fn color_enabled() -> bool {
	USE_COLOR.load(std::sync::atomic::Ordering::Relaxed)
}

/// Apply ANSI color codes only when color is enabled.
macro_rules! colored {
	($text:expr,red) => {
		if color_enabled() {
			format!("{}", $text.red())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,green) => {
		if color_enabled() {
			format!("{}", $text.green())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,yellow) => {
		if color_enabled() {
			format!("{}", $text.yellow())
		} else {
			format!("{}", $text)
		}
	};
	($text:expr,dimmed) => {
		if color_enabled() {
			format!("{}", $text.dimmed())
		} else {
			format!("{}", $text)
		}
	};
}

fn main() {
	let args = DocfillCli::parse();

	// Respect NO_COLOR env var, --no-color flag and terminals without color.
	let use_color = !args.no_color
		&& std::env::var_os("NO_COLOR").is_none()
		&& supports_color::on(supports_color::Stream::Stdout).is_some();
	if !use_color {
		USE_COLOR.store(false, std::sync::atomic::Ordering::Relaxed);
	}

	init_logging(args.verbose, use_color);

	// Install miette's fancy handler for rich error diagnostics.
	miette::set_hook(Box::new(move |_| {
		Box::new(
			miette::MietteHandlerOpts::new()
				.color(use_color)
				.unicode(use_color)
				.build(),
		)
	}))
	.ok();

	let result = match &args.command {
		Some(Commands::Init) => run_init(&args),
		Some(Commands::Render {
			rows,
			pdf,
			workers,
			format,
		}) => run_render(&args, rows, *pdf, *workers, *format),
		Some(Commands::Inspect { template, format }) => run_inspect(template, *format),
		None => {
			eprintln!("No subcommand specified. Run `docfill --help` for usage.");
			process::exit(1);
		}
	};

	if let Err(e) = result {
		// Try to render through miette for rich diagnostics with help text
		// and error codes.
		match e.downcast::<docfill_core::DocfillError>() {
			Ok(docfill_err) => {
				let report: miette::Report = (*docfill_err).into();
				eprintln!("{report:?}");
			}
			Err(e) => {
				eprintln!("{} {e}", colored!("error:", red));
			}
		}
		process::exit(2);
	}
}

/// Log to stderr. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool, use_color: bool) {
	let filter = if std::env::var_os("RUST_LOG").is_some() {
		EnvFilter::from_default_env()
	} else if verbose {
		EnvFilter::new("docfill=debug,docfill_core=debug")
	} else {
		EnvFilter::new("error")
	};

	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_target(false)
		.with_ansi(use_color)
		.try_init();
}

fn resolve_root(args: &DocfillCli) -> PathBuf {
	args.path
		.clone()
		.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

const SAMPLE_CONFIG: &str = r#"# docfill configuration

# Rows rendered at the same time. Defaults to the number of cores.
# workers = 4

[template]
path = "templates/template.docx"
# Template language: liquid or jinja.
# engine = "liquid"

# Declare the type of every column used below.
# Types: string, number, boolean, date, array.
[[columns]]
name = "Name"
type = "string"

# [[columns]]
# name = "Tags"
# type = "array"
# separator = ","

# Template variable = data column.
[variables]
name = "Name"

[output]
dir = "out"
file_name = "document-{id}"
pdf = false
"#;

fn run_init(args: &DocfillCli) -> Result<(), Box<dyn std::error::Error>> {
	let root = resolve_root(args);

	if let Some(existing) = DocfillConfig::resolve_path(&root) {
		println!("Config file already exists: {}", existing.display());
		return Ok(());
	}

	let config_path = root.join(CONFIG_FILE_CANDIDATES[0]);
	std::fs::write(&config_path, SAMPLE_CONFIG)?;
	println!("Created {}", config_path.display());
	println!();
	println!("Next steps:");
	println!("  1. Point [template] path at your .docx or .pptx template");
	println!("  2. Write directives such as {{{{ name }}}} into the template");
	println!("  3. Run `docfill render --rows rows.json`");

	Ok(())
}

/// One row of the render output.
#[derive(Serialize)]
struct RowReport {
	#[serde(flatten)]
	outcome: RowOutcome,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	files: Vec<String>,
}

fn run_render(
	args: &DocfillCli,
	rows_path: &Path,
	pdf: bool,
	workers: Option<usize>,
	format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
	let root = resolve_root(args);
	let config = DocfillConfig::load_required(&root)?;
	let rows: Vec<DataRow> = serde_json::from_str(&std::fs::read_to_string(rows_path)?)?;
	tracing::debug!(
		rows = rows.len(),
		template = %config.template.path.display(),
		engine = ?config.template.engine,
		"loaded rows"
	);

	let job = RenderJob {
		template: config.template.path.to_string_lossy().replace('\\', "/"),
		format: config.template_format(),
		columns: config.columns.clone(),
		variables: config.variable_mapping(),
	};
	let cache = Arc::new(TemplateCache::new(DirectorySource::new(&root)));
	let renderer = Renderer::new(cache, job).with_engine(config.template.engine);
	let outcomes = renderer.render_batch(&rows, workers.or(config.workers))?;

	let output_dir = root.join(&config.output.dir);
	std::fs::create_dir_all(&output_dir)?;
	let convert = pdf || config.output.pdf;

	let mut reports = Vec::with_capacity(outcomes.len());
	for mut outcome in outcomes {
		let mut files = Vec::new();

		if let (Some(bytes), Some(format)) = (outcome.bytes.take(), outcome.format) {
			let document_path = output_dir.join(
				config
					.output
					.file_name_for(&outcome.row_id, format.extension()),
			);
			std::fs::write(&document_path, &bytes)?;
			files.push(make_relative(&document_path, &root));

			if convert {
				match convert_to_pdf(&bytes, format) {
					Ok(pdf_bytes) => {
						let pdf_path = document_path.with_extension("pdf");
						std::fs::write(&pdf_path, pdf_bytes)?;
						files.push(make_relative(&pdf_path, &root));
					}
					Err(e) => {
						outcome.success = false;
						outcome.error = Some(format!("pdf conversion failed: {e}"));
					}
				}
			}
		}

		reports.push(RowReport { outcome, files });
	}

	let failed = reports.iter().filter(|report| !report.outcome.success).count();

	match format {
		OutputFormat::Json => {
			let output = serde_json::json!({
				"ok": failed == 0,
				"rendered": reports.len() - failed,
				"failed": failed,
				"rows": reports,
			});
			println!("{output}");
		}
		OutputFormat::Text => print_render_report(&reports, failed),
	}

	if failed > 0 {
		process::exit(1);
	}

	Ok(())
}

fn print_render_report(reports: &[RowReport], failed: usize) {
	for report in reports {
		let outcome = &report.outcome;
		if outcome.success {
			println!(
				"{} row {} {}",
				colored!("✓", green),
				outcome.row_id,
				colored!(format!("→ {}", report.files.join(", ")), dimmed)
			);
		} else {
			println!(
				"{} row {}: {}",
				colored!("✗", red),
				outcome.row_id,
				outcome.error.as_deref().unwrap_or("unknown error")
			);
		}

		for warning in &outcome.warnings {
			println!("  {} {warning}", colored!("warning:", yellow));
		}
	}

	println!();
	println!(
		"Rendered {} of {} row(s).",
		reports.len() - failed,
		reports.len()
	);
}

#[derive(Serialize)]
struct ParagraphReport {
	index: usize,
	text: String,
	runs: Vec<String>,
	delta: i32,
	directive: bool,
}

fn run_inspect(template: &Path, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
	let bytes = std::fs::read(template)?;
	let template_format = match TemplateFormat::from_path(template) {
		Some(template_format) => template_format,
		None => TemplateFormat::detect(&bytes)?,
	};
	let package = TemplatePackage::read(&bytes, template_format)?;

	let paragraphs: Vec<ParagraphReport> = package
		.document()
		.paragraphs()
		.enumerate()
		.map(|(index, paragraph)| {
			let text = paragraph.text();
			ParagraphReport {
				index,
				delta: scope::delta(&text),
				directive: scope::has_directive(&text),
				runs: paragraph.runs.iter().map(|run| run.text.clone()).collect(),
				text,
			}
		})
		.collect();
	let split = package
		.document()
		.paragraphs()
		.filter(|paragraph| {
			let mut merged = (*paragraph).clone();
			consolidate_runs(&mut merged) > 0
		})
		.count();

	match format {
		OutputFormat::Json => {
			let output = serde_json::json!({
				"format": template_format,
				"paragraphs": paragraphs,
				"split_directives": split,
			});
			println!("{output}");
		}
		OutputFormat::Text => {
			println!(
				"{} ({template_format}, {} paragraph(s))",
				template.display(),
				paragraphs.len()
			);
			for paragraph in &paragraphs {
				let marker = if paragraph.directive { "*" } else { " " };
				println!(
					"{:>4} {:>+3} {marker} {:?} {}",
					paragraph.index,
					paragraph.delta,
					paragraph.text,
					colored!(format!("{:?}", paragraph.runs), dimmed)
				);
			}
			if split > 0 {
				println!();
				println!(
					"{} {split} paragraph(s) have directives split across runs.",
					colored!("note:", yellow)
				);
			}
		}
	}

	Ok(())
}

/// Convert a rendered document with LibreOffice running headless in a
/// throwaway profile.
fn convert_to_pdf(
	bytes: &[u8],
	format: TemplateFormat,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
	let soffice =
		std::env::var_os("SOFFICE_PATH").map_or_else(|| PathBuf::from("soffice"), PathBuf::from);
	let workspace = tempfile::tempdir()?;
	let input = workspace
		.path()
		.join(format!("input.{}", format.extension()));
	std::fs::write(&input, bytes)?;

	let profile = workspace.path().join("profile");
	let output = process::Command::new(&soffice)
		.arg("--headless")
		.arg(format!("-env:UserInstallation=file://{}", profile.display()))
		.arg("--convert-to")
		.arg("pdf")
		.arg("--outdir")
		.arg(workspace.path())
		.arg(&input)
		.output()?;

	if !output.status.success() {
		return Err(format!(
			"{} exited with {}: {}",
			soffice.display(),
			output.status,
			String::from_utf8_lossy(&output.stderr).trim()
		)
		.into());
	}

	Ok(std::fs::read(workspace.path().join("input.pdf"))?)
}

fn make_relative(path: &Path, root: &Path) -> String {
	path.strip_prefix(root)
		.unwrap_or(path)
		.to_string_lossy()
		.replace('\\', "/")
}
