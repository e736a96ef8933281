use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;

use crate::Column;
use crate::DataRow;
use crate::DocfillError;
use crate::DocfillResult;
use crate::LiquidEvaluator;
use crate::RenderContext;
use crate::RenderReport;
use crate::RenderWarning;
use crate::TemplateCache;
use crate::TemplateEngine;
use crate::TemplateEvaluator;
use crate::TemplateFormat;
use crate::TemplatePackage;
use crate::TemplateSource;
use crate::VariableMapping;
use crate::build_context;
use crate::render_document;

/// A rendered document package.
#[derive(Debug, Clone)]
pub struct RenderedPackage {
	/// The rewritten package.
	pub bytes: Vec<u8>,
	pub report: RenderReport,
}

/// Render one package in memory: open it, fill every template block and
/// write it back.
pub fn render_package(
	bytes: &[u8],
	format: TemplateFormat,
	context: &RenderContext,
	evaluator: &dyn TemplateEvaluator,
) -> DocfillResult<RenderedPackage> {
	let mut package = TemplatePackage::read(bytes, format)?;
	let report = render_document(package.document_mut(), context, evaluator);
	let bytes = package.into_bytes()?;

	Ok(RenderedPackage { bytes, report })
}

/// What to render: a template and how data rows map onto its variables.
#[derive(Debug, Clone)]
pub struct RenderJob {
	/// Key of the template in the [`TemplateSource`].
	pub template: String,
	/// Detected from the package contents when `None`.
	pub format: Option<TemplateFormat>,
	pub columns: Vec<Column>,
	pub variables: VariableMapping,
}

/// The result of rendering one data row.
#[derive(Debug, Clone, Serialize)]
pub struct RowOutcome {
	/// Id of the data row.
	pub row_id: String,
	/// Whether the row produced a document.
	pub success: bool,
	/// Format of the rendered document. Absent when the row failed.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub format: Option<TemplateFormat>,
	/// Blocks that were left untouched. A row with warnings still succeeds.
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub warnings: Vec<RenderWarning>,
	/// Why the row failed.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	/// The rendered document package.
	#[serde(skip)]
	pub bytes: Option<Vec<u8>>,
}

/// Renders data rows against one template, sharing a [`TemplateCache`] so the
/// template is downloaded once per generation.
pub struct Renderer<S> {
	cache: Arc<TemplateCache<S>>,
	evaluator: Box<dyn TemplateEvaluator>,
	job: RenderJob,
}

impl<S: TemplateSource> Renderer<S> {
	/// A renderer evaluating Liquid templates.
	pub fn new(cache: Arc<TemplateCache<S>>, job: RenderJob) -> Self {
		Self {
			cache,
			evaluator: Box::new(LiquidEvaluator::new()),
			job,
		}
	}

	#[must_use]
	pub fn with_evaluator(mut self, evaluator: impl TemplateEvaluator + 'static) -> Self {
		self.evaluator = Box::new(evaluator);
		self
	}

	/// Evaluate templates written in `engine`'s language.
	#[must_use]
	pub fn with_engine(mut self, engine: TemplateEngine) -> Self {
		self.evaluator = engine.evaluator();
		self
	}

	pub fn job(&self) -> &RenderJob {
		&self.job
	}

	/// Render one row. Failures are reported in the outcome and never affect
	/// other rows.
	pub fn render_row(&self, row: &DataRow) -> RowOutcome {
		let _span = tracing::info_span!("render_row", row_id = row.id.as_str()).entered();

		match self.try_render_row(row) {
			Ok((format, rendered)) => {
				tracing::info!(
					blocks = rendered.report.blocks,
					rewritten = rendered.report.rewritten,
					warnings = rendered.report.warnings.len(),
					"rendered row"
				);
				RowOutcome {
					row_id: row.id.clone(),
					success: true,
					format: Some(format),
					warnings: rendered.report.warnings,
					error: None,
					bytes: Some(rendered.bytes),
				}
			}
			Err(e) => {
				tracing::error!(error = %e, "row failed to render");
				RowOutcome {
					row_id: row.id.clone(),
					success: false,
					format: self.job.format,
					warnings: Vec::new(),
					error: Some(e.to_string()),
					bytes: None,
				}
			}
		}
	}

	fn try_render_row(&self, row: &DataRow) -> DocfillResult<(TemplateFormat, RenderedPackage)> {
		let bytes = self.cache.get(&self.job.template)?;
		let format = match self.job.format {
			Some(format) => format,
			None => TemplateFormat::detect(&bytes)?,
		};

		if self.job.variables.is_empty() {
			tracing::debug!("no variables mapped, copying template");
			return Ok((
				format,
				RenderedPackage {
					bytes: bytes.to_vec(),
					report: RenderReport::default(),
				},
			));
		}

		let context = build_context(row, &self.job.columns, &self.job.variables)?;
		let rendered = render_package(&bytes, format, &context, self.evaluator.as_ref())?;
		Ok((format, rendered))
	}

	/// Render every row in parallel. `workers` caps the number of threads;
	/// rayon's default pool size is used when it is `None`. Outcomes are
	/// returned in row order.
	pub fn render_batch(
		&self,
		rows: &[DataRow],
		workers: Option<usize>,
	) -> DocfillResult<Vec<RowOutcome>> {
		let mut builder = rayon::ThreadPoolBuilder::new();
		if let Some(workers) = workers {
			builder = builder.num_threads(workers.max(1));
		}
		let pool = builder
			.build()
			.map_err(|e| DocfillError::WorkerPool(e.to_string()))?;

		tracing::info!(rows = rows.len(), threads = pool.current_num_threads(), "rendering batch");
		Ok(pool.install(|| rows.par_iter().map(|row| self.render_row(row)).collect()))
	}
}
