use std::fmt;
use std::sync::LazyLock;

use regex::Captures;
use regex::Regex;
use serde::Deserialize;
use serde::Serialize;

use crate::DocfillError;
use crate::DocfillResult;
use crate::Document;
use crate::Paragraph;
use crate::RenderContext;
use crate::consolidate::consolidate_runs;
use crate::scope;
use crate::scope::has_directive;

/// Number of characters of a block's first paragraph used to identify it in
/// warnings.
pub const LEADING_TEXT_CHARS: usize = 20;

static DIRECTIVE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?s)\{\{.*?\}\}|\{%.*?%\}").unwrap());

/// Evaluates template source text against a render context.
pub trait TemplateEvaluator: Send + Sync {
	fn evaluate(&self, source: &str, context: &RenderContext) -> DocfillResult<String>;
}

static LIQUID: LazyLock<liquid::Parser> =
	LazyLock::new(|| liquid::ParserBuilder::with_stdlib().build().unwrap());

/// A block tag followed by the paragraph join.
static TAG_NEWLINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"%\}\n").unwrap());

/// String literals, or a bare identifier in group 1.
static IDENTIFIER: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r#""[^"]*"|'[^']*'|\b([A-Za-z_][\w-]*)"#).unwrap());

/// [`TemplateEvaluator`] for Liquid templates, the default template language.
///
/// Supports the Liquid standard library of tags and filters (`unless`,
/// `case`, `capture`, `assign`, `upcase`, `append: "!"`, `date: "%d/%m/%Y"`
/// and so on). Variables missing from the context render as empty text and
/// the first newline after a block tag is removed, so tags written on their
/// own paragraph do not leave blank lines behind.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiquidEvaluator;

impl LiquidEvaluator {
	pub fn new() -> Self {
		Self
	}
}

impl TemplateEvaluator for LiquidEvaluator {
	fn evaluate(&self, source: &str, context: &RenderContext) -> DocfillResult<String> {
		let source = TAG_NEWLINE.replace_all(source, "%}");
		let template = LIQUID
			.parse(&source)
			.map_err(|e| DocfillError::TemplateRender(e.to_string()))?;

		let mut globals =
			liquid::to_object(context).map_err(|e| DocfillError::TemplateRender(e.to_string()))?;
		for directive in DIRECTIVE.find_iter(&source) {
			for captures in IDENTIFIER.captures_iter(directive.as_str()) {
				let Some(name) = captures.get(1) else {
					continue;
				};
				if !globals.contains_key(name.as_str()) {
					globals.insert(name.as_str().to_string().into(), liquid::model::Value::Nil);
				}
			}
		}

		template
			.render(&globals)
			.map_err(|e| DocfillError::TemplateRender(e.to_string()))
	}
}

/// [`TemplateEvaluator`] backed by `minijinja`, for templates written with
/// Jinja syntax.
///
/// Undefined variables render as empty text and the first newline after a
/// block tag is removed, matching [`LiquidEvaluator`].
#[derive(Debug)]
pub struct MiniJinjaEvaluator {
	env: minijinja::Environment<'static>,
}

impl MiniJinjaEvaluator {
	pub fn new() -> Self {
		let mut env = minijinja::Environment::new();
		env.set_keep_trailing_newline(true);
		env.set_trim_blocks(true);
		env.set_undefined_behavior(minijinja::UndefinedBehavior::Lenient);
		Self { env }
	}
}

impl Default for MiniJinjaEvaluator {
	fn default() -> Self {
		Self::new()
	}
}

impl TemplateEvaluator for MiniJinjaEvaluator {
	fn evaluate(&self, source: &str, context: &RenderContext) -> DocfillResult<String> {
		self.env
			.render_str(source, minijinja::Value::from_serialize(context))
			.map_err(|e| DocfillError::TemplateRender(e.to_string()))
	}
}

/// Template language of the directives in a template.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateEngine {
	#[default]
	Liquid,
	Jinja,
}

impl TemplateEngine {
	/// A fresh evaluator for this language.
	pub fn evaluator(self) -> Box<dyn TemplateEvaluator> {
		match self {
			Self::Liquid => Box::new(LiquidEvaluator::new()),
			Self::Jinja => Box::new(MiniJinjaEvaluator::new()),
		}
	}
}

/// A problem with one template block. The block is left untouched and the
/// rest of the document still renders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[non_exhaustive]
pub enum RenderWarning {
	/// The evaluator rejected the block.
	Evaluation {
		/// Start of the block's first paragraph.
		leading_text: String,
		/// The evaluator's error message.
		message: String,
	},
	/// A block was still open when the document ended.
	UnterminatedBlock {
		/// Start of the block's first paragraph.
		leading_text: String,
		/// Number of blocks still open.
		depth: i32,
	},
	/// A closing tag appeared without a matching opening tag.
	UnbalancedClose {
		/// Start of the paragraph holding the extra closing tag.
		leading_text: String,
	},
}

impl fmt::Display for RenderWarning {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Evaluation {
				leading_text,
				message,
			} => write!(f, "block starting with `{leading_text}` failed to render: {message}"),
			Self::UnterminatedBlock {
				leading_text,
				depth,
			} => {
				write!(
					f,
					"block starting with `{leading_text}` is not closed at the end of the document \
					 ({depth} level(s) open)"
				)
			}
			Self::UnbalancedClose { leading_text } => {
				write!(f, "block starting with `{leading_text}` closes more blocks than it opens")
			}
		}
	}
}

/// Summary of rendering one document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenderReport {
	/// Blocks handed to the evaluator.
	pub blocks: usize,
	/// Blocks whose output differed from their source and were written back.
	pub rewritten: usize,
	/// Runs absorbed while consolidating directives split across runs.
	pub merged_runs: usize,
	/// Problems with individual blocks, in document order.
	pub warnings: Vec<RenderWarning>,
}

impl RenderReport {
	/// Returns true if every block rendered without a warning.
	pub fn is_clean(&self) -> bool {
		self.warnings.is_empty()
	}
}

/// Fill every template block of `document` in place.
pub fn render_document(
	document: &mut Document,
	context: &RenderContext,
	evaluator: &dyn TemplateEvaluator,
) -> RenderReport {
	let merged_runs: usize = document.paragraphs_mut().map(consolidate_runs).sum();
	let mut report = render_paragraphs(document.paragraphs_mut(), context, evaluator);
	report.merged_runs = merged_runs;
	report
}

/// Group `paragraphs` into template blocks by nesting depth and render each
/// block once. Runs are expected to be consolidated already.
pub fn render_paragraphs<'a>(
	paragraphs: impl IntoIterator<Item = &'a mut Paragraph>,
	context: &RenderContext,
	evaluator: &dyn TemplateEvaluator,
) -> RenderReport {
	let mut replay = Replay {
		context,
		evaluator,
		report: RenderReport::default(),
	};
	let mut buffer: Vec<(&'a mut Paragraph, String)> = Vec::new();
	let mut level = 0;

	for paragraph in paragraphs {
		let text = paragraph.text();
		let delta = scope::delta(&text);

		if level > 0 || delta > 0 {
			level += delta;
			buffer.push((paragraph, text));

			if level < 0 {
				let leading_text = leading_text(&buffer[0].1);
				tracing::warn!(leading_text = %leading_text, "closing tag without an open block");
				replay
					.report
					.warnings
					.push(RenderWarning::UnbalancedClose { leading_text });
				level = 0;
			}

			if level == 0 {
				replay.flush(std::mem::take(&mut buffer));
			}
		} else {
			if delta < 0 {
				let leading_text = leading_text(&text);
				tracing::warn!(leading_text = %leading_text, "closing tag without an open block");
				replay
					.report
					.warnings
					.push(RenderWarning::UnbalancedClose { leading_text });
			}

			replay.flush(vec![(paragraph, text)]);
		}
	}

	if !buffer.is_empty() {
		let leading_text = leading_text(&buffer[0].1);
		tracing::warn!(leading_text = %leading_text, depth = level, "block not closed at the end of the document");
		replay.report.warnings.push(RenderWarning::UnterminatedBlock {
			leading_text,
			depth: level,
		});
		replay.flush(buffer);
	}

	replay.report
}

struct Replay<'c> {
	context: &'c RenderContext,
	evaluator: &'c dyn TemplateEvaluator,
	report: RenderReport,
}

impl Replay<'_> {
	/// Evaluate one block and write the result into its first paragraph,
	/// clearing the others. The block is left untouched when evaluation fails
	/// or changes nothing.
	fn flush(&mut self, block: Vec<(&mut Paragraph, String)>) {
		let Some((_, first_text)) = block.first() else {
			return;
		};
		let leading_text = leading_text(first_text);
		let source = block
			.iter()
			.map(|(_, text)| text.as_str())
			.collect::<Vec<_>>()
			.join("\n");

		if !has_directive(&source) {
			return;
		}

		self.report.blocks += 1;
		let rendered = match self
			.evaluator
			.evaluate(&normalize_quotes(&source), self.context)
		{
			Ok(rendered) => rendered,
			Err(e) => {
				let message = match e {
					DocfillError::TemplateRender(message) => message,
					other => other.to_string(),
				};
				tracing::warn!(leading_text = %leading_text, %message, "template block failed to render");
				self.report.warnings.push(RenderWarning::Evaluation {
					leading_text,
					message,
				});
				return;
			}
		};

		// Paragraph joins at the edges of a block only separate tags from
		// content.
		let rendered = if block.len() > 1 {
			rendered.trim_matches('\n').to_string()
		} else {
			rendered
		};

		if rendered == source {
			return;
		}

		tracing::debug!(leading_text = %leading_text, paragraphs = block.len(), "rewriting block");
		let mut paragraphs = block.into_iter().map(|(paragraph, _)| paragraph);
		if let Some(first) = paragraphs.next() {
			first.set_text(rendered);
		}
		for paragraph in paragraphs {
			paragraph.clear();
		}
		self.report.rewritten += 1;
	}
}

/// Replace typographic quotes inside directive tags with their ASCII forms.
/// Text outside the tags keeps its quotes.
pub fn normalize_quotes(text: &str) -> String {
	DIRECTIVE
		.replace_all(text, |captures: &Captures<'_>| {
			captures[0]
				.chars()
				.map(|c| {
					match c {
						'\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' => '"',
						'\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' => '\'',
						other => other,
					}
				})
				.collect::<String>()
		})
		.into_owned()
}

fn leading_text(text: &str) -> String {
	text.chars().take(LEADING_TEXT_CHARS).collect()
}
