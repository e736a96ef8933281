use serde::Deserialize;
use serde::Serialize;

/// Opaque formatting metadata attached to a [`Run`]. For packages read from
/// disk this holds the serialized run properties (`w:rPr` / `a:rPr`); the
/// engine never inspects it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFormat(pub Option<String>);

/// The smallest unit of formatted text inside a paragraph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
	pub text: String,
	#[serde(default)]
	pub format: RunFormat,
}

impl Run {
	pub fn new(text: impl Into<String>) -> Self {
		Self {
			text: text.into(),
			format: RunFormat::default(),
		}
	}
}

/// An ordered sequence of runs. The paragraph text is the concatenation of
/// its runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Paragraph {
	pub runs: Vec<Run>,
}

impl Paragraph {
	/// Create a paragraph with one run per fragment.
	pub fn from_runs<I, S>(fragments: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			runs: fragments.into_iter().map(Run::new).collect(),
		}
	}

	pub fn text(&self) -> String {
		self.runs.iter().map(|run| run.text.as_str()).collect()
	}

	/// Replace the whole paragraph text. Every run is cleared and the first
	/// one receives `text`, keeping its formatting. A run is created when the
	/// paragraph has none.
	pub fn set_text(&mut self, text: impl Into<String>) {
		for run in &mut self.runs {
			run.text.clear();
		}

		match self.runs.first_mut() {
			Some(first) => first.text = text.into(),
			None => self.runs.push(Run::new(text)),
		}
	}

	/// Clear the text of every run without removing the runs themselves.
	pub fn clear(&mut self) {
		for run in &mut self.runs {
			run.text.clear();
		}
	}
}

/// A grid of cells, each holding its own paragraphs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
	pub rows: Vec<TableRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRow {
	pub cells: Vec<TableCell>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCell {
	pub paragraphs: Vec<Paragraph>,
}

/// A floating text box anchored somewhere in a word-processing document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBox {
	pub paragraphs: Vec<Paragraph>,
}

/// A word-processing document (format A).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordDocument {
	pub body: Vec<Paragraph>,
	pub tables: Vec<Table>,
	pub text_boxes: Vec<TextBox>,
}

/// A shape on a slide.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
	/// A shape with a text frame.
	Text { paragraphs: Vec<Paragraph> },
	/// A graphic frame holding a table.
	Table { table: Table },
	/// A group of shapes, possibly containing further groups.
	Group { shapes: Vec<Shape> },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slide {
	pub shapes: Vec<Shape>,
}

/// A slide deck (format B).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
	pub slides: Vec<Slide>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum Document {
	Word(WordDocument),
	Slides(Presentation),
}

impl From<WordDocument> for Document {
	fn from(value: WordDocument) -> Self {
		Self::Word(value)
	}
}

impl From<Presentation> for Document {
	fn from(value: Presentation) -> Self {
		Self::Slides(value)
	}
}
