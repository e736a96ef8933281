//! Depth-first paragraph traversal for both document formats.
//!
//! The order is stable for an unmodified document:
//!
//! - word documents yield body paragraphs, then table paragraphs (row-major,
//!   cell-major), then text box paragraphs.
//! - presentations yield slides in order, and for every shape its text frame,
//!   its table, then the members of a group, recursively.
//!
//! [`Document::paragraphs`] and [`Document::paragraphs_mut`] always agree on
//! this order; the package writer relies on it to map rendered paragraphs back
//! onto the XML they came from.

use crate::Document;
use crate::Paragraph;
use crate::Presentation;
use crate::Shape;
use crate::Slide;
use crate::Table;
use crate::WordDocument;

pub type Paragraphs<'a> = Box<dyn Iterator<Item = &'a Paragraph> + 'a>;
pub type ParagraphsMut<'a> = Box<dyn Iterator<Item = &'a mut Paragraph> + 'a>;

impl Document {
	/// Lazily walk every text-bearing paragraph. Each call starts a fresh walk.
	pub fn paragraphs(&self) -> Paragraphs<'_> {
		match self {
			Self::Word(document) => document.paragraphs(),
			Self::Slides(presentation) => presentation.paragraphs(),
		}
	}

	/// Mutable counterpart of [`Document::paragraphs`], in the same order.
	pub fn paragraphs_mut(&mut self) -> ParagraphsMut<'_> {
		match self {
			Self::Word(document) => document.paragraphs_mut(),
			Self::Slides(presentation) => presentation.paragraphs_mut(),
		}
	}

	pub fn paragraph_count(&self) -> usize {
		self.paragraphs().count()
	}
}

impl WordDocument {
	pub fn paragraphs(&self) -> Paragraphs<'_> {
		Box::new(
			self.body
				.iter()
				.chain(self.tables.iter().flat_map(table_paragraphs))
				.chain(self.text_boxes.iter().flat_map(|text_box| text_box.paragraphs.iter())),
		)
	}

	pub fn paragraphs_mut(&mut self) -> ParagraphsMut<'_> {
		Box::new(
			self.body
				.iter_mut()
				.chain(self.tables.iter_mut().flat_map(table_paragraphs_mut))
				.chain(
					self.text_boxes
						.iter_mut()
						.flat_map(|text_box| text_box.paragraphs.iter_mut()),
				),
		)
	}
}

impl Presentation {
	pub fn paragraphs(&self) -> Paragraphs<'_> {
		Box::new(self.slides.iter().flat_map(Slide::paragraphs))
	}

	pub fn paragraphs_mut(&mut self) -> ParagraphsMut<'_> {
		Box::new(self.slides.iter_mut().flat_map(Slide::paragraphs_mut))
	}
}

impl Slide {
	pub fn paragraphs(&self) -> Paragraphs<'_> {
		Box::new(self.shapes.iter().flat_map(shape_paragraphs))
	}

	pub fn paragraphs_mut(&mut self) -> ParagraphsMut<'_> {
		Box::new(self.shapes.iter_mut().flat_map(shape_paragraphs_mut))
	}
}

fn table_paragraphs(table: &Table) -> impl Iterator<Item = &Paragraph> + '_ {
	table
		.rows
		.iter()
		.flat_map(|row| row.cells.iter())
		.flat_map(|cell| cell.paragraphs.iter())
}

fn table_paragraphs_mut(table: &mut Table) -> impl Iterator<Item = &mut Paragraph> + '_ {
	table
		.rows
		.iter_mut()
		.flat_map(|row| row.cells.iter_mut())
		.flat_map(|cell| cell.paragraphs.iter_mut())
}

fn shape_paragraphs(shape: &Shape) -> Paragraphs<'_> {
	match shape {
		Shape::Text { paragraphs } => Box::new(paragraphs.iter()),
		Shape::Table { table } => Box::new(table_paragraphs(table)),
		Shape::Group { shapes } => Box::new(shapes.iter().flat_map(shape_paragraphs)),
	}
}

fn shape_paragraphs_mut(shape: &mut Shape) -> ParagraphsMut<'_> {
	match shape {
		Shape::Text { paragraphs } => Box::new(paragraphs.iter_mut()),
		Shape::Table { table } => Box::new(table_paragraphs_mut(table)),
		Shape::Group { shapes } => Box::new(shapes.iter_mut().flat_map(shape_paragraphs_mut)),
	}
}
