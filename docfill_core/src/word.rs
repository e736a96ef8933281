//! Reading and writing the text of `word/document.xml`.

use crate::DocfillError;
use crate::DocfillResult;
use crate::Paragraph;
use crate::Run;
use crate::RunFormat;
use crate::Table;
use crate::TableCell;
use crate::TableRow;
use crate::TextBox;
use crate::WordDocument;
use crate::xml::Element;
use crate::xml::Node;
use crate::xml::XmlPart;
use crate::xml::xml_error;

pub(crate) const DOCUMENT_PART: &str = "word/document.xml";

const PARAGRAPH: &str = "w:p";
const RUN: &str = "w:r";
const TEXT_BOX: &str = "w:txbxContent";
/// Containers whose runs belong to the enclosing paragraph.
const RUN_WRAPPERS: [&str; 2] = ["w:hyperlink", "w:smartTag"];
/// Run children that carry text.
const TEXT_CHILDREN: [&str; 6] = ["w:t", "w:tab", "w:br", "w:cr", "w:noBreakHyphen", "w:ptab"];

pub(crate) fn read(part: &XmlPart) -> DocfillResult<WordDocument> {
	let body = body(part)?;

	let mut text_boxes = Vec::new();
	collect_text_boxes(body, &mut text_boxes);

	Ok(WordDocument {
		body: body
			.children_named(PARAGRAPH)
			.map(|paragraph| read_paragraph(&part.name, paragraph))
			.collect(),
		tables: body
			.children_named("w:tbl")
			.map(|table| read_table(&part.name, table))
			.collect(),
		text_boxes: text_boxes
			.into_iter()
			.map(|text_box| {
				let mut paragraphs = Vec::new();
				collect_box_paragraphs(text_box, &mut |paragraph| {
					paragraphs.push(read_paragraph(&part.name, paragraph));
				});
				TextBox { paragraphs }
			})
			.collect(),
	})
}

/// Copy the text of `document` back into `part`. Only runs whose text changed
/// are touched.
pub(crate) fn write(part: &mut XmlPart, document: &WordDocument) -> DocfillResult<()> {
	let name = part.name.clone();
	let body = body_mut(part)?;
	let expected = document.paragraphs().count();
	let mut paragraphs = document.paragraphs();
	let mut found = 0;
	let mut result = Ok(());

	visit_paragraphs(body, &mut |element| {
		found += 1;
		let Some(paragraph) = paragraphs.next() else {
			return;
		};
		if result.is_ok() {
			result = write_paragraph(&name, element, paragraph);
		}
	});

	result?;
	if expected != found {
		return Err(DocfillError::StructureMismatch { expected, found });
	}
	Ok(())
}

fn body(part: &XmlPart) -> DocfillResult<&Element> {
	part.root()
		.and_then(|root| root.child("w:body"))
		.ok_or_else(|| xml_error(&part.name, "missing `w:body`"))
}

fn body_mut(part: &mut XmlPart) -> DocfillResult<&mut Element> {
	let name = part.name.clone();
	part.root_mut()
		.and_then(|root| root.child_mut("w:body"))
		.ok_or_else(|| xml_error(&name, "missing `w:body`"))
}

fn read_table(part: &str, table: &Element) -> Table {
	Table {
		rows: table
			.children_named("w:tr")
			.map(|row| {
				TableRow {
					cells: row
						.children_named("w:tc")
						.map(|cell| {
							TableCell {
								paragraphs: cell
									.children_named(PARAGRAPH)
									.map(|paragraph| read_paragraph(part, paragraph))
									.collect(),
							}
						})
						.collect(),
				}
			})
			.collect(),
	}
}

/// Text boxes in document order. A nested box follows the box containing it.
fn collect_text_boxes<'a>(element: &'a Element, boxes: &mut Vec<&'a Element>) {
	for child in element.elements() {
		if child.is(TEXT_BOX) {
			boxes.push(child);
		}
		collect_text_boxes(child, boxes);
	}
}

/// Paragraphs of one text box, excluding those of boxes nested inside it.
fn collect_box_paragraphs<'a>(element: &'a Element, visit: &mut dyn FnMut(&'a Element)) {
	for child in element.elements() {
		if child.is(PARAGRAPH) {
			visit(child);
		} else if !child.is(TEXT_BOX) {
			collect_box_paragraphs(child, visit);
		}
	}
}

/// Mutable walk over the same paragraphs, in the same order, as [`read`].
fn visit_paragraphs(body: &mut Element, visit: &mut dyn FnMut(&mut Element)) {
	for paragraph in body.children_named_mut(PARAGRAPH) {
		visit(paragraph);
	}

	for table in body.children_named_mut("w:tbl") {
		for row in table.children_named_mut("w:tr") {
			for cell in row.children_named_mut("w:tc") {
				for paragraph in cell.children_named_mut(PARAGRAPH) {
					visit(paragraph);
				}
			}
		}
	}

	visit_text_boxes(body, visit);
}

fn visit_text_boxes(element: &mut Element, visit: &mut dyn FnMut(&mut Element)) {
	for child in element.elements_mut() {
		if child.is(TEXT_BOX) {
			visit_box_paragraphs(child, visit);
		}
		visit_text_boxes(child, visit);
	}
}

fn visit_box_paragraphs(element: &mut Element, visit: &mut dyn FnMut(&mut Element)) {
	for child in element.elements_mut() {
		if child.is(PARAGRAPH) {
			visit(child);
		} else if !child.is(TEXT_BOX) {
			visit_box_paragraphs(child, visit);
		}
	}
}

fn runs(paragraph: &Element) -> Vec<&Element> {
	let mut runs = Vec::new();
	for child in paragraph.elements() {
		if child.is(RUN) {
			runs.push(child);
		} else if RUN_WRAPPERS.iter().any(|wrapper| child.is(wrapper)) {
			runs.extend(child.children_named(RUN));
		}
	}
	runs
}

fn runs_mut(paragraph: &mut Element) -> Vec<&mut Element> {
	let mut runs = Vec::new();
	for child in paragraph.elements_mut() {
		if child.is(RUN) {
			runs.push(child);
		} else if RUN_WRAPPERS.iter().any(|wrapper| child.is(wrapper)) {
			runs.extend(child.children_named_mut(RUN));
		}
	}
	runs
}

fn read_paragraph(part: &str, paragraph: &Element) -> Paragraph {
	Paragraph {
		runs: runs(paragraph)
			.into_iter()
			.map(|run| {
				Run {
					text: run_text(run),
					format: RunFormat(
						run.child("w:rPr")
							.and_then(|properties| properties.to_xml(part).ok()),
					),
				}
			})
			.collect(),
	}
}

fn run_text(run: &Element) -> String {
	let mut text = String::new();
	for child in run.elements() {
		match child.name() {
			b"w:t" => text.push_str(&child.text()),
			b"w:tab" | b"w:ptab" => text.push('\t'),
			b"w:br" | b"w:cr" => text.push('\n'),
			b"w:noBreakHyphen" => text.push('-'),
			_ => {}
		}
	}
	text
}

fn write_paragraph(part: &str, element: &mut Element, paragraph: &Paragraph) -> DocfillResult<()> {
	let mut runs = runs_mut(element);

	if runs.is_empty() {
		let created = paragraph
			.runs
			.iter()
			.filter(|run| !run.text.is_empty())
			.map(|run| {
				let mut created = Element::new(RUN);
				set_run_text(&mut created, &run.text);
				Node::Element(created)
			})
			.collect::<Vec<_>>();
		element.children.extend(created);
		return Ok(());
	}

	if runs.len() != paragraph.runs.len() {
		return Err(xml_error(
			part,
			format!(
				"paragraph has {} run(s) but {} were rendered",
				runs.len(),
				paragraph.runs.len()
			),
		));
	}

	for (run, rendered) in runs.iter_mut().zip(&paragraph.runs) {
		if run_text(run) != rendered.text {
			set_run_text(run, &rendered.text);
		}
	}

	Ok(())
}

/// Replace the text children of `run`, keeping its properties and any
/// non-text content such as drawings.
fn set_run_text(run: &mut Element, text: &str) {
	let is_text = |node: &Node| {
		node.as_element()
			.is_some_and(|element| TEXT_CHILDREN.iter().any(|name| element.is(name)))
	};
	let position = run
		.children
		.iter()
		.position(is_text)
		.unwrap_or(run.children.len());
	run.children.retain(|node| !is_text(node));

	let mut nodes = Vec::new();
	for (index, line) in text.split('\n').enumerate() {
		if index > 0 {
			nodes.push(Node::Element(Element::new("w:br")));
		}
		for (index, segment) in line.split('\t').enumerate() {
			if index > 0 {
				nodes.push(Node::Element(Element::new("w:tab")));
			}
			if !segment.is_empty() {
				nodes.push(Node::Element(
					Element::new("w:t")
						.with_attribute("xml:space", "preserve")
						.with_text(segment),
				));
			}
		}
	}

	run.children.splice(position..position, nodes);
}
