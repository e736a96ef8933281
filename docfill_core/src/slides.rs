//! Reading and writing the text of `ppt/slides/slideN.xml` parts.

use std::sync::LazyLock;

use regex::Regex;

use crate::DocfillError;
use crate::DocfillResult;
use crate::Paragraph;
use crate::Run;
use crate::RunFormat;
use crate::Shape;
use crate::Slide;
use crate::Table;
use crate::TableCell;
use crate::TableRow;
use crate::xml::Element;
use crate::xml::Node;
use crate::xml::XmlPart;
use crate::xml::xml_error;

static SLIDE_PART: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"^ppt/slides/slide(\d+)\.xml$").unwrap());

const TABLE_PATH: [&str; 3] = ["a:graphic", "a:graphicData", "a:tbl"];

/// The slide number of a package entry name, if it is a slide part.
pub(crate) fn slide_number(name: &str) -> Option<u32> {
	SLIDE_PART
		.captures(name)
		.and_then(|captures| captures[1].parse().ok())
}

pub(crate) fn read(part: &XmlPart) -> DocfillResult<Slide> {
	Ok(Slide {
		shapes: read_shapes(&part.name, shape_tree(part)?),
	})
}

/// Copy the text of `slide` back into `part`.
pub(crate) fn write(part: &mut XmlPart, slide: &Slide) -> DocfillResult<()> {
	let name = part.name.clone();
	let tree = shape_tree_mut(part)?;
	let expected = slide.paragraphs().count();
	let mut paragraphs = slide.paragraphs();
	let mut found = 0;
	let mut result = Ok(());

	visit_shapes(tree, &mut |element| {
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

fn shape_tree(part: &XmlPart) -> DocfillResult<&Element> {
	part.root()
		.and_then(|root| root.path(&["p:cSld", "p:spTree"]))
		.ok_or_else(|| xml_error(&part.name, "missing `p:spTree`"))
}

fn shape_tree_mut(part: &mut XmlPart) -> DocfillResult<&mut Element> {
	let name = part.name.clone();
	part.root_mut()
		.and_then(|root| root.path_mut(&["p:cSld", "p:spTree"]))
		.ok_or_else(|| xml_error(&name, "missing `p:spTree`"))
}

fn read_shapes(part: &str, tree: &Element) -> Vec<Shape> {
	tree.elements()
		.filter_map(|shape| {
			match shape.name() {
				b"p:sp" => {
					shape.child("p:txBody").map(|body| {
						Shape::Text {
							paragraphs: read_text_body(part, body),
						}
					})
				}
				b"p:graphicFrame" => {
					shape.path(&TABLE_PATH).map(|table| {
						Shape::Table {
							table: read_table(part, table),
						}
					})
				}
				b"p:grpSp" => {
					Some(Shape::Group {
						shapes: read_shapes(part, shape),
					})
				}
				_ => None,
			}
		})
		.collect()
}

fn read_table(part: &str, table: &Element) -> Table {
	Table {
		rows: table
			.children_named("a:tr")
			.map(|row| {
				TableRow {
					cells: row
						.children_named("a:tc")
						.map(|cell| {
							TableCell {
								paragraphs: cell
									.child("a:txBody")
									.map(|body| read_text_body(part, body))
									.unwrap_or_default(),
							}
						})
						.collect(),
				}
			})
			.collect(),
	}
}

fn read_text_body(part: &str, body: &Element) -> Vec<Paragraph> {
	body.children_named("a:p")
		.map(|paragraph| {
			Paragraph {
				runs: paragraph
					.children_named("a:r")
					.map(|run| {
						Run {
							text: run_text(run),
							format: RunFormat(
								run.child("a:rPr")
									.and_then(|properties| properties.to_xml(part).ok()),
							),
						}
					})
					.collect(),
			}
		})
		.collect()
}

/// Mutable walk over the same paragraphs, in the same order, as [`read`].
fn visit_shapes(tree: &mut Element, visit: &mut dyn FnMut(&mut Element)) {
	for shape in tree.elements_mut() {
		match shape.name() {
			b"p:sp" => {
				if let Some(body) = shape.child_mut("p:txBody") {
					visit_text_body(body, visit);
				}
			}
			b"p:graphicFrame" => {
				if let Some(table) = shape.path_mut(&TABLE_PATH) {
					for row in table.children_named_mut("a:tr") {
						for cell in row.children_named_mut("a:tc") {
							if let Some(body) = cell.child_mut("a:txBody") {
								visit_text_body(body, visit);
							}
						}
					}
				}
			}
			b"p:grpSp" => visit_shapes(shape, visit),
			_ => {}
		}
	}
}

fn visit_text_body(body: &mut Element, visit: &mut dyn FnMut(&mut Element)) {
	for paragraph in body.children_named_mut("a:p") {
		visit(paragraph);
	}
}

fn run_text(run: &Element) -> String {
	run.child("a:t").map(Element::text).unwrap_or_default()
}

fn write_paragraph(part: &str, element: &mut Element, paragraph: &Paragraph) -> DocfillResult<()> {
	let mut runs: Vec<&mut Element> = element.children_named_mut("a:r").collect();

	if runs.is_empty() {
		let created = paragraph
			.runs
			.iter()
			.filter(|run| !run.text.is_empty())
			.map(|run| {
				Node::Element(
					Element::new("a:r").with_child(Element::new("a:t").with_text(run.text.clone())),
				)
			})
			.collect::<Vec<_>>();
		// Runs must precede the end-of-paragraph properties.
		let position = element
			.children
			.iter()
			.position(|node| node.as_element().is_some_and(|child| child.is("a:endParaRPr")))
			.unwrap_or(element.children.len());
		element.children.splice(position..position, created);
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
		if run_text(run) == rendered.text {
			continue;
		}
		match run.child_mut("a:t") {
			Some(text) => text.set_text(rendered.text.clone()),
			None => {
				run.children
					.push(Node::Element(Element::new("a:t").with_text(rendered.text.clone())));
			}
		}
	}

	Ok(())
}
