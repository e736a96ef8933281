//! A small owned XML tree for the parts of a document package that hold text.
//!
//! Only what the package writer needs is modelled: elements keep their start
//! tag verbatim, text is stored unescaped, and everything else (declarations,
//! comments, processing instructions) is carried through as raw events.

use std::fmt::Display;
use std::io::Cursor;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::escape::unescape;
use quick_xml::events::BytesStart;
use quick_xml::events::BytesText;
use quick_xml::events::Event;

use crate::DocfillError;
use crate::DocfillResult;

#[derive(Debug, Clone)]
pub(crate) enum Node {
	Element(Element),
	Text(String),
	Other(Event<'static>),
}

impl Node {
	pub(crate) fn as_element(&self) -> Option<&Element> {
		match self {
			Self::Element(element) => Some(element),
			_ => None,
		}
	}

	pub(crate) fn as_element_mut(&mut self) -> Option<&mut Element> {
		match self {
			Self::Element(element) => Some(element),
			_ => None,
		}
	}
}

#[derive(Debug, Clone)]
pub(crate) struct Element {
	pub start: BytesStart<'static>,
	pub children: Vec<Node>,
}

impl Element {
	pub(crate) fn new(name: &str) -> Self {
		Self {
			start: BytesStart::new(name.to_string()),
			children: Vec::new(),
		}
	}

	#[must_use]
	pub(crate) fn with_attribute(mut self, key: &str, value: &str) -> Self {
		self.start.push_attribute((key, value));
		self
	}

	#[must_use]
	pub(crate) fn with_text(mut self, text: impl Into<String>) -> Self {
		self.children.push(Node::Text(text.into()));
		self
	}

	#[must_use]
	pub(crate) fn with_child(mut self, child: Element) -> Self {
		self.children.push(Node::Element(child));
		self
	}

	pub(crate) fn name(&self) -> &[u8] {
		self.start.name().into_inner()
	}

	pub(crate) fn is(&self, name: &str) -> bool {
		self.name() == name.as_bytes()
	}

	pub(crate) fn elements(&self) -> impl Iterator<Item = &Element> {
		self.children.iter().filter_map(Node::as_element)
	}

	pub(crate) fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
		self.children.iter_mut().filter_map(Node::as_element_mut)
	}

	pub(crate) fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
		self.elements().filter(move |element| element.is(name))
	}

	pub(crate) fn children_named_mut<'a>(
		&'a mut self,
		name: &'a str,
	) -> impl Iterator<Item = &'a mut Element> {
		self.elements_mut().filter(move |element| element.is(name))
	}

	pub(crate) fn child(&self, name: &str) -> Option<&Element> {
		self.elements().find(|element| element.is(name))
	}

	pub(crate) fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
		self.elements_mut().find(|element| element.is(name))
	}

	/// Follow a path of direct children.
	pub(crate) fn path(&self, names: &[&str]) -> Option<&Element> {
		names
			.iter()
			.try_fold(self, |element, name| element.child(name))
	}

	pub(crate) fn path_mut(&mut self, names: &[&str]) -> Option<&mut Element> {
		let mut element = self;
		for name in names {
			element = element.child_mut(name)?;
		}
		Some(element)
	}

	/// Concatenated direct text children.
	pub(crate) fn text(&self) -> String {
		self.children
			.iter()
			.filter_map(|node| {
				match node {
					Node::Text(text) => Some(text.as_str()),
					_ => None,
				}
			})
			.collect()
	}

	pub(crate) fn set_text(&mut self, text: impl Into<String>) {
		self.children.retain(|node| !matches!(node, Node::Text(_)));
		self.children.push(Node::Text(text.into()));
	}

	/// Serialize this element on its own.
	pub(crate) fn to_xml(&self, part: &str) -> DocfillResult<String> {
		let mut writer = Writer::new(Cursor::new(Vec::new()));
		write_element(&mut writer, part, self)?;
		String::from_utf8(writer.into_inner().into_inner()).map_err(|e| xml_error(part, e))
	}
}

/// One parsed XML part of a package.
#[derive(Debug, Clone)]
pub(crate) struct XmlPart {
	pub name: String,
	nodes: Vec<Node>,
}

impl XmlPart {
	pub(crate) fn parse(name: &str, xml: &[u8]) -> DocfillResult<Self> {
		let mut reader = Reader::from_reader(xml);
		let mut open: Vec<Element> = Vec::new();
		let mut nodes: Vec<Node> = Vec::new();
		let mut pending = String::new();

		loop {
			let event = reader.read_event().map_err(|e| xml_error(name, e))?;

			match &event {
				Event::Text(text) => {
					pending.push_str(&String::from_utf8_lossy(text));
					continue;
				}
				Event::GeneralRef(reference) => {
					pending.push('&');
					pending.push_str(&String::from_utf8_lossy(reference));
					pending.push(';');
					continue;
				}
				_ => {}
			}

			if !pending.is_empty() {
				let text = unescape(&pending).map_err(|e| xml_error(name, e))?.into_owned();
				pending.clear();
				append(&mut open, &mut nodes, Node::Text(text));
			}

			match event {
				Event::Start(start) => {
					open.push(Element {
						start: start.into_owned(),
						children: Vec::new(),
					});
				}
				Event::Empty(start) => {
					let element = Element {
						start: start.into_owned(),
						children: Vec::new(),
					};
					append(&mut open, &mut nodes, Node::Element(element));
				}
				Event::End(_) => {
					let element = open
						.pop()
						.ok_or_else(|| xml_error(name, "closing tag without an open element"))?;
					append(&mut open, &mut nodes, Node::Element(element));
				}
				Event::Eof => break,
				other => append(&mut open, &mut nodes, Node::Other(other.into_owned())),
			}
		}

		if !open.is_empty() {
			return Err(xml_error(name, "unexpected end of document"));
		}

		Ok(Self {
			name: name.to_string(),
			nodes,
		})
	}

	pub(crate) fn root(&self) -> Option<&Element> {
		self.nodes.iter().find_map(Node::as_element)
	}

	pub(crate) fn root_mut(&mut self) -> Option<&mut Element> {
		self.nodes.iter_mut().find_map(Node::as_element_mut)
	}

	pub(crate) fn to_bytes(&self) -> DocfillResult<Vec<u8>> {
		let mut writer = Writer::new(Cursor::new(Vec::new()));
		for node in &self.nodes {
			write_node(&mut writer, &self.name, node)?;
		}
		Ok(writer.into_inner().into_inner())
	}
}

fn append(open: &mut [Element], nodes: &mut Vec<Node>, node: Node) {
	match open.last_mut() {
		Some(parent) => parent.children.push(node),
		None => nodes.push(node),
	}
}

type XmlWriter = Writer<Cursor<Vec<u8>>>;

fn write_node(writer: &mut XmlWriter, part: &str, node: &Node) -> DocfillResult<()> {
	match node {
		Node::Element(element) => write_element(writer, part, element),
		Node::Text(text) => {
			writer
				.write_event(Event::Text(BytesText::new(text)))
				.map_err(|e| xml_error(part, e))
		}
		Node::Other(event) => writer.write_event(event.borrow()).map_err(|e| xml_error(part, e)),
	}
}

fn write_element(writer: &mut XmlWriter, part: &str, element: &Element) -> DocfillResult<()> {
	if element.children.is_empty() {
		return writer
			.write_event(Event::Empty(element.start.borrow()))
			.map_err(|e| xml_error(part, e));
	}

	writer
		.write_event(Event::Start(element.start.borrow()))
		.map_err(|e| xml_error(part, e))?;
	for child in &element.children {
		write_node(writer, part, child)?;
	}
	writer
		.write_event(Event::End(element.start.to_end()))
		.map_err(|e| xml_error(part, e))
}

pub(crate) fn xml_error(part: &str, reason: impl Display) -> DocfillError {
	DocfillError::Xml {
		part: part.to_string(),
		reason: reason.to_string(),
	}
}
