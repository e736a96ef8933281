use std::io::Cursor;
use std::io::Read;
use std::io::Write;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use zip::ZipArchive;
use zip::ZipWriter;
use zip::write::FileOptions;

use super::*;

pub const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub const V_NS: &str = "urn:schemas-microsoft-com:vml";
pub const A_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub const P_NS: &str = "http://schemas.openxmlformats.org/presentationml/2006/main";

pub const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="xml" ContentType="application/xml"/></Types>"#;
pub const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:style w:styleId="Normal"/></w:styles>"#;

pub fn paragraph(fragments: &[&str]) -> Paragraph {
	Paragraph::from_runs(fragments.iter().copied())
}

pub fn word(paragraphs: &[&str]) -> Document {
	Document::Word(WordDocument {
		body: paragraphs.iter().map(|text| paragraph(&[*text])).collect(),
		..WordDocument::default()
	})
}

pub fn texts(document: &Document) -> Vec<String> {
	document.paragraphs().map(Paragraph::text).collect()
}

pub fn render(document: &mut Document, context: &RenderContext) -> RenderReport {
	render_document(document, context, &LiquidEvaluator::new())
}

/// Returns every block exactly as written.
pub struct EchoEvaluator;

impl TemplateEvaluator for EchoEvaluator {
	fn evaluate(&self, source: &str, _context: &RenderContext) -> DocfillResult<String> {
		Ok(source.to_string())
	}
}

pub fn text_value(value: &str) -> ContextValue {
	ContextValue::String(value.to_string())
}

pub fn name_context() -> RenderContext {
	RenderContext::new().with("name", text_value("Ada"))
}

pub fn zip_package(entries: &[(&str, &str)]) -> Vec<u8> {
	let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
	let options: FileOptions<'_, ()> = FileOptions::default();

	for (name, content) in entries {
		writer.start_file(*name, options).unwrap();
		writer.write_all(content.as_bytes()).unwrap();
	}

	writer.finish().unwrap().into_inner()
}

pub fn zip_entry(bytes: &[u8], name: &str) -> String {
	let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
	let mut entry = archive.by_name(name).unwrap();
	let mut content = String::new();
	entry.read_to_string(&mut content).unwrap();
	content
}

/// A word paragraph with one plain run per fragment.
pub fn w_p(runs: &[&str]) -> String {
	let runs: String = runs
		.iter()
		.map(|text| format!(r#"<w:r><w:t xml:space="preserve">{text}</w:t></w:r>"#))
		.collect();
	format!("<w:p>{runs}</w:p>")
}

pub fn w_table(cells: &[&str]) -> String {
	let cells: String = cells
		.iter()
		.map(|text| format!("<w:tc>{}</w:tc>", w_p(&[*text])))
		.collect();
	format!("<w:tbl><w:tr>{cells}</w:tr></w:tbl>")
}

/// A body paragraph anchoring a text box that holds `paragraphs`.
pub fn w_text_box(anchor: &str, paragraphs: &[&str]) -> String {
	let inner: String = paragraphs.iter().map(|text| w_p(&[*text])).collect();
	format!(
		r#"<w:p><w:r><w:t>{anchor}</w:t><w:pict><v:shape><v:textbox><w:txbxContent>{inner}</w:txbxContent></v:textbox></v:shape></w:pict></w:r></w:p>"#
	)
}

pub fn docx_package(body: &str) -> Vec<u8> {
	let document = format!(
		r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="{W_NS}" xmlns:v="{V_NS}"><w:body>{body}<w:sectPr/></w:body></w:document>"#
	);

	zip_package(&[
		("[Content_Types].xml", CONTENT_TYPES),
		("word/document.xml", &document),
		("word/styles.xml", STYLES),
	])
}

/// A slide shape with a text frame. Each inner slice is one paragraph.
pub fn a_sp(paragraphs: &[&[&str]]) -> String {
	let paragraphs: String = paragraphs.iter().map(|runs| a_p(runs)).collect();
	format!("<p:sp><p:nvSpPr/><p:txBody><a:bodyPr/>{paragraphs}</p:txBody></p:sp>")
}

pub fn a_p(runs: &[&str]) -> String {
	let runs: String = runs
		.iter()
		.map(|text| format!(r#"<a:r><a:rPr lang="en-US"/><a:t>{text}</a:t></a:r>"#))
		.collect();
	format!("<a:p>{runs}<a:endParaRPr/></a:p>")
}

pub fn a_table(cells: &[&str]) -> String {
	let cells: String = cells
		.iter()
		.map(|text| format!("<a:tc><a:txBody><a:bodyPr/>{}</a:txBody></a:tc>", a_p(&[*text])))
		.collect();
	format!(
		"<p:graphicFrame><a:graphic><a:graphicData><a:tbl><a:tr>{cells}</a:tr></a:tbl></a:graphicData></a:graphic></p:graphicFrame>"
	)
}

pub fn a_group(shapes: &[String]) -> String {
	format!("<p:grpSp><p:nvGrpSpPr/>{}</p:grpSp>", shapes.concat())
}

/// A presentation holding the given `(slide number, shapes)` parts.
pub fn pptx_package(slides: &[(u32, String)]) -> Vec<u8> {
	let presentation = format!(r#"<p:presentation xmlns:p="{P_NS}"/>"#);
	let parts: Vec<(String, String)> = slides
		.iter()
		.map(|(number, shapes)| {
			(
				format!("ppt/slides/slide{number}.xml"),
				format!(
					r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><p:sld xmlns:a="{A_NS}" xmlns:p="{P_NS}"><p:cSld><p:spTree><p:nvGrpSpPr/>{shapes}</p:spTree></p:cSld></p:sld>"#
				),
			)
		})
		.collect();

	let mut entries = vec![
		("[Content_Types].xml", CONTENT_TYPES),
		("ppt/presentation.xml", presentation.as_str()),
	];
	entries.extend(parts.iter().map(|(name, xml)| (name.as_str(), xml.as_str())));
	zip_package(&entries)
}

pub fn package_texts(bytes: &[u8], format: TemplateFormat) -> Vec<String> {
	let package = TemplatePackage::read(bytes, format).unwrap();
	texts(package.document())
}

/// Wraps a [`MemorySource`], counting downloads and slowing them down so
/// concurrent callers overlap.
#[derive(Debug, Default)]
pub struct CountingSource {
	pub inner: MemorySource,
	pub fetches: AtomicUsize,
	pub delay: Duration,
}

impl CountingSource {
	pub fn new(delay: Duration) -> Self {
		Self {
			delay,
			..Self::default()
		}
	}

	pub fn fetches(&self) -> usize {
		self.fetches.load(Ordering::SeqCst)
	}
}

impl TemplateSource for CountingSource {
	fn fetch_metadata(&self, key: &str) -> DocfillResult<Generation> {
		self.inner.fetch_metadata(key)
	}

	fn fetch(&self, key: &str) -> DocfillResult<(Vec<u8>, Generation)> {
		self.fetches.fetch_add(1, Ordering::SeqCst);
		std::thread::sleep(self.delay);
		self.inner.fetch(key)
	}
}

/// Reports a stable generation but fails every download.
#[derive(Debug, Default)]
pub struct FailingSource {
	pub fetches: AtomicUsize,
	pub delay: Duration,
}

impl TemplateSource for FailingSource {
	fn fetch_metadata(&self, _key: &str) -> DocfillResult<Generation> {
		Ok(Generation::from("1"))
	}

	fn fetch(&self, key: &str) -> DocfillResult<(Vec<u8>, Generation)> {
		self.fetches.fetch_add(1, Ordering::SeqCst);
		std::thread::sleep(self.delay);
		Err(DocfillError::Fetch {
			key: key.to_string(),
			reason: "connection reset".to_string(),
		})
	}
}

/// Reports generation `1`, but the template is replaced while it downloads so
/// every fetch returns generation `2`.
#[derive(Debug, Default)]
pub struct ReplacedSource {
	pub fetches: AtomicUsize,
	pub delay: Duration,
}

impl ReplacedSource {
	pub fn fetches(&self) -> usize {
		self.fetches.load(Ordering::SeqCst)
	}
}

impl TemplateSource for ReplacedSource {
	fn fetch_metadata(&self, _key: &str) -> DocfillResult<Generation> {
		Ok(Generation::from("1"))
	}

	fn fetch(&self, _key: &str) -> DocfillResult<(Vec<u8>, Generation)> {
		self.fetches.fetch_add(1, Ordering::SeqCst);
		std::thread::sleep(self.delay);
		Ok((b"replaced".to_vec(), Generation::from("2")))
	}
}
