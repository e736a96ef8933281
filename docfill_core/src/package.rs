use std::fmt;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use zip::CompressionMethod;
use zip::ZipArchive;
use zip::ZipWriter;
use zip::write::FileOptions;

use crate::DocfillError;
use crate::DocfillResult;
use crate::Document;
use crate::Presentation;
use crate::slides;
use crate::word;
use crate::xml::XmlPart;

/// The document formats templates can be stored in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum TemplateFormat {
	Docx,
	Pptx,
}

impl TemplateFormat {
	pub const DOCX_MIME_TYPE: &str =
		"application/vnd.openxmlformats-officedocument.wordprocessingml.document";
	pub const GOOGLE_DOCS_MIME_TYPE: &str = "application/vnd.google-apps.document";
	pub const GOOGLE_SLIDES_MIME_TYPE: &str = "application/vnd.google-apps.presentation";
	pub const PPTX_MIME_TYPE: &str =
		"application/vnd.openxmlformats-officedocument.presentationml.presentation";

	/// Resolve a MIME type. Native cloud document types map to the office
	/// format they are exported as.
	pub fn from_mime_type(mime_type: &str) -> Option<Self> {
		match mime_type {
			Self::DOCX_MIME_TYPE | Self::GOOGLE_DOCS_MIME_TYPE => Some(Self::Docx),
			Self::PPTX_MIME_TYPE | Self::GOOGLE_SLIDES_MIME_TYPE => Some(Self::Pptx),
			_ => None,
		}
	}

	pub fn from_path(path: &Path) -> Option<Self> {
		let extension = path.extension()?.to_str()?.to_ascii_lowercase();
		match extension.as_str() {
			"docx" => Some(Self::Docx),
			"pptx" => Some(Self::Pptx),
			_ => None,
		}
	}

	/// Identify a package by the parts it contains.
	pub fn detect(bytes: &[u8]) -> DocfillResult<Self> {
		let archive = ZipArchive::new(Cursor::new(bytes)).map_err(package_error)?;
		if archive.file_names().any(|name| name == word::DOCUMENT_PART) {
			return Ok(Self::Docx);
		}
		if archive.file_names().any(|name| name == "ppt/presentation.xml") {
			return Ok(Self::Pptx);
		}

		Err(DocfillError::UnsupportedFormat(
			"package is neither a word document nor a presentation".to_string(),
		))
	}

	pub fn extension(self) -> &'static str {
		match self {
			Self::Docx => "docx",
			Self::Pptx => "pptx",
		}
	}

	pub fn mime_type(self) -> &'static str {
		match self {
			Self::Docx => Self::DOCX_MIME_TYPE,
			Self::Pptx => Self::PPTX_MIME_TYPE,
		}
	}
}

impl fmt::Display for TemplateFormat {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.extension())
	}
}

impl FromStr for TemplateFormat {
	type Err = DocfillError;

	fn from_str(value: &str) -> Result<Self, Self::Err> {
		match value.trim().to_ascii_lowercase().as_str() {
			"docx" => Ok(Self::Docx),
			"pptx" => Ok(Self::Pptx),
			other => {
				Self::from_mime_type(other)
					.ok_or_else(|| DocfillError::UnsupportedFormat(value.to_string()))
			}
		}
	}
}

impl TryFrom<String> for TemplateFormat {
	type Error = DocfillError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}

/// An opened document package: the text-bearing XML parts, parsed, and the
/// [`Document`] read from them. Everything else in the archive is copied
/// through unchanged when the package is written.
#[derive(Debug)]
pub struct TemplatePackage<'a> {
	format: TemplateFormat,
	source: &'a [u8],
	parts: Vec<XmlPart>,
	document: Document,
}

impl<'a> TemplatePackage<'a> {
	pub fn read(source: &'a [u8], format: TemplateFormat) -> DocfillResult<Self> {
		let mut archive = ZipArchive::new(Cursor::new(source)).map_err(package_error)?;

		let (parts, document) = match format {
			TemplateFormat::Docx => {
				let part = read_part(&mut archive, word::DOCUMENT_PART)?;
				let document = word::read(&part)?;
				(vec![part], Document::Word(document))
			}
			TemplateFormat::Pptx => {
				let mut names: Vec<(u32, String)> = archive
					.file_names()
					.filter_map(|name| {
						slides::slide_number(name).map(|number| (number, name.to_string()))
					})
					.collect();
				names.sort();

				let parts = names
					.iter()
					.map(|(_, name)| read_part(&mut archive, name))
					.collect::<DocfillResult<Vec<_>>>()?;
				let slides = parts.iter().map(slides::read).collect::<DocfillResult<Vec<_>>>()?;
				(parts, Document::Slides(Presentation { slides }))
			}
		};

		tracing::debug!(
			%format,
			parts = parts.len(),
			paragraphs = document.paragraph_count(),
			"opened template package"
		);

		Ok(Self {
			format,
			source,
			parts,
			document,
		})
	}

	pub fn format(&self) -> TemplateFormat {
		self.format
	}

	pub fn document(&self) -> &Document {
		&self.document
	}

	pub fn document_mut(&mut self) -> &mut Document {
		&mut self.document
	}

	/// Write the document text back into its XML parts and produce the new
	/// package.
	pub fn into_bytes(mut self) -> DocfillResult<Vec<u8>> {
		match &self.document {
			Document::Word(document) => {
				let part = self
					.parts
					.first_mut()
					.ok_or_else(|| DocfillError::MissingPart(word::DOCUMENT_PART.to_string()))?;
				word::write(part, document)?;
			}
			Document::Slides(presentation) => {
				if presentation.slides.len() != self.parts.len() {
					return Err(DocfillError::Package(format!(
						"presentation has {} slide(s) but the package has {}",
						presentation.slides.len(),
						self.parts.len()
					)));
				}
				for (part, slide) in self.parts.iter_mut().zip(&presentation.slides) {
					slides::write(part, slide)?;
				}
			}
		}

		let rewritten = self
			.parts
			.iter()
			.map(|part| part.to_bytes().map(|bytes| (part.name.as_str(), bytes)))
			.collect::<DocfillResult<Vec<_>>>()?;

		let mut archive = ZipArchive::new(Cursor::new(self.source)).map_err(package_error)?;
		let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
		let options: FileOptions<'_, ()> =
			FileOptions::default().compression_method(CompressionMethod::Deflated);

		for index in 0..archive.len() {
			let entry = archive.by_index_raw(index).map_err(package_error)?;
			let replacement = rewritten
				.iter()
				.find(|(name, _)| *name == entry.name())
				.map(|(_, bytes)| bytes);

			match replacement {
				Some(bytes) => {
					writer
						.start_file(entry.name(), options)
						.map_err(package_error)?;
					writer.write_all(bytes)?;
				}
				None => writer.raw_copy_file(entry).map_err(package_error)?,
			}
		}

		let cursor = writer.finish().map_err(package_error)?;
		Ok(cursor.into_inner())
	}
}

fn read_part<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> DocfillResult<XmlPart> {
	let mut entry = archive
		.by_name(name)
		.map_err(|_| DocfillError::MissingPart(name.to_string()))?;
	let mut xml = Vec::new();
	entry.read_to_end(&mut xml)?;
	XmlPart::parse(name, &xml)
}

fn package_error(error: zip::result::ZipError) -> DocfillError {
	DocfillError::Package(error.to_string())
}
