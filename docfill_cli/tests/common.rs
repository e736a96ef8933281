#![allow(dead_code)]

use std::io::Cursor;
use std::io::Read;
use std::io::Write;
use std::path::Path;

use assert_cmd::Command;
use docfill_core::AnyEmptyResult;
use docfill_core::AnyResult;
use insta_cmd::get_cargo_bin;
use zip::ZipArchive;
use zip::ZipWriter;
use zip::write::FileOptions;

pub const CERTIFICATE_CONFIG: &str = r#"
[template]
path = "templates/certificate.docx"

[[columns]]
name = "Name"
type = "string"

[[columns]]
name = "Premium"
type = "boolean"

[[columns]]
name = "Score"
type = "number"

[variables]
name = "Name"
premium = "Premium"
score = "Score"

[output]
file_name = "certificate-{id}"
"#;

pub fn docfill_cmd() -> Command {
	let mut cmd = Command::new(get_cargo_bin("docfill"));
	cmd.env("NO_COLOR", "1");
	cmd.env_remove("RUST_LOG");
	cmd
}

/// A minimal word package. Each inner slice is one paragraph made of runs.
pub fn docx(paragraphs: &[&[&str]]) -> AnyResult<Vec<u8>> {
	let body: String = paragraphs
		.iter()
		.map(|runs| {
			let runs: String = runs
				.iter()
				.map(|text| format!(r#"<w:r><w:t xml:space="preserve">{text}</w:t></w:r>"#))
				.collect();
			format!("<w:p>{runs}</w:p>")
		})
		.collect();
	let document = format!(
		r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}<w:sectPr/></w:body></w:document>"#
	);

	let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
	let options: FileOptions<'_, ()> = FileOptions::default();
	writer.start_file("[Content_Types].xml", options)?;
	writer.write_all(
		br#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#,
	)?;
	writer.start_file("word/document.xml", options)?;
	writer.write_all(document.as_bytes())?;

	Ok(writer.finish()?.into_inner())
}

pub fn certificate_template() -> AnyResult<Vec<u8>> {
	docx(&[
		&["Certificate for ", "{{ na", "me }}"],
		&["{% if premium %}"],
		&["Premium member"],
		&["{% endif %}"],
		&["Score: {{ score }}"],
	])
}

/// Write a config, template and rows file into `root`.
pub fn write_project(root: &Path, config: &str, rows: &str) -> AnyEmptyResult {
	std::fs::create_dir_all(root.join("templates"))?;
	std::fs::write(root.join("docfill.toml"), config)?;
	std::fs::write(
		root.join("templates/certificate.docx"),
		certificate_template()?,
	)?;
	std::fs::write(root.join("rows.json"), rows)?;

	Ok(())
}

/// The `word/document.xml` part of a rendered word package.
pub fn document_xml(path: &Path) -> AnyResult<String> {
	let bytes = std::fs::read(path)?;
	let mut archive = ZipArchive::new(Cursor::new(bytes))?;
	let mut entry = archive.by_name("word/document.xml")?;
	let mut xml = String::new();
	entry.read_to_string(&mut xml)?;

	Ok(xml)
}
