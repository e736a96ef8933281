mod common;

use docfill_core::AnyEmptyResult;
use predicates::prelude::*;
use serde_json::Value;

const ROWS: &str = r#"[
	{ "id": "1", "data": { "Name": "Ada", "Premium": true, "Score": 92 } },
	{ "id": "2", "data": { "Name": "Grace", "Premium": "false", "Score": "71" } }
]"#;

#[test]
fn render_writes_one_document_per_row() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_project(tmp.path(), common::CERTIFICATE_CONFIG, ROWS)?;

	common::docfill_cmd()
		.arg("render")
		.arg("--rows")
		.arg(tmp.path().join("rows.json"))
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("✓ row 1 → out/certificate-1.docx"))
		.stdout(predicates::str::contains("✓ row 2 → out/certificate-2.docx"))
		.stdout(predicates::str::contains("Rendered 2 of 2 row(s)."));

	let first = common::document_xml(&tmp.path().join("out/certificate-1.docx"))?;
	assert!(first.contains("Certificate for Ada"));
	assert!(first.contains("Premium member"));
	assert!(!first.contains("{%"));

	let second = common::document_xml(&tmp.path().join("out/certificate-2.docx"))?;
	assert!(second.contains("Certificate for Grace"));
	assert!(!second.contains("Premium member"));

	Ok(())
}

#[test]
fn render_reports_failed_rows_and_continues() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let rows = r#"[
		{ "id": "good", "data": { "Name": "Ada", "Score": 1 } },
		{ "id": "bad", "data": { "Name": "Bob", "Score": "many" } }
	]"#;
	common::write_project(tmp.path(), common::CERTIFICATE_CONFIG, rows)?;

	common::docfill_cmd()
		.arg("render")
		.arg("--rows")
		.arg(tmp.path().join("rows.json"))
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.code(1)
		.stdout(predicates::str::contains("✓ row good"))
		.stdout(predicates::str::contains(
			"✗ row bad: cannot coerce `many` in column `Score` to number",
		))
		.stdout(predicates::str::contains("Rendered 1 of 2 row(s)."));

	assert!(tmp.path().join("out/certificate-good.docx").exists());
	assert!(!tmp.path().join("out/certificate-bad.docx").exists());

	Ok(())
}

#[test]
fn render_json_output() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_project(tmp.path(), common::CERTIFICATE_CONFIG, ROWS)?;

	let output = common::docfill_cmd()
		.arg("render")
		.arg("--rows")
		.arg(tmp.path().join("rows.json"))
		.arg("--path")
		.arg(tmp.path())
		.arg("--format")
		.arg("json")
		.arg("--workers")
		.arg("1")
		.output()?;
	assert!(output.status.success());

	let json: Value = serde_json::from_slice(&output.stdout)?;
	assert_eq!(json["ok"], true);
	assert_eq!(json["rendered"], 2);
	assert_eq!(json["failed"], 0);
	assert_eq!(json["rows"][0]["row_id"], "1");
	assert_eq!(json["rows"][0]["format"], "docx");
	assert_eq!(json["rows"][0]["files"][0], "out/certificate-1.docx");
	assert_eq!(json["rows"][1]["row_id"], "2");
	assert!(json["rows"][1].get("error").is_none());

	Ok(())
}

#[test]
fn render_reports_block_warnings() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_project(tmp.path(), common::CERTIFICATE_CONFIG, ROWS)?;
	std::fs::write(
		tmp.path().join("templates/certificate.docx"),
		common::docx(&[&["Dear {{ name }}"], &["{{ name + }}"]])?,
	)?;

	common::docfill_cmd()
		.arg("render")
		.arg("--rows")
		.arg(tmp.path().join("rows.json"))
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("warning:"));

	let first = common::document_xml(&tmp.path().join("out/certificate-1.docx"))?;
	assert!(first.contains("Dear Ada"));
	assert!(first.contains("{{ name + }}"));

	Ok(())
}

#[test]
fn render_without_config_fails() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	std::fs::write(tmp.path().join("rows.json"), "[]")?;

	common::docfill_cmd()
		.arg("render")
		.arg("--rows")
		.arg(tmp.path().join("rows.json"))
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.code(2)
		.stderr(predicates::str::contains("no config file found"));

	Ok(())
}

#[test]
fn render_with_missing_template_fails_every_row() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_project(tmp.path(), common::CERTIFICATE_CONFIG, ROWS)?;
	std::fs::remove_file(tmp.path().join("templates/certificate.docx"))?;

	common::docfill_cmd()
		.arg("render")
		.arg("--rows")
		.arg(tmp.path().join("rows.json"))
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.code(1)
		.stdout(predicates::str::contains("failed to fetch template"))
		.stdout(predicates::str::contains("Rendered 0 of 2 row(s)."));

	Ok(())
}

#[test]
fn render_applies_liquid_filters() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_project(tmp.path(), common::CERTIFICATE_CONFIG, ROWS)?;
	std::fs::write(
		tmp.path().join("templates/certificate.docx"),
		common::docx(&[
			&["{{ name | upcase | append: \"!\" }}"],
			&["{% unless premium %}"],
			&["Standard member"],
			&["{% endunless %}"],
		])?,
	)?;

	common::docfill_cmd()
		.arg("render")
		.arg("--rows")
		.arg(tmp.path().join("rows.json"))
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success()
		.stdout(predicates::str::contains("warning:").not());

	let first = common::document_xml(&tmp.path().join("out/certificate-1.docx"))?;
	assert!(first.contains("ADA!"));
	assert!(!first.contains("Standard member"));
	let second = common::document_xml(&tmp.path().join("out/certificate-2.docx"))?;
	assert!(second.contains("GRACE!"));
	assert!(second.contains("Standard member"));

	Ok(())
}

#[test]
fn render_with_jinja_engine() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let config = common::CERTIFICATE_CONFIG.replace(
		"path = \"templates/certificate.docx\"",
		"path = \"templates/certificate.docx\"\nengine = \"jinja\"",
	);
	common::write_project(tmp.path(), &config, ROWS)?;
	std::fs::write(
		tmp.path().join("templates/certificate.docx"),
		common::docx(&[&["{{ name | upper }}"]])?,
	)?;

	common::docfill_cmd()
		.arg("render")
		.arg("--rows")
		.arg(tmp.path().join("rows.json"))
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success();

	let first = common::document_xml(&tmp.path().join("out/certificate-1.docx"))?;
	assert!(first.contains("ADA"));

	Ok(())
}

#[test]
fn render_rejects_absolute_template_path() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	let template = tmp.path().join("templates/certificate.docx");
	let config = common::CERTIFICATE_CONFIG.replace(
		"templates/certificate.docx",
		&template.to_string_lossy().replace('\\', "/"),
	);
	common::write_project(tmp.path(), &config, ROWS)?;

	common::docfill_cmd()
		.arg("render")
		.arg("--rows")
		.arg(tmp.path().join("rows.json"))
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.code(2)
		.stderr(predicates::str::contains(
			"must be a relative path inside the project root",
		));

	assert!(!tmp.path().join("out").exists());

	Ok(())
}

#[test]
fn render_resolves_dot_config_docfill_toml() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_project(tmp.path(), common::CERTIFICATE_CONFIG, ROWS)?;
	std::fs::create_dir_all(tmp.path().join(".config"))?;
	std::fs::rename(
		tmp.path().join("docfill.toml"),
		tmp.path().join(".config/docfill.toml"),
	)?;

	common::docfill_cmd()
		.arg("render")
		.arg("--rows")
		.arg(tmp.path().join("rows.json"))
		.arg("--path")
		.arg(tmp.path())
		.assert()
		.success();

	assert!(tmp.path().join("out/certificate-1.docx").exists());

	Ok(())
}

#[test]
fn failed_pdf_conversion_fails_the_row() -> AnyEmptyResult {
	let tmp = tempfile::tempdir()?;
	common::write_project(tmp.path(), common::CERTIFICATE_CONFIG, ROWS)?;

	common::docfill_cmd()
		.env("SOFFICE_PATH", tmp.path().join("missing-soffice"))
		.arg("render")
		.arg("--rows")
		.arg(tmp.path().join("rows.json"))
		.arg("--path")
		.arg(tmp.path())
		.arg("--pdf")
		.assert()
		.code(1)
		.stdout(predicates::str::contains("pdf conversion failed"))
		.stdout(predicates::str::contains("Rendered 0 of 2 row(s)."));

	assert!(tmp.path().join("out/certificate-1.docx").exists());
	assert!(!tmp.path().join("out/certificate-1.pdf").exists());

	Ok(())
}

#[test]
fn no_subcommand_prints_usage_hint() -> AnyEmptyResult {
	common::docfill_cmd()
		.assert()
		.code(1)
		.stderr(predicates::str::contains("No subcommand specified"))
		.stdout(predicates::str::is_empty());

	Ok(())
}
