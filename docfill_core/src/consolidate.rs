use crate::Paragraph;
use crate::scope::has_directive;

const OPENERS: [(&str, &str); 2] = [("{{", "}}"), ("{%", "%}")];

/// Merge runs of one paragraph so that a directive split by formatting
/// boundaries ends up inside a single run.
///
/// A run holding an opening delimiter whose closing delimiter is not in the
/// same run absorbs the text of the following runs (which are left empty)
/// until the directive is closed or the paragraph runs out. An unterminated
/// directive is left as is for the evaluator to report.
///
/// Returns the number of runs that were absorbed.
pub fn consolidate_runs(paragraph: &mut Paragraph) -> usize {
	if !has_directive(&paragraph.text()) {
		return 0;
	}

	let runs = &mut paragraph.runs;
	let mut absorbed = 0;
	let mut index = 0;

	while index < runs.len() {
		let mut next = index + 1;

		while next < runs.len() && pending_closer(&runs[index].text).is_some() {
			let text = std::mem::take(&mut runs[next].text);
			runs[index].text.push_str(&text);
			absorbed += 1;
			next += 1;
		}

		index = next;
	}

	absorbed
}

/// The closing delimiter still missing from `text`, judged by its last
/// opening delimiter.
pub(crate) fn pending_closer(text: &str) -> Option<&'static str> {
	let (position, closer) = OPENERS
		.iter()
		.filter_map(|(opener, closer)| text.rfind(opener).map(|position| (position, *closer)))
		.max_by_key(|(position, _)| *position)?;

	if text[position + 2..].contains(closer) {
		None
	} else {
		Some(closer)
	}
}
