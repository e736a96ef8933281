use std::sync::LazyLock;

use regex::Regex;

/// Control tags that open a block which must be closed later.
pub const BLOCK_OPEN_TAGS: [&str; 8] = [
	"if", "unless", "case", "for", "tablerow", "capture", "form", "paginate",
];

/// Control tags that close a block opened by one of [`BLOCK_OPEN_TAGS`].
pub const BLOCK_CLOSE_TAGS: [&str; 8] = [
	"endif",
	"endunless",
	"endcase",
	"endfor",
	"endtablerow",
	"endcapture",
	"endform",
	"endpaginate",
];

static TAG_NAME: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{%-?\s*(\w+)").unwrap());

/// How a control tag affects nesting depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
	Open,
	Close,
	Inert,
}

impl TagKind {
	pub fn of(name: &str) -> Self {
		if BLOCK_OPEN_TAGS.contains(&name) {
			Self::Open
		} else if BLOCK_CLOSE_TAGS.contains(&name) {
			Self::Close
		} else {
			Self::Inert
		}
	}

	fn weight(self) -> i32 {
		match self {
			Self::Open => 1,
			Self::Close => -1,
			Self::Inert => 0,
		}
	}
}

/// Names of every control tag in `text`, in order of appearance.
pub fn tag_names(text: &str) -> impl Iterator<Item = &str> {
	TAG_NAME
		.captures_iter(text)
		.filter_map(|captures| captures.get(1))
		.map(|name| name.as_str())
}

/// Net change in block nesting caused by the control tags in `text`. Only the
/// depth is tracked; tags are never paired by name.
pub fn delta(text: &str) -> i32 {
	tag_names(text).map(|name| TagKind::of(name).weight()).sum()
}

/// Whether `text` holds anything the evaluator would act on.
pub fn has_directive(text: &str) -> bool {
	text.contains("{{") || text.contains("{%")
}
