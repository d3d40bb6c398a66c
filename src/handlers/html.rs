//! HTML page generation with asset injection

use super::{OptionKind, OptionSpec, StepHandler, StepInput, StepOptions};
use crate::core::error::StepError;
use crate::core::resource::Artifact;
use async_trait::async_trait;

const OPTIONS: &[OptionSpec] = &[
    OptionSpec::new("template", OptionKind::String, "Template file, relative to the project root"),
    OptionSpec::new("title", OptionKind::String, "Replaces {{ title }} in the template"),
    OptionSpec::new("inject", OptionKind::Bool, "Inject emitted css/js tags (default: true)"),
];

const DEFAULT_TEMPLATE: &str = "<!DOCTYPE html>
<html>
<head>
<meta charset=\"utf-8\">
<title>{{ title }}</title>
</head>
<body>
</body>
</html>
";

/// Produce `index.html` from a template, linking emitted stylesheets and scripts
pub struct HtmlHandler;

#[async_trait]
impl StepHandler for HtmlHandler {
    fn name(&self) -> &str {
        "html"
    }

    fn options(&self) -> &[OptionSpec] {
        OPTIONS
    }

    async fn execute(&self, input: StepInput<'_>, options: &StepOptions) -> Result<Artifact, StepError> {
        let template = if input.artifact.contents.is_empty() {
            DEFAULT_TEMPLATE.to_string()
        } else {
            input.artifact.text()?.to_string()
        };

        let title = options.get_str("title").unwrap_or("");
        let mut page = template.replace("{{ title }}", title);

        if options.get_bool("inject").unwrap_or(true) {
            let mut styles = String::new();
            let mut scripts = String::new();
            for asset in input.emitted {
                if asset.path.ends_with(".css") {
                    styles.push_str(&format!("<link rel=\"stylesheet\" href=\"{}\">\n", asset.path));
                } else if asset.path.ends_with(".js") {
                    scripts.push_str(&format!("<script defer src=\"{}\"></script>\n", asset.path));
                }
            }
            page = insert_before(&page, "</head>", &styles);
            page = insert_before(&page, "</body>", &scripts);
        }

        let mut artifact = Artifact::new("index.html", page);
        artifact.filename_template = Some("index.html".to_string());
        Ok(artifact)
    }
}

/// Insert `snippet` before the last occurrence of `tag`, or append when absent
fn insert_before(page: &str, tag: &str, snippet: &str) -> String {
    if snippet.is_empty() {
        return page.to_string();
    }
    match page.rfind(tag) {
        Some(idx) => format!("{}{}{}", &page[..idx], snippet, &page[idx..]),
        None => format!("{}{}", page, snippet),
    }
}
