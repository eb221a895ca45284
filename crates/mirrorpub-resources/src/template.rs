//! Dynamic pages rendered by literal placeholder substitution

use crate::source::ResourceSource;
use mirrorpub_core::error::{PublishError, Result};
use mirrorpub_core::types::TemplateConfig;
use regex::{NoExpand, Regex};
use std::collections::HashMap;
use std::sync::Arc;

/// Renders template resources into static page bytes.
#[derive(Debug, Clone)]
pub struct TemplateRenderer {
    source: Arc<ResourceSource>,
}

impl TemplateRenderer {
    pub fn new(source: Arc<ResourceSource>) -> Self {
        Self { source }
    }

    /// Loads `template_path` as UTF-8 text and replaces every occurrence of
    /// each placeholder with its replacement.
    pub fn render(
        &self,
        template_path: &str,
        replacements: &HashMap<String, String>,
    ) -> Result<Vec<u8>> {
        let bytes = self.source.read(template_path)?;
        let template = String::from_utf8(bytes).map_err(|e| PublishError::InvalidTemplate {
            path: template_path.to_string(),
            reason: e.to_string(),
        })?;

        let rendered = substitute(
            &template,
            replacements
                .iter()
                .map(|(placeholder, replacement)| (placeholder.as_str(), replacement.as_str())),
        )?;

        tracing::trace!(
            template = template_path,
            replacements = replacements.len(),
            "Rendered template"
        );

        Ok(rendered.into_bytes())
    }

    /// Renders the template page described by `config`.
    pub fn render_config(&self, config: &TemplateConfig) -> Result<Vec<u8>> {
        self.render(config.resource_path(), config.replacements())
    }
}

/// Applies placeholder/replacement pairs to `template`.
///
/// Placeholders match literally; regex metacharacters in them are escaped
/// and `$` in replacements is not expanded.
pub fn substitute<'a, I>(template: &str, replacements: I) -> Result<String>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut text = template.to_string();

    for (placeholder, replacement) in replacements {
        if placeholder.is_empty() {
            return Err(PublishError::precondition("placeholder must not be empty"));
        }
        let pattern = Regex::new(&regex::escape(placeholder)).map_err(|e| {
            PublishError::precondition(format!("placeholder '{}' rejected: {}", placeholder, e))
        })?;
        text = pattern.replace_all(&text, NoExpand(replacement)).into_owned();
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn renderer_with(files: &[(&str, &str)]) -> (TempDir, TemplateRenderer) {
        let temp = TempDir::new().unwrap();
        for (name, content) in files {
            let path = temp.path().join(name);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        let source = Arc::new(ResourceSource::directory(temp.path()));
        (temp, TemplateRenderer::new(source))
    }

    #[test]
    fn test_render_replaces_every_occurrence() {
        let (_temp, renderer) = renderer_with(&[(
            "views/quote.template",
            "<p>{QUOTE}</p><p>{QUOTE}</p><i>{AUTHOR}</i>",
        )]);

        let mut replacements = HashMap::new();
        replacements.insert("{QUOTE}".to_string(), "Stay hungry".to_string());
        replacements.insert("{AUTHOR}".to_string(), "Unknown".to_string());

        let page = renderer.render("views/quote.template", &replacements).unwrap();
        assert_eq!(
            String::from_utf8(page).unwrap(),
            "<p>Stay hungry</p><p>Stay hungry</p><i>Unknown</i>"
        );
    }

    #[test]
    fn test_metacharacters_match_literally() {
        let text = substitute("a.b a+b (x) $1", [("a.b", "dot"), ("(x)", "paren")]).unwrap();
        assert_eq!(text, "dot a+b paren $1");

        let text = substitute("total: [PRICE]", [("[PRICE]", "$5 and ${name}")]).unwrap();
        assert_eq!(text, "total: $5 and ${name}");
    }

    #[test]
    fn test_disjoint_placeholders_are_order_insensitive() {
        let template = "{A}-{B}-{C}-{A}";
        let pairs = [("{A}", "alpha"), ("{B}", "beta"), ("{C}", "gamma")];

        let forward = substitute(template, pairs).unwrap();
        let mut reversed = pairs;
        reversed.reverse();
        let backward = substitute(template, reversed).unwrap();

        assert_eq!(forward, backward);
        assert_eq!(forward, "alpha-beta-gamma-alpha");
    }

    #[test]
    fn test_no_placeholder_left_after_render() {
        let text = substitute("{USERNAME}, hello {USERNAME}!", [("{USERNAME}", "Ada")]).unwrap();
        assert!(!text.contains("{USERNAME}"));
    }

    #[test]
    fn test_empty_placeholder_rejected() {
        assert!(matches!(
            substitute("abc", [("", "x")]),
            Err(PublishError::PreconditionViolation(_))
        ));
    }

    #[test]
    fn test_missing_template() {
        let (_temp, renderer) = renderer_with(&[]);
        let result = renderer.render("views/missing.template", &HashMap::new());
        assert!(matches!(result, Err(PublishError::NotFound { .. })));
    }

    #[test]
    fn test_invalid_utf8_template() {
        let (temp, renderer) = renderer_with(&[]);
        std::fs::create_dir_all(temp.path().join("views")).unwrap();
        std::fs::write(temp.path().join("views/bad.template"), [0xffu8, 0xfe, 0x00]).unwrap();
        let result = renderer.render("views/bad.template", &HashMap::new());
        assert!(matches!(result, Err(PublishError::InvalidTemplate { .. })));
    }

    #[test]
    fn test_render_config() {
        let (_temp, renderer) = renderer_with(&[("views/welcome.template", "Hi {USERNAME}")]);
        let mut config = TemplateConfig::new("views/welcome.template", "welcome.html").unwrap();
        config.put_replacement("{USERNAME}", "Grace").unwrap();

        let page = renderer.render_config(&config).unwrap();
        assert_eq!(page, b"Hi Grace");
    }
}
