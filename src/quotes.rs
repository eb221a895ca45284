//! Quote of the day page

use anyhow::{bail, Context, Result};
use mirrorpub_core::config::QuotesConfig;
use mirrorpub_core::types::TemplateConfig;
use mirrorpub_publisher::TemplateProvider;
use rand::Rng;
use tracing::{debug, warn};

const QUOTE_PLACEHOLDER: &str = "{QUOTE}";
const AUTHOR_PLACEHOLDER: &str = "{AUTHOR}";
const UNKNOWN_AUTHOR: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quote {
    pub text: String,
    pub author: String,
}

/// Parses `author;quote` lines. An empty author becomes "Unknown"; blank
/// and malformed lines are skipped.
pub fn parse_quotes(content: &str) -> Vec<Quote> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(index, line)| match line.split_once(';') {
            Some((author, text)) => Some(Quote {
                text: text.to_string(),
                author: if author.is_empty() {
                    UNKNOWN_AUTHOR.to_string()
                } else {
                    author.to_string()
                },
            }),
            None => {
                warn!(line = index + 1, "Skipping quote line without ';'");
                None
            }
        })
        .collect()
}

/// Fills the quote template with a randomly picked quote on every refresh.
#[derive(Debug, Clone)]
pub struct QuoteProvider {
    quotes: Vec<Quote>,
    template: String,
    target_path: String,
    view_id: Option<String>,
}

impl QuoteProvider {
    pub fn new(
        quotes: Vec<Quote>,
        template: impl Into<String>,
        target_path: impl Into<String>,
        view_id: Option<String>,
    ) -> Result<Self> {
        if quotes.is_empty() {
            bail!("no quotes available");
        }
        Ok(Self {
            quotes,
            template: template.into(),
            target_path: target_path.into(),
            view_id,
        })
    }

    pub fn from_config(config: &QuotesConfig) -> Result<Self> {
        let content = std::fs::read_to_string(&config.file)
            .with_context(|| format!("Failed to read quotes file: {:?}", config.file))?;
        let quotes = parse_quotes(&content);
        debug!(count = quotes.len(), file = ?config.file, "Loaded quotes");

        Self::new(
            quotes,
            config.template.clone(),
            config.target_path.clone(),
            config.view_id.clone(),
        )
        .with_context(|| format!("Quotes file {:?} holds no quotes", config.file))
    }

    fn page_for(&self, quote: &Quote) -> mirrorpub_core::Result<TemplateConfig> {
        let mut page = TemplateConfig::new(self.template.as_str(), self.target_path.as_str())?;
        if let Some(view_id) = &self.view_id {
            page = page.with_view_id(view_id.as_str());
        }
        page.put_replacement(QUOTE_PLACEHOLDER, quote.text.as_str())?;
        page.put_replacement(AUTHOR_PLACEHOLDER, quote.author.as_str())?;
        Ok(page)
    }
}

impl TemplateProvider for QuoteProvider {
    fn templates(&self) -> mirrorpub_core::Result<Vec<TemplateConfig>> {
        let index = rand::thread_rng().gen_range(0..self.quotes.len());
        let quote = &self.quotes[index];
        debug!(author = %quote.author, "Picked quote of the day");
        Ok(vec![self.page_for(quote)?])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_quotes() {
        let quotes = parse_quotes(
            "Antoine de Saint-Exupery;Perfection is achieved when there is nothing left to take away.\r\n\
             ;Simplicity is prerequisite for reliability.\n\
             \n\
             no separator here\n\
             Ada;a;b\n",
        );

        assert_eq!(quotes.len(), 3);
        assert_eq!(quotes[0].author, "Antoine de Saint-Exupery");
        assert_eq!(
            quotes[0].text,
            "Perfection is achieved when there is nothing left to take away."
        );
        assert_eq!(quotes[1].author, "Unknown");
        assert_eq!(quotes[2].text, "a;b");
    }

    #[test]
    fn test_provider_fills_placeholders() {
        let provider = QuoteProvider::new(
            vec![Quote {
                text: "Less is more".to_string(),
                author: "Mies".to_string(),
            }],
            "views/quote.template",
            "quote.html",
            Some("QuoteView".to_string()),
        )
        .unwrap();

        let pages = provider.templates().unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].target_path(), "quote.html");
        assert_eq!(pages[0].view_id(), Some("QuoteView"));
        assert_eq!(pages[0].replacements()["{QUOTE}"], "Less is more");
        assert_eq!(pages[0].replacements()["{AUTHOR}"], "Mies");
    }

    #[test]
    fn test_empty_quotes_rejected() {
        assert!(QuoteProvider::new(Vec::new(), "t", "q.html", None).is_err());
    }

    #[test]
    fn test_from_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, ";Stay curious.").unwrap();

        let config = QuotesConfig {
            file: file.path().to_path_buf(),
            template: "views/quote.template".to_string(),
            target_path: "quote.html".to_string(),
            view_id: None,
        };
        let provider = QuoteProvider::from_config(&config).unwrap();
        let pages = provider.templates().unwrap();
        assert_eq!(pages[0].replacements()["{AUTHOR}"], "Unknown");
        assert_eq!(pages[0].view_id(), None);
    }
}
