use anyhow::{Context as _, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::ElementRef;
use std::collections::HashSet;

use super::context::{build_context, Context, ContextIndex};

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// The two shapes an XBRL disclosure arrives in: tagging embedded inside
/// an HTML document (inline XBRL) or a standalone XML instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    Inline,
    Standard,
}

impl Dialect {
    pub fn from_document_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.ends_with(".htm") || lower.ends_with(".html") {
            Dialect::Inline
        } else {
            Dialect::Standard
        }
    }
}

/// A value-bearing element normalized out of either dialect: canonical
/// tag identity, context reference and extracted text, ready for alias
/// matching.
#[derive(Clone, Debug)]
pub struct TaggedElement {
    pub tag: String,
    pub context_ref: String,
    pub text: Option<String>,
    pub decimals: Option<String>,
}

/// Strips an optional namespace prefix from a tag name, accepting both
/// the colon form used in documents (`us-gaap:Revenues`) and the
/// underscore form used in alias stores (`us-gaap_Revenues`).
pub fn canonical_tag(name: &str) -> &str {
    if let Some((_, rest)) = name.split_once(':') {
        return rest;
    }
    if let Some((prefix, rest)) = name.split_once('_') {
        if !prefix.is_empty() && !rest.is_empty() {
            return rest;
        }
    }
    name
}

/// One parsed instance document: its context index plus every element
/// that carries a context reference, normalized so that alias matching
/// is a plain set-membership test regardless of dialect.
pub struct XbrlDocument {
    dialect: Dialect,
    contexts: ContextIndex,
    elements: Vec<TaggedElement>,
}

impl XbrlDocument {
    pub fn parse(content: &str, dialect: Dialect) -> Result<Self> {
        match dialect {
            Dialect::Standard => Self::parse_standard(content),
            Dialect::Inline => Ok(Self::parse_inline(content)),
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn contexts(&self) -> &ContextIndex {
        &self.contexts
    }

    /// Elements whose canonical tag is in the given set and whose context
    /// reference resolves in this document's context index. Elements with
    /// dangling context references are skipped silently; that is a
    /// document-formatting quirk, not a data error.
    pub fn matching_elements<'a>(
        &'a self,
        tags: &'a HashSet<String>,
    ) -> impl Iterator<Item = (&'a TaggedElement, &'a Context)> {
        self.elements.iter().filter_map(move |element| {
            if !tags.contains(element.tag.as_str()) {
                return None;
            }
            self.contexts
                .get(&element.context_ref)
                .map(|context| (element, context))
        })
    }

    /// Standalone XBRL is pure XML; a parse failure here is the one fatal
    /// condition of the extraction core.
    fn parse_standard(content: &str) -> Result<Self> {
        // Collapsing whitespace keeps extracted values clean.
        let normalized = WHITESPACE.replace_all(content, " ");
        let tree = roxmltree::Document::parse(&normalized)
            .context("Failed to parse XBRL instance document")?;

        let mut contexts = ContextIndex::new();
        for node in tree
            .root_element()
            .descendants()
            .filter(|n| n.has_tag_name("context"))
        {
            let id = match node.attribute("id") {
                Some(id) => id,
                None => continue,
            };
            let period = match node.descendants().find(|n| n.has_tag_name("period")) {
                Some(period) => period,
                None => continue,
            };

            let find_date = |name: &str| {
                period
                    .descendants()
                    .find(|n| n.has_tag_name(name))
                    .and_then(|n| n.text())
                    .map(|t| t.trim().to_string())
            };
            let raw = period.text().map(str::to_string);

            if let Some(context) = build_context(
                find_date("instant"),
                find_date("startDate"),
                find_date("endDate"),
                raw,
            ) {
                contexts.insert(id.to_string(), context);
            }
        }

        let mut elements = Vec::new();
        for node in tree.root_element().descendants().filter(|n| n.is_element()) {
            let context_ref = match node.attribute("contextRef") {
                Some(context_ref) => context_ref,
                None => continue,
            };

            let text = node
                .text()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .or_else(|| {
                    node.attribute("value")
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string)
                });

            elements.push(TaggedElement {
                tag: canonical_tag(node.tag_name().name()).to_string(),
                context_ref: context_ref.to_string(),
                text,
                decimals: node.attribute("decimals").map(str::to_string),
            });
        }

        Ok(Self {
            dialect: Dialect::Standard,
            contexts,
            elements,
        })
    }

    /// Inline XBRL is HTML with the tagged concept in a `name` attribute.
    /// The HTML parser recovers from malformed markup, so this never
    /// fails outright; it just finds fewer things. Element and attribute
    /// names come back lowercased from the HTML parser.
    fn parse_inline(content: &str) -> Self {
        let html = scraper::Html::parse_document(content);

        let mut contexts = ContextIndex::new();
        let mut elements = Vec::new();

        for node in html.root_element().descendants() {
            let element = match ElementRef::wrap(node) {
                Some(element) => element,
                None => continue,
            };

            if local_name(element.value().name()).eq_ignore_ascii_case("context") {
                let id = match element.value().attr("id") {
                    Some(id) => id,
                    None => continue,
                };
                let period = match find_descendant(&element, "period") {
                    Some(period) => period,
                    None => continue,
                };

                let raw = period.text().collect::<String>();
                if let Some(context) = build_context(
                    descendant_text(&period, "instant"),
                    descendant_text(&period, "startdate"),
                    descendant_text(&period, "enddate"),
                    Some(raw),
                ) {
                    contexts.insert(id.to_string(), context);
                }
                continue;
            }

            let name = match element.value().attr("name") {
                Some(name) => name,
                None => continue,
            };
            let context_ref = match element.value().attr("contextref") {
                Some(context_ref) => context_ref,
                None => continue,
            };

            // Inline values may be split across nested markup, so all
            // descendant text is concatenated.
            let joined = element.text().collect::<String>();
            let trimmed = joined.trim();
            let text = if trimmed.is_empty() {
                element
                    .value()
                    .attr("value")
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
            } else {
                Some(trimmed.to_string())
            };

            elements.push(TaggedElement {
                tag: canonical_tag(name).to_string(),
                context_ref: context_ref.to_string(),
                text,
                decimals: element.value().attr("decimals").map(str::to_string),
            });
        }

        Self {
            dialect: Dialect::Inline,
            contexts,
            elements,
        }
    }
}

fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

fn find_descendant<'a>(element: &ElementRef<'a>, local: &str) -> Option<ElementRef<'a>> {
    element
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|e| local_name(e.value().name()).eq_ignore_ascii_case(local))
}

fn descendant_text(element: &ElementRef, local: &str) -> Option<String> {
    find_descendant(element, local)
        .map(|e| e.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}
