//! Top-level body sections of a JATS article

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{Result, RetrievalError};
use crate::text::{non_empty, normalize_whitespace, reflow_case_boundaries};
use crate::xml::{get_attr, make_reader, read_text_content};

/// One top-level `<sec>` of `<article><body>`
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct BodySection {
    pub title: Option<String>,
    pub text: Option<String>,
}

/// Identifier and body sections of one article
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ParsedArticle {
    pub pmid: Option<String>,
    pub sections: Vec<BodySection>,
}

enum Action {
    ReadPmid,
    ReadSection,
    Enter,
}

/// Collapse whitespace inside each line and drop blank lines
fn tidy_lines(text: &str) -> String {
    text.lines()
        .map(normalize_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Read a `<sec>` whose `Start` was just consumed
///
/// The title is the text of a direct `<title>` child. The section text is all
/// text below the element, title included, concatenated as it appears in the
/// markup and then reflowed at case boundaries.
fn read_section(reader: &mut Reader<&[u8]>, buf: &mut Vec<u8>) -> Result<BodySection> {
    let mut title = None;
    let mut text = String::new();
    let mut depth: u32 = 1;

    loop {
        let event = reader
            .read_event_into(buf)
            .map_err(|e| RetrievalError::XmlError(e.to_string()))?;

        match event {
            Event::Start(e) => {
                let is_title = depth == 1 && title.is_none() && e.name().as_ref() == b"title";
                buf.clear();
                if is_title {
                    let title_text = read_text_content(reader, b"title", buf)?;
                    text.push_str(&title_text);
                    title = non_empty(Some(&title_text));
                } else {
                    depth += 1;
                }
            }
            Event::Text(e) => {
                let unescaped = e
                    .unescape()
                    .map_err(|err| RetrievalError::XmlError(err.to_string()))?;
                text.push_str(&unescaped);
            }
            Event::CData(e) => {
                text.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            Event::Eof => {
                return Err(RetrievalError::XmlError(
                    "unexpected end of document inside <sec>".to_string(),
                ));
            }
            _ => {}
        }
        buf.clear();
    }

    Ok(BodySection {
        title,
        text: non_empty(Some(&tidy_lines(&reflow_case_boundaries(&text)))),
    })
}

/// Extract the PMID from `article-meta` and every top-level body section
///
/// Sections of `sub-article` bodies are ignored. A missing body gives no
/// sections rather than an error.
pub(crate) fn parse_article(xml: &str) -> Result<ParsedArticle> {
    let mut reader = make_reader(xml);
    let mut buf = Vec::new();
    let mut path: Vec<Vec<u8>> = Vec::new();
    let mut article = ParsedArticle::default();
    let mut seen_root = false;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| RetrievalError::XmlError(e.to_string()))?;

        match event {
            Event::Start(e) => {
                seen_root = true;
                let name = e.name().as_ref().to_vec();
                let parent = path.last().map(Vec::as_slice).unwrap_or_default();
                let grandparent = path
                    .len()
                    .checked_sub(2)
                    .map(|i| path[i].as_slice())
                    .unwrap_or_default();

                let action = match (grandparent, parent, name.as_slice()) {
                    (_, b"article-meta", b"article-id")
                        if article.pmid.is_none()
                            && get_attr(&e, b"pub-id-type").as_deref() == Some("pmid") =>
                    {
                        Action::ReadPmid
                    }
                    (b"article", b"body", b"sec") => Action::ReadSection,
                    _ => Action::Enter,
                };
                buf.clear();

                match action {
                    Action::ReadPmid => {
                        let pmid = read_text_content(&mut reader, &name, &mut buf)?;
                        article.pmid = non_empty(Some(&pmid));
                    }
                    Action::ReadSection => {
                        article.sections.push(read_section(&mut reader, &mut buf)?);
                    }
                    Action::Enter => path.push(name),
                }
            }
            Event::End(_) => {
                path.pop();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !seen_root {
        return Err(RetrievalError::XmlError("empty article XML".to_string()));
    }

    Ok(article)
}
