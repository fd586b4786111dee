// Copyright 2023 Remi Bernotavicius

use super::ShoppingListItem;
use derive_more::Display;
use std::fmt::Write as _;
use strum::{EnumIter, EnumString};
use thousands::Separable as _;

#[derive(Debug, Display, EnumIter, EnumString, Default, Copy, Clone, PartialEq, Eq)]
#[strum(ascii_case_insensitive)]
pub enum DocumentFormat {
    #[default]
    #[display("txt")]
    #[strum(serialize = "txt")]
    Txt,
    #[display("rtf")]
    #[strum(serialize = "rtf")]
    Rtf,
}

impl DocumentFormat {
    pub fn iter() -> impl Iterator<Item = Self> {
        <Self as strum::IntoEnumIterator>::iter()
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Txt => "text/plain; charset=utf-8",
            Self::Rtf => "application/rtf",
        }
    }

    pub fn filename(&self) -> String {
        format!("shopping_cart.{self}")
    }

    /// The `Content-Disposition` value naming [`Self::filename`].
    pub fn attachment(&self) -> &'static str {
        match self {
            Self::Txt => "attachment; filename=\"shopping_cart.txt\"",
            Self::Rtf => "attachment; filename=\"shopping_cart.rtf\"",
        }
    }
}

/// A rendered shopping list ready to be sent as an attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub content_type: &'static str,
    pub filename: String,
    pub body: String,
}

fn line(item: &ShoppingListItem) -> String {
    format!(
        "{}: {} {}",
        item.name,
        item.total.separate_with_commas(),
        item.measurement_unit
    )
}

fn heading(date: chrono::NaiveDate) -> String {
    date.format("Shopping list for %e %B %Y")
        .to_string()
        .replace("  ", " ")
}

fn plain_text(items: &[ShoppingListItem], date: chrono::NaiveDate) -> String {
    let mut text = heading(date);
    text += "\n\n";
    for item in items {
        text += &line(item);
        text += "\n";
    }
    text
}

/// Escapes RTF control characters. Anything outside ASCII goes out as `\uN?` UTF-16 units.
fn rtf_escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' | '{' | '}' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\n' => escaped += "\\line ",
            c if c.is_ascii() => escaped.push(c),
            c => {
                let mut units = [0; 2];
                for unit in c.encode_utf16(&mut units) {
                    let _ = write!(escaped, "\\u{}?", *unit as i16);
                }
            }
        }
    }
    escaped
}

fn rich_text_header() -> String {
    let mut rich_text = String::new();
    rich_text += "{\\rtf1\\ansi\\deff0\n";
    rich_text +=
        "{\\fonttbl\\f0\\fnil\\fcharset0 HelveticaNeue-Bold;\\f1\\fswiss\\fcharset0 Helvetica;}\n";

    rich_text += "\\pard";
    for i in 1..13 {
        rich_text += &format!("\\tx{}", i * 560);
    }
    rich_text += "\\pardirnatural\\partightenfactor0\n";
    rich_text
}

fn rich_text(items: &[ShoppingListItem], date: chrono::NaiveDate) -> String {
    let mut rich_text = rich_text_header();
    rich_text += &format!("\\f0\\b\\fs24 \\cf0 {} \\\n", rtf_escape(&heading(date)));
    rich_text += "\\f1\\b0 ";
    for item in items {
        rich_text += &format!("\\\n{}", rtf_escape(&line(item)));
    }
    rich_text += "}";
    rich_text
}

pub fn render(
    format: DocumentFormat,
    items: &[ShoppingListItem],
    date: chrono::NaiveDate,
) -> Document {
    let body = match format {
        DocumentFormat::Txt => plain_text(items, date),
        DocumentFormat::Rtf => rich_text(items, date),
    };
    Document {
        content_type: format.content_type(),
        filename: format.filename(),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr as _;

    fn item(id: &str, name: &str, total: i64, unit: &str) -> ShoppingListItem {
        ShoppingListItem {
            ingredient: id.parse().unwrap(),
            name: name.into(),
            measurement_unit: unit.into(),
            total,
        }
    }

    fn date() -> chrono::NaiveDate {
        chrono::NaiveDate::from_ymd_opt(2026, 3, 7).unwrap()
    }

    #[test]
    fn format_parsing() {
        assert_eq!(DocumentFormat::from_str("txt").unwrap(), DocumentFormat::Txt);
        assert_eq!(DocumentFormat::from_str("RTF").unwrap(), DocumentFormat::Rtf);
        assert!(DocumentFormat::from_str("pdf").is_err());
        assert_eq!(DocumentFormat::default(), DocumentFormat::Txt);

        for format in DocumentFormat::iter() {
            assert!(format.attachment().ends_with(&format!("\"{}\"", format.filename())));
        }
        let names: Vec<_> = DocumentFormat::iter().map(|f| f.filename()).collect();
        assert_eq!(names, ["shopping_cart.txt", "shopping_cart.rtf"]);
    }

    #[test]
    fn plain_text_lines() {
        let items = [
            item("1", "Flour", 1500, "g"),
            item("2", "Salt", 15, "g"),
        ];
        let doc = render(DocumentFormat::Txt, &items, date());
        assert_eq!(doc.content_type, "text/plain; charset=utf-8");
        assert_eq!(
            doc.body,
            "Shopping list for 7 March 2026\n\nFlour: 1,500 g\nSalt: 15 g\n"
        );
    }

    #[test]
    fn empty_list_still_has_a_heading() {
        let doc = render(DocumentFormat::Txt, &[], date());
        assert_eq!(doc.body, "Shopping list for 7 March 2026\n\n");

        let doc = render(DocumentFormat::Rtf, &[], date());
        assert!(doc.body.starts_with("{\\rtf1"));
        assert!(doc.body.contains("Shopping list for 7 March 2026"));
        assert!(doc.body.ends_with('}'));
    }

    #[test]
    fn rich_text_is_escaped() {
        let items = [item("1", "Crème {fraîche}", 200, "ml\\l")];
        let doc = render(DocumentFormat::Rtf, &items, date());
        assert_eq!(doc.content_type, "application/rtf");
        assert_eq!(doc.filename, "shopping_cart.rtf");
        assert!(
            doc.body
                .contains("\\\nCr\\u232?me \\{fra\\u238?che\\}: 200 ml\\\\l}"),
            "{}",
            doc.body
        );
    }

    #[test]
    fn astral_characters_become_surrogate_pairs() {
        assert_eq!(rtf_escape("🧂"), "\\u-10178?\\u-8766?");
    }
}
