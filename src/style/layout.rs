//! Print-layout maintenance: title sync and metadata extraction.
//!
//! A print layout carries display metadata the publishing side needs
//! without parsing the whole document again: the size of the first map
//! item and the ids of all label items. The composer title is kept in
//! sync with the template name on every save.

use std::io::Cursor;

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

use super::process::{attr_value, replace_attr};
use crate::error::AssetError;

/// Metadata extracted from a print layout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutInfo {
    /// Width of the first map item, as written in the document.
    pub map_width: Option<String>,
    /// Height of the first map item.
    pub map_height: Option<String>,
    /// Ids of all label items, in document order (commas escaped).
    pub labels: Vec<String>,
}

impl LayoutInfo {
    /// Comma-joined label ids for the database row.
    pub fn labels_field(&self) -> String {
        self.labels.join(",")
    }
}

/// Rewrite the composer title (when it differs) and extract layout
/// metadata in a single pass.
pub fn update_layout(
    text: &str,
    title: Option<&str>,
) -> Result<(String, LayoutInfo), AssetError> {
    let mut reader = Reader::from_str(text);
    let mut writer = Writer::new(Cursor::new(Vec::with_capacity(text.len())));

    let mut info = LayoutInfo::default();
    let mut stack: Vec<Vec<u8>> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(elem)) => {
                let handled = handle_item(&elem, &stack, title, &mut info)?;
                stack.push(elem.name().as_ref().to_vec());
                match handled {
                    Some(rewritten) => write(&mut writer, Event::Start(rewritten))?,
                    None => write(&mut writer, Event::Start(elem))?,
                }
            }
            Ok(Event::Empty(elem)) => {
                match handle_item(&elem, &stack, title, &mut info)? {
                    Some(rewritten) => write(&mut writer, Event::Empty(rewritten))?,
                    None => write(&mut writer, Event::Empty(elem))?,
                }
            }
            Ok(Event::End(elem)) => {
                stack.pop();
                write(&mut writer, Event::End(elem))?;
            }
            Ok(Event::Eof) => break,
            Ok(event) => write(&mut writer, event)?,
            Err(e) => {
                return Err(AssetError::MalformedDocument(format!(
                    "parse error at position {}: {e}",
                    reader.error_position()
                )));
            }
        }
    }

    let bytes = writer.into_inner().into_inner();
    Ok((String::from_utf8(bytes)?, info))
}

fn handle_item(
    elem: &BytesStart<'_>,
    stack: &[Vec<u8>],
    title: Option<&str>,
    info: &mut LayoutInfo,
) -> Result<Option<BytesStart<'static>>, AssetError> {
    let name = elem.name();
    let parent = stack.last().map(Vec::as_slice);

    match name.as_ref() {
        // root <Composer title="...">
        b"Composer" if stack.is_empty() => {
            if let Some(title) = title
                && attr_value(elem, "title")?.as_deref() != Some(title)
            {
                return Ok(Some(replace_attr(elem, "title", title)?));
            }
        }
        b"ComposerItem" => match parent {
            Some(b"ComposerMap") if info.map_width.is_none() => {
                info.map_width = attr_value(elem, "width")?;
                info.map_height = attr_value(elem, "height")?;
            }
            Some(b"ComposerLabel") => {
                if let Some(id) = attr_value(elem, "id")?
                    && !id.is_empty()
                {
                    info.labels.push(id.replace(',', "\\,"));
                }
            }
            _ => {}
        },
        _ => {}
    }
    Ok(None)
}

fn write(writer: &mut Writer<Cursor<Vec<u8>>>, event: Event<'_>) -> Result<(), AssetError> {
    writer
        .write_event(event)
        .map_err(|e| AssetError::io("document buffer", std::io::Error::other(e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const QPT: &str = r#"<Composer title="old name" visible="1">
 <ComposerMap keepLayerSet="false">
  <ComposerItem width="200.5" height="120" x="10" y="10"/>
 </ComposerMap>
 <ComposerMap keepLayerSet="false">
  <ComposerItem width="90" height="60" x="0" y="0"/>
 </ComposerMap>
 <ComposerLabel labelText="Title">
  <ComposerItem id="head,line" x="5" y="5"/>
 </ComposerLabel>
 <ComposerLabel labelText="Footer">
  <ComposerItem id="footer" x="5" y="180"/>
 </ComposerLabel>
</Composer>"#;

    #[test]
    fn test_extracts_first_map_size() {
        let (_, info) = update_layout(QPT, None).unwrap();
        assert_eq!(info.map_width.as_deref(), Some("200.5"));
        assert_eq!(info.map_height.as_deref(), Some("120"));
    }

    #[test]
    fn test_extracts_labels_with_escaped_commas() {
        let (_, info) = update_layout(QPT, None).unwrap();
        assert_eq!(info.labels, vec!["head\\,line".to_string(), "footer".to_string()]);
        assert_eq!(info.labels_field(), "head\\,line,footer");
    }

    #[test]
    fn test_title_rewritten_when_changed() {
        let (text, _) = update_layout(QPT, Some("Flood map A4")).unwrap();
        assert!(text.contains(r#"title="Flood map A4""#));
        assert!(!text.contains("old name"));
        // sibling attribute keeps its place
        assert!(text.contains(r#"visible="1""#));
    }

    #[test]
    fn test_title_untouched_when_equal() {
        let (text, _) = update_layout(QPT, Some("old name")).unwrap();
        assert_eq!(text, QPT);
    }

    #[test]
    fn test_malformed_layout() {
        assert!(matches!(
            update_layout("<Composer><Bad></Composer>", None),
            Err(AssetError::MalformedDocument(_))
        ));
    }
}
