//! Streaming scan and rewrite of resource references in style documents.
//!
//! The document is walked once with a `quick-xml` reader/writer pair.
//! Reference nodes matched by the active rule set are offered to a
//! resolver; when the resolver produces a replacement path the attribute
//! is rewritten, otherwise the event passes through untouched. Everything
//! else is copied verbatim, so re-processing byte-identical input yields
//! byte-identical output.

use std::io::Cursor;

use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};
use rustc_hash::FxHashSet;

use super::rules::{
    PROPERTY_CLASS_ATTR, PROPERTY_CONTAINER, PROPERTY_ELEMENT, PROPERTY_KEY_ATTR,
    PROPERTY_VALUE_ATTR, ReferenceRule,
};
use crate::error::AssetError;
use crate::ingest::StyleBundle;
use crate::ingest::archive::basename;
use crate::{log, warn};

/// A binary resource extracted from the bundle, ready for the asset store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAsset {
    /// Content-derived filename (`{key}{extension}`).
    pub filename: String,
    /// Raw resource bytes.
    pub bytes: Vec<u8>,
}

/// Result of a rewrite pass.
pub struct ProcessOutcome {
    /// Document text with resolvable references rewritten.
    pub text: String,
    /// Distinct new assets, in first-reference order.
    pub assets: Vec<NewAsset>,
}

/// Content key of a resource: blake3 over the raw bytes, hex, 128 bits.
///
/// Hashing bytes (not the reference path) makes identical resources
/// dedupe to one stored file no matter how documents refer to them.
pub fn content_key(bytes: &[u8]) -> String {
    hex::encode(blake3::hash(bytes).as_bytes())[..32].to_string()
}

/// Filename extension including the dot, or empty.
fn extension(filename: &str) -> &str {
    filename
        .rfind('.')
        .map_or("", |index| &filename[index..])
}

/// Rewrite every resolvable reference, extracting resources from `bundle`.
///
/// Unresolvable references are assumed to point at platform-default
/// resources and stay untouched (logged as warnings).
pub fn rewrite_references(
    text: &str,
    rules: &[ReferenceRule],
    sub_dir: &str,
    bundle: &mut StyleBundle,
) -> Result<ProcessOutcome, AssetError> {
    let mut assets = Vec::new();
    let mut seen: FxHashSet<String> = FxHashSet::default();

    let out = transform(text, rules, |path| {
        let filename = basename(path);
        let Some(entry) = bundle.resolve(filename).map(str::to_string) else {
            warn!("style"; "resource not in bundle, keeping reference: {}", path);
            return Ok(None);
        };

        let bytes = bundle.read(&entry)?;
        let new_filename = format!("{}{}", content_key(&bytes), extension(filename));
        let new_path = format!("{sub_dir}/{new_filename}");

        log!("style"; "save and update reference: {} => {}", path, new_path);

        if seen.insert(new_filename.clone()) {
            assets.push(NewAsset {
                filename: new_filename,
                bytes,
            });
        }
        Ok(Some(new_path))
    })?;

    Ok(ProcessOutcome { text: out, assets })
}

/// Collect every reference path matched by `rules`, without rewriting.
///
/// Also serves as the well-formedness check for bare uploads, which are
/// stored verbatim and must never be re-serialized.
pub fn scan_references(text: &str, rules: &[ReferenceRule]) -> Result<Vec<String>, AssetError> {
    let mut refs = Vec::new();
    transform(text, rules, |path| {
        refs.push(path.to_string());
        Ok(None)
    })?;
    Ok(refs)
}

// ============================================================================
// Event Walk
// ============================================================================

/// Walk the document, offering each matched reference path to `resolve`.
///
/// `resolve` returns the replacement path, or `None` to pass the node
/// through unchanged. Returns the serialized document.
fn transform<R>(text: &str, rules: &[ReferenceRule], mut resolve: R) -> Result<String, AssetError>
where
    R: FnMut(&str) -> Result<Option<String>, AssetError>,
{
    let mut reader = Reader::from_str(text);
    let mut writer = Writer::new(Cursor::new(Vec::with_capacity(text.len())));

    // property-key context of each open element (Some while inside a
    // symbol-layer container matched by a Property rule)
    let mut stack: Vec<Option<&'static str>> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(elem)) => {
                let parent_key = stack.last().copied().flatten();
                let context = container_key(&elem, rules)?;
                stack.push(context);
                match rewrite_element(&elem, parent_key, rules, &mut resolve)? {
                    Some(rewritten) => write(&mut writer, Event::Start(rewritten))?,
                    None => write(&mut writer, Event::Start(elem))?,
                }
            }
            Ok(Event::Empty(elem)) => {
                let parent_key = stack.last().copied().flatten();
                match rewrite_element(&elem, parent_key, rules, &mut resolve)? {
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
    Ok(String::from_utf8(bytes)?)
}

fn write(writer: &mut Writer<Cursor<Vec<u8>>>, event: Event<'_>) -> Result<(), AssetError> {
    writer
        .write_event(event)
        .map_err(|e| AssetError::io("document buffer", std::io::Error::other(e)))
}

/// Property key to look for inside `elem`, if it is a matched container.
fn container_key(
    elem: &BytesStart<'_>,
    rules: &[ReferenceRule],
) -> Result<Option<&'static str>, AssetError> {
    if elem.name().as_ref() != PROPERTY_CONTAINER.as_bytes() {
        return Ok(None);
    }
    let Some(class) = attr_value(elem, PROPERTY_CLASS_ATTR)? else {
        return Ok(None);
    };
    for rule in rules {
        if let ReferenceRule::Property { class: c, key } = rule
            && *c == class
        {
            return Ok(Some(key));
        }
    }
    Ok(None)
}

/// Apply the matching rule to one element, if any.
fn rewrite_element<R>(
    elem: &BytesStart<'_>,
    parent_key: Option<&'static str>,
    rules: &[ReferenceRule],
    resolve: &mut R,
) -> Result<Option<BytesStart<'static>>, AssetError>
where
    R: FnMut(&str) -> Result<Option<String>, AssetError>,
{
    let name = elem.name();

    // <prop k=KEY v=PATH> under an active symbol-layer container
    if name.as_ref() == PROPERTY_ELEMENT.as_bytes() {
        if let Some(key) = parent_key
            && attr_value(elem, PROPERTY_KEY_ATTR)?.as_deref() == Some(key)
            && let Some(path) = attr_value(elem, PROPERTY_VALUE_ATTR)?
            && let Some(new_path) = resolve(&path)?
        {
            return Ok(Some(replace_attr(elem, PROPERTY_VALUE_ATTR, &new_path)?));
        }
        return Ok(None);
    }

    for rule in rules {
        if let ReferenceRule::Attribute { element, attr } = rule
            && name.as_ref() == element.as_bytes()
            && let Some(path) = attr_value(elem, attr)?
            && let Some(new_path) = resolve(&path)?
        {
            return Ok(Some(replace_attr(elem, attr, &new_path)?));
        }
    }
    Ok(None)
}

/// Unescaped value of the named attribute.
pub(super) fn attr_value(elem: &BytesStart<'_>, key: &str) -> Result<Option<String>, AssetError> {
    for attr in elem.attributes() {
        let attr = attr.map_err(|e| AssetError::MalformedDocument(e.to_string()))?;
        if attr.key.as_ref() == key.as_bytes() {
            let value = attr
                .unescape_value()
                .map_err(|e| AssetError::MalformedDocument(e.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// Rebuild an element with one attribute replaced, preserving order.
pub(super) fn replace_attr(
    elem: &BytesStart<'_>,
    key: &str,
    value: &str,
) -> Result<BytesStart<'static>, AssetError> {
    let name = String::from_utf8_lossy(elem.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    for attr in elem.attributes() {
        let attr = attr.map_err(|e| AssetError::MalformedDocument(e.to_string()))?;
        if attr.key.as_ref() == key.as_bytes() {
            out.push_attribute((key, value));
        } else {
            out.push_attribute(attr);
        }
    }
    Ok(out)
}
