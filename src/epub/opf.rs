use crate::epub::{EpubVersion, ManifestItem, SourceMetadata, SpineItem};
use crate::error::{Result, SmithError};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

pub struct OpfData {
    pub metadata: SourceMetadata,
    pub manifest: Vec<ManifestItem>,
    pub spine: Vec<SpineItem>,
    pub version: EpubVersion,
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn manifest_item(e: &BytesStart<'_>) -> ManifestItem {
    ManifestItem {
        id: attr_value(e, b"id").unwrap_or_default(),
        href: attr_value(e, b"href").unwrap_or_default(),
        media_type: attr_value(e, b"media-type").unwrap_or_default(),
        properties: attr_value(e, b"properties"),
    }
}

fn spine_item(e: &BytesStart<'_>) -> SpineItem {
    SpineItem {
        idref: attr_value(e, b"idref").unwrap_or_default(),
        linear: attr_value(e, b"linear").is_none_or(|v| v != "no"),
    }
}

pub fn parse_opf(xml: &str) -> Result<OpfData> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    let mut metadata = SourceMetadata::default();
    let mut manifest = Vec::new();
    let mut spine = Vec::new();
    let mut version = EpubVersion::V3;

    let mut in_metadata = false;
    let mut current_element = String::new();
    let mut current_text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match local.as_str() {
                    "package" => {
                        if attr_value(e, b"version").is_some_and(|v| v.starts_with('2')) {
                            version = EpubVersion::V2;
                        }
                    }
                    "metadata" => in_metadata = true,
                    "item" => manifest.push(manifest_item(e)),
                    "itemref" => spine.push(spine_item(e)),
                    _ if in_metadata => {
                        current_element = local;
                        current_text.clear();
                    }
                    _ => {}
                }
            }
            Ok(Event::End(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if local == "metadata" {
                    in_metadata = false;
                } else if in_metadata && !current_text.trim().is_empty() {
                    let text = current_text.trim().to_string();
                    match current_element.as_str() {
                        "title" => metadata.titles.push(text),
                        "creator" => metadata.creators.push(text),
                        "description" => metadata.description = Some(text),
                        _ => {}
                    }
                    current_text.clear();
                    current_element.clear();
                }
            }
            Ok(Event::Text(ref e)) => {
                if in_metadata {
                    current_text.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::Empty(ref e)) => {
                let local = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match local.as_str() {
                    "item" => manifest.push(manifest_item(e)),
                    "itemref" => spine.push(spine_item(e)),
                    // <meta name="cover" content="cover-image"/>
                    "meta" if in_metadata => {
                        if attr_value(e, b"name").as_deref() == Some("cover") {
                            metadata.cover_id = attr_value(e, b"content");
                        }
                    }
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SmithError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(OpfData {
        metadata,
        manifest,
        spine,
        version,
    })
}
