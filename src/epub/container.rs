use crate::error::{Result, SmithError};
use quick_xml::Reader;
use quick_xml::events::Event;

/// Path of the package document inside archives this crate writes.
pub const PACKAGE_PATH: &str = "content.opf";

/// Parse META-INF/container.xml to find the OPF rootfile path
pub fn parse_container(xml: &str) -> Result<String> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.local_name().as_ref() == b"rootfile" =>
            {
                if let Some(attr) = e
                    .attributes()
                    .flatten()
                    .find(|a| a.key.as_ref() == b"full-path")
                {
                    return Ok(String::from_utf8_lossy(&attr.value).into_owned());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SmithError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Err(SmithError::InvalidEpub(
        "no rootfile found in container.xml".into(),
    ))
}

pub fn generate_container_xml() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="{PACKAGE_PATH}" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#
    )
}
