use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, info};

use crate::error::Result;

const FILE_TYPE: &str = "file_type";
const DOWNLOAD_LINK: &str = "download_link";

/// One `<doc>` of the Solr response: its named children, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingRecord {
    pub fields: Vec<(String, String)>,
}

impl ListingRecord {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Parse a Solr XML search response into its `doc` records.
///
/// Every direct child of a `doc` carrying a `name` attribute becomes a
/// field, whatever its element type (`str`, `date`, `long`, ...).
/// Values are trimmed: Solr pads them when the response is indented, and a
/// padded `download_link` is not a fetchable URL. Instrument text in the
/// document itself is kept verbatim.
pub fn parse_listing(body: &[u8]) -> Result<Vec<ListingRecord>> {
    let mut reader = Reader::from_reader(body);
    reader.config_mut().trim_text(true);

    let mut records = Vec::new();
    let mut current: Option<ListingRecord> = None;
    // (field name, accumulated text) for the open direct child of `doc`
    let mut field: Option<(String, String)> = None;
    let mut depth_in_doc = 0usize;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                if current.is_some() {
                    depth_in_doc += 1;
                    if depth_in_doc == 1 {
                        field = name_attr(&e)?.map(|n| (n, String::new()));
                    }
                } else if e.local_name().as_ref() == b"doc" {
                    current = Some(ListingRecord::default());
                    depth_in_doc = 0;
                }
            }
            Event::Empty(e) => {
                if let Some(rec) = current.as_mut() {
                    if depth_in_doc == 0 {
                        if let Some(name) = name_attr(&e)? {
                            rec.fields.push((name, String::new()));
                        }
                    }
                } else if e.local_name().as_ref() == b"doc" {
                    records.push(ListingRecord::default());
                }
            }
            Event::Text(e) => {
                if let Some((_, value)) = field.as_mut() {
                    value.push_str(&e.unescape()?);
                }
            }
            Event::CData(e) => {
                if let Some((_, value)) = field.as_mut() {
                    value.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Event::End(_) if current.is_some() => {
                if depth_in_doc == 0 {
                    records.extend(current.take());
                } else {
                    if depth_in_doc == 1 {
                        if let (Some(rec), Some(f)) = (current.as_mut(), field.take()) {
                            rec.fields.push(f);
                        }
                    }
                    depth_in_doc -= 1;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    debug!(records = records.len(), "Listing parsed");
    Ok(records)
}

fn name_attr(e: &BytesStart<'_>) -> Result<Option<String>> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.local_name().as_ref() == b"name" {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Download link of the first record that has a `file_type` field.
///
/// With `file_type` set, the field's value must also match it. A matching
/// record without a `download_link` is passed over.
pub fn find_download_link(records: &[ListingRecord], file_type: Option<&str>) -> Option<String> {
    info!("Looking for the zip file url");
    for record in records {
        let Some(kind) = record.get(FILE_TYPE) else {
            continue;
        };
        if file_type.is_some_and(|wanted| wanted != kind) {
            continue;
        }
        if let Some(link) = record.get(DOWNLOAD_LINK) {
            info!("Url of the required zip file is found: {}", link);
            return Some(link.to_string());
        }
    }
    info!("Zip file url is not found");
    None
}
