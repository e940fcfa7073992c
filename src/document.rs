use std::fs;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{debug, info};

use crate::error::{Error, Result};

const GENERAL_ATTRIBUTES: &[u8] = b"FinInstrmGnlAttrbts";
const ISSUER: &[u8] = b"Issr";

/// One financial instrument, one output row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentRecord {
    pub id: String,
    pub full_name: String,
    pub classification: String,
    pub commodity_derivative: String,
    pub currency: String,
    pub issuer: String,
}

#[derive(Debug, Default)]
struct GeneralAttributes {
    id: Option<String>,
    full_name: Option<String>,
    classification: Option<String>,
    commodity_derivative: Option<String>,
    currency: Option<String>,
}

impl GeneralAttributes {
    fn set(&mut self, tag: &[u8], text: String) {
        let slot = match tag {
            b"Id" => &mut self.id,
            b"FullNm" => &mut self.full_name,
            b"ClssfctnTp" => &mut self.classification,
            b"CmmdtyDerivInd" => &mut self.commodity_derivative,
            b"NtnlCcy" => &mut self.currency,
            _ => return,
        };
        slot.get_or_insert(text);
    }

    fn into_record(self, record: usize, issuer: Option<&str>) -> Result<InstrumentRecord> {
        let missing = |field| Error::MissingField { record, field };
        Ok(InstrumentRecord {
            id: self.id.ok_or_else(|| missing("Id"))?,
            full_name: self.full_name.ok_or_else(|| missing("FullNm"))?,
            classification: self.classification.ok_or_else(|| missing("ClssfctnTp"))?,
            commodity_derivative: self
                .commodity_derivative
                .ok_or_else(|| missing("CmmdtyDerivInd"))?,
            currency: self.currency.ok_or_else(|| missing("NtnlCcy"))?,
            issuer: issuer.ok_or_else(|| missing("Issr"))?.to_string(),
        })
    }
}

/// An open element. Only record containers end up holding anything.
#[derive(Default)]
struct Frame {
    attributes: Vec<GeneralAttributes>,
    issuer: Option<String>,
}

/// Single pass over the document: each record container (the parent of a
/// `FinInstrmGnlAttrbts`) yields its rows when it closes, so all six
/// fields of a row come from the same container.
#[derive(Default)]
struct Walker {
    stack: Vec<Frame>,
    /// Open `FinInstrmGnlAttrbts` and the stack depth it sits at.
    general: Option<(usize, GeneralAttributes)>,
    text: String,
    records: Vec<InstrumentRecord>,
}

impl Walker {
    fn open(&mut self, tag: &[u8]) {
        self.stack.push(Frame::default());
        self.text.clear();
        if tag == GENERAL_ATTRIBUTES && self.general.is_none() {
            self.general = Some((self.stack.len(), GeneralAttributes::default()));
        }
    }

    fn close(&mut self, tag: &[u8]) -> Result<()> {
        let text = std::mem::take(&mut self.text);
        let Some(frame) = self.stack.pop() else {
            return Ok(());
        };
        let depth = self.stack.len();

        let general_at = self.general.as_ref().map(|(at, _)| *at);
        if tag == GENERAL_ATTRIBUTES && general_at == Some(depth + 1) {
            if let (Some((_, attrs)), Some(container)) =
                (self.general.take(), self.stack.last_mut())
            {
                container.attributes.push(attrs);
            }
        } else if general_at == Some(depth) {
            if let Some((_, attrs)) = self.general.as_mut() {
                attrs.set(tag, text);
            }
        } else if tag == ISSUER {
            if let Some(container) = self.stack.last_mut() {
                container.issuer.get_or_insert(text);
            }
        }

        for attrs in frame.attributes {
            let record = attrs.into_record(self.records.len(), frame.issuer.as_deref())?;
            self.records.push(record);
        }
        Ok(())
    }
}

/// Extract every instrument record, in document order.
///
/// Elements are matched by local name. A record container missing any of
/// the six fields is an error.
pub fn parse_instruments(xml: &str) -> Result<Vec<InstrumentRecord>> {
    let mut reader = Reader::from_str(xml);
    let mut walker = Walker::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => walker.open(e.local_name().as_ref()),
            Event::Empty(e) => {
                let name = e.local_name();
                walker.open(name.as_ref());
                walker.close(name.as_ref())?;
            }
            Event::End(e) => walker.close(e.local_name().as_ref())?,
            Event::Text(e) => walker.text.push_str(&e.unescape()?),
            Event::CData(e) => walker.text.push_str(&String::from_utf8_lossy(&e)),
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(walker.records)
}

/// Read `path` as UTF-8 text.
pub fn read_document(path: &Path) -> Result<String> {
    info!("Reading the xml file {:?}", path);
    let bytes = fs::read(path).map_err(|e| Error::io(path, e))?;
    let text = String::from_utf8(bytes).map_err(|source| Error::Utf8 {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(bytes = text.len(), "Document read");
    Ok(text)
}

pub fn flatten(path: &Path) -> Result<Vec<InstrumentRecord>> {
    let xml = read_document(path)?;
    let records = parse_instruments(&xml)?;
    info!("Fetched {} instrument records", records.len());
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(records: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<BizData xmlns="urn:iso:std:iso:20022:tech:xsd:head.003.001.01">
  <Pyld>
    <Document xmlns="urn:iso:std:iso:20022:tech:xsd:auth.036.001.02">
      <FinInstrmRptgRefDataDltaRpt>
        <FinInstrm>{records}</FinInstrm>
      </FinInstrmRptgRefDataDltaRpt>
    </Document>
  </Pyld>
</BizData>"#
        )
    }

    fn instrument(fields: [&str; 6]) -> InstrumentRecord {
        let [id, full_name, classification, commodity_derivative, currency, issuer] = fields;
        InstrumentRecord {
            id: id.into(),
            full_name: full_name.into(),
            classification: classification.into(),
            commodity_derivative: commodity_derivative.into(),
            currency: currency.into(),
            issuer: issuer.into(),
        }
    }

    fn record(container: &str, r: &InstrumentRecord) -> String {
        format!(
            "<{container}><FinInstrmGnlAttrbts><Id>{}</Id><FullNm>{}</FullNm>\
             <ShrtNm>short</ShrtNm><ClssfctnTp>{}</ClssfctnTp><NtnlCcy>{}</NtnlCcy>\
             <CmmdtyDerivInd>{}</CmmdtyDerivInd></FinInstrmGnlAttrbts>\
             <Issr>{}</Issr><TradgVnRltdAttrbts><Id>XFRA</Id></TradgVnRltdAttrbts>\
             </{container}>",
            r.id, r.full_name, r.classification, r.currency, r.commodity_derivative, r.issuer
        )
    }

    #[test]
    fn fixture_round_trip() {
        let xml = std::fs::read_to_string("tests/fixtures/DLTINS_sample.xml").unwrap();
        let records = parse_instruments(&xml).unwrap();
        assert_eq!(
            records,
            vec![InstrumentRecord {
                id: "X".into(),
                full_name: "Kreditanst.f.Wiederaufbau     Anl.v.2014 (2021)".into(),
                classification: "X".into(),
                commodity_derivative: "false".into(),
                currency: "EUR".into(),
                issuer: "Y".into(),
            }]
        );
    }

    #[test]
    fn three_records_stay_aligned() {
        let expected = vec![
            instrument(["DE000A1RQEE9", "First", "DBFTFB", "false", "EUR", "ISSUER1"]),
            instrument(["DE000A1RQEF6", "Second", "DBVTFR", "true", "USD", "ISSUER2"]),
            instrument(["DE000A1RQEG4", "Third", "FFICSX", "false", "GBP", "ISSUER3"]),
        ];
        let xml = wrap(
            &[
                record("ModfdRcrd", &expected[0]),
                record("NewRcrd", &expected[1]),
                record("TermntdRcrd", &expected[2]),
            ]
            .concat(),
        );

        // every column of every row, so a shifted field in any record shows up;
        // the venue Id under TradgVnRltdAttrbts must not replace the instrument Id
        assert_eq!(parse_instruments(&xml).unwrap(), expected);
    }

    #[test]
    fn missing_issuer_fails_on_its_record() {
        let broken = "<ModfdRcrd><FinInstrmGnlAttrbts><Id>B</Id><FullNm>n</FullNm>\
                      <ClssfctnTp>c</ClssfctnTp><NtnlCcy>EUR</NtnlCcy>\
                      <CmmdtyDerivInd>false</CmmdtyDerivInd></FinInstrmGnlAttrbts></ModfdRcrd>";
        let xml = wrap(&format!("{}{}", record("ModfdRcrd", &instrument(["A", "n", "c", "false", "EUR", "I"])), broken));
        let err = parse_instruments(&xml).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingField {
                record: 1,
                field: "Issr"
            }
        ));
    }

    #[test]
    fn missing_general_field_fails() {
        let broken = "<NewRcrd><FinInstrmGnlAttrbts><Id>B</Id><FullNm>n</FullNm>\
                      <ClssfctnTp>c</ClssfctnTp><CmmdtyDerivInd>false</CmmdtyDerivInd>\
                      </FinInstrmGnlAttrbts><Issr>I</Issr></NewRcrd>";
        let err = parse_instruments(&wrap(broken)).unwrap_err();
        assert!(matches!(
            err,
            Error::MissingField {
                record: 0,
                field: "NtnlCcy"
            }
        ));
    }

    #[test]
    fn issuer_before_attributes_and_prefixed_names() {
        let xml = wrap(
            "<a:NewRcrd xmlns:a=\"urn:x\"><a:Issr>LEI1</a:Issr><a:FinInstrmGnlAttrbts>\
             <a:Id>P</a:Id><a:FullNm>Bond &amp; Co</a:FullNm><a:ClssfctnTp>c</a:ClssfctnTp>\
             <a:NtnlCcy>USD</a:NtnlCcy><a:CmmdtyDerivInd>true</a:CmmdtyDerivInd>\
             </a:FinInstrmGnlAttrbts></a:NewRcrd>",
        );
        let records = parse_instruments(&xml).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].issuer, "LEI1");
        assert_eq!(records[0].full_name, "Bond & Co");
        assert_eq!(records[0].commodity_derivative, "true");
    }

    #[test]
    fn empty_element_is_an_empty_value() {
        let xml = wrap(
            "<NewRcrd><FinInstrmGnlAttrbts><Id>E</Id><FullNm/><ClssfctnTp>c</ClssfctnTp>\
             <NtnlCcy>EUR</NtnlCcy><CmmdtyDerivInd>false</CmmdtyDerivInd>\
             </FinInstrmGnlAttrbts><Issr>I</Issr></NewRcrd>",
        );
        let records = parse_instruments(&xml).unwrap();
        assert_eq!(records[0].full_name, "");
    }

    #[test]
    fn document_without_records() {
        assert!(parse_instruments(&wrap("")).unwrap().is_empty());
    }

    #[test]
    fn non_utf8_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("latin1.xml");
        std::fs::write(&path, b"<FullNm>Caf\xe9</FullNm>").unwrap();
        assert!(matches!(read_document(&path), Err(Error::Utf8 { .. })));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            flatten(&dir.path().join("absent.xml")),
            Err(Error::Io { .. })
        ));
    }
}
