use std::fs;
use std::path::PathBuf;

use dotenvy::dotenv;

use tei_reader_backend::{parse_tei, ParsedDocument};

pub fn test_setup() {
    dotenv().ok();
}

#[allow(dead_code)]
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from("tests/data").join(name)
}

#[allow(dead_code)]
pub fn read_fixture(name: &str) -> String {
    fs::read_to_string(fixture_path(name)).expect("Failed to read fixture")
}

#[allow(dead_code)]
pub fn parse_fixture(name: &str) -> ParsedDocument {
    parse_tei(&read_fixture(name)).expect("Can't parse fixture")
}

/// A continuous-mode document with one source segment `la.5.335`, lines 335-339.
/// `extra` is placed after the source stream.
#[allow(dead_code)]
pub fn tebaide_segment(extra: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<TEI xmlns="http://www.tei-c.org/ns/1.0">
  <teiHeader><fileDesc><titleStmt><title type="main">Tebaide</title></titleStmt></fileDesc></teiHeader>
  <text type="source">
    <body>
      <seg xml:id="la.5.335">
        <l n="335">Ecce autem</l>
        <l n="336">Lemnos</l>
        <l n="337">arma</l>
        <l n="338">virumque</l>
        <l n="339">cano</l>
      </seg>
    </body>
  </text>
  {}
</TEI>"#,
        extra
    )
}
