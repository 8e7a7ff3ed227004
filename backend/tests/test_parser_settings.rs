/// Parsing with non-default settings.

use std::fs;

use tei_reader_backend::parser_settings::{EditorialMarkers, IdConventions, PrefixRule, TranslationLayout};
use tei_reader_backend::{parse_tei_with_settings, ParserSettings};

mod helpers;
use helpers as h;

#[test]
fn test_omit_editorial_markers() {
    h::test_setup();

    let settings = ParserSettings {
        editorial_markers: EditorialMarkers::Omit,
        ..Default::default()
    };
    let parsed = parse_tei_with_settings(&h::read_fixture("tebaide_5_335.xml"), &settings).unwrap();

    let verses = &parsed.sections[0].verses;
    assert_eq!(
        verses[0].source_content,
        r#"Ecce autem <span class="tei-name" data-type="person">Hypsipyle</span> tandem"#
    );
    assert_eq!(verses[2].source_content, r#"<em class="tei-hi">arma</em> virumque"#);
}

#[test]
fn test_empty_source_lines_are_not_ghosts() {
    h::test_setup();

    let xml = r#"<TEI><text type="source"><seg xml:id="la.1">
        <l/>
        <l><gap reason="lost"/></l>
        <l n="3">c</l>
    </seg></text></TEI>"#;
    let settings = ParserSettings {
        editorial_markers: EditorialMarkers::Omit,
        ..Default::default()
    };
    let parsed = parse_tei_with_settings(xml, &settings).unwrap();

    let verses = &parsed.sections[0].verses;
    assert_eq!(verses.len(), 3);
    assert_eq!(verses[0].n, "");
    assert_eq!(verses[1].source_content, "");
    assert!(verses.iter().all(|v| !v.is_ghost()));
}

#[test]
fn test_line_break_translation_layout() {
    h::test_setup();

    let settings = ParserSettings {
        translation_layout: TranslationLayout::LineBreaks,
        ..Default::default()
    };
    let parsed = parse_tei_with_settings(&h::read_fixture("tebaide_5_335.xml"), &settings).unwrap();

    let verses = &parsed.sections[0].verses;
    assert_eq!(
        verses[0].translation_content,
        r#"Ecco che nel frattempo <span class="tei-name" data-type="person">Ipsipile</span> vede"#
    );
    assert_eq!(
        verses[1].translation_content,
        r#"la flotta avvicinarsi a <span class="tei-name" data-type="place">Lemno</span>,"#
    );
    assert_eq!(verses[2].translation_content, "e le donne prendono le armi.");
    assert_eq!(verses[3].translation_content, "");
}

#[test]
fn test_custom_conventions() {
    h::test_setup();

    let xml = r#"<TEI>
        <text type="source"><seg xml:id="gr.1"><l n="1">μῆνιν</l></seg></text>
        <text type="translation"><seg xml:id="en.1">Wrath</seg></text>
        <text type="commentary"><div xml:id="comm.1"><seg>1 μῆνιν: first word</seg></div></text>
    </TEI>"#;

    // Default conventions know nothing about gr.
    let parsed = parse_tei_with_settings(xml, &ParserSettings::default()).unwrap();
    assert_eq!(parsed.sections[0].verses[0].translation_content, "");
    assert!(parsed.commentary.is_empty());

    let settings = ParserSettings {
        conventions: IdConventions {
            translation: vec![PrefixRule::new("gr.", "en.")],
            commentary: vec![PrefixRule::new("gr.", "comm.")],
        },
        ..Default::default()
    };
    let parsed = parse_tei_with_settings(xml, &settings).unwrap();
    let verse = &parsed.sections[0].verses[0];
    assert_eq!(verse.translation_content, "Wrath");
    assert!(verse.has_commentary);
    assert_eq!(parsed.commentary["comm.1.note.1"].target, "gr.1.1");
}

#[test]
fn test_settings_from_json_file() {
    h::test_setup();

    let path = std::env::temp_dir().join("tei_reader_settings_test.json");
    fs::write(
        &path,
        r#"{ "translation_layout": "line_breaks", "witness_list_label": "Testimoni" }"#,
    ).expect("Can't write settings");

    let settings = ParserSettings::load_from_json(&path).unwrap();
    assert_eq!(settings.translation_layout, TranslationLayout::LineBreaks);
    assert_eq!(settings.editorial_markers, EditorialMarkers::Placeholder);

    let parsed = parse_tei_with_settings(&h::read_fixture("tebaide_5_335.xml"), &settings).unwrap();
    assert!(parsed.source_description.contains("<summary>Testimoni</summary>"));

    let _ = fs::remove_file(&path);
}
