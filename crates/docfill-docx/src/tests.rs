use std::collections::BTreeMap;
use std::io::Cursor;
use std::ops::ControlFlow;

use image::ImageFormat;

use super::*;
use crate::package::Package;
use crate::paragraph::paragraph_text;
use crate::story::walk_paragraphs;
use crate::xml::{Element, XmlTree};

const W_NS: &str = r#"xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships""#;

const STYLES: &[u8] = b"<?xml version=\"1.0\"?><w:styles/>";

fn p(text: &str) -> String {
    format!("<w:p><w:r><w:t xml:space=\"preserve\">{text}</w:t></w:r></w:p>")
}

fn cell_table(cells: &[&str]) -> String {
    let cells: String = cells.iter().map(|c| format!("<w:tc>{c}</w:tc>")).collect();
    format!("<w:tbl><w:tr>{cells}</w:tr></w:tbl>")
}

/// Builds a template with one section referencing `header1.xml` and
/// `footer1.xml`.
fn template(body: &str, header: &str, footer: &str) -> Vec<u8> {
    let mut package = Package::default();
    package.put(
        "[Content_Types].xml",
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/></Types>"#
            .to_vec(),
    );
    package.put(
        "_rels/.rels",
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#
            .to_vec(),
    );
    package.put(
        "word/document.xml",
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document {W_NS}><w:body>{body}<w:sectPr><w:headerReference w:type="default" r:id="rId2"/><w:footerReference w:type="default" r:id="rId3"/></w:sectPr></w:body></w:document>"#
        )
        .into_bytes(),
    );
    package.put(
        "word/_rels/document.xml.rels",
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/header" Target="header1.xml"/><Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/footer" Target="footer1.xml"/></Relationships>"#
            .to_vec(),
    );
    package.put("word/styles.xml", STYLES.to_vec());
    package.put(
        "word/header1.xml",
        format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:hdr {W_NS}>{header}</w:hdr>"#)
            .into_bytes(),
    );
    package.put(
        "word/footer1.xml",
        format!(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:ftr {W_NS}>{footer}</w:ftr>"#)
            .into_bytes(),
    );
    package.to_bytes().unwrap()
}

fn texts(doc: &Document, part: &str) -> Vec<String> {
    let container = doc.part(part).unwrap().container().unwrap();
    let mut out = Vec::new();
    let _ = walk_paragraphs(container, &mut |p: &Element| {
        out.push(paragraph_text(p));
        ControlFlow::<()>::Continue(())
    });
    out
}

fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn png(width: u32, height: u32) -> LogoImage {
    let mut out = Vec::new();
    image::RgbaImage::new(width, height)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .unwrap();
    LogoImage::from_bytes(out).unwrap()
}

fn drawings(doc: &Document, part: &str) -> Vec<Element> {
    let mut found = Vec::new();
    doc.part(part)
        .unwrap()
        .xml()
        .root()
        .for_each_element(&mut |el: &Element| {
            if el.is("wp:inline") {
                found.push(el.clone());
            }
        });
    found
}

#[test]
fn stories_follow_sections() {
    let doc = Document::from_bytes(&template(&p("x"), &p("h"), &p("f"))).unwrap();
    assert_eq!(doc.main_part(), "word/document.xml");
    assert_eq!(
        doc.sections(),
        [Section {
            header: Some("word/header1.xml".into()),
            footer: Some("word/footer1.xml".into()),
        }]
    );

    let stories: Vec<_> = doc.stories().into_iter().map(|s| (s.kind, s.part)).collect();
    assert_eq!(
        stories,
        [
            (StoryKind::Body, "word/document.xml".to_owned()),
            (StoryKind::Header, "word/header1.xml".to_owned()),
            (StoryKind::Footer, "word/footer1.xml".to_owned()),
        ]
    );
}

#[test]
fn substitution_reaches_every_story() {
    let nested = cell_table(&[&p("{{CNPJ_CLIENTE}}")]);
    let body = format!(
        "{}{}",
        p("Proposta para {{NOME_CLIENTE}}"),
        cell_table(&[&format!("{}{nested}", p("{{QTD_HORA}} x {{VALOR_HORA}}"))]),
    );
    let bytes = template(&body, &p("Rev. {{NUMERO_REVISAO}}"), &p("{{EMAIL_EXECUTIVO}} {{OUTRO}}"));

    let mut doc = Document::from_bytes(&bytes).unwrap();
    let changed = doc.fill(&values(&[
        ("NOME_CLIENTE", "ACME"),
        ("QTD_HORA", "40"),
        ("VALOR_HORA", "R$ 150,00"),
        ("CNPJ_CLIENTE", "00.000.000/0001-00"),
        ("NUMERO_REVISAO", "3"),
        ("EMAIL_EXECUTIVO", "ana@example.com"),
    ]));
    assert_eq!(changed, 5);

    let doc = Document::from_bytes(&doc.to_bytes().unwrap()).unwrap();
    assert_eq!(
        texts(&doc, "word/document.xml"),
        ["Proposta para ACME", "40 x R$ 150,00", "00.000.000/0001-00"]
    );
    assert_eq!(texts(&doc, "word/header1.xml"), ["Rev. 3"]);
    assert_eq!(texts(&doc, "word/footer1.xml"), ["ana@example.com {{OUTRO}}"]);
    assert_eq!(doc.placeholders(), ["OUTRO"]);
}

#[test]
fn untouched_parts_keep_their_bytes() {
    let bytes = template(&p("{{NOME_CLIENTE}}"), &p("plain header"), &p("{{OUTRO}}"));
    let original = Package::from_bytes(&bytes).unwrap();

    let mut doc = Document::from_bytes(&bytes).unwrap();
    doc.fill(&values(&[("NOME_CLIENTE", "ACME")]));
    let filled = Package::from_bytes(&doc.to_bytes().unwrap()).unwrap();

    assert_eq!(
        filled.names().collect::<Vec<_>>(),
        original.names().collect::<Vec<_>>()
    );
    for name in original.names().filter(|name| *name != "word/document.xml") {
        assert_eq!(filled.get(name), original.get(name), "{name} changed");
    }
    assert_ne!(
        filled.get("word/document.xml"),
        original.get("word/document.xml")
    );
}

#[test]
fn scan_sorts_and_deduplicates() {
    let body = format!("{}{}", p("{{B}} and {{A}}"), cell_table(&[&p("{{A}}")]));
    let bytes = template(&body, &p("{{lower}}"), &p(""));
    assert_eq!(scan(&bytes).unwrap(), ["A", "B"]);
}

#[test]
fn logo_replaces_only_the_first_marker() {
    let body = format!("{}{}", p("Intro"), p("[LOGO]"));
    let bytes = template(&body, &p("Header"), &p("[LOGO]"));

    let mut doc = Document::from_bytes(&bytes).unwrap();
    assert!(doc.insert_logo(&png(200, 100), &LogoOptions::default()).unwrap());

    let out = doc.to_bytes().unwrap();
    let doc = Document::from_bytes(&out).unwrap();
    assert_eq!(texts(&doc, "word/document.xml"), ["Intro", ""]);
    assert_eq!(texts(&doc, "word/footer1.xml"), ["[LOGO]"]);
    assert!(drawings(&doc, "word/footer1.xml").is_empty());

    let inline = drawings(&doc, "word/document.xml");
    assert_eq!(inline.len(), 1);
    let extent = inline[0].child("wp:extent").unwrap();
    assert_eq!(extent.attr("cx"), Some("1800000"));
    assert_eq!(extent.attr("cy"), Some("900000"));
    assert_eq!(
        inline[0].child("wp:docPr").and_then(|el| el.attr("id")),
        Some("1")
    );

    let rels = doc.part("word/document.xml").unwrap().rels();
    let image = rels.by_type(rels::rel_type::IMAGE).unwrap();
    assert_eq!(image.id, "rId4");
    assert_eq!(image.target, "media/logo1.png");

    let package = Package::from_bytes(&out).unwrap();
    assert!(package.get("word/media/logo1.png").is_some());
    let types = XmlTree::parse(package.get("[Content_Types].xml").unwrap()).unwrap();
    assert!(types
        .root()
        .elements()
        .any(|el| el.attr("Extension") == Some("png")));
}

#[test]
fn logo_in_footer_gets_its_own_relationship() {
    let bytes = template(&p("{{NOME_CLIENTE}}"), &p("Header"), &p("Logo: [LOGO]"));

    let mut doc = Document::from_bytes(&bytes).unwrap();
    assert!(doc.insert_logo(&png(10, 10), &LogoOptions::default()).unwrap());

    let out = doc.to_bytes().unwrap();
    let package = Package::from_bytes(&out).unwrap();
    let rels = rels::Relationships::parse(
        package
            .get("word/_rels/footer1.xml.rels")
            .expect("footer relationships are created"),
    )
    .unwrap();
    assert_eq!(
        rels.by_type(rels::rel_type::IMAGE).map(|rel| rel.target),
        Some("media/logo1.png")
    );

    let doc = Document::from_bytes(&out).unwrap();
    assert_eq!(drawings(&doc, "word/footer1.xml").len(), 1);
    assert_eq!(texts(&doc, "word/document.xml"), ["{{NOME_CLIENTE}}"]);
}

#[test]
fn logo_in_nested_table_is_found() {
    let nested = cell_table(&[&p("[LOGO]")]);
    let body = cell_table(&[&format!("{}{nested}", p("cell"))]);
    let bytes = template(&body, &p("[LOGO]"), &p(""));

    let mut doc = Document::from_bytes(&bytes).unwrap();
    assert!(doc.insert_logo(&png(10, 10), &LogoOptions::default()).unwrap());
    assert_eq!(drawings(&doc, "word/document.xml").len(), 1);
    assert_eq!(texts(&doc, "word/header1.xml"), ["[LOGO]"]);
}

#[test]
fn missing_marker_leaves_document_alone() {
    let bytes = template(&p("{{NOME_CLIENTE}}"), &p("Header"), &p("Footer"));

    let mut doc = Document::from_bytes(&bytes).unwrap();
    doc.fill(&values(&[("NOME_CLIENTE", "ACME")]));
    let before = doc.to_bytes().unwrap();
    assert!(!doc.insert_logo(&png(10, 10), &LogoOptions::default()).unwrap());
    let after = doc.to_bytes().unwrap();

    let before = Package::from_bytes(&before).unwrap();
    let after = Package::from_bytes(&after).unwrap();
    assert_eq!(
        after.names().collect::<Vec<_>>(),
        before.names().collect::<Vec<_>>()
    );
    for name in before.names() {
        assert_eq!(after.get(name), before.get(name), "{name} changed");
    }
}

#[test]
fn logo_is_only_loaded_when_a_marker_exists() {
    let bytes = template(&p("{{NOME_CLIENTE}}"), &p(""), &p(""));
    let mut doc = Document::from_bytes(&bytes).unwrap();
    let inserted = doc
        .insert_logo_with(&LogoOptions::default(), || -> docfill_std::Result<LogoImage> {
            panic!("logo loaded without a marker")
        })
        .unwrap();
    assert!(!inserted);

    let bytes = template(&p("[LOGO]"), &p(""), &p(""));
    let mut doc = Document::from_bytes(&bytes).unwrap();
    let err = doc.insert_logo_with(&LogoOptions::default(), || {
        LogoImage::from_bytes(b"not an image".to_vec())
    });
    assert!(err.is_err());
    assert_eq!(texts(&doc, "word/document.xml"), ["[LOGO]"]);
}

#[test]
fn unusable_width_falls_back_to_native_size() {
    let bytes = template(&p("[LOGO]"), &p(""), &p(""));
    let options = LogoOptions {
        width: Some(0),
        ..LogoOptions::default()
    };

    let mut doc = Document::from_bytes(&bytes).unwrap();
    assert!(doc.insert_logo(&png(20, 10), &options).unwrap());

    let inline = drawings(&doc, "word/document.xml");
    let extent = inline[0].child("wp:extent").unwrap();
    assert_eq!(extent.attr("cx"), Some("190500"));
    assert_eq!(extent.attr("cy"), Some("95250"));
}

#[test]
fn drawing_ids_skip_existing_ones() {
    let existing = r#"<w:p><w:r><w:drawing><wp:inline xmlns:wp="http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing"><wp:docPr id="7" name="Picture 7"/></wp:inline></w:drawing></w:r></w:p>"#;
    let bytes = template(&p("[LOGO]"), existing, &p(""));

    let mut doc = Document::from_bytes(&bytes).unwrap();
    assert!(doc.insert_logo(&png(10, 10), &LogoOptions::default()).unwrap());

    let inline = drawings(&doc, "word/document.xml");
    assert_eq!(
        inline[0].child("wp:docPr").and_then(|el| el.attr("id")),
        Some("8")
    );
}

#[test]
fn unusual_namespace_prefixes_are_filled() {
    let mut package = Package::from_bytes(&template("", &p("{{NOME_CLIENTE}}"), &p(""))).unwrap();
    package.put(
        "word/document.xml",
        br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<ns0:document xmlns:ns0="http://schemas.openxmlformats.org/wordprocessingml/2006/main" xmlns:rel="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><ns0:body><ns0:p><ns0:r><ns0:t>Cliente: {{NOME_CLIENTE}}</ns0:t></ns0:r></ns0:p><ns0:p><ns0:r><ns0:t>[LOGO]</ns0:t></ns0:r></ns0:p><ns0:sectPr><ns0:headerReference ns0:type="default" rel:id="rId2"/></ns0:sectPr></ns0:body></ns0:document>"#
            .to_vec(),
    );

    let mut doc = Document::from_bytes(&package.to_bytes().unwrap()).unwrap();
    assert_eq!(doc.placeholders(), ["NOME_CLIENTE"]);
    doc.fill(&values(&[("NOME_CLIENTE", "ACME")]));
    assert!(doc.insert_logo(&png(10, 10), &LogoOptions::default()).unwrap());

    let doc = Document::from_bytes(&doc.to_bytes().unwrap()).unwrap();
    assert_eq!(texts(&doc, "word/document.xml"), ["Cliente: ACME", ""]);
    assert_eq!(texts(&doc, "word/header1.xml"), ["ACME"]);
    assert_eq!(drawings(&doc, "word/document.xml").len(), 1);

    let root = doc.part("word/document.xml").unwrap().xml().root();
    assert_eq!(root.name, "w:document");
    assert_eq!(
        root.attr("xmlns:w"),
        Some("http://schemas.openxmlformats.org/wordprocessingml/2006/main")
    );
    assert_eq!(root.attr("xmlns:ns0"), None);
}

#[test]
fn render_and_save_round_trip() {
    let bytes = template(&p("{{NOME_CLIENTE}} [LOGO]"), &p(""), &p(""));
    let out = render(
        &bytes,
        &values(&[("NOME_CLIENTE", "ACME")]),
        Some(&png(10, 10)),
        &LogoOptions::default(),
    )
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.docx");
    Document::from_bytes(&out).unwrap().save(&path).unwrap();

    let doc = Document::open(&path).unwrap();
    assert_eq!(drawings(&doc, "word/document.xml").len(), 1);
    assert!(doc.placeholders().is_empty());
}

#[test]
fn sections_inherit_previous_references() {
    let body = format!(
        r#"{}<w:p><w:pPr><w:sectPr><w:headerReference w:type="default" r:id="rId2"/></w:sectPr></w:pPr></w:p>"#,
        p("first section")
    );
    let mut package = Package::from_bytes(&template(&body, &p("h"), &p("f"))).unwrap();
    // The trailing section only references a footer.
    let main = String::from_utf8(package.get("word/document.xml").unwrap().to_vec()).unwrap();
    let main = main.replace(
        r#"<w:sectPr><w:headerReference w:type="default" r:id="rId2"/><w:footerReference"#,
        r#"<w:sectPr><w:footerReference"#,
    );
    package.put("word/document.xml", main.into_bytes());

    let doc = Document::from_bytes(&package.to_bytes().unwrap()).unwrap();
    assert_eq!(
        doc.sections(),
        [
            Section {
                header: Some("word/header1.xml".into()),
                footer: None,
            },
            Section {
                header: Some("word/header1.xml".into()),
                footer: Some("word/footer1.xml".into()),
            },
        ]
    );
    assert_eq!(doc.stories().len(), 3);
}
