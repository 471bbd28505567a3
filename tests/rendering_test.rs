//! Rasterization of text, clipping and annotations, seen through checkbox counts.

mod common;

use common::{build_pdf, gray_image, Appearance, FontSpec, MockOcr, TestPage};
use formscan::{extract_bytes, DocumentExtractor, Error};

fn count(page: TestPage) -> Vec<u32> {
    let pdf = build_pdf(vec![page]);
    DocumentExtractor::from_bytes(&pdf)
        .unwrap()
        .count_checkboxes()
        .unwrap()
}

const WIDGET_BOX: &str = "0 G 1 w 1 1 14 14 re S";

#[test]
fn test_type3_glyph_box_is_counted() {
    let page = TestPage::new()
        .font("T3", FontSpec::Type3Box)
        .graphics("BT /T3 16 Tf 100 400 Td (a) Tj ET");
    assert_eq!(count(page), vec![1]);
}

#[test]
fn test_type3_glyphs_advance() {
    let page = TestPage::new()
        .font("T3", FontSpec::Type3Box)
        .graphics("BT /T3 16 Tf 100 400 Td (aaa) Tj ET");
    assert_eq!(count(page), vec![3]);
}

#[test]
fn test_truetype_glyph_boxes_are_counted() {
    let page = TestPage::new()
        .font("TT", FontSpec::TrueTypeBox)
        .graphics("BT /TT 20 Tf 100 400 Td (OOO) Tj ET");
    assert_eq!(count(page), vec![3]);
}

#[test]
fn test_text_positioning_operators() {
    // One box per line via T*, one placed by Tm, one shifted by a TJ kern.
    let page = TestPage::new().font("TT", FontSpec::TrueTypeBox).graphics(
        "BT /TT 20 Tf 30 TL 100 600 Td (O) Tj T* (O) Tj \
         1 0 0 1 300 300 Tm (O) Tj [-2000 (O)] TJ ET",
    );
    assert_eq!(count(page), vec![4]);
}

#[test]
fn test_invisible_text_is_not_counted() {
    let page = TestPage::new()
        .font("TT", FontSpec::TrueTypeBox)
        .graphics("BT /TT 20 Tf 3 Tr 100 400 Td (OOO) Tj ET");
    assert_eq!(count(page), vec![0]);
}

#[test]
fn test_unknown_font_draws_nothing() {
    let page = TestPage::new()
        .graphics("BT /Missing 20 Tf 100 400 Td (OOO) Tj ET")
        .checkbox(300.0, 300.0, 20.0);
    assert_eq!(count(page), vec![1]);
}

#[test]
fn test_clipped_box_is_not_counted() {
    let page = TestPage::new().graphics("q 0 0 50 50 re W n 0 G 1 w 100 100 20 20 re S Q");
    assert_eq!(count(page), vec![0]);
}

#[test]
fn test_box_inside_clip_is_counted() {
    let page = TestPage::new().graphics("q 0 0 200 200 re W n 0 G 1 w 100 100 20 20 re S Q");
    assert_eq!(count(page), vec![1]);
}

#[test]
fn test_clip_ends_with_restore() {
    let page = TestPage::new()
        .graphics("q 0 0 50 50 re W n Q")
        .checkbox(100.0, 100.0, 20.0);
    assert_eq!(count(page), vec![1]);
}

#[test]
fn test_clip_applies_to_text() {
    let page = TestPage::new()
        .font("TT", FontSpec::TrueTypeBox)
        .graphics("q 0 0 125 800 re W n BT /TT 20 Tf 100 400 Td (OOO) Tj ET Q");
    assert_eq!(count(page), vec![1]);
}

#[test]
fn test_form_is_clipped_to_bbox() {
    // The form's box is 200 units wide; a square drawn at 250 falls outside.
    let page = TestPage::new()
        .graphics("q 1 0 0 1 100 100 cm /Fm1 Do Q")
        .form_with_image(
            "Fm1",
            "q 0 G 1 w 10 10 20 20 re S 250 10 20 20 re S Q",
            "Inner",
            gray_image(2, 2, 240),
        );
    assert_eq!(count(page), vec![1]);
}

#[test]
fn test_widget_appearance_is_counted() {
    let page = TestPage::new().widget(
        [100.0, 400.0, 116.0, 416.0],
        4,
        Appearance::Single(WIDGET_BOX.into()),
    );
    assert_eq!(count(page), vec![1]);
}

#[test]
fn test_hidden_widget_is_not_counted() {
    let hidden = TestPage::new().widget(
        [100.0, 400.0, 116.0, 416.0],
        2,
        Appearance::Single(WIDGET_BOX.into()),
    );
    assert_eq!(count(hidden), vec![0]);

    let no_view = TestPage::new().widget(
        [100.0, 400.0, 116.0, 416.0],
        32,
        Appearance::Single(WIDGET_BOX.into()),
    );
    assert_eq!(count(no_view), vec![0]);
}

#[test]
fn test_widget_state_picks_appearance() {
    let states = |current: &str| Appearance::States {
        current: current.into(),
        states: vec![("Off".into(), String::new()), ("Yes".into(), WIDGET_BOX.into())],
    };

    let off = TestPage::new().widget([100.0, 400.0, 116.0, 416.0], 4, states("Off"));
    assert_eq!(count(off), vec![0]);

    let on = TestPage::new().widget([100.0, 400.0, 116.0, 416.0], 4, states("Yes"));
    assert_eq!(count(on), vec![1]);
}

#[test]
fn test_dangling_xobject_fails_page() {
    let pdf = build_pdf(vec![TestPage::new()
        .xobject("Im1", gray_image(4, 4, 240))
        .dangling_xobject("Im2")]);

    match extract_bytes(&pdf, &MockOcr::new()) {
        Err(Error::PageRender { page, .. }) => assert_eq!(page, 1),
        other => panic!("expected page render error, got {:?}", other),
    }
}

#[test]
fn test_drawing_dangling_xobject_fails_count() {
    let pdf = build_pdf(vec![TestPage::new()
        .graphics("q 20 0 0 20 100 100 cm /Im9 Do Q")
        .dangling_xobject("Im9")]);
    let result = DocumentExtractor::from_bytes(&pdf).unwrap().count_checkboxes();
    assert!(matches!(result, Err(Error::PageRender { page: 1, .. })), "{:?}", result);
}
