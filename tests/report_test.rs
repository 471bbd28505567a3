//! Integration tests for report output.

mod common;

use std::fs;

use common::{build_pdf, gray_image, MockOcr, TestPage};
use formscan::{
    count_checkboxes, extract_file, render, ChartOptions, DirectorySink, Document, Error,
    ExtractOptions, Formscan, JsonFormat, NoOcr,
};
use tempfile::TempDir;

fn write_form(dir: &TempDir) -> std::path::PathBuf {
    let pdf = build_pdf(vec![
        TestPage::new()
            .text("Section A")
            .checkbox(72.0, 500.0, 14.0)
            .checkbox(72.0, 470.0, 14.0)
            .checkbox(72.0, 440.0, 14.0)
            .xobject("Im1", gray_image(6, 4, 240)),
        TestPage::new().text("Section B").checkbox(72.0, 500.0, 14.0),
    ]);
    let path = dir.path().join("form.pdf");
    fs::write(&path, pdf).unwrap();
    path
}

#[test]
fn test_report_written_to_directory() {
    let dir = TempDir::new().unwrap();
    let input = write_form(&dir);
    let out = dir.path().join("reports");

    let result = Formscan::new()
        .with_ocr(MockOcr::new())
        .extract(&input)
        .unwrap();
    let artifacts = result.write_to(&DirectorySink::new(&out), "form").unwrap();

    let json = fs::read_to_string(&artifacts.json).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["checkbox_count"], 4);
    assert_eq!(value["pages"][0]["page_number"], 1);
    assert_eq!(value["pages"][0]["images"][0]["index"], 1);
    assert_eq!(value["pages"][0]["images"][0]["ocr_text"], "text 6x4");
    assert_eq!(value["pages"][1]["images"].as_array().unwrap().len(), 0);

    let chart = image::open(artifacts.chart.unwrap()).unwrap();
    assert_eq!((chart.width(), chart.height()), (800, 480));
}

#[test]
fn test_report_round_trips_through_json() {
    let dir = TempDir::new().unwrap();
    let doc = extract_file(write_form(&dir), &NoOcr).unwrap();

    let json = render::to_json(&doc, JsonFormat::Compact).unwrap();
    let parsed: Document = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.pages(), doc.pages());
    assert_eq!(parsed.checkbox_count(), doc.checkbox_count());
}

#[test]
fn test_no_ocr_gives_empty_image_text() {
    let dir = TempDir::new().unwrap();
    let doc = extract_file(write_form(&dir), &NoOcr).unwrap();
    let images = &doc.get_page(1).unwrap().images;
    assert_eq!(images.len(), 1);
    assert!(images[0].ocr_text.is_empty());
}

#[test]
fn test_count_checkboxes_from_file() {
    let dir = TempDir::new().unwrap();
    let counts = count_checkboxes(write_form(&dir), ExtractOptions::new()).unwrap();
    assert_eq!(counts, vec![3, 1]);
}

#[test]
fn test_custom_chart_size() {
    let dir = TempDir::new().unwrap();
    let result = Formscan::new()
        .without_ocr()
        .with_chart(ChartOptions::default().with_size(320, 200))
        .extract(write_form(&dir))
        .unwrap();

    let png = result.chart_png().unwrap();
    let chart = image::load_from_memory(&png).unwrap();
    assert_eq!((chart.width(), chart.height()), (320, 200));
}

#[test]
fn test_missing_input_file() {
    let result = extract_file("/nonexistent/dir/form.pdf", &NoOcr);
    assert!(matches!(result, Err(Error::Io(_))));
}

#[test]
fn test_failed_extraction_writes_nothing() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("broken.pdf");
    fs::write(&input, b"%PDF-1.7\ngarbage").unwrap();
    let out = dir.path().join("reports");

    let result = Formscan::new().without_ocr().extract(&input);
    assert!(result.is_err());
    assert!(!out.exists());
}
