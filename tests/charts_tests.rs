use setlist_charts::{extract_charts, parse_chart_page, Glyph, LayoutConfig, PageContent};

fn line_glyphs(text: &str, x0: f64, pitch: f64, top: f64) -> Vec<Glyph> {
    text.chars()
        .enumerate()
        .filter(|(_, c)| *c != ' ')
        .map(|(i, c)| Glyph::new(c.to_string(), x0 + pitch * i as f64, top))
        .collect()
}

fn wagon_wheel_glyphs() -> Vec<Glyph> {
    let mut g = line_glyphs("Wagon Wheel", 200.0, 9.0, 50.0);
    g.extend(line_glyphs("Key of G", 210.0, 9.0, 65.0));
    g.extend(line_glyphs("G   D", 40.0, 6.0, 100.0));
    g.extend(line_glyphs("Hello", 40.0, 6.0, 112.0));
    g.extend(line_glyphs("Bye", 40.0, 6.0, 136.0));
    g.extend(line_glyphs("7", 300.0, 6.0, 700.0));
    g
}

#[test]
fn plain_text_fallback_without_glyphs() {
    let text = "Wagon Wheel\nKey of A - Capo 2\nG D\nHeaded down south\n3\n";
    let rec = parse_chart_page(4, text, &[], &LayoutConfig::default()).expect("record");
    assert_eq!(rec.page, 4);
    assert_eq!(rec.title, "Wagon Wheel");
    assert_eq!(rec.notes, "Key of A - Capo 2");
    assert_eq!(rec.body, "G D\nHeaded down south");
}

#[test]
fn glyph_body_preserves_spacing_and_blank_lines() {
    let text = "Wagon Wheel\nKey of G\nG D\nHello\nBye\n7";
    let rec = parse_chart_page(1, text, &wagon_wheel_glyphs(), &LayoutConfig::default()).expect("record");
    assert_eq!(rec.title, "Wagon Wheel");
    assert_eq!(rec.notes, "Key of G");
    assert_eq!(rec.body, "G   D\nHello\n\nBye");
}

#[test]
fn header_only_page_has_empty_body() {
    let rec = parse_chart_page(2, "Jolene\nKey of Am", &line_glyphs("Jolene", 0.0, 6.0, 10.0), &LayoutConfig::default())
        .expect("record");
    assert_eq!(rec.title, "Jolene");
    assert_eq!(rec.body, "");
}

#[test]
fn pages_with_fewer_than_two_lines_are_skipped() {
    let cfg = LayoutConfig::default();
    assert!(parse_chart_page(1, "", &[], &cfg).is_none());
    assert!(parse_chart_page(1, "Only a title\n12\n   \n", &[], &cfg).is_none());
}

#[test]
fn extract_charts_keys_by_page_number() {
    let pages = vec![
        PageContent { number: 1, text: "Cover".to_string(), glyphs: vec![] },
        PageContent { number: 2, text: "Jolene\nKey of Am\nAm C G Am".to_string(), glyphs: vec![] },
        PageContent { number: 3, text: "Wagon Wheel\nKey of G\nG D Em C".to_string(), glyphs: vec![] },
    ];
    let charts = extract_charts(&pages, &LayoutConfig::default());
    assert_eq!(charts.keys().copied().collect::<Vec<_>>(), vec![2, 3]);
    assert_eq!(charts[&3].title, "Wagon Wheel");
}
