use super::font::{FONT_12X16, FONT_16X32, FONT_5X8, FONT_8X8};
use super::*;

#[test]
fn draw_mode_combine() {
    assert_eq!(DrawMode::Add.combine(0b1010, 0b0110), 0b1110);
    assert_eq!(DrawMode::Subtract.combine(0b1010, 0b0110), 0b1000);
    assert_eq!(DrawMode::Invert.combine(0b1010, 0b0110), 0b1100);
}

#[test]
fn panel_rows() {
    assert_eq!(PanelRows::from_rows(32), Ok(PanelRows::R32));
    assert_eq!(PanelRows::from_rows(64), Ok(PanelRows::R64));
    assert_eq!(PanelRows::from_rows(48), Err(DeviceError::InvalidConfig));

    assert_eq!(Bitmap::new(PanelRows::R32).as_bytes().len(), 512);
    assert_eq!(Bitmap::new(PanelRows::R64).as_bytes().len(), 1024);
}

#[test]
fn pixels_use_page_layout() {
    let mut bm = Bitmap::new(PanelRows::R64);

    bm.set_pixel(9, 3, DrawMode::Add);
    assert_eq!(bm.as_bytes()[COLUMNS + 3], 0b10);
    assert!(bm.pixel(9, 3));

    bm.set_pixel(9, 3, DrawMode::Invert);
    assert!(!bm.pixel(9, 3));
    bm.set_pixel(9, 3, DrawMode::Invert);
    bm.set_pixel(9, 3, DrawMode::Subtract);
    assert!(!bm.pixel(9, 3));
}

#[test]
fn pixels_outside_are_clipped() {
    let mut bm = Bitmap::new(PanelRows::R32);
    bm.set_pixel(-1, 0, DrawMode::Add);
    bm.set_pixel(0, -1, DrawMode::Add);
    bm.set_pixel(32, 0, DrawMode::Add);
    bm.set_pixel(0, 128, DrawMode::Add);

    assert!(bm.as_bytes().iter().all(|b| *b == 0));
}

#[test]
fn lines() {
    let mut bm = Bitmap::new(PanelRows::R64);
    bm.draw_line(2, 0, 2, 4, DrawMode::Add);
    assert_eq!(&bm.as_bytes()[..6], &[4, 4, 4, 4, 4, 0]);

    let mut bm = Bitmap::new(PanelRows::R64);
    bm.draw_line(0, 0, 3, 3, DrawMode::Add);
    assert_eq!(&bm.as_bytes()[..4], &[1, 2, 4, 8]);

    // vertical line running off the bottom
    let mut bm = Bitmap::new(PanelRows::R32);
    bm.draw_line(28, 5, 40, 5, DrawMode::Add);
    assert_eq!(bm.as_bytes()[3 * COLUMNS + 5], 0xf0);
}

#[test]
fn rect_outline_and_fill() {
    let mut bm = Bitmap::new(PanelRows::R64);
    bm.draw_rect(3, 3, 0, 0, false, DrawMode::Add);
    assert_eq!(&bm.as_bytes()[..5], &[0x0f, 0x09, 0x09, 0x0f, 0]);

    let mut bm = Bitmap::new(PanelRows::R64);
    bm.draw_rect(0, 0, 3, 3, true, DrawMode::Add);
    assert_eq!(&bm.as_bytes()[..5], &[0x0f, 0x0f, 0x0f, 0x0f, 0]);

    bm.draw_rect(1, 1, 2, 2, true, DrawMode::Invert);
    assert_eq!(&bm.as_bytes()[..5], &[0x0f, 0x09, 0x09, 0x0f, 0]);
}

#[test]
fn font_glyphs() {
    assert_eq!(FONT_5X8.width(), 5);
    assert_eq!(FONT_5X8.height(), 8);
    assert_eq!(FONT_5X8.glyph('A'), Some(&[0x7e, 0x11, 0x11, 0x11, 0x7e][..]));
    assert_eq!(FONT_5X8.glyph('~').map(|g| g.len()), Some(5));
    assert_eq!(FONT_5X8.glyph('\n'), None);
    assert_eq!(FONT_5X8.glyph('é'), None);
}

#[test]
fn built_in_sizes() {
    for (font, width, height) in [(&FONT_8X8, 8, 8), (&FONT_12X16, 12, 16), (&FONT_16X32, 16, 32)] {
        assert_eq!((font.width(), font.height()), (width, height));
        assert_eq!(font.glyph('~').map(|g| g.len()), Some(width * height / 8));
    }
    assert_eq!(
        FONT_8X8.glyph('A'),
        Some(&[0, 0x7e, 0x11, 0x11, 0x11, 0x7e, 0, 0][..])
    );

    let mut bm = Bitmap::new(PanelRows::R64);
    bm.draw_char(0, 0, 'A', &FONT_12X16, DrawMode::Add);
    // first 5x8 column 0x7e doubled: columns 1 and 2, rows 2 to 13
    assert!(!bm.pixel(0, 1) && !bm.pixel(1, 1));
    assert!(bm.pixel(2, 1) && bm.pixel(13, 2));
    assert!(!bm.pixel(14, 1) && !bm.pixel(2, 0));

    let mut bm = Bitmap::new(PanelRows::R64);
    bm.draw_char(0, 0, 'A', &FONT_16X32, DrawMode::Add);
    assert!(!bm.pixel(3, 0) && bm.pixel(4, 0) && bm.pixel(27, 2));
    assert!(!bm.pixel(28, 2));
    assert!((0..32).all(|r| !bm.pixel(r, 15)));
}

#[test]
fn tall_glyphs_span_pages() {
    #[rustfmt::skip]
    let tall = [
        2, 16,
        0x01, 0x80, 0x00, 0xff, // ' '
        0x02, 0x00, 0x00, 0x01, // !
    ];
    let font = Font::new(&tall);
    assert_eq!(font.pages(), 2);
    assert_eq!(font.glyph('!'), Some(&[0x02, 0x00, 0x00, 0x01][..]));

    let mut bm = Bitmap::new(PanelRows::R32);
    assert_eq!(bm.draw_text(10, 0, " !", &font, DrawMode::Add), 4);

    assert!(bm.pixel(10, 0) && bm.pixel(25, 0));
    assert!((18..26).all(|r| bm.pixel(r, 1)));
    assert!(!bm.pixel(17, 1));
    assert!(bm.pixel(11, 2) && bm.pixel(18, 3));
    let lit = (0..32)
        .flat_map(|r| (0..COLUMNS as i32).map(move |c| (r, c)))
        .filter(|(r, c)| bm.pixel(*r, *c))
        .count();
    assert_eq!(lit, 2 + 8 + 2);
}

#[test]
fn text_advances_by_font_width() {
    let mut bm = Bitmap::new(PanelRows::R64);
    let end = bm.draw_text(0, 0, "AB", &FONT_5X8, DrawMode::Add);

    assert_eq!(end, 10);
    assert_eq!(&bm.as_bytes()[..5], FONT_5X8.glyph('A').unwrap());
    assert_eq!(&bm.as_bytes()[5..10], FONT_5X8.glyph('B').unwrap());

    let narrow = [3, 8, 0xff, 0xff, 0xff];
    let font = Font::new(&narrow);
    let mut bm = Bitmap::new(PanelRows::R64);
    // only ' ' has a glyph; other characters still advance
    assert_eq!(bm.draw_text(0, 0, "x x", &font, DrawMode::Add), 9);
    assert_eq!(&bm.as_bytes()[..9], &[0, 0, 0, 0xff, 0xff, 0xff, 0, 0, 0]);
}

#[test]
fn text_is_clipped_not_wrapped() {
    let mut bm = Bitmap::new(PanelRows::R64);
    let end = bm.draw_text(0, 125, "AB", &FONT_5X8, DrawMode::Add);

    assert_eq!(end, 130);
    assert_eq!(&bm.as_bytes()[125..128], &[0x7e, 0x11, 0x11]);
    assert!(bm.as_bytes()[COLUMNS..].iter().all(|b| *b == 0));
    assert!(bm.as_bytes()[..125].iter().all(|b| *b == 0));
}

#[test]
fn text_between_pages() {
    let mut bm = Bitmap::new(PanelRows::R64);
    bm.draw_char(4, 0, '|', &FONT_5X8, DrawMode::Add);

    assert_eq!(bm.as_bytes()[2], 0xf0);
    assert_eq!(bm.as_bytes()[COLUMNS + 2], 0x07);
}

#[test]
fn layer_highlight() {
    let mut bm = Bitmap::new(PanelRows::R32);
    bm.set_active_layers(&[true, false, true]);

    let page0 = &bm.as_bytes()[..COLUMNS];
    assert_eq!(page0[0], 0);
    assert!(page0[1..8].iter().all(|b| *b == 0xfe));
    assert!(page0[8..17].iter().all(|b| *b == 0));
    assert!(page0[17..24].iter().all(|b| *b == 0xfe));
    assert!(page0[24..].iter().all(|b| *b == 0));
    assert_eq!(bm.active_layers(), 0b101);

    bm.set_active_layers(&[false, true]);
    let page0 = &bm.as_bytes()[..COLUMNS];
    assert!(page0[1..8].iter().all(|b| *b == 0));
    assert!(page0[9..16].iter().all(|b| *b == 0xfe));
    assert!(page0[17..24].iter().all(|b| *b == 0xfe));
    assert_eq!(bm.active_layers(), 0b110);
}

#[test]
fn layer_cells_stop_at_sixteen() {
    let mut bm = Bitmap::new(PanelRows::R32);
    bm.set_active_layers(&[true; 20]);

    assert_eq!(bm.active_layers(), 0xffff);
    assert_eq!(bm.as_bytes()[127], 0xfe);
    assert!(bm.as_bytes()[COLUMNS..].iter().all(|b| *b == 0));
}
