#![no_main]
use btex_core::{assist, Direction, Options, StructuralDocument, TextEdit};
use btex_syntax::Position;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Every analysis must tolerate arbitrary text, and an edit must leave the
    // cache equal to a fresh analysis of the result.
    let s = String::from_utf8_lossy(data);
    let mut mid = s.len() / 2;
    while !s.is_char_boundary(mid) {
        mid += 1;
    }
    let (text, insert) = s.split_at(mid);
    let mut document = StructuralDocument::new(text, Options::default());
    let _ = document.validate();

    let lines = document.line_count();
    for line in 1..=lines.min(8) {
        for column in 1..=8 {
            let position = Position::new(line, column);
            let _ = document.detect_mode(position);
            let _ = document.highlight(position);
            let _ = assist::linked_environment_names(&document, position);
            let _ = btex_core::match_environment(document.tokens(), position, None, Direction::Forward);
            let _ = btex_core::match_environment(document.tokens(), position, None, Direction::Backward);
        }
    }

    document.apply_edit(&TextEdit::insert(Position::new(1, 2), insert));
    let fresh = StructuralDocument::new(&document.text(), Options::default());
    assert_eq!(document.tokens(), fresh.tokens());
});
