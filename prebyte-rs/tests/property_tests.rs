use proptest::prelude::*;
use prebyte::script::scan::{Delimiters, Scanner, Segment};
use prebyte::Prebyte;

proptest! {
    /// Text without the delimiter character comes back byte for byte.
    #[test]
    fn delimiter_free_text_round_trips(s in "[^%]*") {
        let out = Prebyte::new().process(&s).unwrap();
        prop_assert_eq!(out, s);
    }

    /// The engine returns Ok or Err on any input, never panics.
    #[test]
    fn engine_does_not_panic(s in "(\\PC|%%|%%#|\n){0,64}") {
        let _ = Prebyte::new().process(&s);
    }

    /// Scanned segments reassemble into the input.
    #[test]
    fn scanner_covers_input(s in "([a-z \n]|%%[a-z ]{0,6}%%|%%#[a-z ]{0,6}\n){0,16}") {
        let delims = Delimiters::new("%%", "%%");
        let mut scanner = Scanner::new(&s);
        let mut joined = String::new();
        while let Some(segment) = scanner.next_segment(&delims).unwrap() {
            match segment {
                Segment::Literal(text) => joined.push_str(text),
                Segment::Action(action) => joined.push_str(action.raw),
            }
        }
        prop_assert_eq!(joined, s);
    }

    /// A bound variable expands to its value.
    #[test]
    fn set_variable_expands(name in "[A-Z][A-Z0-9_]{0,8}", value in "[a-z0-9 ]{1,16}") {
        prop_assume!(name != "ARGS");
        let mut p = Prebyte::new();
        p.set_variable(&name, &value).unwrap();
        let out = p.process(&format!("<%%{name}%%>")).unwrap();
        prop_assert_eq!(out, format!("<{value}>"));
    }
}
