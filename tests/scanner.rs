use loxpp::prelude::Scanner;

#[test]
fn scanner_works() {
    let input = "2 and 3";
    let tokens = Scanner::new("<test>", input)
        .scan_tokens()
        .expect("failed to scan");
    assert_eq!(tokens.len(), 4);
}
