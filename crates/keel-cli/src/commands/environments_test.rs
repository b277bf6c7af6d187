use super::*;

#[test]
fn test_all_is_default() {
    assert_eq!(format_environments(), "ALL (default)\nCLOUD\nEMULATOR\n");
}
