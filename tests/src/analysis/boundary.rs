use crate::asm::solc_dispatcher;
use selscope_analysis::boundary::{DEFAULT_RESULT_CAPACITY, flatten, unflatten, write_selectors};
use selscope_analysis::function_selectors;
use selscope_core::signature::selector_of;
use selscope_utils::errors::BoundaryError;

fn selectors(n: usize) -> Vec<[u8; 4]> {
    (0..n).map(|i| selector_of(&format!("f{i}()"))).collect()
}

#[test]
fn test_host_round_trip() {
    let expected = selectors(8);
    let code = solc_dispatcher(&expected).unwrap();

    let mut out = vec![0u8; DEFAULT_RESULT_CAPACITY];
    let written = write_selectors(&code, 0, &mut out).unwrap();
    assert_eq!(written, expected.len() * 4);
    assert_eq!(unflatten(&out[..written]).unwrap(), expected);
    assert_eq!(flatten(&function_selectors(&code, 0)), out[..written]);
}

#[test]
fn test_exact_fit_and_one_short() {
    let code = solc_dispatcher(&selectors(3)).unwrap();

    let mut exact = [0u8; 12];
    assert_eq!(write_selectors(&code, 0, &mut exact), Ok(12));

    let mut short = [0u8; 11];
    assert_eq!(
        write_selectors(&code, 0, &mut short),
        Err(BoundaryError::BufferTooSmall {
            needed: 12,
            capacity: 11
        })
    );
    assert_eq!(short, [0u8; 11]);
}

#[test]
fn test_analysis_anomalies_are_not_boundary_errors() {
    let mut out = [0u8; 16];
    // truncated push, jump past the end, and a tiny budget
    assert_eq!(write_selectors(&[0x7f, 0x01], 0, &mut out), Ok(0));
    assert_eq!(write_selectors(&[0x61, 0xff, 0xff, 0x56], 0, &mut out), Ok(0));
    let code = solc_dispatcher(&selectors(2)).unwrap();
    assert!(write_selectors(&code, 3, &mut out).is_ok());
}
