extern crate derive_more;

use nom::character::complete::{char, digit1};
use nom::combinator::{all_consuming, map, map_res, opt};
use nom::sequence::{pair, preceded};
use nom::IResult;

/// A frequency multiplier over the base frequency: `Ratio(1.5)` is a
/// perfect fifth above it.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, derive_more::Display)]
#[repr(transparent)]
pub struct Ratio(pub f64);

fn integer(input: &str) -> IResult<&str, u64> {
    map_res(digit1, str::parse)(input)
}

/// A ratio literal: `3` or `3/2`. A zero denominator resolves to the
/// bare numerator instead of dividing.
fn ratio(input: &str) -> IResult<&str, Ratio> {
    map(
        pair(integer, opt(preceded(char('/'), integer))),
        |(numerator, denominator)| match denominator {
            Some(d) if d != 0 => Ratio(numerator as f64 / d as f64),
            _ => Ratio(numerator as f64),
        },
    )(input)
}

/// Splits a comma separated ratio list, keeping only tokens that are
/// entirely a bare integer or an integer fraction. Everything else is
/// dropped, never an error.
pub fn ratios(input: &str) -> Vec<Ratio> {
    input
        .split(',')
        .map(str::trim)
        .filter_map(|candidate| {
            let result: IResult<&str, Ratio> = all_consuming(ratio)(candidate);
            match result {
                Ok((_, parsed)) => Some(parsed),
                Err(_) => None,
            }
        })
        .collect()
}

#[test]
fn parse_ratio() {
    assert_eq!(ratio("3/2"), Ok(("", Ratio(1.5))));
    assert_eq!(ratio("2"), Ok(("", Ratio(2.0))));
    assert_eq!(ratio("3/0"), Ok(("", Ratio(3.0))));
}

#[test]
fn parse_ratio_list() {
    assert_eq!(
        ratios("1, 9/8, 5/4, 3/2"),
        vec![Ratio(1.0), Ratio(1.125), Ratio(1.25), Ratio(1.5)]
    );
}

#[test]
fn ratio_list_drops_junk() {
    assert_eq!(ratios("1,abc,3/2"), vec![Ratio(1.0), Ratio(1.5)]);
    assert_eq!(ratios("3/,1.5,5/4x"), Vec::<Ratio>::new());
    assert_eq!(ratios(""), Vec::<Ratio>::new());
}
