extern crate derive_more;

use nom::character::complete::{char, digit1};
use nom::combinator::{all_consuming, map_res, recognize};
use nom::sequence::{pair, preceded};
use nom::IResult;

/// A span of time measured in beats. `Beats(0.75)` is three quarters of
/// a beat, whatever the beat length ends up being at playback time.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    PartialOrd,
    derive_more::Add,
    derive_more::Sub,
    derive_more::Display,
)]
#[repr(transparent)]
pub struct Beats(pub f64);

/// One timed unit of the expanded sequence: either a sounding beat or a
/// rest, lasting `value` beats. `value` is always positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event {
    pub value: Beats,
    pub is_rest: bool,
}

impl Event {
    pub fn beat(value: Beats) -> Self {
        Event {
            value,
            is_rest: false,
        }
    }

    pub fn rest(value: Beats) -> Self {
        Event {
            value,
            is_rest: true,
        }
    }
}

fn parse_int(input: &str) -> Option<u64> {
    let result: IResult<&str, u64> = all_consuming(map_res(digit1, str::parse))(input);
    match result {
        Ok((_, number)) => Some(number),
        Err(_) => None,
    }
}

/// Greedy `x<digits>` repeat suffix directly after a closed group.
fn repeat_suffix(input: &str) -> IResult<&str, &str> {
    recognize(pair(char('x'), digit1))(input)
}

/// Splits a notation string into top-level tokens. Commas separate
/// tokens, but not inside `[...]` or `(...)` regions; those come out as
/// single tokens, with an `x<digits>` suffix attached when present.
/// An unterminated bracket swallows the rest of the string into one
/// token that no expansion rule will match.
pub fn tokenize(input: &str) -> Vec<&str> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'[' | b'(' => {
                if depth == 0 {
                    push_token(&mut tokens, &input[start..i]);
                    start = i;
                }
                depth += 1;
                i += 1;
            }
            // Any close character drops the depth, matching or not.
            b']' | b')' if depth > 0 => {
                depth -= 1;
                i += 1;
                if depth == 0 {
                    if let Ok((_, suffix)) = repeat_suffix(&input[i..]) {
                        i += suffix.len();
                    }
                    tokens.push(&input[start..i]);
                    start = i;
                }
            }
            b',' if depth == 0 => {
                push_token(&mut tokens, &input[start..i]);
                i += 1;
                start = i;
            }
            _ => i += 1,
        }
    }
    push_token(&mut tokens, &input[start..]);
    tokens
}

fn push_token<'a>(tokens: &mut Vec<&'a str>, raw: &'a str) {
    let token = raw.trim();
    if !token.is_empty() {
        tokens.push(token);
    }
}

#[test]
fn tokenize_top_level() {
    assert_eq!(tokenize("3,4,5"), vec!["3", "4", "5"]);
    assert_eq!(tokenize(" 3 , 4 "), vec!["3", "4"]);
    assert_eq!(tokenize("3,,5"), vec!["3", "5"]);
    assert_eq!(tokenize(""), Vec::<&str>::new());
}

#[test]
fn tokenize_groups() {
    assert_eq!(tokenize("[3,4]x2,(2)"), vec!["[3,4]x2", "(2)"]);
    assert_eq!(tokenize("[[1,1]x2,2]x2"), vec!["[[1,1]x2,2]x2"]);
    assert_eq!(tokenize("(1,(2))"), vec!["(1,(2))"]);
    assert_eq!(tokenize("3,[2]x4"), vec!["3", "[2]x4"]);
}

#[test]
fn tokenize_unterminated() {
    assert_eq!(tokenize("[1,2"), vec!["[1,2"]);
    assert_eq!(tokenize("3,(4"), vec!["3", "(4"]);
}

/// `[<inner>]x<N>` with the suffix exactly `x` plus digits; the inner
/// text runs to the last `]` so nested groups stay intact.
fn repeat_group(token: &str) -> Option<(&str, u32)> {
    let (inner, suffix) = token.strip_prefix('[')?.rsplit_once(']')?;
    let result: IResult<&str, u32> =
        all_consuming(preceded(char('x'), map_res(digit1, str::parse)))(suffix);
    match result {
        Ok((_, times)) => Some((inner, times)),
        Err(_) => None,
    }
}

/// `(<inner>)`: everything inside plays as silence.
fn rest_group(token: &str) -> Option<&str> {
    token.strip_prefix('(')?.strip_suffix(')')
}

/// A duration literal: `3` is three beats, `3/4` is three quarters of a
/// beat. The numerator must be all digits; a denominator that is zero
/// or not entirely digits falls back to the bare numerator. Segments
/// past a second `/` are ignored.
fn duration(token: &str) -> Option<Beats> {
    let mut parts = token.split('/');
    let numerator = parts.next().and_then(parse_int)?;
    match parts.next().and_then(parse_int) {
        Some(denominator) if denominator != 0 => {
            Some(Beats(numerator as f64 / denominator as f64))
        }
        _ => Some(Beats(numerator as f64)),
    }
}

#[test]
fn parse_duration() {
    assert_eq!(duration("3"), Some(Beats(3.0)));
    assert_eq!(duration("1/4"), Some(Beats(0.25)));
    assert_eq!(duration("3/0"), Some(Beats(3.0)));
    assert_eq!(duration("3/x"), Some(Beats(3.0)));
    assert_eq!(duration("3/4/5"), Some(Beats(0.75)));
    assert_eq!(duration("abc"), None);
    assert_eq!(duration("3a"), None);
    assert_eq!(duration(""), None);
}

/// Expands a notation string into a flat sequence of timed events.
///
/// Tokens resolve in order, first rule wins: a repeat group appends its
/// expanded inner sequence N times, a rest group silences its inner
/// sequence while keeping the durations, `=` repeats the last resolved
/// duration as a new sounding beat, a duration literal sounds as
/// written. Anything else is dropped without stopping the remaining
/// tokens. Every call owns its own last-duration state, so ties never
/// reach across group boundaries.
pub fn expand(input: &str) -> Vec<Event> {
    let mut events = Vec::new();
    let mut last_duration: Option<Beats> = None;
    for token in tokenize(input) {
        if let Some((inner, times)) = repeat_group(token) {
            let expanded = expand(inner);
            for _ in 0..times {
                events.extend_from_slice(&expanded);
            }
        } else if let Some(inner) = rest_group(token) {
            let silenced = expand(inner);
            if let Some(event) = silenced.last() {
                last_duration = Some(event.value);
            }
            events.extend(silenced.into_iter().map(|e| Event::rest(e.value)));
        } else if token == "=" {
            if let Some(value) = last_duration {
                events.push(Event::beat(value));
            }
        } else if let Some(value) = duration(token) {
            if value > Beats(0.0) {
                last_duration = Some(value);
                events.push(Event::beat(value));
            }
        }
    }
    events
}

/// Sum of the event durations, in beats.
pub fn total_beats(events: &[Event]) -> Beats {
    events.iter().fold(Beats(0.0), |total, e| total + e.value)
}

/// Expands a multi-track notation string, tracks separated by `;`, and
/// pads every track shorter than the longest with a single trailing
/// rest so all tracks span the same total time. Tracks are expanded in
/// full isolation from each other.
pub fn expand_tracks(input: &str) -> Vec<Vec<Event>> {
    let mut tracks: Vec<Vec<Event>> = input
        .split(';')
        .map(|segment| expand(segment.trim()))
        .collect();
    let longest = tracks
        .iter()
        .map(|track| total_beats(track))
        .fold(Beats(0.0), |a, b| if b > a { b } else { a });
    for track in tracks.iter_mut() {
        let length = total_beats(track);
        if length < longest {
            track.push(Event::rest(longest - length));
        }
    }
    tracks
}

#[test]
fn expand_plain() {
    assert_eq!(
        expand("3,4,5"),
        vec![
            Event::beat(Beats(3.0)),
            Event::beat(Beats(4.0)),
            Event::beat(Beats(5.0))
        ]
    );
    assert_eq!(expand("1/4,1/2"), vec![
        Event::beat(Beats(0.25)),
        Event::beat(Beats(0.5))
    ]);
}

#[test]
fn expand_repeats() {
    assert_eq!(
        expand("[3,4]x2"),
        vec![
            Event::beat(Beats(3.0)),
            Event::beat(Beats(4.0)),
            Event::beat(Beats(3.0)),
            Event::beat(Beats(4.0))
        ]
    );
    assert_eq!(expand("[2]x0"), vec![]);
    // a group without a repeat suffix matches no rule
    assert_eq!(expand("[1,2]"), vec![]);
}

#[test]
fn expand_nested_repeats() {
    let expected_half = vec![
        Event::beat(Beats(1.0)),
        Event::beat(Beats(1.0)),
        Event::beat(Beats(1.0)),
        Event::beat(Beats(1.0)),
        Event::beat(Beats(2.0)),
    ];
    let mut expected = expected_half.clone();
    expected.extend_from_slice(&expected_half);
    assert_eq!(expand("[[1,1]x2,2]x2"), expected);
}

#[test]
fn expand_rests() {
    assert_eq!(
        expand("(3,4)"),
        vec![Event::rest(Beats(3.0)), Event::rest(Beats(4.0))]
    );
    assert_eq!(
        expand("3,(1),3"),
        vec![
            Event::beat(Beats(3.0)),
            Event::rest(Beats(1.0)),
            Event::beat(Beats(3.0))
        ]
    );
    assert_eq!(expand("()"), vec![]);
}

#[test]
fn expand_ties() {
    assert_eq!(
        expand("3,="),
        vec![Event::beat(Beats(3.0)), Event::beat(Beats(3.0))]
    );
    // no prior duration, nothing to repeat
    assert_eq!(expand("="), vec![]);
    // a rest group leaves its final duration behind for a tie
    assert_eq!(
        expand("(3),="),
        vec![Event::rest(Beats(3.0)), Event::beat(Beats(3.0))]
    );
    // a repeat group does not
    assert_eq!(expand("[3]x1,="), vec![Event::beat(Beats(3.0))]);
}

#[test]
fn expand_drops_junk() {
    assert_eq!(
        expand("3,??,4"),
        vec![Event::beat(Beats(3.0)), Event::beat(Beats(4.0))]
    );
    assert_eq!(expand("[1,2"), vec![]);
    assert_eq!(expand("(3)x2"), vec![]);
    assert_eq!(expand("0,5"), vec![Event::beat(Beats(5.0))]);
    assert_eq!(expand("0/5,5"), vec![Event::beat(Beats(5.0))]);
}

#[test]
fn expand_is_pure() {
    let first = expand("[3,4]x2,(2),=");
    let second = expand("[3,4]x2,(2),=");
    assert_eq!(first, second);
}

#[test]
fn test_total_beats() {
    assert_eq!(total_beats(&expand("3,4,5")), Beats(12.0));
    assert_eq!(total_beats(&[]), Beats(0.0));
}

#[test]
fn align_tracks() {
    let tracks = expand_tracks("3;5;4");
    assert_eq!(tracks.len(), 3);
    for track in &tracks {
        assert_eq!(total_beats(track), Beats(5.0));
    }
    assert_eq!(
        tracks[0],
        vec![Event::beat(Beats(3.0)), Event::rest(Beats(2.0))]
    );
    assert_eq!(tracks[1], vec![Event::beat(Beats(5.0))]);
    assert_eq!(
        tracks[2],
        vec![Event::beat(Beats(4.0)), Event::rest(Beats(1.0))]
    );
}

#[test]
fn align_empty_track() {
    let tracks = expand_tracks("3;??");
    assert_eq!(tracks[1], vec![Event::rest(Beats(3.0))]);
    // ties do not reach across the track separator
    assert_eq!(expand_tracks("3;="), expand_tracks("3;??"));
    // nothing valid anywhere leaves every track empty
    assert_eq!(expand_tracks("??;!!"), vec![vec![], vec![]]);
}

// 3,4,5        beats of three, four and five
// [3,4]x2      3,4,3,4
// (2)          two beats of silence
// 3,=          3,3
// 3;4,4        two tracks, the first padded with a five beat rest
