extern crate derive_more;
use std::cmp::min;

use midly::num::{u15, u24, u28, u4, u7};
use midly::{Header, MetaMessage, MidiMessage, PitchBend, Smf, Track, TrackEvent, TrackEventKind};

use crate::midi::pitch::key_and_bend;
use crate::notation::rhythm::{Beats, Event};
use crate::notation::scale::Ratio;

// Number of ticks since the beginning of the track.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    derive_more::Add,
    derive_more::Sub,
    derive_more::Display,
)]
#[repr(transparent)]
pub struct Tick(pub u64);

static TICKS_PER_BEAT: u16 = 48;

/// How long a sounding beat actually rings: a short fixed pulse, the
/// rest of the event's span is silence before the next one.
static PULSE_TICKS: u64 = 12;

static PERCUSSION_CHANNEL: u8 = 9;
static SCALE_CHANNEL: u8 = 0;

// https://computermusicresource.com/GM.Percussion.KeyMap.html
static TRACK_KEYS: [u8; 6] = [75, 76, 56, 54, 77, 60];

/// GM percussion key for the n-th polyrhythm track, wrapping around
/// when there are more tracks than mapped keys.
fn track_key(index: usize) -> u7 {
    u7::from(TRACK_KEYS[index % TRACK_KEYS.len()])
}

impl Beats {
    fn to_ticks(&self) -> Tick {
        Tick((self.0 * TICKS_PER_BEAT as f64).round() as u64)
    }
}

#[test]
fn test_beats_to_ticks() {
    assert_eq!(Beats(1.0).to_ticks(), Tick(48));
    assert_eq!(Beats(0.75).to_ticks(), Tick(36));
    assert_eq!(Beats(1.0 / 3.0).to_ticks(), Tick(16));
}

fn percussion<'a>(key: u7, on: bool) -> TrackEventKind<'a> {
    let message = if on {
        MidiMessage::NoteOn {
            key,
            vel: u7::from(120),
        }
    } else {
        MidiMessage::NoteOff {
            key,
            vel: u7::from(0),
        }
    };
    TrackEventKind::Midi {
        channel: u4::from(PERCUSSION_CHANNEL),
        message,
    }
}

/// Lays one expanded rhythm track out on an absolute tick timeline.
/// Sounding events pulse for `PULSE_TICKS` (clamped to the event's own
/// span), rests only advance the clock.
fn rhythm_track<'a>(events: &[Event], key: u7) -> Vec<(Tick, TrackEventKind<'a>)> {
    let mut time = Tick(0);
    let mut out = Vec::new();
    for event in events {
        let length = event.value.to_ticks();
        if !event.is_rest {
            let pulse = min(length, Tick(PULSE_TICKS));
            out.push((time, percussion(key, true)));
            out.push((time + pulse, percussion(key, false)));
        }
        time = time + length;
    }
    out
}

#[test]
fn test_rhythm_track() {
    let key = track_key(0);
    let events = vec![
        Event::beat(Beats(1.0)),
        Event::rest(Beats(1.0)),
        Event::beat(Beats(1.0)),
    ];
    assert_eq!(
        rhythm_track(&events, key),
        vec![
            (Tick(0), percussion(key, true)),
            (Tick(12), percussion(key, false)),
            (Tick(96), percussion(key, true)),
            (Tick(108), percussion(key, false)),
        ]
    );
}

#[test]
fn test_rhythm_track_short_pulse() {
    let key = track_key(1);
    let events = vec![Event::beat(Beats(1.0 / 8.0)), Event::beat(Beats(1.0))];
    // a 6-tick event cannot ring for the full 12-tick pulse
    assert_eq!(
        rhythm_track(&events, key),
        vec![
            (Tick(0), percussion(key, true)),
            (Tick(6), percussion(key, false)),
            (Tick(6), percussion(key, true)),
            (Tick(18), percussion(key, false)),
        ]
    );
}

/// Lays the scale out sequentially, one beat per tone: a pitch-bend
/// correction, then the tone itself. Ratios that leave the MIDI key
/// range are skipped, their slot stays silent.
fn scale_track<'a>(scale: &[Ratio], base_frequency: f64) -> Vec<(Tick, TrackEventKind<'a>)> {
    let channel = u4::from(SCALE_CHANNEL);
    let mut time = Tick(0);
    let mut out = Vec::new();
    for ratio in scale {
        if let Some((key, bend)) = key_and_bend(base_frequency * ratio.0) {
            out.push((
                time,
                TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::PitchBend {
                        bend: PitchBend(bend),
                    },
                },
            ));
            out.push((
                time,
                TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOn {
                        key,
                        vel: u7::from(96),
                    },
                },
            ));
            out.push((
                time + Tick(TICKS_PER_BEAT as u64),
                TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::NoteOff {
                        key,
                        vel: u7::from(0),
                    },
                },
            ));
        }
        time = time + Tick(TICKS_PER_BEAT as u64);
    }
    out
}

/// Absolute ticks to MIDI delta times, with the end-of-track marker
/// appended.
fn to_track<'a>(mut events: Vec<(Tick, TrackEventKind<'a>)>) -> Track<'a> {
    events.sort_by_key(|(tick, _)| *tick);
    let mut time = Tick(0);
    let mut track = Track::new();
    for (tick, kind) in events {
        let delta = tick - time;
        time = tick;
        track.push(TrackEvent {
            delta: u28::new(delta.0 as u32),
            kind,
        });
    }
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });
    track
}

#[test]
fn test_to_track_deltas() {
    let key = track_key(0);
    let track = to_track(vec![
        (Tick(0), percussion(key, true)),
        (Tick(12), percussion(key, false)),
        (Tick(96), percussion(key, true)),
        (Tick(108), percussion(key, false)),
    ]);
    let deltas: Vec<u32> = track.iter().map(|e| e.delta.as_int()).collect();
    assert_eq!(deltas, vec![0, 12, 84, 12, 0]);
    assert_eq!(
        track.last().unwrap().kind,
        TrackEventKind::Meta(MetaMessage::EndOfTrack)
    );
}

/// Builds the full MIDI file: a conductor track carrying the tempo,
/// one melodic track for the scale when there is one, and one
/// percussion track per rhythm track. The beat length in milliseconds
/// becomes the quarter-note tempo.
pub fn create_smf<'a>(
    scale: &[Ratio],
    tracks: &[Vec<Event>],
    base_frequency: f64,
    beat_ms: u32,
) -> Smf<'a> {
    let mut out = Vec::new();
    out.push(to_track(vec![(
        Tick(0),
        TrackEventKind::Meta(MetaMessage::Tempo(u24::new(beat_ms * 1000))),
    )]));
    if !scale.is_empty() {
        out.push(to_track(scale_track(scale, base_frequency)));
    }
    for (index, track) in tracks.iter().enumerate() {
        out.push(to_track(rhythm_track(track, track_key(index))));
    }
    Smf {
        header: Header {
            format: midly::Format::Parallel,
            timing: midly::Timing::Metrical(u15::new(TICKS_PER_BEAT)),
        },
        tracks: out,
    }
}

#[test]
fn test_create_smf() {
    use crate::notation::rhythm::expand_tracks;
    use crate::notation::scale::ratios;

    let tracks = expand_tracks("3;4,4");
    let smf = create_smf(&ratios("1,3/2"), &tracks, 440.0, 500);
    // conductor + scale + two rhythm tracks
    assert_eq!(smf.tracks.len(), 4);
    assert_eq!(smf.header.timing, midly::Timing::Metrical(u15::new(48)));
    assert_eq!(
        smf.tracks[0][0].kind,
        TrackEventKind::Meta(MetaMessage::Tempo(u24::new(500000)))
    );
    // the padded 3-beat track pulses once, ending at tick 12
    let first_end: u32 = smf.tracks[2].iter().map(|e| e.delta.as_int()).sum();
    let second_end: u32 = smf.tracks[3].iter().map(|e| e.delta.as_int()).sum();
    assert_eq!(first_end, 12);
    assert_eq!(second_end, (8 - 4) * 48 + 12);
}

#[test]
fn test_track_key_wraps() {
    assert_eq!(track_key(0), track_key(TRACK_KEYS.len()));
    assert_ne!(track_key(0), track_key(1));
}
