use midly::num::{u14, u7};

/// A4 in 12-TET: MIDI key 69 at 440 Hz.
static CONCERT_A_KEY: f64 = 69.0;
static CONCERT_A_HZ: f64 = 440.0;

/// Bend range GM instruments assume, in semitones either way.
static BEND_RANGE: f64 = 2.0;
static BEND_CENTER: f64 = 8192.0;

/// Maps an arbitrary frequency to the nearest equal-temperament key and
/// the pitch-bend value that corrects the remainder. Frequencies that
/// land outside the MIDI key range come back as `None`.
pub fn key_and_bend(frequency: f64) -> Option<(u7, u14)> {
    if frequency <= 0.0 {
        return None;
    }
    let semitones = CONCERT_A_KEY + 12.0 * (frequency / CONCERT_A_HZ).log2();
    let key = semitones.round();
    if key < 0.0 || key > 127.0 {
        return None;
    }
    let bend = BEND_CENTER + (semitones - key) / BEND_RANGE * BEND_CENTER;
    Some((u7::from(key as u8), u14::new(bend.round() as u16)))
}

#[test]
fn key_of_concert_a() {
    assert_eq!(key_and_bend(440.0), Some((u7::from(69), u14::new(8192))));
    assert_eq!(key_and_bend(880.0), Some((u7::from(81), u14::new(8192))));
    assert_eq!(key_and_bend(220.0), Some((u7::from(57), u14::new(8192))));
}

#[test]
fn bend_of_just_intervals() {
    // 3/2 over 440Hz: two cents shy of the tempered fifth
    let (key, bend) = key_and_bend(660.0).unwrap();
    assert_eq!(key, u7::from(76));
    assert_eq!(bend, u14::new(8272));
    // 5/4: a just third sits 14 cents under the tempered one
    let (key, bend) = key_and_bend(550.0).unwrap();
    assert_eq!(key, u7::from(73));
    assert!(bend < u14::new(8192));
}

#[test]
fn rejects_unplayable_frequencies() {
    assert_eq!(key_and_bend(0.0), None);
    assert_eq!(key_and_bend(-440.0), None);
    assert_eq!(key_and_bend(100000.0), None);
}
