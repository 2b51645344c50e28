//! Identifier-to-name tables for session metadata.
//!
//! The Session packet carries numeric identifiers for track, session type and
//! weather; these tables turn them into the names used in recording
//! filenames. Unmapped identifiers get a stable fallback rather than an
//! error: the detector is opportunistic and a recording must never fail over
//! a cosmetic lookup.

/// Track name for a track identifier, or `Track{id}` when unmapped.
pub fn track_name(track_id: i8) -> String {
    let name = match track_id {
        0 => "Melbourne",
        2 => "Shanghai",
        3 => "Bahrain",
        4 => "Catalunya",
        5 => "Monaco",
        6 => "Montreal",
        7 => "Silverstone",
        9 => "Hungaroring",
        10 => "Spa",
        11 => "Monza",
        12 => "Singapore",
        13 => "Suzuka",
        14 => "AbuDhabi",
        15 => "Texas",
        16 => "Brazil",
        17 => "Austria",
        19 => "Mexico",
        20 => "Baku",
        26 => "Zandvoort",
        27 => "Imola",
        29 => "Jeddah",
        30 => "Miami",
        31 => "LasVegas",
        32 => "Losail",
        39 => "Silverstone_Rev",
        40 => "Austria_Rev",
        41 => "Zandvoort_Rev",
        _ => return format!("Track{track_id}"),
    };
    name.to_string()
}

/// Session type name for a session type identifier.
pub fn session_type_name(session_type: u8) -> &'static str {
    match session_type {
        1 => "P1",
        2 => "P2",
        3 => "P3",
        4 => "Practice",
        5 => "Q1",
        6 => "Q2",
        7 => "Q3",
        8 => "Qualifying",
        9 => "OneShotQ",
        10 => "SS1",
        11 => "SS2",
        12 => "SS3",
        13 => "SprintShootout",
        14 => "OneShotSS",
        15 => "Race",
        16 => "Race2",
        17 => "Race3",
        18 => "TimeTrial",
        _ => "Unknown",
    }
}

/// Weather condition name for a weather identifier.
pub fn weather_name(weather: u8) -> &'static str {
    match weather {
        0 => "Clear",
        1 => "LightCloud",
        2 => "Overcast",
        3 => "LightRain",
        4 => "HeavyRain",
        5 => "Storm",
        _ => "Unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_identifiers_resolve() {
        assert_eq!(track_name(5), "Monaco");
        assert_eq!(track_name(10), "Spa");
        assert_eq!(session_type_name(15), "Race");
        assert_eq!(session_type_name(8), "Qualifying");
        assert_eq!(weather_name(0), "Clear");
        assert_eq!(weather_name(5), "Storm");
    }

    #[test]
    fn unmapped_identifiers_get_fallbacks() {
        assert_eq!(track_name(99), "Track99");
        assert_eq!(track_name(-3), "Track-3");
        assert_eq!(session_type_name(0), "Unknown");
        assert_eq!(session_type_name(200), "Unknown");
        assert_eq!(weather_name(42), "Unknown");
    }
}
