//! Pure helpers a player needs around playlist items: resolving something
//! loadable from an audio payload, and the remaining-time label.

use podcast_proto::protocol::PodcastAudio;

pub fn mime_type(audio_type: &str) -> Option<&'static str> {
    match audio_type {
        "mp3" => Some("audio/mpeg"),
        "wav" => Some("audio/wav"),
        _ => None,
    }
}

/// Prefer the hosted URL; otherwise build a `data:` URI from the embedded
/// base64 bytes.  An empty string means the payload is unplayable.
pub fn audio_src(audio: &PodcastAudio) -> String {
    if !audio.url.is_empty() {
        return audio.url.clone();
    }

    match mime_type(&audio.audio_type) {
        Some(mime) if !audio.data.is_empty() => format!("data:{mime};base64,{}", audio.data),
        _ => String::new(),
    }
}

/// `duration - current`, or zero when that isn't a positive finite number.
pub fn remaining_secs(duration: f64, current: f64) -> f64 {
    let remaining = duration - current;
    if remaining.is_finite() && remaining > 0.0 {
        remaining
    } else {
        0.0
    }
}

/// `m:ss`, with `0:00` for anything negative or not finite.
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_string();
    }
    let whole = seconds.floor() as u64;
    format!("{}:{:02}", whole / 60, whole % 60)
}

pub fn format_remaining(duration: f64, current: f64) -> String {
    format_time(remaining_secs(duration, current))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(audio_type: &str, url: &str, data: &str) -> PodcastAudio {
        PodcastAudio {
            audio_type: audio_type.to_string(),
            url: url.to_string(),
            data: data.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_url_wins_over_data() {
        let audio = payload("mp3", "https://cdn.example.com/a.mp3", "SUQz");
        assert_eq!(audio_src(&audio), "https://cdn.example.com/a.mp3");
    }

    #[test]
    fn test_data_uri_from_known_type() {
        assert_eq!(
            audio_src(&payload("mp3", "", "SUQz")),
            "data:audio/mpeg;base64,SUQz"
        );
        assert_eq!(
            audio_src(&payload("wav", "", "UklG")),
            "data:audio/wav;base64,UklG"
        );
    }

    #[test]
    fn test_unplayable_payloads_resolve_empty() {
        assert_eq!(audio_src(&payload("m3u8", "", "SUQz")), "");
        assert_eq!(audio_src(&payload("mp3", "", "")), "");
        assert_eq!(audio_src(&PodcastAudio::default()), "");
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(7.9), "0:07");
        assert_eq!(format_time(65.0), "1:05");
        assert_eq!(format_time(3600.0), "60:00");
        assert_eq!(format_time(-3.0), "0:00");
        assert_eq!(format_time(f64::INFINITY), "0:00");
        assert_eq!(format_time(f64::NAN), "0:00");
    }

    #[test]
    fn test_remaining_is_clamped() {
        assert_eq!(remaining_secs(120.0, 30.5), 89.5);
        assert_eq!(remaining_secs(30.0, 45.0), 0.0);
        assert_eq!(remaining_secs(f64::NAN, 1.0), 0.0);
        assert_eq!(format_remaining(125.0, 0.0), "2:05");
        assert_eq!(format_remaining(f64::INFINITY, 10.0), "0:00");
    }
}
