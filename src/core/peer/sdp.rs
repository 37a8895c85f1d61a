//! Minimal session-description parsing and answer generation.
//!
//! Offers arrive as SDP-style text. Only the structure the signaling endpoint
//! needs is modeled: session-level lines are validated for shape and media
//! sections (`m=` lines) are parsed into typed descriptions. Answer generation
//! accepts every offered audio section and rejects everything else by zeroing
//! its port, per standard offer/answer rules.

use std::fmt;

use uuid::Uuid;

use super::SignalingError;

/// Media kind declared by an `m=` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
    Other(String),
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Audio => write!(f, "audio"),
            MediaKind::Video => write!(f, "video"),
            MediaKind::Other(kind) => write!(f, "{kind}"),
        }
    }
}

/// One parsed media section of a session description.
#[derive(Debug, Clone)]
pub struct MediaSection {
    pub kind: MediaKind,
    pub port: u16,
    pub protocol: String,
    /// Payload format identifiers, in offer order.
    pub formats: Vec<String>,
}

impl MediaSection {
    pub fn is_audio(&self) -> bool {
        self.kind == MediaKind::Audio
    }
}

/// A parsed session description.
#[derive(Debug, Clone)]
pub struct SessionDescription {
    pub media: Vec<MediaSection>,
}

impl SessionDescription {
    /// Parse an offer. Requires a `v=` version line and at least one media
    /// section; malformed lines are rejected rather than skipped so a caller
    /// never negotiates against a description it half-understood.
    pub fn parse(raw: &str) -> Result<Self, SignalingError> {
        let mut saw_version = false;
        let mut media = Vec::new();

        for line in raw.lines() {
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            if line.starts_with("v=") {
                saw_version = true;
                continue;
            }
            if let Some(rest) = line.strip_prefix("m=") {
                media.push(parse_media_line(rest)?);
            }
            // Attribute, origin, and connection lines carry nothing the
            // gateway negotiates on; they pass through unexamined.
        }

        if !saw_version {
            return Err(SignalingError::MalformedOffer(
                "missing v= version line".to_string(),
            ));
        }
        if media.is_empty() {
            return Err(SignalingError::MalformedOffer(
                "no media sections in offer".to_string(),
            ));
        }

        Ok(Self { media })
    }

    /// Audio sections of the description, in offer order.
    pub fn audio_sections(&self) -> impl Iterator<Item = &MediaSection> {
        self.media.iter().filter(|m| m.is_audio())
    }

    pub fn has_audio(&self) -> bool {
        self.audio_sections().next().is_some()
    }
}

fn parse_media_line(rest: &str) -> Result<MediaSection, SignalingError> {
    let mut parts = rest.split_whitespace();
    let kind = parts
        .next()
        .ok_or_else(|| SignalingError::MalformedOffer("empty m= line".to_string()))?;
    let port = parts
        .next()
        .and_then(|p| p.parse::<u16>().ok())
        .ok_or_else(|| {
            SignalingError::MalformedOffer(format!("invalid port in m={kind} line"))
        })?;
    let protocol = parts
        .next()
        .ok_or_else(|| {
            SignalingError::MalformedOffer(format!("missing protocol in m={kind} line"))
        })?
        .to_string();
    let formats: Vec<String> = parts.map(str::to_string).collect();

    let kind = match kind {
        "audio" => MediaKind::Audio,
        "video" => MediaKind::Video,
        other => MediaKind::Other(other.to_string()),
    };

    Ok(MediaSection {
        kind,
        port,
        protocol,
        formats,
    })
}

/// Generate the answer description for an accepted offer.
///
/// Audio sections are mirrored back with their offered formats; non-audio
/// sections are declined with a zero port. Section order matches the offer,
/// as answers must.
pub fn build_answer(offer: &SessionDescription, session_id: Uuid) -> String {
    let mut answer = String::new();
    answer.push_str("v=0\r\n");
    answer.push_str("o=aria-gateway 0 0 IN IP4 0.0.0.0\r\n");
    answer.push_str(&format!("s={session_id}\r\n"));
    answer.push_str("t=0 0\r\n");

    for section in &offer.media {
        let port = if section.is_audio() { section.port } else { 0 };
        answer.push_str(&format!(
            "m={} {} {} {}\r\n",
            section.kind,
            port,
            section.protocol,
            section.formats.join(" ")
        ));
        if section.is_audio() {
            answer.push_str("a=recvonly\r\n");
        }
    }

    answer
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUDIO_OFFER: &str = "v=0\r\no=- 1 1 IN IP4 127.0.0.1\r\ns=call\r\nt=0 0\r\nm=audio 49170 RTP/AVP 0 8\r\na=sendrecv\r\n";

    #[test]
    fn test_parse_audio_offer() {
        let desc = SessionDescription::parse(AUDIO_OFFER).unwrap();
        assert_eq!(desc.media.len(), 1);
        assert!(desc.has_audio());
        let audio = desc.audio_sections().next().unwrap();
        assert_eq!(audio.port, 49170);
        assert_eq!(audio.formats, vec!["0", "8"]);
    }

    #[test]
    fn test_parse_rejects_missing_version() {
        let err = SessionDescription::parse("m=audio 49170 RTP/AVP 0\r\n").unwrap_err();
        assert!(matches!(err, SignalingError::MalformedOffer(_)));
    }

    #[test]
    fn test_parse_rejects_bad_port() {
        let offer = "v=0\r\nm=audio notaport RTP/AVP 0\r\n";
        let err = SessionDescription::parse(offer).unwrap_err();
        assert!(matches!(err, SignalingError::MalformedOffer(_)));
    }

    #[test]
    fn test_video_only_offer_has_no_audio() {
        let offer = "v=0\r\nm=video 51372 RTP/AVP 96\r\n";
        let desc = SessionDescription::parse(offer).unwrap();
        assert!(!desc.has_audio());
    }

    #[test]
    fn test_answer_mirrors_audio_and_declines_video() {
        let offer = "v=0\r\nm=audio 49170 RTP/AVP 0 8\r\nm=video 51372 RTP/AVP 96\r\n";
        let desc = SessionDescription::parse(offer).unwrap();
        let answer = build_answer(&desc, Uuid::nil());

        assert!(answer.contains("m=audio 49170 RTP/AVP 0 8"));
        // Declined sections keep their position but get a zero port.
        assert!(answer.contains("m=video 0 RTP/AVP 96"));
        let audio_pos = answer.find("m=audio").unwrap();
        let video_pos = answer.find("m=video").unwrap();
        assert!(audio_pos < video_pos);
    }
}
