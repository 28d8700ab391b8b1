//! XMLTV document encoding
//!
//! Converts the normalized channel/program model into an XMLTV document.
//! Encoding is pure and deterministic for a given timezone and input, and
//! it never fails outright: a program with a malformed episode number is
//! emitted with best-effort content and a recorded warning.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use regex_lite::Regex;
use tracing::warn;

use crate::types::{Channel, FirstRun, ProgramRecord};

/// An encoded XMLTV document plus any non-fatal warnings recorded while
/// encoding individual programs
#[derive(Debug, Clone)]
pub struct XmltvDocument {
    /// The document text, UTF-8, XML 1.0, indented
    pub xml: String,
    /// Non-fatal per-program degradations (e.g., unparsable episode numbers)
    pub warnings: Vec<String>,
}

/// Repeat/new marker for one programme
#[derive(Debug, Clone, PartialEq, Eq)]
enum StatusMarker {
    New,
    /// `start` carries the original airdate timestamp when the airdate's
    /// calendar date differs from the broadcast date
    PreviouslyShown { start: Option<String> },
}

/// Encodes channels and programs into XMLTV markup
pub struct XmltvEncoder {
    timezone: Tz,
    generator_name: String,
    generator_url: String,
}

impl XmltvEncoder {
    /// Create an encoder rendering instants in the given timezone.
    pub fn new(
        timezone: Tz,
        generator_name: impl Into<String>,
        generator_url: impl Into<String>,
    ) -> Self {
        Self {
            timezone,
            generator_name: generator_name.into(),
            generator_url: generator_url.into(),
        }
    }

    /// Encode the full document: one `channel` element per channel, one
    /// `programme` element per program record.
    pub fn encode(&self, channels: &[Channel], programs: &[ProgramRecord]) -> XmltvDocument {
        let mut xml = String::new();
        let mut warnings = Vec::new();

        xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
        xml.push_str(&format!(
            "<tv source-info-name=\"HDHomeRun\" generator-info-name=\"{}\" generator-info-url=\"{}\">\n",
            escape_xml(&self.generator_name),
            escape_xml(&self.generator_url)
        ));

        for channel in channels {
            self.write_channel(&mut xml, channel);
        }
        for program in programs {
            self.write_programme(&mut xml, program, &mut warnings);
        }

        xml.push_str("</tv>\n");
        XmltvDocument { xml, warnings }
    }

    fn write_channel(&self, xml: &mut String, channel: &Channel) {
        xml.push_str(&format!(
            "  <channel id=\"{}\">\n",
            escape_xml(&channel.guide_number)
        ));
        xml.push_str(&format!(
            "    <display-name lang=\"en\">{}</display-name>\n",
            escape_xml(&channel.guide_name)
        ));
        if let Some(icon) = &channel.icon_url {
            if !icon.is_empty() {
                xml.push_str(&format!("    <icon src=\"{}\" />\n", escape_xml(icon)));
            }
        }
        xml.push_str("  </channel>\n");
    }

    fn write_programme(
        &self,
        xml: &mut String,
        program: &ProgramRecord,
        warnings: &mut Vec<String>,
    ) {
        let start = self.wall_clock(program.start_time);
        let stop = self.wall_clock(program.end_time);

        xml.push_str(&format!(
            "  <programme start=\"{}\" stop=\"{}\" channel=\"{}\">\n",
            start,
            stop,
            escape_xml(&program.guide_number)
        ));

        xml.push_str(&format!(
            "    <title lang=\"en\">{}</title>\n",
            escape_xml(&program.title)
        ));

        if let Some(episode_title) = &program.episode_title {
            xml.push_str(&format!(
                "    <sub-title lang=\"en\">{}</sub-title>\n",
                escape_xml(episode_title)
            ));
        }

        if let Some(synopsis) = &program.synopsis {
            xml.push_str(&format!(
                "    <desc lang=\"en\">{}</desc>\n",
                escape_xml(&clean_text(synopsis))
            ));
        }

        for filter in &program.filters {
            xml.push_str(&format!(
                "    <category lang=\"en\">{}</category>\n",
                escape_xml(filter)
            ));
        }

        if let Some(icon) = &program.icon_url {
            xml.push_str(&format!("    <icon src=\"{}\" />\n", escape_xml(icon)));
        }

        if let Some(raw) = &program.episode_number {
            xml.push_str(&format!(
                "    <episode-num system=\"onscreen\">{}</episode-num>\n",
                escape_xml(raw)
            ));
            match interchange_numbering(raw) {
                Ok(Some(numbering)) => {
                    xml.push_str(&format!(
                        "    <episode-num system=\"xmltv_ns\">{}</episode-num>\n",
                        numbering
                    ));
                }
                Ok(None) => {}
                Err(message) => {
                    warn!(title = %program.title, %message, "episode number not translated");
                    warnings.push(message);
                }
            }
        }

        match self.episode_status(program) {
            Some(StatusMarker::New) => xml.push_str("    <new />\n"),
            Some(StatusMarker::PreviouslyShown { start: Some(start) }) => {
                xml.push_str(&format!("    <previously-shown start=\"{}\" />\n", start));
            }
            Some(StatusMarker::PreviouslyShown { start: None }) => {
                xml.push_str("    <previously-shown />\n");
            }
            None => {}
        }

        xml.push_str("  </programme>\n");
    }

    /// Decide the repeat/new marker for one program.
    ///
    /// An explicit first-run flag wins. Otherwise the original airdate's
    /// calendar date (in the output timezone) is compared against the
    /// broadcast date; a differing date is a repeat regardless of the
    /// flag, matching the upstream guide semantics this library inherits.
    fn episode_status(&self, program: &ProgramRecord) -> Option<StatusMarker> {
        match program.first_run {
            FirstRun::New => Some(StatusMarker::New),
            flag => {
                if let Some(airdate) = program.original_airdate {
                    let air_local = airdate.with_timezone(&self.timezone);
                    let start_local = program.start_time.with_timezone(&self.timezone);
                    if air_local.date_naive() != start_local.date_naive() {
                        Some(StatusMarker::PreviouslyShown {
                            start: Some(air_local.format("%Y%m%d%H%M%S").to_string()),
                        })
                    } else if flag == FirstRun::Repeat {
                        Some(StatusMarker::PreviouslyShown { start: None })
                    } else {
                        None
                    }
                } else if flag == FirstRun::Repeat {
                    Some(StatusMarker::PreviouslyShown { start: None })
                } else {
                    None
                }
            }
        }
    }

    /// Render an instant as an XMLTV wall-clock timestamp with offset.
    fn wall_clock(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.timezone)
            .format("%Y%m%d%H%M%S %z")
            .to_string()
    }
}

/// Translate a vendor "S<season>E<episode>" string into the zero-based
/// xmltv_ns "season.episode.part/total" form.
///
/// Returns `Ok(None)` when the string does not carry the S/E pattern at
/// all, and `Err` with a warning message when the pattern is present but
/// the digit runs do not parse.
fn interchange_numbering(raw: &str) -> Result<Option<String>, String> {
    let (s_idx, e_idx) = match (raw.find('S'), raw.find('E')) {
        (Some(s), Some(e)) => (s, e),
        _ => return Ok(None),
    };

    let parsed = raw
        .get(s_idx + 1..e_idx)
        .and_then(|s| s.parse::<i64>().ok())
        .zip(raw.get(e_idx + 1..).and_then(|e| e.parse::<i64>().ok()));

    match parsed {
        // Vendor numbering is 1-based, xmltv_ns is 0-based.
        Some((season, episode)) => Ok(Some(format!("{}.{}.0/0", season - 1, episode - 1))),
        None => Err(format!("could not parse episode number: {}", raw)),
    }
}

/// Clean description text: drop control characters, bracketed all-caps
/// feature tags like `[HD,CC]`, and embedded season/episode fragments
/// that duplicate the structured episode-number field.
fn clean_text(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|&c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
        .collect();

    let mut cleaned = cleaned;
    if let Ok(re) = Regex::new(r"\[[A-Z,]+\]") {
        cleaned = re.replace_all(&cleaned, "").into_owned();
    }
    if let Ok(re) = Regex::new(r"\(?[SE]?\d+\s?Ep\s?\d+[\d/]*\)?") {
        cleaned = re.replace_all(&cleaned, "").into_owned();
    }
    cleaned.trim().to_string()
}

/// Escape text for XML element content and attribute values.
fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn channel(guide_number: &str, name: &str) -> Channel {
        Channel {
            guide_number: guide_number.to_string(),
            guide_name: name.to_string(),
            stream_url: format!("http://10.0.0.2:5004/auto/v{}", guide_number),
            icon_url: None,
        }
    }

    fn program(start: i64, title: &str, guide_number: &str) -> ProgramRecord {
        ProgramRecord {
            title: title.to_string(),
            start_time: Utc.timestamp_opt(start, 0).unwrap(),
            end_time: Utc.timestamp_opt(start + 1800, 0).unwrap(),
            guide_number: guide_number.to_string(),
            synopsis: None,
            episode_title: None,
            episode_number: None,
            icon_url: None,
            original_airdate: None,
            filters: Vec::new(),
            first_run: FirstRun::Unknown,
        }
    }

    fn encoder() -> XmltvEncoder {
        XmltvEncoder::new(chrono_tz::UTC, "hdhr-epg", "https://example.invalid/hdhr-epg")
    }

    // --- episode numbering ---

    #[test]
    fn test_interchange_numbering() {
        assert_eq!(
            interchange_numbering("S04E12").unwrap(),
            Some("3.11.0/0".to_string())
        );
        assert_eq!(
            interchange_numbering("S1E2").unwrap(),
            Some("0.1.0/0".to_string())
        );
    }

    #[test]
    fn test_interchange_numbering_pattern_absent() {
        assert_eq!(interchange_numbering("105").unwrap(), None);
        assert_eq!(interchange_numbering("EP105").unwrap(), None);
        // Lowercase does not match; the pattern is case-sensitive.
        assert_eq!(interchange_numbering("s01e05").unwrap(), None);
    }

    #[test]
    fn test_interchange_numbering_parse_failure() {
        assert!(interchange_numbering("SxEy").is_err());
        assert!(interchange_numbering("S01E").is_err());
        assert!(interchange_numbering("E05S01").is_err());
    }

    #[test]
    fn test_interchange_numbering_zero_values_mirror_vendor() {
        assert_eq!(
            interchange_numbering("S00E00").unwrap(),
            Some("-1.-1.0/0".to_string())
        );
    }

    proptest! {
        #[test]
        fn prop_valid_codes_translate(season in 1i64..100, episode in 1i64..100) {
            let raw = format!("S{:02}E{:02}", season, episode);
            let numbering = interchange_numbering(&raw).unwrap().unwrap();
            prop_assert_eq!(numbering, format!("{}.{}.0/0", season - 1, episode - 1));
        }
    }

    // --- text cleaning / escaping ---

    #[test]
    fn test_clean_text_strips_control_characters() {
        assert_eq!(clean_text("a\u{0}b\u{7}c"), "abc");
        assert_eq!(clean_text("line1\nline2"), "line1\nline2");
    }

    #[test]
    fn test_clean_text_strips_feature_tags() {
        assert_eq!(clean_text("A thrilling finale. [HD,CC]"), "A thrilling finale.");
    }

    #[test]
    fn test_clean_text_strips_episode_fragments() {
        assert_eq!(clean_text("The gang returns. (S4 Ep12)"), "The gang returns.");
    }

    #[test]
    fn test_escape_xml() {
        assert_eq!(
            escape_xml(r#"<Tom & Jerry's "Best">"#),
            "&lt;Tom &amp; Jerry&apos;s &quot;Best&quot;&gt;"
        );
    }

    // --- repeat/new decision table ---

    #[test]
    fn test_status_new_always_wins() {
        let enc = encoder();
        let mut p = program(1_700_000_000, "Show", "5.1");
        p.first_run = FirstRun::New;
        assert_eq!(enc.episode_status(&p), Some(StatusMarker::New));

        // Even with a differing airdate.
        p.original_airdate = Some(Utc.timestamp_opt(1_600_000_000, 0).unwrap());
        assert_eq!(enc.episode_status(&p), Some(StatusMarker::New));
    }

    #[test]
    fn test_status_differing_airdate_carries_timestamp() {
        let enc = encoder();
        for flag in [FirstRun::Repeat, FirstRun::Unknown] {
            let mut p = program(1_700_000_000, "Show", "5.1");
            p.first_run = flag;
            p.original_airdate = Some(Utc.timestamp_opt(1_600_000_000, 0).unwrap());
            match enc.episode_status(&p) {
                Some(StatusMarker::PreviouslyShown { start: Some(start) }) => {
                    assert_eq!(start, "20200913122640");
                }
                other => panic!("expected dated previously-shown, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_status_same_date_repeat_is_plain_previously_shown() {
        let enc = encoder();
        let mut p = program(1_700_000_000, "Show", "5.1");
        p.first_run = FirstRun::Repeat;
        // One hour before broadcast, same UTC calendar date.
        p.original_airdate = Some(Utc.timestamp_opt(1_700_000_000 - 3600, 0).unwrap());
        assert_eq!(
            enc.episode_status(&p),
            Some(StatusMarker::PreviouslyShown { start: None })
        );
    }

    #[test]
    fn test_status_same_date_unknown_emits_nothing() {
        let enc = encoder();
        let mut p = program(1_700_000_000, "Show", "5.1");
        p.original_airdate = Some(Utc.timestamp_opt(1_700_000_000 - 3600, 0).unwrap());
        assert_eq!(enc.episode_status(&p), None);
    }

    #[test]
    fn test_status_repeat_without_airdate() {
        let enc = encoder();
        let mut p = program(1_700_000_000, "Show", "5.1");
        p.first_run = FirstRun::Repeat;
        assert_eq!(
            enc.episode_status(&p),
            Some(StatusMarker::PreviouslyShown { start: None })
        );
    }

    #[test]
    fn test_status_unknown_without_airdate() {
        let enc = encoder();
        let p = program(1_700_000_000, "Show", "5.1");
        assert_eq!(enc.episode_status(&p), None);
    }

    #[test]
    fn test_status_dates_compared_in_output_timezone() {
        // 2023-11-14 01:00 UTC is still 2023-11-13 in Los Angeles, so an
        // airdate on 2023-11-13 UTC evening is the same local date.
        let enc = XmltvEncoder::new(
            chrono_tz::America::Los_Angeles,
            "hdhr-epg",
            "https://example.invalid/hdhr-epg",
        );
        let mut p = program(0, "Show", "5.1");
        p.start_time = Utc.with_ymd_and_hms(2023, 11, 14, 1, 0, 0).unwrap();
        p.end_time = Utc.with_ymd_and_hms(2023, 11, 14, 2, 0, 0).unwrap();
        p.original_airdate = Some(Utc.with_ymd_and_hms(2023, 11, 13, 20, 0, 0).unwrap());
        p.first_run = FirstRun::Unknown;
        // Same local date + unknown flag: no marker.
        assert_eq!(enc.episode_status(&p), None);
    }

    // --- whole documents ---

    #[test]
    fn test_encode_basic_document() {
        let enc = encoder();
        let channels = vec![channel("5.1", "KTLA"), channel("7.1", "KABC")];
        let mut p1 = program(1_700_000_000, "News", "5.1");
        p1.first_run = FirstRun::New;
        let mut p2 = program(1_700_010_000, "Movie", "7.1");
        p2.first_run = FirstRun::New;

        let document = enc.encode(&channels, &[p1, p2]);
        assert!(document.warnings.is_empty());
        assert!(document.xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n"));
        assert_eq!(document.xml.matches("<channel id=").count(), 2);
        assert_eq!(document.xml.matches("<programme ").count(), 2);
        assert_eq!(document.xml.matches("<new />").count(), 2);
        assert!(!document.xml.contains("previously-shown"));
        assert!(document.xml.contains("source-info-name=\"HDHomeRun\""));
        assert!(document.xml.contains("generator-info-name=\"hdhr-epg\""));
    }

    #[test]
    fn test_encode_is_deterministic() {
        let enc = encoder();
        let channels = vec![channel("5.1", "KTLA")];
        let mut p = program(1_700_000_000, "News", "5.1");
        p.episode_number = Some("S04E12".to_string());
        p.synopsis = Some("Local news. [HD]".to_string());
        p.filters = vec!["News".to_string()];

        let a = enc.encode(&channels, std::slice::from_ref(&p));
        let b = enc.encode(&channels, std::slice::from_ref(&p));
        assert_eq!(a.xml, b.xml);
    }

    #[test]
    fn test_encode_optional_fields() {
        let enc = encoder();
        let channels = vec![channel("5.1", "KTLA")];
        let mut p = program(1_700_000_000, "Drama", "5.1");
        p.episode_title = Some("The One".to_string());
        p.synopsis = Some("Finale. [HD,CC]".to_string());
        p.episode_number = Some("S02E03".to_string());
        p.icon_url = Some("http://img/ep.png".to_string());
        p.filters = vec!["Drama".to_string(), "Premiere".to_string()];

        let document = enc.encode(&channels, &[p]);
        assert!(document.xml.contains("<sub-title lang=\"en\">The One</sub-title>"));
        assert!(document.xml.contains("<desc lang=\"en\">Finale.</desc>"));
        assert!(document.xml.contains("<episode-num system=\"onscreen\">S02E03</episode-num>"));
        assert!(document.xml.contains("<episode-num system=\"xmltv_ns\">1.2.0/0</episode-num>"));
        assert_eq!(document.xml.matches("<category lang=\"en\">").count(), 2);
        assert!(document.xml.contains("<icon src=\"http://img/ep.png\" />"));
    }

    #[test]
    fn test_encode_malformed_episode_number_degrades() {
        let enc = encoder();
        let channels = vec![channel("5.1", "KTLA")];
        let mut p = program(1_700_000_000, "Show", "5.1");
        p.episode_number = Some("SxEy".to_string());

        let document = enc.encode(&channels, &[p]);
        assert!(document.xml.contains("<episode-num system=\"onscreen\">SxEy</episode-num>"));
        assert!(!document.xml.contains("xmltv_ns"));
        assert_eq!(document.warnings.len(), 1);
        assert!(document.warnings[0].contains("SxEy"));
    }

    #[test]
    fn test_programme_timestamps_carry_offset() {
        let enc = XmltvEncoder::new(
            chrono_tz::America::New_York,
            "hdhr-epg",
            "https://example.invalid/hdhr-epg",
        );
        let channels = vec![channel("5.1", "KTLA")];
        let mut p = program(0, "Show", "5.1");
        p.start_time = Utc.with_ymd_and_hms(2023, 11, 14, 17, 0, 0).unwrap();
        p.end_time = Utc.with_ymd_and_hms(2023, 11, 14, 18, 0, 0).unwrap();

        let document = enc.encode(&channels, &[p]);
        assert!(document.xml.contains("start=\"20231114120000 -0500\""));
        assert!(document.xml.contains("stop=\"20231114130000 -0500\""));
    }
}
