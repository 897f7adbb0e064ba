//! VTIMEZONE rendering.
//!
//! Invites carry the business timezone definition inline so that clients
//! resolve `TZID`-tagged times identically, whatever their local zone
//! database says. The default rule pair is the central European one used by
//! `Europe/Vienna`; deployments in other zones supply their own rules.

use crate::contentline::LineWriter;

/// One observance rule inside a VTIMEZONE (a STANDARD or DAYLIGHT block).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservanceRule {
    /// First onset of the rule, local time (`19700329T020000`).
    pub dtstart: String,
    /// Yearly recurrence (`FREQ=YEARLY;BYMONTH=3;BYDAY=-1SU`).
    pub rrule: String,
    /// UTC offset before the transition (`+0100`).
    pub offset_from: String,
    /// UTC offset after the transition (`+0200`).
    pub offset_to: String,
    /// Abbreviated zone name (`CEST`).
    pub name: String,
}

/// The timezone definition embedded in every invite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimezoneSpec {
    /// STANDARD observance, always present.
    pub standard: ObservanceRule,
    /// DAYLIGHT observance, absent for zones without DST.
    pub daylight: Option<ObservanceRule>,
}

impl TimezoneSpec {
    /// The central European rule pair: daylight saving starts on the last
    /// Sunday of March at 02:00 and ends on the last Sunday of October at
    /// 03:00.
    pub fn central_european() -> Self {
        Self {
            standard: ObservanceRule {
                dtstart: "19701025T030000".into(),
                rrule: "FREQ=YEARLY;BYMONTH=10;BYDAY=-1SU".into(),
                offset_from: "+0200".into(),
                offset_to: "+0100".into(),
                name: "CET".into(),
            },
            daylight: Some(ObservanceRule {
                dtstart: "19700329T020000".into(),
                rrule: "FREQ=YEARLY;BYMONTH=3;BYDAY=-1SU".into(),
                offset_from: "+0100".into(),
                offset_to: "+0200".into(),
                name: "CEST".into(),
            }),
        }
    }

    /// A fixed-offset spec with no transitions, for zones without DST.
    pub fn fixed_offset(offset: impl Into<String>, name: impl Into<String>) -> Self {
        let offset = offset.into();
        Self {
            standard: ObservanceRule {
                dtstart: "19700101T000000".into(),
                rrule: String::new(),
                offset_from: offset.clone(),
                offset_to: offset,
                name: name.into(),
            },
            daylight: None,
        }
    }

    /// Writes the VTIMEZONE component for the given TZID.
    pub fn write(&self, tzid: &str, w: &mut LineWriter) {
        w.prop("BEGIN", "VTIMEZONE");
        w.prop("TZID", tzid);
        if let Some(daylight) = &self.daylight {
            write_observance(w, "DAYLIGHT", daylight);
        }
        write_observance(w, "STANDARD", &self.standard);
        w.prop("END", "VTIMEZONE");
    }
}

impl Default for TimezoneSpec {
    fn default() -> Self {
        Self::central_european()
    }
}

fn write_observance(w: &mut LineWriter, kind: &str, rule: &ObservanceRule) {
    w.prop("BEGIN", kind);
    w.prop("DTSTART", &rule.dtstart);
    if !rule.rrule.is_empty() {
        w.prop("RRULE", &rule.rrule);
    }
    w.prop("TZOFFSETFROM", &rule.offset_from);
    w.prop("TZOFFSETTO", &rule.offset_to);
    w.prop("TZNAME", &rule.name);
    w.prop("END", kind);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(spec: &TimezoneSpec, tzid: &str) -> String {
        let mut w = LineWriter::new();
        spec.write(tzid, &mut w);
        w.finish()
    }

    #[test]
    fn central_european_block() {
        let out = render(&TimezoneSpec::central_european(), "Europe/Vienna");
        assert!(out.starts_with("BEGIN:VTIMEZONE\r\nTZID:Europe/Vienna\r\n"));
        assert!(out.contains("BEGIN:DAYLIGHT\r\n"));
        assert!(out.contains("RRULE:FREQ=YEARLY;BYMONTH=3;BYDAY=-1SU\r\n"));
        assert!(out.contains("TZOFFSETFROM:+0100\r\nTZOFFSETTO:+0200\r\nTZNAME:CEST\r\n"));
        assert!(out.contains("BEGIN:STANDARD\r\n"));
        assert!(out.contains("RRULE:FREQ=YEARLY;BYMONTH=10;BYDAY=-1SU\r\n"));
        assert!(out.contains("TZOFFSETFROM:+0200\r\nTZOFFSETTO:+0100\r\nTZNAME:CET\r\n"));
        assert!(out.ends_with("END:VTIMEZONE\r\n"));
    }

    #[test]
    fn daylight_precedes_standard() {
        let out = render(&TimezoneSpec::central_european(), "Europe/Vienna");
        let daylight = out.find("BEGIN:DAYLIGHT").unwrap();
        let standard = out.find("BEGIN:STANDARD").unwrap();
        assert!(daylight < standard);
    }

    #[test]
    fn fixed_offset_has_no_daylight() {
        let out = render(&TimezoneSpec::fixed_offset("+0900", "JST"), "Asia/Tokyo");
        assert!(!out.contains("DAYLIGHT"));
        assert!(!out.contains("RRULE"));
        assert!(out.contains("TZOFFSETFROM:+0900\r\nTZOFFSETTO:+0900\r\nTZNAME:JST\r\n"));
    }
}
