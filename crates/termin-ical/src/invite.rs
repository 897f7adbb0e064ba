//! Invite rendering.
//!
//! Produces the `METHOD:REQUEST` iCalendar document that accompanies a
//! tentative appointment. Rendering is pure: the same appointment, organizer,
//! options and timestamp always produce byte-identical output, so the
//! document can be regenerated for retries without drift.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use thiserror::Error;

use termin_core::Appointment;

use crate::contentline::{LineWriter, escape_text, param_value};
use crate::timezone::TimezoneSpec;

/// Errors raised before any invite output is produced.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InviteError {
    /// A required appointment field is empty.
    #[error("appointment field '{field}' is required for an invite")]
    MissingField { field: &'static str },

    /// The appointment does not start before it ends.
    #[error("appointment start ({start}) must be before end ({end})")]
    InvalidTimeRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

/// The party sending the invite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Organizer {
    /// Display name, used for the `CN` parameter.
    pub name: String,
    /// Mailto target of ORGANIZER and the email alarm.
    pub email: String,
}

impl Organizer {
    /// Creates an organizer.
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Deployment-level invite settings.
#[derive(Debug, Clone)]
pub struct InviteOptions {
    /// PRODID of the generating system.
    pub prod_id: String,
    /// UID prefix; the full UID is `<namespace>-<id>@<domain>`.
    pub uid_namespace: String,
    /// UID domain part.
    pub uid_domain: String,
    /// Event summary; the customer name is appended.
    pub summary: String,
    /// Fallback location when the appointment carries none.
    pub default_location: Option<String>,
    /// Business timezone for `TZID`-tagged local times.
    pub timezone: Tz,
    /// The VTIMEZONE rules embedded in the document.
    pub tz_rules: TimezoneSpec,
}

impl Default for InviteOptions {
    fn default() -> Self {
        Self {
            prod_id: "-//NEST-Haus//Termin//DE".into(),
            uid_namespace: "appointment".into(),
            uid_domain: "nest-haus.at".into(),
            summary: "NEST-Haus Beratungstermin".into(),
            default_location: Some("NEST-Haus Office, Karmeliterplatz 8, 8010 Graz".into()),
            timezone: chrono_tz::Europe::Vienna,
            tz_rules: TimezoneSpec::central_european(),
        }
    }
}

/// A rendered invite, ready to attach to an outbound email.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InviteDocument {
    /// The iCalendar text, CRLF line endings throughout.
    pub content: String,
    /// Attachment filename (`termin-<id>.ics`).
    pub filename: String,
}

impl InviteDocument {
    /// MIME type for the attachment.
    pub const MIME_TYPE: &'static str = "text/calendar; method=REQUEST";
}

/// Renders the invite for a tentative appointment.
///
/// `rendered_at` becomes the `DTSTAMP`; callers pass the current time in
/// production and a fixed instant in tests.
///
/// # Errors
///
/// Returns [`InviteError`] when the appointment is missing its id, customer
/// name or customer email, or when it does not start before it ends. No
/// partial document is ever produced.
pub fn render_invite(
    appointment: &Appointment,
    organizer: &Organizer,
    options: &InviteOptions,
    rendered_at: DateTime<Utc>,
) -> Result<InviteDocument, InviteError> {
    validate(appointment)?;

    let tzid = options.timezone.name();
    let start_local = appointment.start.with_timezone(&options.timezone);
    let end_local = appointment.end.with_timezone(&options.timezone);
    let name = escape_text(&appointment.customer_name);

    let mut w = LineWriter::new();
    w.prop("BEGIN", "VCALENDAR");
    w.prop("VERSION", "2.0");
    w.prop("PRODID", &options.prod_id);
    w.prop("CALSCALE", "GREGORIAN");
    w.prop("METHOD", "REQUEST");

    options.tz_rules.write(tzid, &mut w);

    w.prop("BEGIN", "VEVENT");
    w.prop(
        "UID",
        &format!(
            "{}-{}@{}",
            options.uid_namespace, appointment.id, options.uid_domain
        ),
    );
    w.prop("DTSTAMP", &rendered_at.format("%Y%m%dT%H%M%SZ").to_string());
    w.line(&format!(
        "DTSTART;TZID={tzid}:{}",
        start_local.format("%Y%m%dT%H%M%S")
    ));
    w.line(&format!(
        "DTEND;TZID={tzid}:{}",
        end_local.format("%Y%m%dT%H%M%S")
    ));
    w.prop("SUMMARY", &format!("{} - {name}", escape_text(&options.summary)));
    w.prop("DESCRIPTION", &description(appointment));
    if let Some(location) = appointment
        .location
        .as_deref()
        .or(options.default_location.as_deref())
    {
        w.prop("LOCATION", &escape_text(location));
    }
    w.line(&format!(
        "ORGANIZER;CN={}:mailto:{}",
        param_value(&organizer.name),
        organizer.email
    ));
    w.line(&format!(
        "ATTENDEE;ROLE=REQ-PARTICIPANT;RSVP=TRUE;PARTSTAT=NEEDS-ACTION;CN={}:mailto:{}",
        param_value(&appointment.customer_name),
        appointment.customer_email
    ));
    w.prop("STATUS", "TENTATIVE");
    w.prop("SEQUENCE", "0");
    w.prop("TRANSP", "OPAQUE");

    // Email reminder to the organizer a day ahead.
    w.prop("BEGIN", "VALARM");
    w.prop("TRIGGER", "-PT24H");
    w.prop("ACTION", "EMAIL");
    w.prop("ATTENDEE", &format!("mailto:{}", organizer.email));
    w.prop("SUMMARY", "Erinnerung: Termin in 24 Stunden");
    w.prop(
        "DESCRIPTION",
        &format!(
            "Termin mit {name} am {} um {}",
            start_local.format("%d.%m.%Y"),
            start_local.format("%H:%M")
        ),
    );
    w.prop("END", "VALARM");

    // On-device reminder an hour ahead.
    w.prop("BEGIN", "VALARM");
    w.prop("TRIGGER", "-PT1H");
    w.prop("ACTION", "DISPLAY");
    w.prop("DESCRIPTION", &format!("Termin in 1 Stunde - {name}"));
    w.prop("END", "VALARM");

    w.prop("END", "VEVENT");
    w.prop("END", "VCALENDAR");

    Ok(InviteDocument {
        content: w.finish(),
        filename: format!("termin-{}.ics", appointment.id),
    })
}

fn validate(appointment: &Appointment) -> Result<(), InviteError> {
    if appointment.id.is_empty() {
        return Err(InviteError::MissingField { field: "id" });
    }
    if appointment.customer_name.is_empty() {
        return Err(InviteError::MissingField {
            field: "customer_name",
        });
    }
    if appointment.customer_email.is_empty() {
        return Err(InviteError::MissingField {
            field: "customer_email",
        });
    }
    if appointment.start >= appointment.end {
        return Err(InviteError::InvalidTimeRange {
            start: appointment.start,
            end: appointment.end,
        });
    }
    Ok(())
}

fn description(appointment: &Appointment) -> String {
    let mut text = match &appointment.description {
        Some(notes) => format!("{notes}\n\n"),
        None => String::new(),
    };
    text.push_str(&format!(
        "Kunde: {}\nE-Mail: {}\nTermin-ID: {}\n\nBitte bestätigen Sie den Termin innerhalb von 24 Stunden.",
        appointment.customer_name, appointment.customer_email, appointment.id
    ));
    escape_text(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    fn sample_appointment() -> Appointment {
        let now = utc(2025, 2, 3, 12, 0, 0);
        Appointment::tentative(
            "apt-123",
            "Maria Muster",
            "maria@example.com",
            utc(2025, 2, 4, 9, 0, 0),
            utc(2025, 2, 4, 10, 0, 0),
            now,
            now + Duration::hours(24),
        )
    }

    fn organizer() -> Organizer {
        Organizer::new("NEST-Haus Team", "termine@nest-haus.at")
    }

    fn render(appointment: &Appointment) -> InviteDocument {
        render_invite(
            appointment,
            &organizer(),
            &InviteOptions::default(),
            utc(2025, 2, 3, 12, 30, 0),
        )
        .unwrap()
    }

    #[test]
    fn wrapper_properties() {
        let doc = render(&sample_appointment());
        assert!(doc.content.starts_with("BEGIN:VCALENDAR\r\nVERSION:2.0\r\n"));
        assert!(doc.content.contains("PRODID:-//NEST-Haus//Termin//DE\r\n"));
        assert!(doc.content.contains("CALSCALE:GREGORIAN\r\n"));
        assert!(doc.content.contains("METHOD:REQUEST\r\n"));
        assert!(doc.content.ends_with("END:VCALENDAR\r\n"));
    }

    #[test]
    fn vtimezone_included() {
        let doc = render(&sample_appointment());
        assert!(doc.content.contains("BEGIN:VTIMEZONE\r\nTZID:Europe/Vienna\r\n"));
        assert!(doc.content.contains("RRULE:FREQ=YEARLY;BYMONTH=3;BYDAY=-1SU\r\n"));
        assert!(doc.content.contains("RRULE:FREQ=YEARLY;BYMONTH=10;BYDAY=-1SU\r\n"));
    }

    #[test]
    fn uid_is_stable() {
        let apt = sample_appointment();
        let a = render(&apt);
        let b = render(&apt);
        assert!(a.content.contains("UID:appointment-apt-123@nest-haus.at\r\n"));
        assert_eq!(a.content, b.content);
    }

    #[test]
    fn times_are_tzid_tagged_local_wall_clock() {
        // 09:00 UTC on a winter day is 10:00 in Vienna.
        let doc = render(&sample_appointment());
        assert!(doc.content.contains("DTSTART;TZID=Europe/Vienna:20250204T100000\r\n"));
        assert!(doc.content.contains("DTEND;TZID=Europe/Vienna:20250204T110000\r\n"));
        assert!(doc.content.contains("DTSTAMP:20250203T123000Z\r\n"));
    }

    #[test]
    fn summer_times_follow_dst() {
        let mut apt = sample_appointment();
        apt.start = utc(2025, 7, 1, 9, 0, 0);
        apt.end = utc(2025, 7, 1, 10, 0, 0);
        let doc = render(&apt);
        // 09:00 UTC in July is 11:00 CEST.
        assert!(doc.content.contains("DTSTART;TZID=Europe/Vienna:20250701T110000\r\n"));
    }

    #[test]
    fn event_status_and_participants() {
        let doc = render(&sample_appointment());
        assert!(doc.content.contains("STATUS:TENTATIVE\r\n"));
        assert!(doc.content.contains("SEQUENCE:0\r\n"));
        assert!(doc.content.contains("TRANSP:OPAQUE\r\n"));
        assert!(doc.content.contains(
            "ORGANIZER;CN=NEST-Haus Team:mailto:termine@nest-haus.at\r\n"
        ));
        assert!(doc.content.contains(
            "ATTENDEE;ROLE=REQ-PARTICIPANT;RSVP=TRUE;PARTSTAT=NEEDS-ACTION;CN=Maria"
        ));
    }

    #[test]
    fn two_alarms_with_negative_triggers() {
        let doc = render(&sample_appointment());
        assert_eq!(doc.content.matches("BEGIN:VALARM\r\n").count(), 2);
        assert!(doc.content.contains("TRIGGER:-PT24H\r\nACTION:EMAIL\r\n"));
        assert!(doc.content.contains("TRIGGER:-PT1H\r\nACTION:DISPLAY\r\n"));
    }

    #[test]
    fn text_fields_escaped() {
        let mut apt = sample_appointment();
        apt.customer_name = "Muster; GmbH, Wien".into();
        apt = apt.with_location("Karmeliterplatz 8\n8010 Graz");
        let doc = render(&apt);
        assert!(doc.content.contains("Muster\\; GmbH\\, Wien"));
        assert!(doc.content.contains("LOCATION:Karmeliterplatz 8\\n8010 Graz\r\n"));
        // Raw separators never survive into the escaped fields.
        assert!(!doc.content.contains("LOCATION:Karmeliterplatz 8\n"));
    }

    #[test]
    fn custom_notes_prepended_to_description() {
        let apt = sample_appointment().with_description("Frage zu Modul 4");
        let doc = render(&apt);
        assert!(doc.content.contains("DESCRIPTION:Frage zu Modul 4\\n\\nKunde: Maria Muster"));
    }

    #[test]
    fn filename_from_appointment_id() {
        let doc = render(&sample_appointment());
        assert_eq!(doc.filename, "termin-apt-123.ics");
        assert_eq!(InviteDocument::MIME_TYPE, "text/calendar; method=REQUEST");
    }

    #[test]
    fn physical_lines_capped_at_75_octets() {
        let apt = sample_appointment()
            .with_description("Sehr ausführliche Beschreibung des gewünschten Termins. ".repeat(8));
        let doc = render(&apt);
        for line in doc.content.split("\r\n") {
            assert!(line.len() <= 75, "line exceeds 75 octets: {line:?}");
        }
    }

    #[test]
    fn missing_fields_rejected() {
        let mut apt = sample_appointment();
        apt.customer_name = String::new();
        let err = render_invite(
            &apt,
            &organizer(),
            &InviteOptions::default(),
            utc(2025, 2, 3, 12, 30, 0),
        )
        .unwrap_err();
        assert_eq!(
            err,
            InviteError::MissingField {
                field: "customer_name"
            }
        );

        let mut apt = sample_appointment();
        apt.id = String::new();
        assert!(matches!(
            render_invite(&apt, &organizer(), &InviteOptions::default(), utc(2025, 2, 3, 12, 30, 0)),
            Err(InviteError::MissingField { field: "id" })
        ));
    }

    #[test]
    fn inverted_times_rejected() {
        let mut apt = sample_appointment();
        std::mem::swap(&mut apt.start, &mut apt.end);
        assert!(matches!(
            render_invite(&apt, &organizer(), &InviteOptions::default(), utc(2025, 2, 3, 12, 30, 0)),
            Err(InviteError::InvalidTimeRange { .. })
        ));
    }

    #[test]
    fn cn_parameters_quoted_not_escaped() {
        let mut apt = sample_appointment();
        apt.customer_name = "Muster, GmbH".into();
        let doc = render_invite(
            &apt,
            &Organizer::new("NEST-Haus; Beratung", "termine@nest-haus.at"),
            &InviteOptions::default(),
            utc(2025, 2, 3, 12, 30, 0),
        )
        .unwrap();

        // Parameter values take DQUOTE quoting; TEXT escapes would leave a
        // backslash that strict parsers reject in a parameter. Unfold first so
        // a 75-octet fold cannot split the substring under test.
        let unfolded = doc.content.replace("\r\n ", "");
        assert!(unfolded.contains("CN=\"Muster, GmbH\":mailto:maria@example.com"));
        assert!(unfolded.contains("ORGANIZER;CN=\"NEST-Haus; Beratung\":mailto:"));
        assert!(!unfolded.contains("CN=Muster\\,"));
        // The escaped form still appears where TEXT rules apply.
        assert!(unfolded.contains("SUMMARY:NEST-Haus Beratungstermin - Muster\\, GmbH"));
    }

    #[test]
    fn parses_back_with_icalendar() {
        use icalendar::Component;

        let doc = render(&sample_appointment());
        let parsed: icalendar::Calendar = doc.content.parse().expect("invite should parse");
        let events: Vec<_> = parsed
            .components
            .iter()
            .filter_map(|c| match c {
                icalendar::CalendarComponent::Event(e) => Some(e),
                _ => None,
            })
            .collect();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].get_summary(),
            Some("NEST-Haus Beratungstermin - Maria Muster")
        );
    }
}
