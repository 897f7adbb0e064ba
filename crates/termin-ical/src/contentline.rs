//! RFC 5545 content lines: TEXT escaping and 75-octet folding.
//!
//! A content line is a logical `NAME;PARAM=V:VALUE` line. On the wire no
//! physical line may exceed 75 octets (excluding the CRLF terminator);
//! longer lines are folded with a CRLF followed by a single space, and the
//! continuation space counts against the next line's budget.

/// Maximum physical line length in octets, excluding CRLF.
const FOLD_LIMIT: usize = 75;

/// Escapes a value for use in an iCalendar TEXT property.
///
/// Backslash, semicolon, comma and newline are escaped per RFC 5545
/// section 3.3.11. CRLF pairs and bare CR are normalized to `\n` first so
/// no raw line break can ever reach the output.
pub fn escape_text(value: &str) -> String {
    let normalized = value.replace("\r\n", "\n").replace('\r', "\n");
    let mut out = String::with_capacity(normalized.len());
    for c in normalized.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            ';' => out.push_str("\\;"),
            ',' => out.push_str("\\,"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

/// Prepares a value for use as a property parameter (`CN=` and friends).
///
/// Parameter values use DQUOTE quoting, not TEXT escapes: a value
/// containing `,`, `;` or `:` is wrapped in double quotes. DQUOTE itself
/// and line breaks cannot be represented in a parameter value and are
/// dropped.
pub fn param_value(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .filter(|c| !matches!(c, '"' | '\r' | '\n'))
        .collect();
    if cleaned.contains([',', ';', ':']) {
        format!("\"{cleaned}\"")
    } else {
        cleaned
    }
}

/// Accumulates folded content lines into an iCalendar document body.
#[derive(Debug, Default)]
pub struct LineWriter {
    buf: String,
}

impl LineWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one logical content line, folding it as needed.
    ///
    /// The line must not contain raw CR or LF; escape TEXT values with
    /// [`escape_text`] before building the line.
    pub fn line(&mut self, line: &str) {
        debug_assert!(
            !line.contains('\r') && !line.contains('\n'),
            "content lines must not contain raw line breaks"
        );
        let bytes = line.as_bytes();
        let mut pos = 0;
        let mut budget = FOLD_LIMIT;

        while bytes.len() - pos > budget {
            let mut cut = pos + budget;
            // Never split inside a multi-byte UTF-8 sequence; back off past
            // continuation bytes (10xxxxxx) to the character start.
            while cut > pos && (bytes[cut] & 0xC0) == 0x80 {
                cut -= 1;
            }
            self.buf.push_str(&line[pos..cut]);
            self.buf.push_str("\r\n ");
            pos = cut;
            // The leading space occupies one octet of every continuation line.
            budget = FOLD_LIMIT - 1;
        }

        self.buf.push_str(&line[pos..]);
        self.buf.push_str("\r\n");
    }

    /// Appends a `NAME:VALUE` property.
    pub fn prop(&mut self, name: &str, value: &str) {
        self.line(&format!("{name}:{value}"));
    }

    /// Returns the accumulated document body.
    pub fn finish(self) -> String {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn physical_lines(s: &str) -> Vec<&str> {
        s.split("\r\n").filter(|l| !l.is_empty()).collect()
    }

    mod escaping {
        use super::*;

        #[test]
        fn special_characters() {
            assert_eq!(escape_text("a\\b"), "a\\\\b");
            assert_eq!(escape_text("a;b"), "a\\;b");
            assert_eq!(escape_text("a,b"), "a\\,b");
            assert_eq!(escape_text("a\nb"), "a\\nb");
        }

        #[test]
        fn crlf_normalized() {
            assert_eq!(escape_text("a\r\nb"), "a\\nb");
            assert_eq!(escape_text("a\rb"), "a\\nb");
        }

        #[test]
        fn backslash_escaped_before_others() {
            // A literal backslash-n must not collapse into an escaped newline.
            assert_eq!(escape_text("\\n"), "\\\\n");
        }

        #[test]
        fn plain_text_untouched() {
            assert_eq!(escape_text("Karmeliterplatz 8. Stock"), "Karmeliterplatz 8. Stock");
        }
    }

    mod parameters {
        use super::*;

        #[test]
        fn plain_value_unquoted() {
            assert_eq!(param_value("Maria Muster"), "Maria Muster");
        }

        #[test]
        fn separators_trigger_quoting() {
            assert_eq!(param_value("Muster, GmbH"), "\"Muster, GmbH\"");
            assert_eq!(param_value("Muster; GmbH"), "\"Muster; GmbH\"");
            assert_eq!(param_value("Achtung: Chef"), "\"Achtung: Chef\"");
        }

        #[test]
        fn dquote_and_line_breaks_dropped() {
            assert_eq!(param_value("Maria \"Mia\" Muster"), "Maria Mia Muster");
            assert_eq!(param_value("Maria\nMuster"), "MariaMuster");
        }

        #[test]
        fn no_backslash_escapes_in_parameters() {
            assert!(!param_value("a,b").contains('\\'));
        }
    }

    mod folding {
        use super::*;

        #[test]
        fn short_line_unfolded() {
            let mut w = LineWriter::new();
            w.prop("SUMMARY", "Beratung");
            assert_eq!(w.finish(), "SUMMARY:Beratung\r\n");
        }

        #[test]
        fn exactly_75_octets_not_folded() {
            let mut w = LineWriter::new();
            let line = "X".repeat(75);
            w.line(&line);
            let out = w.finish();
            assert_eq!(out, format!("{line}\r\n"));
        }

        #[test]
        fn long_line_folded_at_75() {
            let mut w = LineWriter::new();
            w.line(&"A".repeat(200));
            let out = w.finish();
            for line in physical_lines(&out) {
                assert!(line.len() <= 75, "physical line too long: {}", line.len());
            }
            // Continuations start with a single space.
            let lines = physical_lines(&out);
            assert!(lines.len() > 1);
            for cont in &lines[1..] {
                assert!(cont.starts_with(' '));
            }
        }

        #[test]
        fn folded_content_reassembles() {
            let original = format!("DESCRIPTION:{}", "abcdefghij".repeat(30));
            let mut w = LineWriter::new();
            w.line(&original);
            let out = w.finish();
            let unfolded = out.replace("\r\n ", "").replace("\r\n", "");
            assert_eq!(unfolded, original);
        }

        #[test]
        fn fold_never_splits_utf8() {
            // Two-byte characters positioned so a naive 75-octet cut would
            // land mid-sequence.
            let mut w = LineWriter::new();
            w.line(&format!("DESCRIPTION:{}", "ä".repeat(120)));
            let out = w.finish();
            for line in physical_lines(&out) {
                assert!(line.len() <= 75);
                // Would panic at the str boundary if a character were split;
                // also verify explicitly.
                assert!(std::str::from_utf8(line.as_bytes()).is_ok());
            }
            let unfolded = out.replace("\r\n ", "").replace("\r\n", "");
            assert_eq!(unfolded.chars().filter(|&c| c == 'ä').count(), 120);
        }

        #[test]
        fn every_line_ends_crlf() {
            let mut w = LineWriter::new();
            w.prop("BEGIN", "VCALENDAR");
            w.line(&"B".repeat(100));
            w.prop("END", "VCALENDAR");
            let out = w.finish();
            assert!(out.ends_with("\r\n"));
            assert!(!out.contains("\n\n"));
            // No bare LF anywhere.
            assert_eq!(out.matches('\n').count(), out.matches("\r\n").count());
        }
    }
}
