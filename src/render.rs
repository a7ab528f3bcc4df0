//! Turns schedule sessions into calendar events and the events into
//! iCalendar text.

use crate::schedule::{Day, Schedule, Session};
use chrono::{DateTime, Duration, LocalResult, NaiveDate, NaiveTime, Offset, TimeZone, Utc};
use chrono_tz::Tz;
use ics::components::Property;
use ics::properties::{Description, DtEnd, DtStart, Summary};
use std::fmt;
use tracing::{debug, warn};

pub const PRODUCT_ID: &str = "-//ContinuumCon//Conference Schedule//EN";
pub const CALENDAR_NAME: &str = "ContinuumCon";
pub const UID_DOMAIN: &str = "continuumcon";

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const TIME_FORMAT: &str = "%H:%M";

/// One rendered session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub uid: String,
    pub summary: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Already escaped with [`escape_text`]. The summary is kept raw and
    /// escaped on output.
    pub description: Option<String>,
}

impl CalendarEvent {
    pub fn dtstart(&self) -> String {
        format_timestamp(&self.start)
    }

    pub fn dtend(&self) -> String {
        format_timestamp(&self.end)
    }
}

/// A session that would have produced an event but has no UID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingUid {
    pub date: NaiveDate,
    pub start: String,
    pub title: String,
}

impl fmt::Display for MissingUid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.date, self.start, self.title)
    }
}

#[derive(Debug, Default)]
pub struct Rendered {
    pub events: Vec<CalendarEvent>,
    pub missing_uids: Vec<MissingUid>,
}

pub fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

/// Split "HH:MM-HH:MM" into its two wall-clock times.
pub fn parse_time_range(range: &str) -> Option<(NaiveTime, NaiveTime)> {
    let parts: Vec<&str> = range.split('-').map(str::trim).collect();
    match parts.as_slice() {
        [start, end] => Some((
            NaiveTime::parse_from_str(start, TIME_FORMAT).ok()?,
            NaiveTime::parse_from_str(end, TIME_FORMAT).ok()?,
        )),
        _ => None,
    }
}

/// Interpret a wall-clock time in `tz` and return the UTC instant.
///
/// In a fall-back overlap the earlier instant wins. In a spring-forward gap
/// the offset in effect before the gap is applied.
pub fn local_to_utc(date: NaiveDate, time: NaiveTime, tz: Tz) -> DateTime<Utc> {
    let local = date.and_time(time);
    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => {
            let before = tz.offset_from_utc_datetime(&(local - Duration::days(1)));
            let offset = Duration::seconds(i64::from(before.fix().local_minus_utc()));
            Utc.from_utc_datetime(&(local - offset))
        }
    }
}

fn collapse_line_breaks(text: &str) -> String {
    text.split(['\r', '\n'])
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Escape a TEXT value for the calendar format: backslash, semicolon and
/// comma get a leading backslash and every line break becomes `\n`.
pub fn escape_text(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n").replace('\r', "\n");
    let mut escaped = String::with_capacity(normalized.len());
    for c in normalized.chars() {
        match c {
            '\\' | ';' | ',' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\n' => escaped.push_str("\\n"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn build_description(session: &Session, schedule: &Schedule) -> Option<String> {
    let mut lines: Vec<String> = Vec::new();

    if let Some(text) = session.abstract_text.as_deref().map(str::trim) {
        if !text.is_empty() {
            lines.push(text.to_string());
        }
    }
    if let Some(level) = session.difficulty.as_deref() {
        if !level.trim().is_empty() {
            lines.push(format!("Level: {}", level));
        }
    }
    if !schedule.stream_links.is_empty() {
        lines.push(String::new());
        lines.push("Watch the stream:".to_string());
        lines.extend(schedule.stream_urls().map(|url| format!("- {}", url)));
    }
    if let Some(url) = schedule.access_url() {
        lines.push(String::new());
        lines.push(format!("Access {} content:", CALENDAR_NAME));
        lines.push(format!("- {}", url));
    }

    let description = escape_text(&lines.join("\n"));
    if description.is_empty() {
        None
    } else {
        Some(description)
    }
}

fn render_session(
    day: &Day,
    session: &Session,
    schedule: &Schedule,
    tz: Tz,
) -> Option<Result<CalendarEvent, MissingUid>> {
    let (title, range) = match (session.title(), session.time_range()) {
        (Some(title), Some(range)) => (title, range),
        _ => {
            debug!(
                date = %day.date,
                title = ?session.title,
                time = ?session.time,
                "skipping incomplete session"
            );
            return None;
        }
    };
    let (start, end) = match parse_time_range(range) {
        Some(times) => times,
        None => {
            debug!(date = %day.date, title, range, "skipping malformed time range");
            return None;
        }
    };

    let uid = match session.uid() {
        Some(uid) => uid,
        None => {
            warn!(date = %day.date, title, "session has no uid");
            return Some(Err(MissingUid {
                date: day.date,
                start: start.format(TIME_FORMAT).to_string(),
                title: title.to_string(),
            }));
        }
    };

    Some(Ok(CalendarEvent {
        uid: format!("{}@{}", collapse_line_breaks(uid), UID_DOMAIN),
        summary: collapse_line_breaks(title),
        start: local_to_utc(day.date, start, tz),
        end: local_to_utc(day.date, end, tz),
        description: build_description(session, schedule),
    }))
}

/// Render every complete session, in day order then session order.
pub fn render_events(schedule: &Schedule, tz: Tz) -> Rendered {
    let mut rendered = Rendered::default();
    for (day, session) in schedule.sessions() {
        match render_session(day, session, schedule, tz) {
            Some(Ok(event)) => rendered.events.push(event),
            Some(Err(missing)) => rendered.missing_uids.push(missing),
            None => {}
        }
    }
    rendered
}

/// The full calendar document, CRLF-terminated, one blank line between
/// event records.
pub fn to_calendar(events: &[CalendarEvent], tz: Tz, generated_at: DateTime<Utc>) -> String {
    let stamp = format_timestamp(&generated_at);

    let mut calendar = ics::ICalendar::new("2.0", PRODUCT_ID);
    calendar.push(Property::new("DTSTAMP", stamp.as_str()));
    calendar.push(Property::new("X-WR-CALNAME", CALENDAR_NAME));
    calendar.push(Property::new("X-WR-TIMEZONE", tz.name()));

    for e in events {
        let mut event = ics::Event::new(e.uid.as_str(), stamp.as_str());
        event.push(Summary::new(escape_text(&e.summary)));
        event.push(DtStart::new(e.dtstart()));
        event.push(DtEnd::new(e.dtend()));
        if let Some(ref description) = e.description {
            event.push(Description::new(description.as_str()));
        }
        calendar.add_event(event);
    }

    calendar
        .to_string()
        .replace("END:VEVENT\r\nBEGIN:VEVENT", "END:VEVENT\r\n\r\nBEGIN:VEVENT")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::StreamLink;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn session(title: &str, time: &str, uid: &str) -> Session {
        Session {
            title: Some(title.to_string()),
            time: Some(time.to_string()),
            uid: Some(uid.to_string()),
            ..Session::default()
        }
    }

    fn one_day(date: NaiveDate, sessions: Vec<Session>) -> Schedule {
        Schedule {
            days: vec![Day {
                date,
                sessions,
                extra: Default::default(),
            }],
            ..Schedule::default()
        }
    }

    #[test]
    fn test_parse_time_range() {
        let nine = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        let ten_thirty = NaiveTime::from_hms_opt(10, 30, 0).unwrap();
        assert_eq!(parse_time_range("09:00-10:30"), Some((nine, ten_thirty)));
        assert_eq!(parse_time_range(" 09:00 - 10:30 "), Some((nine, ten_thirty)));
        assert_eq!(parse_time_range("09:00"), None);
        assert_eq!(parse_time_range("09:00-10:00-11:00"), None);
        assert_eq!(parse_time_range("nine-ten"), None);
    }

    #[test]
    fn test_new_york_standard_and_daylight_time() {
        let tz = chrono_tz::America::New_York;

        let winter = one_day(date(2025, 1, 15), vec![session("Talk", "09:00-10:00", "a")]);
        let winter = render_events(&winter, tz);
        assert_eq!(winter.events[0].dtstart(), "20250115T140000Z");
        assert_eq!(winter.events[0].dtend(), "20250115T150000Z");

        let summer = one_day(date(2025, 7, 15), vec![session("Talk", "09:00-10:00", "a")]);
        let summer = render_events(&summer, tz);
        assert_eq!(summer.events[0].dtstart(), "20250715T130000Z");
        assert_eq!(summer.events[0].dtend(), "20250715T140000Z");
    }

    #[test]
    fn test_dst_edges() {
        let tz = chrono_tz::America::New_York;
        let half_past = |h| NaiveTime::from_hms_opt(h, 30, 0).unwrap();

        // 02:30 does not exist on 2025-03-09; EST still applies.
        assert_eq!(
            format_timestamp(&local_to_utc(date(2025, 3, 9), half_past(2), tz)),
            "20250309T073000Z"
        );
        // 01:30 happens twice on 2025-11-02; take the EDT one.
        assert_eq!(
            format_timestamp(&local_to_utc(date(2025, 11, 2), half_past(1), tz)),
            "20251102T053000Z"
        );
    }

    #[test]
    fn test_bare_session_has_no_description() {
        let rendered = render_events(
            &one_day(date(2025, 3, 14), vec![session("Talk", "09:00-10:00", "abc")]),
            chrono_tz::UTC,
        );
        assert_eq!(
            rendered.events,
            vec![CalendarEvent {
                uid: "abc@continuumcon".to_string(),
                summary: "Talk".to_string(),
                start: Utc.with_ymd_and_hms(2025, 3, 14, 9, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0).unwrap(),
                description: None,
            }]
        );

        let ics = to_calendar(&rendered.events, chrono_tz::UTC, Utc::now());
        assert!(!ics.contains("DESCRIPTION"), "{}", ics);
    }

    #[test]
    fn test_full_description() {
        let mut talk = session("Talk", "09:00-10:00", "abc");
        talk.abstract_text = Some("  Deep dive.\nTwo lines.\n".to_string());
        talk.difficulty = Some("Advanced".to_string());

        let mut schedule = one_day(date(2025, 3, 14), vec![talk]);
        schedule.stream_links = vec![
            StreamLink {
                label: Some("YouTube".to_string()),
                urls: vec![
                    "https://yt.example/a".to_string(),
                    "https://yt.example/b".to_string(),
                ],
                extra: Default::default(),
            },
            StreamLink {
                label: None,
                urls: vec!["https://twitch.example".to_string()],
                extra: Default::default(),
            },
        ];
        schedule.access_conference_url = Some("https://continuumcon.example".to_string());

        let rendered = render_events(&schedule, chrono_tz::UTC);
        assert_eq!(
            rendered.events[0].description.as_deref(),
            Some(
                "Deep dive.\\nTwo lines.\\nLevel: Advanced\\n\\nWatch the stream:\\n\
                 - https://yt.example/a\\n- https://yt.example/b\\n- https://twitch.example\\n\\n\
                 Access ContinuumCon content:\\n- https://continuumcon.example"
            )
        );
    }

    #[test]
    fn test_summary_collapses_line_breaks() {
        let title = "Rust\nin\r\nproduction\n";
        let rendered = render_events(
            &one_day(date(2025, 3, 14), vec![session(title, "09:00-10:00", "a")]),
            chrono_tz::UTC,
        );
        assert_eq!(rendered.events[0].summary, "Rust in production");
    }

    #[test]
    fn test_incomplete_sessions_are_skipped_silently() {
        let untitled = Session {
            time: Some("09:00-10:00".to_string()),
            uid: Some("u1".to_string()),
            ..Session::default()
        };
        let untimed = Session {
            title: Some("Hallway track".to_string()),
            uid: Some("u2".to_string()),
            ..Session::default()
        };
        let malformed = session("Broken", "09:00", "u3");
        let rendered = render_events(
            &one_day(date(2025, 3, 14), vec![untitled, untimed, malformed]),
            chrono_tz::UTC,
        );
        assert!(rendered.events.is_empty());
        assert!(rendered.missing_uids.is_empty());
    }

    #[test]
    fn test_missing_uid_is_excluded_and_reported() {
        let mut no_uid = session("Orphan", "14:15-15:00", "");
        no_uid.uid = None;
        let rendered = render_events(
            &one_day(
                date(2025, 3, 14),
                vec![session("Kept", "09:00-10:00", "k"), no_uid],
            ),
            chrono_tz::UTC,
        );
        assert_eq!(rendered.events.len(), 1);
        assert_eq!(
            rendered.missing_uids,
            vec![MissingUid {
                date: date(2025, 3, 14),
                start: "14:15".to_string(),
                title: "Orphan".to_string(),
            }]
        );
        assert_eq!(rendered.missing_uids[0].to_string(), "2025-03-14 14:15 Orphan");
    }

    #[test]
    fn test_uid_line_breaks_are_collapsed() {
        let schedule = one_day(date(2025, 3, 14), vec![session("Talk", "09:00-10:00", "x\ny")]);
        let events = render_events(&schedule, chrono_tz::UTC).events;
        assert_eq!(events[0].uid, "x y@continuumcon");

        let ics = to_calendar(&events, chrono_tz::UTC, Utc::now());
        assert!(ics.contains("UID:x y@continuumcon\r\n"), "{}", ics);
        assert!(
            ics.match_indices('\n').all(|(i, _)| i > 0 && &ics[i - 1..i] == "\r"),
            "bare LF in output"
        );
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("plain"), "plain");
        assert_eq!(escape_text("a,b;c\\d"), "a\\,b\\;c\\\\d");
        assert_eq!(escape_text("one\r\ntwo\rthree\nfour"), "one\\ntwo\\nthree\\nfour");
    }

    #[test]
    fn test_summary_and_description_are_escaped_on_output() {
        let mut talk = session("Rust; C, and friends", "09:00-10:00", "a");
        talk.abstract_text = Some("Bring a laptop, or don't.".to_string());
        let schedule = one_day(date(2025, 3, 14), vec![talk]);
        let events = render_events(&schedule, chrono_tz::UTC).events;

        assert_eq!(events[0].summary, "Rust; C, and friends");
        assert_eq!(events[0].description.as_deref(), Some("Bring a laptop\\, or don't."));

        let ics = to_calendar(&events, chrono_tz::UTC, Utc::now());
        assert!(ics.contains("SUMMARY:Rust\\; C\\, and friends\r\n"), "{}", ics);
    }

    #[test]
    fn test_events_keep_document_order() {
        let schedule = one_day(
            date(2025, 3, 14),
            vec![
                session("Late", "16:00-17:00", "b"),
                session("Early", "09:00-10:00", "a"),
            ],
        );
        let summaries: Vec<String> = render_events(&schedule, chrono_tz::UTC)
            .events
            .into_iter()
            .map(|e| e.summary)
            .collect();
        assert_eq!(summaries, vec!["Late", "Early"]);
    }

    #[test]
    fn test_calendar_framing() {
        let schedule = one_day(
            date(2025, 3, 14),
            vec![
                session("One", "09:00-10:00", "a"),
                session("Two", "10:00-11:00", "b"),
            ],
        );
        let generated_at = Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap();
        let events = render_events(&schedule, chrono_tz::UTC).events;
        let ics = to_calendar(&events, chrono_tz::UTC, generated_at);

        assert!(ics.starts_with("BEGIN:VCALENDAR\r\n"), "{}", ics);
        assert!(ics.trim_end().ends_with("END:VCALENDAR"), "{}", ics);
        assert!(ics.contains("VERSION:2.0\r\n"));
        assert!(ics.contains(&format!("PRODID:{}\r\n", PRODUCT_ID)));
        assert!(ics.contains("DTSTAMP:20250301T120000Z\r\n"));
        assert!(ics.contains("X-WR-CALNAME:ContinuumCon\r\n"));
        assert!(ics.contains("UID:a@continuumcon\r\n"));
        assert!(ics.contains("END:VEVENT\r\n\r\nBEGIN:VEVENT"), "{}", ics);
        assert_eq!(ics.matches("BEGIN:VEVENT").count(), 2);
        assert!(
            ics.match_indices('\n').all(|(i, _)| i > 0 && &ics[i - 1..i] == "\r"),
            "bare LF in output"
        );
    }

    #[test]
    fn test_empty_calendar_is_header_and_footer() {
        let ics = to_calendar(&[], chrono_tz::UTC, Utc::now());
        assert!(ics.contains("BEGIN:VCALENDAR"));
        assert!(ics.contains("END:VCALENDAR"));
        assert!(!ics.contains("VEVENT"));
    }
}
