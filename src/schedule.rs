//! The schedule document: days, sessions, stream links and the conference
//! timezone, as authored by the program committee.

use crate::error::{ScheduleError, ScheduleResult};
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

pub const DEFAULT_TIMEZONE: &str = "UTC";

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Schedule {
    #[serde(default)]
    pub days: Vec<Day>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stream_links: Vec<StreamLink>,
    #[serde(default, with = "text", skip_serializing_if = "Option::is_none")]
    pub access_conference_url: Option<String>,
    #[serde(default, with = "text", skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Keys we don't interpret, kept so a rewrite doesn't lose them.
    #[serde(flatten)]
    pub extra: serde_yaml::Mapping,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Day {
    #[serde(with = "date_format")]
    pub date: NaiveDate,
    #[serde(default)]
    pub sessions: Vec<Session>,
    #[serde(flatten)]
    pub extra: serde_yaml::Mapping,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Session {
    #[serde(default, with = "text", skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// "HH:MM-HH:MM" in the conference timezone.
    #[serde(default, with = "text", skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(rename = "abstract", default, with = "text", skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    #[serde(default, with = "text", skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
    #[serde(default, with = "text", skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(flatten)]
    pub extra: serde_yaml::Mapping,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StreamLink {
    #[serde(default, with = "text", skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(deserialize_with = "one_or_many")]
    pub urls: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_yaml::Mapping,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

impl Schedule {
    /// Read and parse the schedule at `path`.
    pub fn load(path: &Path) -> ScheduleResult<Schedule> {
        if !path.exists() {
            return Err(ScheduleError::NotFound(path.to_path_buf()));
        }
        let contents = fs::read_to_string(path).map_err(|e| ScheduleError::io(path, e))?;
        if contents.trim().is_empty() {
            return Ok(Schedule::default());
        }
        let schedule: Schedule =
            serde_yaml::from_str(&contents).map_err(|source| ScheduleError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        debug!(
            path = %path.display(),
            days = schedule.days.len(),
            "loaded schedule"
        );
        Ok(schedule)
    }

    /// Overwrite `path` with this schedule.
    pub fn save(&self, path: &Path) -> ScheduleResult<()> {
        let contents = serde_yaml::to_string(self).map_err(ScheduleError::Serialize)?;
        fs::write(path, contents).map_err(|e| ScheduleError::io(path, e))
    }

    /// The conference timezone: the document's own field wins, then
    /// `fallback` (flag or `CONFERENCE_TZ`), then UTC.
    pub fn resolve_timezone(&self, fallback: Option<&str>) -> ScheduleResult<Tz> {
        let name = non_blank(self.timezone.as_deref())
            .or_else(|| non_blank(fallback))
            .unwrap_or(DEFAULT_TIMEZONE);
        name.parse::<Tz>()
            .map_err(|_| ScheduleError::UnknownTimezone(name.to_string()))
    }

    pub fn access_url(&self) -> Option<&str> {
        non_blank(self.access_conference_url.as_deref())
    }

    /// Every stream URL across all links, in document order.
    pub fn stream_urls(&self) -> impl Iterator<Item = &str> {
        self.stream_links
            .iter()
            .flat_map(|link| link.urls.iter().map(String::as_str))
    }

    pub fn sessions(&self) -> impl Iterator<Item = (&Day, &Session)> {
        self.days
            .iter()
            .flat_map(|day| day.sessions.iter().map(move |session| (day, session)))
    }
}

impl Session {
    pub fn title(&self) -> Option<&str> {
        non_blank(self.title.as_deref())
    }

    pub fn time_range(&self) -> Option<&str> {
        non_blank(self.time.as_deref())
    }

    pub fn uid(&self) -> Option<&str> {
        non_blank(self.uid.as_deref())
    }
}

mod date_format {
    use chrono::NaiveDate;
    use serde::{self, Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = format!("{}", date.format(FORMAT));
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(s.trim(), FORMAT).map_err(serde::de::Error::custom)
    }
}

/// Free-text fields. Authors write `difficulty: 1` or `uid: 42` as often as
/// quoted strings, so plain scalars are all taken as text.
mod text {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use serde_yaml::Value;

    pub fn serialize<S>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(s) => serializer.serialize_str(s),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s)),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(Value::Bool(b)) => Ok(Some(b.to_string())),
            Some(other) => Err(D::Error::custom(format!(
                "expected a text value, found {:?}",
                other
            ))),
        }
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(url) => vec![url],
        OneOrMany::Many(urls) => urls,
    })
}
