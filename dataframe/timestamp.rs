use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};

/// Unix timestamps above this value are interpreted as milliseconds.
const MILLISECONDS_THRESHOLD: f64 = 1e11;

const DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/**
Parse a timestamp written as unix seconds, unix milliseconds, RFC 3339, `%Y-%m-%d %H:%M:%S`, `%Y-%m-%dT%H:%M:%S`, or `%Y-%m-%d`. Times without an offset are taken to be UTC.
*/
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
	let value = value.trim();
	if value.is_empty() {
		return None;
	}
	if let Ok(number) = lexical::parse::<f64, _>(value) {
		if !number.is_finite() {
			return None;
		}
		let millis = if number.abs() > MILLISECONDS_THRESHOLD {
			number
		} else {
			number * 1000.0
		};
		return Utc.timestamp_millis_opt(millis.round() as i64).single();
	}
	if let Ok(date_time) = DateTime::parse_from_rfc3339(value) {
		return Some(date_time.with_timezone(&Utc));
	}
	for format in DATE_TIME_FORMATS {
		if let Ok(date_time) = NaiveDateTime::parse_from_str(value, format) {
			return Some(Utc.from_utc_datetime(&date_time));
		}
	}
	NaiveDate::parse_from_str(value, "%Y-%m-%d")
		.ok()
		.and_then(|date| date.and_hms_opt(0, 0, 0))
		.map(|date_time| Utc.from_utc_datetime(&date_time))
}

/// The calendar features derived from a timestamp.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimeFeatures {
	/// 0 to 23
	pub hour_of_day: f64,
	/// 0 is Monday, 6 is Sunday.
	pub day_of_week: f64,
	/// 1 to 12
	pub month: f64,
}

impl TimeFeatures {
	pub const NAMES: [&'static str; 3] = ["hour_of_day", "day_of_week", "month"];

	pub fn missing() -> Self {
		Self {
			hour_of_day: f64::NAN,
			day_of_week: f64::NAN,
			month: f64::NAN,
		}
	}

	pub fn to_array(self) -> [f64; 3] {
		[self.hour_of_day, self.day_of_week, self.month]
	}
}

impl From<DateTime<Utc>> for TimeFeatures {
	fn from(date_time: DateTime<Utc>) -> Self {
		Self {
			hour_of_day: date_time.hour() as f64,
			day_of_week: date_time.weekday().num_days_from_monday() as f64,
			month: date_time.month() as f64,
		}
	}
}

#[test]
fn test_parse_timestamp() {
	// 2021-03-04 15:30:00 UTC was a Thursday.
	let expected = TimeFeatures {
		hour_of_day: 15.0,
		day_of_week: 3.0,
		month: 3.0,
	};
	for value in &[
		"1614871800",
		"1614871800000",
		"2021-03-04T15:30:00Z",
		"2021-03-04T16:30:00+01:00",
		"2021-03-04 15:30:00",
		"2021-03-04T15:30:00",
	] {
		let timestamp = parse_timestamp(value).unwrap();
		assert_eq!(TimeFeatures::from(timestamp), expected, "{}", value);
	}
	let date = parse_timestamp("2021-03-04").unwrap();
	assert_eq!(TimeFeatures::from(date).hour_of_day, 0.0);
}

#[test]
fn test_parse_timestamp_invalid() {
	assert_eq!(parse_timestamp(""), None);
	assert_eq!(parse_timestamp("yesterday"), None);
	assert_eq!(parse_timestamp("2021-13-40"), None);
	assert_eq!(parse_timestamp("NaN"), None);
}
