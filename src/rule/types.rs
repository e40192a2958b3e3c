//! Leaf value types shared by all rule shapes.
//!
//! Metric and condition names are open sets: the backend owns the catalogue,
//! so unknown names are kept verbatim in an `Other` variant instead of being
//! rejected here.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Declares a string-backed enum with a fallback `Other(String)` variant.
macro_rules! named_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
            /// A name this crate does not know; passed through unchanged.
            Other(String),
        }

        impl $name {
            /// Every known variant, in declaration order.
            pub const KNOWN: &'static [$name] = &[ $( $name::$variant, )+ ];

            /// Wire name.
            #[must_use]
            pub fn as_str(&self) -> &str {
                match self {
                    $( Self::$variant => $wire, )+
                    Self::Other(name) => name.as_str(),
                }
            }

            /// Parses a wire name; unknown names become `Other`.
            #[must_use]
            pub fn from_name(name: &str) -> Self {
                match name {
                    $( $wire => Self::$variant, )+
                    other => Self::Other(other.to_string()),
                }
            }

            /// True for names outside the known catalogue.
            #[must_use]
            pub const fn is_other(&self) -> bool {
                matches!(self, Self::Other(_))
            }

            /// True if the name is empty or whitespace.
            #[must_use]
            pub fn is_blank(&self) -> bool {
                self.as_str().trim().is_empty()
            }
        }

        impl From<String> for $name {
            fn from(name: String) -> Self {
                match Self::from_name(&name) {
                    Self::Other(_) => Self::Other(name),
                    known => known,
                }
            }
        }

        impl From<&str> for $name {
            fn from(name: &str) -> Self {
                Self::from_name(name)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                match value {
                    $name::Other(name) => name,
                    known => known.as_str().to_string(),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

named_enum! {
    /// Backend metric a rule compares against.
    pub enum MetricType {
        /// Errors as a share of all events.
        ErrorRate => "ERROR_RATE",
        /// Error count.
        TotalErrors => "TOTAL_ERRORS",
        /// Error rate for one source.
        SourceErrorRate => "SOURCE_ERROR_RATE",
        /// Mean latency.
        AvgLatency => "AVG_LATENCY",
        /// Median latency.
        P50Latency => "P50_LATENCY",
        /// 95th percentile latency.
        P95Latency => "P95_LATENCY",
        /// 99th percentile latency.
        P99Latency => "P99_LATENCY",
        /// Worst latency.
        MaxLatency => "MAX_LATENCY",
        /// Best latency.
        MinLatency => "MIN_LATENCY",
        /// Throughput per second.
        EventsPerSecond => "EVENTS_PER_SECOND",
        /// Throughput per minute.
        EventsPerMinute => "EVENTS_PER_MINUTE",
        /// Throughput per hour.
        EventsPerHour => "EVENTS_PER_HOUR",
        /// Throughput per day.
        EventsPerDay => "EVENTS_PER_DAY",
        /// Highest observed throughput.
        PeakThroughput => "PEAK_THROUGHPUT",
        /// Mean throughput over one hour.
        AvgThroughput1h => "AVG_THROUGHPUT_1H",
        /// Mean throughput over one day.
        AvgThroughput24h => "AVG_THROUGHPUT_24H",
        /// Events in the last minute.
        EventsLast1Minute => "EVENTS_LAST_1_MINUTE",
        /// Events in the last five minutes.
        EventsLast5Minutes => "EVENTS_LAST_5_MINUTES",
        /// Events in the last fifteen minutes.
        EventsLast15Minutes => "EVENTS_LAST_15_MINUTES",
        /// Events in the last hour.
        EventsLast1Hour => "EVENTS_LAST_1_HOUR",
        /// Events in the last day.
        EventsLast24Hours => "EVENTS_LAST_24_HOURS",
        /// All events seen.
        TotalEvents => "TOTAL_EVENTS",
        /// Distinct sources.
        UniqueSources => "UNIQUE_SOURCES",
        /// Distinct event types.
        UniqueEventTypes => "UNIQUE_EVENT_TYPES",
        /// Distinct users.
        UniqueUsers => "UNIQUE_USERS",
        /// Backend health score.
        SystemHealth => "SYSTEM_HEALTH",
        /// Users active in the last hour.
        ActiveUsersLast1Hour => "ACTIVE_USERS_LAST_1_HOUR",
        /// Users active in the last day.
        ActiveUsersLast24Hours => "ACTIVE_USERS_LAST_24_HOURS",
        /// Distinct users ever seen.
        TotalUniqueUsers => "TOTAL_UNIQUE_USERS",
        /// Count of one event type.
        EventTypeCount => "EVENT_TYPE_COUNT",
        /// Ratio of two event types.
        EventRatio => "EVENT_RATIO",
        /// Percent change of the error rate.
        ErrorRateChange => "ERROR_RATE_CHANGE",
        /// Percent change of latency.
        LatencyChange => "LATENCY_CHANGE",
        /// Percent change of throughput.
        ThroughputChange => "THROUGHPUT_CHANGE",
        /// Sudden traffic spike.
        SpikeDetection => "SPIKE_DETECTION",
    }
}

impl MetricType {
    /// The rate-of-change metric this name denotes, if any.
    #[must_use]
    pub const fn as_change(&self) -> Option<ChangeMetric> {
        match self {
            Self::ErrorRateChange => Some(ChangeMetric::ErrorRateChange),
            Self::LatencyChange => Some(ChangeMetric::LatencyChange),
            Self::ThroughputChange => Some(ChangeMetric::ThroughputChange),
            Self::SpikeDetection => Some(ChangeMetric::SpikeDetection),
            _ => None,
        }
    }

    /// True for the rate-of-change family.
    #[must_use]
    pub const fn is_change(&self) -> bool {
        self.as_change().is_some()
    }
}

named_enum! {
    /// Comparison applied to a metric and its threshold.
    pub enum Condition {
        /// `>`
        GreaterThan => "GREATER_THAN",
        /// `<`
        LessThan => "LESS_THAN",
        /// `==`
        Equals => "EQUALS",
        /// `>=`
        GreaterThanOrEqual => "GREATER_THAN_OR_EQUAL",
        /// `<=`
        LessThanOrEqual => "LESS_THAN_OR_EQUAL",
        /// `!=`
        NotEquals => "NOT_EQUALS",
        /// Inside a range.
        Between => "BETWEEN",
        /// Outside a range.
        NotBetween => "NOT_BETWEEN",
    }
}

/// Metrics accepted by rate-of-change rules.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeMetric {
    ErrorRateChange,
    LatencyChange,
    ThroughputChange,
    SpikeDetection,
}

impl From<ChangeMetric> for MetricType {
    fn from(metric: ChangeMetric) -> Self {
        match metric {
            ChangeMetric::ErrorRateChange => Self::ErrorRateChange,
            ChangeMetric::LatencyChange => Self::LatencyChange,
            ChangeMetric::ThroughputChange => Self::ThroughputChange,
            ChangeMetric::SpikeDetection => Self::SpikeDetection,
        }
    }
}

impl fmt::Display for ChangeMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(MetricType::from(*self).as_str())
    }
}

/// How composite conditions combine.
///
/// Parsed case-insensitively, emitted upper-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CompositeOperator {
    /// All conditions must hold.
    And,
    /// At least one condition must hold.
    Or,
}

impl CompositeOperator {
    /// Wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

impl TryFrom<String> for CompositeOperator {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(Self::And),
            "OR" => Ok(Self::Or),
            _ => Err(format!("unknown composite operator `{value}`; expected AND or OR")),
        }
    }
}

impl From<CompositeOperator> for String {
    fn from(op: CompositeOperator) -> Self {
        op.as_str().to_string()
    }
}

impl fmt::Display for CompositeOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A threshold as the user entered it: number or string.
///
/// The backend parses it; here it only has to be present and non-empty.
/// JSON `null` is not a threshold: it decodes as an absent field, and none of
/// the constructors produce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "Value", try_from = "Value")]
pub struct ThresholdValue(Value);

impl ThresholdValue {
    /// Numeric threshold, or `None` for NaN and infinities, which have no
    /// JSON form.
    #[must_use]
    pub fn number(n: f64) -> Option<Self> {
        serde_json::Number::from_f64(n).map(|n| Self(Value::Number(n)))
    }

    /// Threshold as entered text.
    pub fn text(s: impl Into<String>) -> Self {
        Self(Value::String(s.into()))
    }

    /// Wraps a raw JSON value; `None` for `null`.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        (!value.is_null()).then_some(Self(value))
    }

    /// The raw value.
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }

    /// True for empty or whitespace-only strings.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Numeric reading of the threshold, parsing strings.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match &self.0 {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// Non-finite numbers are kept in their text form (`NaN`, `inf`) so the
/// value survives encoding; the backend rejects them.
impl From<f64> for ThresholdValue {
    fn from(n: f64) -> Self {
        Self::number(n).unwrap_or_else(|| Self::text(n.to_string()))
    }
}

impl From<&str> for ThresholdValue {
    fn from(s: &str) -> Self {
        Self::text(s)
    }
}

impl From<ThresholdValue> for Value {
    fn from(v: ThresholdValue) -> Self {
        v.0
    }
}

impl TryFrom<Value> for ThresholdValue {
    type Error = &'static str;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value).ok_or("threshold must not be null")
    }
}

/// A minute count as entered; must be a positive integer to be valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "Value", try_from = "Value")]
pub struct Minutes(Value);

impl Minutes {
    /// Whole minutes.
    #[must_use]
    pub fn new(minutes: u64) -> Self {
        Self(Value::from(minutes))
    }

    /// Wraps a raw JSON value; `None` for `null`.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        (!value.is_null()).then_some(Self(value))
    }

    /// The raw value.
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }

    /// The minute count if it is a positive integral JSON number.
    ///
    /// Strings are not accepted, and neither is `0`.
    #[must_use]
    pub fn positive(&self) -> Option<u64> {
        let Value::Number(n) = &self.0 else {
            return None;
        };
        if let Some(v) = n.as_u64() {
            return (v > 0).then_some(v);
        }
        let f = n.as_f64()?;
        if f.is_finite() && f.fract() == 0.0 && f >= 1.0 && f <= u64::MAX as f64 {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            return Some(f as u64);
        }
        None
    }
}

impl From<Minutes> for Value {
    fn from(m: Minutes) -> Self {
        m.0
    }
}

impl TryFrom<Value> for Minutes {
    type Error = &'static str;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value).ok_or("minutes must not be null")
    }
}

impl From<u64> for Minutes {
    fn from(minutes: u64) -> Self {
        Self::new(minutes)
    }
}
