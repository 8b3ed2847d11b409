//! Measurement records with per-metric polarity.
//!
//! A [`Record`] is an immutable scalar measurement. The metric kind is a type
//! parameter, so comparing or combining records of different kinds does not
//! compile. Each kind carries a static [`Polarity`]:
//!
//! - lower-is-better kinds (latencies) invert the natural order, so a record
//!   with a *higher* raw value compares as *less*, and subtraction is reversed
//!   (`a - b` yields `b.value() - a.value()`);
//! - higher-is-better kinds (throughput) keep the natural order and
//!   subtraction.
//!
//! In both cases `a - b` is positive when `a` is the better measurement and
//! `max` over a set of records of one kind selects the best one.

use serde::{Deserialize, Serialize};

use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Add, Sub};

/// Direction in which a metric improves.
pub trait Polarity {
    const NAME: &'static str;

    fn compare(lhs: f64, rhs: f64) -> Option<Ordering>;

    /// How much better `lhs` is than `rhs`.
    fn improvement(lhs: f64, rhs: f64) -> f64;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LowerIsBetter;

#[derive(Debug, Clone, Copy, Default)]
pub struct HigherIsBetter;

impl Polarity for LowerIsBetter {
    const NAME: &'static str = "lower_is_better";

    fn compare(lhs: f64, rhs: f64) -> Option<Ordering> {
        rhs.partial_cmp(&lhs)
    }

    fn improvement(lhs: f64, rhs: f64) -> f64 {
        rhs - lhs
    }
}

impl Polarity for HigherIsBetter {
    const NAME: &'static str = "higher_is_better";

    fn compare(lhs: f64, rhs: f64) -> Option<Ordering> {
        lhs.partial_cmp(&rhs)
    }

    fn improvement(lhs: f64, rhs: f64) -> f64 {
        lhs - rhs
    }
}

/// Static description of one metric kind.
pub trait Metric: fmt::Debug + Clone + Copy + Default + 'static {
    type Polarity: Polarity;

    /// Key used in serialized result dictionaries.
    const TAG: &'static str;
    const HEADER: &'static str;
    /// Header used when the value comes from min/max/mean aggregation.
    const AGGREGATED_HEADER: &'static str;

    fn wrap(record: Record<Self>) -> AnyRecord;

    fn unwrap(record: &AnyRecord) -> Option<Record<Self>>;
}

#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Record<M: Metric> {
    value: f64,
    #[serde(default)]
    timestamp: f64,
    #[serde(skip)]
    _metric: PhantomData<M>,
}

impl<M: Metric> Record<M> {
    pub fn new(value: f64) -> Self {
        Self::with_timestamp(value, 0.0)
    }

    /// `timestamp` is the elapsed time in seconds since profiling started.
    pub fn with_timestamp(value: f64, timestamp: f64) -> Self {
        Self {
            value,
            timestamp,
            _metric: PhantomData,
        }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn timestamp(&self) -> f64 {
        self.timestamp
    }

    pub fn tag() -> &'static str {
        M::TAG
    }

    pub fn polarity() -> &'static str {
        <M::Polarity as Polarity>::NAME
    }

    pub fn header(aggregation_tag: bool) -> &'static str {
        if aggregation_tag {
            M::AGGREGATED_HEADER
        } else {
            M::HEADER
        }
    }
}

impl<M: Metric> Clone for Record<M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: Metric> Copy for Record<M> {}

impl<M: Metric> fmt::Debug for Record<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("tag", &M::TAG)
            .field("value", &self.value)
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

impl<M: Metric> PartialEq for Record<M> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<M: Metric> PartialOrd for Record<M> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        M::Polarity::compare(self.value, other.value)
    }
}

impl<M: Metric> Add for Record<M> {
    type Output = Record<M>;

    fn add(self, other: Self) -> Self::Output {
        Record::new(self.value + other.value)
    }
}

/// `a - b` is how much `a` improves on `b`: `b - a` for latency kinds and
/// `a - b` for throughput. `a - b == -(b - a)` holds for every kind.
impl<M: Metric> Sub for Record<M> {
    type Output = Record<M>;

    fn sub(self, other: Self) -> Self::Output {
        Record::new(M::Polarity::improvement(self.value, other.value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    Min,
    Max,
    Mean,
}

/// Folds records of one kind. `Max` picks the best record for the metric's
/// polarity, `Min` the worst. Returns `None` for an empty slice.
pub fn aggregate<M: Metric>(records: &[Record<M>], how: Aggregation) -> Option<Record<M>> {
    let (first, rest) = records.split_first()?;
    let out = match how {
        Aggregation::Min => rest
            .iter()
            .fold(*first, |acc, r| if r < &acc { *r } else { acc }),
        Aggregation::Max => rest
            .iter()
            .fold(*first, |acc, r| if r > &acc { *r } else { acc }),
        Aggregation::Mean => {
            let total = rest.iter().fold(*first, |acc, r| acc + *r);
            Record::new(total.value() / records.len() as f64)
        }
    };
    Some(out)
}

macro_rules! metrics {
    ($(
        $(#[$doc:meta])*
        $marker:ident => $alias:ident {
            polarity: $polarity:ty,
            tag: $tag:literal,
            header: $header:literal,
            aggregated: $aggregated:literal $(,)?
        }
    )+) => {
        $(
            $(#[$doc])*
            #[derive(Debug, Clone, Copy, Default)]
            pub struct $marker;

            pub type $alias = Record<$marker>;

            impl Metric for $marker {
                type Polarity = $polarity;

                const TAG: &'static str = $tag;
                const HEADER: &'static str = $header;
                const AGGREGATED_HEADER: &'static str = $aggregated;

                fn wrap(record: Record<Self>) -> AnyRecord {
                    AnyRecord::$alias(record)
                }

                fn unwrap(record: &AnyRecord) -> Option<Record<Self>> {
                    match record {
                        AnyRecord::$alias(r) => Some(*r),
                        #[allow(unreachable_patterns)]
                        _ => None,
                    }
                }
            }
        )+

        /// A record of any known kind, used where kinds are mixed (result sets).
        #[derive(Debug, Clone, Copy, PartialEq)]
        pub enum AnyRecord {
            $($alias($alias),)+
        }

        impl AnyRecord {
            /// All known tags in declaration order.
            pub const TAGS: &'static [&'static str] = &[$($tag,)+];

            pub fn from_tag(tag: &str, value: f64) -> Option<Self> {
                match tag {
                    $($tag => Some(Self::$alias(Record::new(value))),)+
                    _ => None,
                }
            }

            pub fn tag(&self) -> &'static str {
                match self {
                    $(Self::$alias(_) => $tag,)+
                }
            }

            pub fn value(&self) -> f64 {
                match self {
                    $(Self::$alias(r) => r.value(),)+
                }
            }

            pub fn timestamp(&self) -> f64 {
                match self {
                    $(Self::$alias(r) => r.timestamp(),)+
                }
            }

            pub fn header(&self, aggregation_tag: bool) -> &'static str {
                match self {
                    $(Self::$alias(_) => $alias::header(aggregation_tag),)+
                }
            }

            /// Improvement of `self` over `other`; `None` when kinds differ.
            pub fn improvement_over(&self, other: &AnyRecord) -> Option<f64> {
                match (self, other) {
                    $((Self::$alias(a), Self::$alias(b)) => Some((*a - *b).value()),)+
                    #[allow(unreachable_patterns)]
                    _ => None,
                }
            }
        }
    };
}

metrics! {
    /// p99 client latency in milliseconds.
    LatencyP99 => PerfLatency {
        polarity: LowerIsBetter,
        tag: "perf_latency_p99",
        header: "p99 Latency (ms)",
        aggregated: "p99 Latency (ms)",
    }
    LatencyP95 => PerfLatencyP95 {
        polarity: LowerIsBetter,
        tag: "perf_latency_p95",
        header: "p95 Latency (ms)",
        aggregated: "p95 Latency (ms)",
    }
    LatencyP90 => PerfLatencyP90 {
        polarity: LowerIsBetter,
        tag: "perf_latency_p90",
        header: "p90 Latency (ms)",
        aggregated: "p90 Latency (ms)",
    }
    LatencyP50 => PerfLatencyP50 {
        polarity: LowerIsBetter,
        tag: "perf_latency_p50",
        header: "p50 Latency (ms)",
        aggregated: "p50 Latency (ms)",
    }
    LatencyAvg => PerfLatencyAvg {
        polarity: LowerIsBetter,
        tag: "perf_latency_avg",
        header: "Avg Latency (ms)",
        aggregated: "Mean Avg Latency (ms)",
    }
    LatencyStd => PerfLatencyStd {
        polarity: LowerIsBetter,
        tag: "perf_latency_std",
        header: "Latency Std (ms)",
        aggregated: "Mean Latency Std (ms)",
    }
    /// Inferences per second.
    Throughput => PerfThroughput {
        polarity: HigherIsBetter,
        tag: "perf_throughput",
        header: "Throughput (infer/sec)",
        aggregated: "Max Throughput (infer/sec)",
    }
}
