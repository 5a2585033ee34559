// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-namespace TTL resolution.

use std::collections::BTreeMap;
use std::fmt;

use chrono::Duration;

/// Annotation overriding the default TTL for a single namespace.
pub const TTL_ANNOTATION: &str = "preview-sweeper.maxsauce.com/ttl";

/// Where an effective TTL came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtlSource {
	Annotation,
	Default,
}

impl TtlSource {
	pub fn as_str(&self) -> &'static str {
		match self {
			TtlSource::Annotation => "annotation",
			TtlSource::Default => "default",
		}
	}
}

impl fmt::Display for TtlSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Effective TTL for one namespace in one pass.
///
/// The TTL is signed: an annotation such as `-1h` or `0` yields a
/// non-positive value, which disables expiry for that namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlResolution {
	pub ttl: Duration,
	pub source: TtlSource,
}

impl TtlResolution {
	pub fn expires(&self) -> bool {
		self.ttl > Duration::zero()
	}
}

/// Resolve the effective TTL from a namespace's annotations.
///
/// A malformed annotation is ignored and the default applies.
pub fn resolve_ttl(annotations: &BTreeMap<String, String>, default_ttl: Duration) -> TtlResolution {
	annotations
		.get(TTL_ANNOTATION)
		.map(|raw| raw.trim())
		.filter(|raw| !raw.is_empty())
		.and_then(parse_ttl)
		.map(|ttl| TtlResolution {
			ttl,
			source: TtlSource::Annotation,
		})
		.unwrap_or(TtlResolution {
			ttl: default_ttl,
			source: TtlSource::Default,
		})
}

/// Parse a duration expression (`4h`, `30m`, `2h45m`, `1.5h`, `-1h`),
/// falling back to a bare integer number of hours (`12`, `+5`).
fn parse_ttl(raw: &str) -> Option<Duration> {
	let (negative, expr) = match raw.strip_prefix('-') {
		Some(rest) => (true, rest),
		None => (false, raw.strip_prefix('+').unwrap_or(raw)),
	};

	if let Ok(parsed) = humantime::parse_duration(expr) {
		let ttl = Duration::from_std(parsed).ok()?;
		return Some(if negative { -ttl } else { ttl });
	}

	raw
		.parse::<u64>()
		.ok()
		.and_then(|hours| i64::try_from(hours).ok())
		.and_then(Duration::try_hours)
}

/// Render a signed duration the way operators write them (`3days`, `-1h`).
pub fn format_ttl(ttl: Duration) -> String {
	let magnitude = ttl.abs().to_std().unwrap_or_default();
	let formatted = humantime::format_duration(magnitude).to_string();
	if ttl < Duration::zero() {
		format!("-{formatted}")
	} else {
		formatted
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn annotated(value: &str) -> BTreeMap<String, String> {
		BTreeMap::from([(TTL_ANNOTATION.to_string(), value.to_string())])
	}

	fn default_ttl() -> Duration {
		Duration::hours(72)
	}

	#[test]
	fn missing_annotation_uses_default() {
		let resolved = resolve_ttl(&BTreeMap::new(), default_ttl());
		assert_eq!(resolved.ttl, default_ttl());
		assert_eq!(resolved.source, TtlSource::Default);
	}

	#[test]
	fn duration_expressions_are_parsed() {
		let cases = [
			("4h", Duration::hours(4)),
			("30m", Duration::minutes(30)),
			("2h45m", Duration::hours(2) + Duration::minutes(45)),
			("1h 30m", Duration::minutes(90)),
			("90s", Duration::seconds(90)),
			("1.5h", Duration::minutes(90)),
			("+5", Duration::hours(5)),
			("+2h", Duration::hours(2)),
		];
		for (raw, expected) in cases {
			let resolved = resolve_ttl(&annotated(raw), default_ttl());
			assert_eq!(resolved.ttl, expected, "annotation {raw:?}");
			assert_eq!(resolved.source, TtlSource::Annotation);
		}
	}

	#[test]
	fn bare_integer_is_hours() {
		let resolved = resolve_ttl(&annotated("12"), default_ttl());
		assert_eq!(resolved.ttl, Duration::hours(12));
		assert_eq!(resolved.source, TtlSource::Annotation);
	}

	#[test]
	fn surrounding_whitespace_is_ignored() {
		let resolved = resolve_ttl(&annotated("  6h\n"), default_ttl());
		assert_eq!(resolved.ttl, Duration::hours(6));
	}

	#[test]
	fn malformed_annotation_falls_back_to_default() {
		for raw in ["", "   ", "soon", "4x", "-3", "h4", "1.5.2h"] {
			let resolved = resolve_ttl(&annotated(raw), default_ttl());
			assert_eq!(resolved.ttl, default_ttl(), "annotation {raw:?}");
			assert_eq!(resolved.source, TtlSource::Default, "annotation {raw:?}");
		}
	}

	#[test]
	fn zero_and_negative_ttls_disable_expiry() {
		let zero = resolve_ttl(&annotated("0"), default_ttl());
		assert_eq!(zero.source, TtlSource::Annotation);
		assert!(!zero.expires());

		let negative = resolve_ttl(&annotated("-1h"), default_ttl());
		assert_eq!(negative.ttl, -Duration::hours(1));
		assert!(!negative.expires());
	}

	#[test]
	fn format_ttl_round_trips_sign() {
		assert_eq!(format_ttl(Duration::hours(4)), "4h");
		assert_eq!(format_ttl(-Duration::minutes(30)), "-30m");
	}

	proptest! {
		#[test]
		fn hour_minute_expressions_resolve_exactly(hours in 0u32..10_000, minutes in 0u32..60) {
			let raw = format!("{hours}h{minutes}m");
			let resolved = resolve_ttl(&annotated(&raw), default_ttl());
			prop_assert_eq!(resolved.source, TtlSource::Annotation);
			prop_assert_eq!(
				resolved.ttl,
				Duration::hours(i64::from(hours)) + Duration::minutes(i64::from(minutes))
			);
		}

		#[test]
		fn integers_resolve_as_hours(hours in 0u32..1_000_000) {
			let resolved = resolve_ttl(&annotated(&hours.to_string()), default_ttl());
			prop_assert_eq!(resolved.source, TtlSource::Annotation);
			prop_assert_eq!(resolved.ttl, Duration::hours(i64::from(hours)));
		}

		#[test]
		fn alphabetic_garbage_resolves_to_default(raw in "[a-zA-Z]{1,12}") {
			// Single unit words like "h" or "min" are not valid without a number.
			let resolved = resolve_ttl(&annotated(&raw), default_ttl());
			prop_assert_eq!(resolved.source, TtlSource::Default);
			prop_assert_eq!(resolved.ttl, default_ttl());
		}
	}
}
