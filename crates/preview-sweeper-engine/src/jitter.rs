// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::time::Duration;

/// Jitter fraction applied to the first sweep delay after startup.
pub const INITIAL_JITTER: f64 = 0.1;

/// Shift `base` by half of `base * fraction`, up or down at random.
///
/// The result lies in `[base - base*fraction/2, base + base*fraction/2]`.
/// Non-positive or non-finite fractions return `base` unchanged.
pub fn jitter(base: Duration, fraction: f64) -> Duration {
	if !fraction.is_finite() || fraction <= 0.0 {
		return base;
	}

	let half = Duration::try_from_secs_f64(base.as_secs_f64() * fraction / 2.0)
		.unwrap_or(Duration::MAX);
	if fastrand::bool() {
		base.saturating_add(half)
	} else {
		base.saturating_sub(half)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn zero_fraction_is_identity() {
		let base = Duration::from_secs(3600);
		assert_eq!(jitter(base, 0.0), base);
	}

	#[test]
	fn negative_and_nan_fractions_are_identity() {
		let base = Duration::from_secs(60);
		assert_eq!(jitter(base, -0.5), base);
		assert_eq!(jitter(base, f64::NAN), base);
	}

	#[test]
	fn result_is_exactly_half_delta_away() {
		let base = Duration::from_secs(100);
		for _ in 0..64 {
			let got = jitter(base, 0.2);
			assert!(
				got == Duration::from_secs(110) || got == Duration::from_secs(90),
				"unexpected delay {got:?}"
			);
		}
	}

	proptest! {
		#[test]
		fn result_stays_within_window(secs in 1u64..10_000_000, fraction in 0.0f64..1.0) {
			let base = Duration::from_secs(secs);
			let got = jitter(base, fraction).as_secs_f64();
			let half = base.as_secs_f64() * fraction / 2.0;
			let slack = 1e-6;
			prop_assert!(got >= base.as_secs_f64() - half - slack);
			prop_assert!(got <= base.as_secs_f64() + half + slack);
		}

		#[test]
		fn zero_fraction_never_moves(secs in 0u64..u32::MAX as u64) {
			let base = Duration::from_secs(secs);
			prop_assert_eq!(jitter(base, 0.0), base);
		}
	}
}
