// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Argon2 parameters for password hashing.
//!
//! Release and debug builds use `Argon2::default()` (Argon2id, 19 MiB, t=2,
//! p=1). Unit tests in this crate use a 1 MiB / t=1 instance so that the many
//! hash-and-verify tests stay fast. The test parameters MUST NOT reach
//! production, which the `cfg(test)` gate guarantees.

use argon2::Argon2;
#[cfg(test)]
use argon2::{Algorithm, Params, Version};

#[inline]
pub(crate) fn argon2_instance() -> Argon2<'static> {
	#[cfg(test)]
	{
		match Params::new(1024, 1, 1, None) {
			Ok(params) => Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
			Err(_) => Argon2::default(),
		}
	}

	#[cfg(not(test))]
	{
		Argon2::default()
	}
}
