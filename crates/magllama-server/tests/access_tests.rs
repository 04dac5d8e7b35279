// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Access core integration tests entry point.
//!
//! Every test runs against a migrated in-memory database wired through
//! `AccessCore::from_pool`, so audit entries land in `activity_logs`.

mod access;
