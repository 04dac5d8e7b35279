// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod api_keys;
mod invariants;
mod scenarios;
mod support;
mod wiring;
