// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan clean-up — the bilevel fax rendition.

pub mod fax;

pub use fax::fax_filter;
