// SPDX-FileCopyrightText: 2026 Kbchat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for kbchat integration tests.
//!
//! # Components
//!
//! - [`TestHarness`] - an initialized store over a throwaway SQLite file
//! - [`fixtures`] - builders for conversations, messages, and references

pub mod fixtures;
pub mod harness;

pub use harness::{TestHarness, TestHarnessBuilder};
