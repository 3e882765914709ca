// Copyright 2026 Openbox Contributors
// SPDX-License-Identifier: Apache-2.0

//! Openbox runtime — drives a headless browser over an infinite-scroll
//! open-box listing until it stops growing, then hands the page to
//! `openbox_catalog` for extraction and persistence.
//!
//! This library crate exposes the modules for the `openbox` binary and for
//! integration testing.

pub mod cli;
pub mod config;
pub mod convergence;
pub mod pipeline;
pub mod progress;
pub mod renderer;
pub mod rest;
pub mod scripts;
pub mod session;
