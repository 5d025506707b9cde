// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Synchronous SQL helpers run inside tokio-rusqlite `call` closures.

pub mod conversations;
