// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Naiad-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Naiad and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Naiad: database schema diagrams as data.
//!
//! The crate is an embeddable editing core: a typed diagram model, a
//! [`context::DiagramContext`] that owns mutation / undo / redo / events,
//! and pluggable persistence behind [`store::Storage`] (a folder of JSON
//! files or a remote HTTP API).

pub mod context;
pub mod history;
pub mod model;
pub mod store;
