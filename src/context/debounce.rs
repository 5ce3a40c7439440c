// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Naiad-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Naiad and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Trailing-edge debouncing for chatty persistence.
//!
//! Timestamp touches arrive on every edit; writing each one through would
//! multiply store traffic for no benefit. The debouncer keeps only the most
//! recent scheduled future and runs it after the delay elapses without a
//! newer one arriving.
//!
//! Only the pre-fire wait is cancellable. Each call stamps a generation;
//! the spawned task re-checks the stamp after its sleep and returns if a
//! newer call superseded it. A future that has already started is never
//! interrupted, so an in-flight store write always finishes.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
pub struct Debouncer {
    delay: Duration,
    generation: Arc<AtomicU64>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedules `fut` to run after the delay, superseding any previously
    /// scheduled future that has not fired yet. Must be called from within a
    /// tokio runtime.
    pub fn schedule<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let delay = self.delay;
        let generation = self.generation.clone();
        let scheduled = generation.fetch_add(1, Ordering::SeqCst) + 1;

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Stale stamp: a newer schedule or a cancel arrived during the
            // wait. Once past this check the future runs to completion.
            if generation.load(Ordering::SeqCst) != scheduled {
                return;
            }
            fut.await;
        });
    }

    /// Supersedes the pending future, if any, without running it. A future
    /// that has already started is left to finish.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
