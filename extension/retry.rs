/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

use std::time::Duration;

use backon::{BackoffBuilder, ConstantBuilder};

/// Two states: a single retry still available, or exhausted.
pub struct RetryPolicy {
    delays: backon::ConstantBackoff,
}

impl RetryPolicy {
    /// Allow exactly one retry, after `delay`.
    pub fn once(delay: Duration) -> Self {
        Self {
            delays: ConstantBuilder::default()
                .with_delay(delay)
                .with_max_times(1)
                .build(),
        }
    }

    /// Delay before the next attempt, or `None` once the retry is spent.
    pub fn next_delay(&mut self) -> Option<Duration> {
        self.delays.next()
    }
}
