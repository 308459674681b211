// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 hfed contributors

//! Attribute ownership transfer bookkeeping.
//!
//! A federate may *pull* ownership of HLA attributes (request to become the
//! publisher) or *push* it (offer to divest). Requests are queued with a
//! target logical time and drained at time-advance-grant, so transfers land
//! on frame boundaries the whole federation observes.

use crate::rti::{AttributeHandle, ObjectInstanceHandle, RtiAmbassador};
use crate::time::LogicalTime;
use crate::{debug, Result};
use parking_lot::Mutex;

/// Direction of an ownership transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnershipKind {
    /// Acquire ownership (become the publisher).
    Pull,
    /// Divest ownership (stop publishing).
    Push,
}

/// A queued transfer, due at `time` on the HLA logical timeline.
#[derive(Debug, Clone)]
pub struct OwnershipRequest {
    pub kind: OwnershipKind,
    pub instance: ObjectInstanceHandle,
    pub attributes: Vec<AttributeHandle>,
    pub time: LogicalTime,
}

/// Queue of pending ownership transfers, drained at grant time.
#[derive(Default)]
pub struct OwnershipTracker {
    queue: Mutex<Vec<OwnershipRequest>>,
}

impl OwnershipTracker {
    pub fn new() -> OwnershipTracker {
        OwnershipTracker::default()
    }

    /// Queue a pull (acquisition) due at `time`.
    pub fn pull_ownership(
        &self,
        instance: ObjectInstanceHandle,
        attributes: Vec<AttributeHandle>,
        time: LogicalTime,
    ) {
        self.queue.lock().push(OwnershipRequest {
            kind: OwnershipKind::Pull,
            instance,
            attributes,
            time,
        });
    }

    /// Queue a push (divestiture) due at `time`.
    pub fn push_ownership(
        &self,
        instance: ObjectInstanceHandle,
        attributes: Vec<AttributeHandle>,
        time: LogicalTime,
    ) {
        self.queue.lock().push(OwnershipRequest {
            kind: OwnershipKind::Push,
            instance,
            attributes,
            time,
        });
    }

    /// Number of queued transfers.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Issue every transfer due at or before `now`. Returns how many were
    /// drained. The queue lock is not held across the RTI calls.
    pub fn drain_due(&self, rti: &dyn RtiAmbassador, now: LogicalTime) -> Result<usize> {
        let due: Vec<OwnershipRequest> = {
            let mut queue = self.queue.lock();
            let mut due = Vec::new();
            let mut index = 0;
            while index < queue.len() {
                if queue[index].time <= now {
                    due.push(queue.swap_remove(index));
                } else {
                    index += 1;
                }
            }
            due
        };
        let count = due.len();
        for request in due {
            match request.kind {
                OwnershipKind::Pull => {
                    debug!(
                        "pulling ownership of {} attribute(s) on instance {}",
                        request.attributes.len(),
                        request.instance
                    );
                    rti.attribute_ownership_acquisition(
                        request.instance,
                        &request.attributes,
                        &[],
                    )?;
                }
                OwnershipKind::Push => {
                    debug!(
                        "pushing ownership of {} attribute(s) on instance {}",
                        request.attributes.len(),
                        request.instance
                    );
                    rti.unconditional_attribute_ownership_divestiture(
                        request.instance,
                        &request.attributes,
                    )?;
                }
            }
        }
        Ok(count)
    }
}
