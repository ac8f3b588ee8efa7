// 4.0: inbound notifications from data-feed collaborators.
// a feed publishes (field, old, new) triples under a topic (an order, a
// security). the hub routes them to subscribed data points through their
// data set so staleness reaches dependents.

use crate::data_point::DataPoint;
use crate::data_set::{DataSet, DataSetError};
use crate::scheduler::ChangeTracker;
use crate::types::{DataPointId, Timestamp, Value};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tracing::{trace, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    pub field: String,
    pub old_value: Value,
    pub new_value: Value,
}

impl FieldChange {
    pub fn new(field: impl Into<String>, old_value: impl Into<Value>, new_value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            old_value: old_value.into(),
            new_value: new_value.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub topic: String,
    pub changes: Vec<FieldChange>,
    pub timestamp: Timestamp,
}

impl Notification {
    pub fn new(topic: impl Into<String>, changes: Vec<FieldChange>) -> Self {
        Self {
            topic: topic.into(),
            changes,
            timestamp: Timestamp::now(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Changes for one field, in delivery order.
    pub fn changes_for<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldChange> + 'a {
        self.changes.iter().filter(move |c| c.field == field)
    }
}

#[derive(Debug, Clone)]
struct Subscription {
    data_set: Weak<DataSet>,
    point: DataPointId,
}

/// Topic -> subscribed data points. Holds data sets weakly; targets whose set
/// has been dropped are pruned on the next publish.
#[derive(Debug, Default)]
pub struct FeedHub {
    topics: RwLock<HashMap<String, Vec<Subscription>>>,
}

impl FeedHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        topic: impl Into<String>,
        data_set: &Arc<DataSet>,
        point: &DataPoint,
    ) -> Result<(), DataSetError> {
        let member = data_set.data_point_by_id(point.id());
        if !member.is_some_and(|p| std::ptr::eq(Arc::as_ptr(&p), point)) {
            return Err(DataSetError::ForeignDataPoint {
                data_set: data_set.name().to_string(),
                name: point.name().to_string(),
            });
        }

        let topic = topic.into();
        trace!(topic = %topic, data_set = %data_set.name(), data_point = %point.name(), "subscribed");
        self.topics.write().entry(topic).or_default().push(Subscription {
            data_set: Arc::downgrade(data_set),
            point: point.id(),
        });
        Ok(())
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.read().get(topic).map_or(0, Vec::len)
    }

    /// Deliver to every live subscriber of the topic, in subscription order.
    /// Returns how many sources applied the notification.
    pub fn publish(&self, notification: &Notification) -> usize {
        self.deliver_all(notification, |_, _| {})
    }

    /// Like [`FeedHub::publish`], also recording each applied delivery in
    /// `tracker`.
    pub fn publish_tracked(&self, notification: &Notification, tracker: &mut ChangeTracker) -> usize {
        self.deliver_all(notification, |data_set, point| {
            if let Err(e) = tracker.record(data_set, point) {
                warn!(data_set = %data_set.name(), error = %e, "change not tracked");
            }
        })
    }

    fn deliver_all<F>(&self, notification: &Notification, mut on_applied: F) -> usize
    where
        F: FnMut(&DataSet, &str),
    {
        let targets = match self.topics.read().get(&notification.topic) {
            Some(subs) => subs.clone(),
            None => return 0,
        };

        let mut applied = 0;
        let mut dead = false;
        for sub in &targets {
            let Some(data_set) = sub.data_set.upgrade() else {
                dead = true;
                continue;
            };
            match data_set.deliver(sub.point, notification) {
                Ok(true) => {
                    applied += 1;
                    if let Some(point) = data_set.data_point_by_id(sub.point) {
                        on_applied(&*data_set, point.name());
                    }
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(topic = %notification.topic, data_set = %data_set.name(), error = %e, "delivery failed");
                }
            }
        }

        if dead {
            if let Some(subs) = self.topics.write().get_mut(&notification.topic) {
                subs.retain(|s| s.data_set.strong_count() > 0);
            }
        }
        applied
    }
}
