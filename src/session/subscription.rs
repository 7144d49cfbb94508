//! Subscription acknowledgement aggregation for one connect cycle.

use crate::error::SubscriptionError;
use crate::session::transport::{GrantedQos, SubscribeAck, SUBACK_FAILURE};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOutcome {
    pub filter: String,
    pub granted: Vec<GrantedQos>,
    pub ack: Option<SubscribeAck>,
}

impl FilterOutcome {
    pub fn rejected(&self) -> bool {
        self.granted.iter().any(|g| g.qos == SUBACK_FAILURE)
    }

    pub fn timed_out(&self) -> bool {
        self.ack.is_none()
    }

    fn details(&self, out: &mut Vec<String>) {
        let Some(ack) = &self.ack else {
            out.push(format!("timeout:{}", self.filter));
            return;
        };

        if !ack.granted.is_empty() {
            if self.rejected() {
                out.push(format!("rejected:{}", self.filter));
            }
        } else if ack.error.is_none() {
            out.push(format!("none:{}", self.filter));
        }

        if let Some(err) = &ack.error {
            if let Some(code) = err.reason_code {
                out.push(format!("rc:{}", code));
            }
            if let Some(reason) = err.reason_text.as_deref().filter(|r| !r.is_empty()) {
                out.push(format!("reason:{}", reason));
            }
            let label = if ack.granted.is_empty() { "error" } else { "warn" };
            let message = if err.message.is_empty() { "Subscribe error" } else { &err.message };
            out.push(format!("{}:{}", label, message));
        }
    }
}

/// Everything learned from one connect cycle, in acknowledgement order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionOutcome {
    pub filters: Vec<String>,
    pub results: Vec<FilterOutcome>,
}

impl SubscriptionOutcome {
    pub fn filter_label(&self) -> String {
        self.filters.join(", ")
    }

    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if self.filters.len() > 1 {
            parts.push(format!("subscribed {} filters", self.filters.len()));
        }

        let granted: Vec<String> = self
            .results
            .iter()
            .flat_map(|r| r.granted.iter())
            .map(|g| format!("{}:{}", g.filter, g.qos))
            .collect();
        if granted.is_empty() {
            parts.push("granted:none".to_string());
        } else {
            parts.push(format!("granted:{}", granted.join(", ")));
        }

        for result in &self.results {
            result.details(&mut parts);
        }

        let summary = parts.into_iter().filter(|p| !p.is_empty()).collect::<Vec<_>>().join(" | ");
        if summary.is_empty() { "subscribed".to_string() } else { summary }
    }

    pub fn errors(&self) -> Vec<SubscriptionError> {
        self.results
            .iter()
            .filter_map(|r| {
                if r.timed_out() {
                    return Some(SubscriptionError::Timeout { filter: r.filter.clone() });
                }
                if r.rejected() {
                    return Some(SubscriptionError::Rejected { filter: r.filter.clone() });
                }
                let err = r.ack.as_ref()?.error.as_ref()?;
                Some(SubscriptionError::Failed {
                    filter: r.filter.clone(),
                    message: err.message.clone(),
                })
            })
            .collect()
    }
}

/// Counts down the filters still awaiting an answer.
#[derive(Debug)]
pub struct SubscriptionCycle {
    filters: Vec<String>,
    pending: Vec<String>,
    results: Vec<FilterOutcome>,
}

impl SubscriptionCycle {
    pub fn new(filters: Vec<String>) -> Self {
        Self {
            pending: filters.clone(),
            filters,
            results: Vec::new(),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.pending.is_empty()
    }

    /// Returns the outcome once the last pending filter has been answered.
    /// Answers for filters that are not pending are ignored.
    pub fn record(&mut self, filter: &str, ack: SubscribeAck) -> Option<SubscriptionOutcome> {
        let Some(position) = self.pending.iter().position(|f| f == filter) else {
            tracing::debug!("Ignoring ack for filter '{}' outside the current cycle", filter);
            return None;
        };
        self.pending.remove(position);
        self.results.push(FilterOutcome {
            filter: filter.to_string(),
            granted: ack.granted.clone(),
            ack: Some(ack),
        });

        if self.is_complete() { Some(self.outcome()) } else { None }
    }

    /// Closes the cycle, marking every unanswered filter as timed out.
    pub fn expire(mut self) -> SubscriptionOutcome {
        for filter in std::mem::take(&mut self.pending) {
            self.results.push(FilterOutcome { filter, granted: Vec::new(), ack: None });
        }
        self.outcome()
    }

    fn outcome(&self) -> SubscriptionOutcome {
        SubscriptionOutcome {
            filters: self.filters.clone(),
            results: self.results.clone(),
        }
    }
}
