//! Per-user interaction log with bounded retention

use crate::clock::{Clock, MS_PER_DAY};
use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionType {
    View,
    Favorite,
    Search,
    Contact,
}

impl InteractionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionType::View => "view",
            InteractionType::Favorite => "favorite",
            InteractionType::Search => "search",
            InteractionType::Contact => "contact",
        }
    }
}

impl fmt::Display for InteractionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InteractionType {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "view" => Ok(InteractionType::View),
            "favorite" | "favourite" => Ok(InteractionType::Favorite),
            "search" => Ok(InteractionType::Search),
            "contact" => Ok(InteractionType::Contact),
            other => Err(EngineError::InvalidInput(format!(
                "unknown interaction type '{other}' (expected view, favorite, search or contact)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInteraction {
    pub user_id: String,
    pub property_id: String,
    #[serde(rename = "type")]
    pub interaction_type: InteractionType,
    pub timestamp_ms: u64,
}

/// An interaction is dropped once either limit is exceeded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetentionPolicy {
    pub max_per_user: usize,
    pub max_age: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_per_user: 100,
            max_age: Duration::from_millis(90 * MS_PER_DAY),
        }
    }
}

pub struct InteractionLog {
    users: Mutex<HashMap<String, VecDeque<UserInteraction>>>,
    retention: RetentionPolicy,
    clock: Arc<dyn Clock>,
}

impl InteractionLog {
    pub fn new(retention: RetentionPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            retention,
            clock,
        }
    }

    /// Append an interaction stamped with the current time and trim the
    /// user's log.
    pub fn record(
        &self,
        user_id: &str,
        property_id: &str,
        interaction_type: InteractionType,
    ) -> UserInteraction {
        let now = self.clock.now_ms();
        let interaction = UserInteraction {
            user_id: user_id.to_string(),
            property_id: property_id.to_string(),
            interaction_type,
            timestamp_ms: now,
        };

        let mut users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        let log = users.entry(user_id.to_string()).or_default();
        log.push_back(interaction.clone());
        self.trim(log, now);
        interaction
    }

    /// The user's retained interactions, oldest first.
    pub fn for_user(&self, user_id: &str) -> Vec<UserInteraction> {
        let now = self.clock.now_ms();
        let mut users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        let Some(log) = users.get_mut(user_id) else {
            return Vec::new();
        };
        self.trim(log, now);
        if log.is_empty() {
            users.remove(user_id);
            return Vec::new();
        }
        log.iter().cloned().collect()
    }

    /// Trim every user's log and forget users left with nothing. Returns
    /// the number of users dropped.
    pub fn prune(&self) -> usize {
        let now = self.clock.now_ms();
        let mut users = self.users.lock().unwrap_or_else(|e| e.into_inner());
        let before = users.len();
        users.retain(|_, log| {
            self.trim(log, now);
            !log.is_empty()
        });
        before - users.len()
    }

    pub fn user_count(&self) -> usize {
        self.users.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn trim(&self, log: &mut VecDeque<UserInteraction>, now_ms: u64) {
        let max_age_ms = self.retention.max_age.as_millis() as u64;
        let cutoff = now_ms.saturating_sub(max_age_ms);
        while log
            .front()
            .is_some_and(|i| log.len() > self.retention.max_per_user || i.timestamp_ms < cutoff)
        {
            log.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use test_case::test_case;

    fn log(max_per_user: usize, max_age_days: u64) -> (InteractionLog, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(1_000 * MS_PER_DAY));
        let log = InteractionLog::new(
            RetentionPolicy {
                max_per_user,
                max_age: Duration::from_millis(max_age_days * MS_PER_DAY),
            },
            clock.clone(),
        );
        (log, clock)
    }

    #[test_case("view", InteractionType::View)]
    #[test_case("Favorite", InteractionType::Favorite)]
    #[test_case(" search ", InteractionType::Search)]
    #[test_case("CONTACT", InteractionType::Contact)]
    fn parses_interaction_types(input: &str, expected: InteractionType) {
        assert_eq!(input.parse::<InteractionType>().unwrap(), expected);
    }

    #[test]
    fn rejects_unknown_interaction_type() {
        let err = "share".parse::<InteractionType>().unwrap_err();
        assert!(matches!(err, EngineError::InvalidInput(_)));
    }

    #[test]
    fn keeps_only_the_most_recent_interactions() {
        let (log, clock) = log(3, 90);
        for id in ["P1", "P2", "P3", "P4", "P5"] {
            clock.advance_ms(1);
            log.record("U1", id, InteractionType::View);
        }
        let ids: Vec<String> = log.for_user("U1").into_iter().map(|i| i.property_id).collect();
        assert_eq!(ids, vec!["P3", "P4", "P5"]);
    }

    #[test]
    fn drops_interactions_older_than_max_age() {
        let (log, clock) = log(100, 10);
        log.record("U1", "P1", InteractionType::Contact);
        clock.advance_ms(6 * MS_PER_DAY);
        log.record("U1", "P2", InteractionType::View);
        clock.advance_ms(5 * MS_PER_DAY);

        let ids: Vec<String> = log.for_user("U1").into_iter().map(|i| i.property_id).collect();
        assert_eq!(ids, vec!["P2"]);

        clock.advance_ms(10 * MS_PER_DAY);
        assert!(log.for_user("U1").is_empty());
        assert_eq!(log.user_count(), 0);
    }

    #[test]
    fn users_are_isolated() {
        let (log, _clock) = log(10, 90);
        log.record("U1", "P1", InteractionType::View);
        log.record("U2", "P2", InteractionType::Search);
        assert_eq!(log.for_user("U1").len(), 1);
        assert_eq!(log.for_user("U2")[0].interaction_type, InteractionType::Search);
        assert!(log.for_user("U3").is_empty());
    }

    #[test]
    fn prune_forgets_users_past_retention() {
        let (log, clock) = log(100, 10);
        for i in 0..500 {
            log.record(&format!("U{i}"), "P1", InteractionType::View);
        }
        clock.advance_ms(5 * MS_PER_DAY);
        log.record("U0", "P2", InteractionType::Contact);
        assert_eq!(log.prune(), 0);

        clock.advance_ms(6 * MS_PER_DAY);
        assert_eq!(log.prune(), 499);
        assert_eq!(log.user_count(), 1);
        assert_eq!(log.for_user("U0")[0].property_id, "P2");
    }
}
