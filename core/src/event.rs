// Stream events and the session event log
use serde::{Deserialize, Serialize};

/// JSON body of a stream message as published on the topic
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamPayload {
    pub title: String,
    pub source: String,
    pub date: String,
    /// ISO 8601, e.g. `2024-01-01T10:00:00.000Z`
    pub timestamp: String,
    pub content: String,
}

impl StreamPayload {
    pub fn from_slice(data: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(data)
    }
}

/// A decoded stream message with its position in the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(flatten)]
    pub payload: StreamPayload,
    /// 1-based position in the log at append time
    pub count: u64,
}

impl Event {
    /// Wall-clock part of the timestamp (`HH:MM:SS`), without date or fraction
    pub fn time_of_day(&self) -> &str {
        let ts = self.payload.timestamp.as_str();
        let time = ts.split_once('T').map(|(_, t)| t).unwrap_or(ts);
        time.split(['.', 'Z', '+']).next().unwrap_or(time)
    }
}

/// Append-only log of events received during the session
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a payload and return the stored event
    pub fn append(&mut self, payload: StreamPayload) -> &Event {
        let count = self.events.len() as u64 + 1;
        self.events.push(Event { payload, count });
        &self.events[self.events.len() - 1]
    }

    /// Up to `n` most recent events, newest first
    pub fn latest(&self, n: usize) -> impl Iterator<Item = &Event> {
        self.events.iter().rev().take(n)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(title: &str) -> StreamPayload {
        StreamPayload {
            title: title.to_string(),
            source: format!("https://en.wikipedia.org/wiki/{title}"),
            date: "2024-01-01".to_string(),
            timestamp: "2024-01-01T10:00:00.000Z".to_string(),
            content: "body".to_string(),
        }
    }

    #[test]
    fn counts_follow_append_order() {
        let mut log = EventLog::new();
        for i in 0..5 {
            log.append(payload(&format!("T{i}")));
        }
        for (idx, ev) in log.iter().enumerate() {
            assert_eq!(ev.count, idx as u64 + 1);
        }
    }

    #[test]
    fn latest_is_newest_first_and_bounded() {
        let mut log = EventLog::new();
        for i in 0..15 {
            log.append(payload(&format!("T{i}")));
        }
        let counts: Vec<u64> = log.latest(10).map(|e| e.count).collect();
        assert_eq!(counts, (6..=15).rev().collect::<Vec<_>>());
    }

    #[test]
    fn time_of_day_strips_date_and_fraction() {
        let mut log = EventLog::new();
        let ev = log.append(payload("A"));
        assert_eq!(ev.time_of_day(), "10:00:00");

        let mut p = payload("B");
        p.timestamp = "10:11:12".to_string();
        let ev = log.append(p);
        assert_eq!(ev.time_of_day(), "10:11:12");
    }

    #[test]
    fn event_serializes_flat() {
        let mut log = EventLog::new();
        let ev = log.append(payload("A"));
        let v = serde_json::to_value(ev).unwrap();
        assert_eq!(v["title"], "A");
        assert_eq!(v["count"], 1);
    }
}
