//! Aggregate message statistics

use std::collections::HashSet;
use std::path::PathBuf;

use drift_core::{
    ConnectionListener, HostId, Message, MessageListener, Report, SimResult, UpdateListener,
    World,
};

use crate::{report_path, write_report};

/// Counts message lifecycle events and derives the classic DTN metrics:
/// delivery probability, overhead ratio, and latency / hop-count /
/// buffer-time averages. Messages created during the warmup period are
/// excluded entirely.
#[derive(Debug)]
pub struct MessageStatsReport {
    path: PathBuf,
    warmup: f64,
    warmup_ids: HashSet<String>,
    created: u64,
    started: u64,
    relayed: u64,
    aborted: u64,
    delivered: u64,
    dropped: u64,
    latencies: Vec<f64>,
    hop_counts: Vec<usize>,
    buffer_times: Vec<f64>,
}

impl MessageStatsReport {
    pub fn new(dir: &str, scenario: &str, warmup: f64) -> Self {
        Self {
            path: report_path(dir, scenario, "MessageStatsReport"),
            warmup,
            warmup_ids: HashSet::new(),
            created: 0,
            started: 0,
            relayed: 0,
            aborted: 0,
            delivered: 0,
            dropped: 0,
            latencies: Vec::new(),
            hop_counts: Vec::new(),
            buffer_times: Vec::new(),
        }
    }

    fn is_warmup(&self, m: &Message) -> bool {
        self.warmup_ids.contains(&m.id)
    }

    fn render(&self) -> String {
        let avg = |values: &[f64]| {
            if values.is_empty() {
                "NaN".to_string()
            } else {
                format!("{:.4}", values.iter().sum::<f64>() / values.len() as f64)
            }
        };
        let delivery_prob = if self.created == 0 {
            "NaN".to_string()
        } else {
            format!("{:.4}", self.delivered as f64 / self.created as f64)
        };
        let overhead = if self.delivered == 0 {
            "NaN".to_string()
        } else {
            format!(
                "{:.4}",
                (self.relayed as f64 - self.delivered as f64) / self.delivered as f64
            )
        };
        let hops: Vec<f64> = self.hop_counts.iter().map(|&h| h as f64).collect();

        format!(
            "created: {}\nstarted: {}\nrelayed: {}\naborted: {}\ndropped: {}\n\
             delivered: {}\ndelivery_prob: {}\noverhead_ratio: {}\n\
             latency_avg: {}\nhopcount_avg: {}\nbuffertime_avg: {}\n",
            self.created,
            self.started,
            self.relayed,
            self.aborted,
            self.dropped,
            self.delivered,
            delivery_prob,
            overhead,
            avg(&self.latencies),
            avg(&hops),
            avg(&self.buffer_times),
        )
    }
}

impl MessageListener for MessageStatsReport {
    fn new_message(&mut self, m: &Message) {
        if m.created_at < self.warmup {
            self.warmup_ids.insert(m.id.clone());
            return;
        }
        self.created += 1;
    }

    fn transfer_started(&mut self, m: &Message, _from: HostId, _to: HostId, _time: f64) {
        if !self.is_warmup(m) {
            self.started += 1;
        }
    }

    fn transfer_aborted(&mut self, m: &Message, _from: HostId, _to: HostId, _time: f64) {
        if !self.is_warmup(m) {
            self.aborted += 1;
        }
    }

    fn message_transferred(
        &mut self,
        m: &Message,
        _from: HostId,
        _to: HostId,
        time: f64,
        delivered: bool,
    ) {
        if self.is_warmup(m) {
            return;
        }
        self.relayed += 1;
        if delivered {
            self.delivered += 1;
            self.latencies.push(time - m.created_at);
            self.hop_counts.push(m.hop_count());
        }
    }

    fn message_deleted(&mut self, m: &Message, _host: HostId, time: f64, dropped: bool) {
        if self.is_warmup(m) {
            return;
        }
        if dropped {
            self.dropped += 1;
        }
        self.buffer_times.push(time - m.receive_time);
    }
}

impl ConnectionListener for MessageStatsReport {}
impl UpdateListener for MessageStatsReport {}

impl Report for MessageStatsReport {
    fn done(&mut self, world: &World) -> SimResult<()> {
        let header = format!("Message stats (sim time {:.4})\n", world.clock().time());
        write_report(&self.path, &format!("{header}{}", self.render()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_message(id: &str, created: f64) -> Message {
        Message::new(id, HostId(0), HostId(1), 100, created)
    }

    #[test]
    fn test_metrics() {
        let mut report = MessageStatsReport::new("r", "s", 0.0);
        report.new_message(&make_message("a", 0.0));
        report.new_message(&make_message("b", 0.0));

        // a: relayed once, then delivered
        report.message_transferred(&make_message("a", 0.0), HostId(0), HostId(2), 5.0, false);
        report.message_transferred(&make_message("a", 0.0), HostId(2), HostId(1), 10.0, true);

        let text = report.render();
        assert!(text.contains("created: 2"));
        assert!(text.contains("relayed: 2"));
        assert!(text.contains("delivered: 1"));
        assert!(text.contains("delivery_prob: 0.5000"));
        // overhead = (2 - 1) / 1
        assert!(text.contains("overhead_ratio: 1.0000"));
        assert!(text.contains("latency_avg: 10.0000"));
    }

    #[test]
    fn test_warmup_messages_excluded() {
        let mut report = MessageStatsReport::new("r", "s", 100.0);
        report.new_message(&make_message("w", 50.0));
        report.new_message(&make_message("a", 150.0));
        report.message_transferred(&make_message("w", 50.0), HostId(0), HostId(1), 160.0, true);

        let text = report.render();
        assert!(text.contains("created: 1"));
        assert!(text.contains("delivered: 0"));
    }

    #[test]
    fn test_undefined_ratios_render_nan() {
        let report = MessageStatsReport::new("r", "s", 0.0);
        let text = report.render();
        assert!(text.contains("delivery_prob: NaN"));
        assert!(text.contains("overhead_ratio: NaN"));
        assert!(text.contains("latency_avg: NaN"));
    }
}
