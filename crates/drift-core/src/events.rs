//! Scheduled event sources
//!
//! Two kinds of source feed the world's event queue: a periodic message
//! generator and a replay of pre-recorded contact events. Sources expose
//! the time of their next event; the world drains every source whose next
//! event falls inside the current update window, in timestamp order.

use std::collections::VecDeque;
use std::path::Path;

use rand::Rng;
use rand::rngs::StdRng;

use crate::error::{SimError, SimResult};
use crate::host::HostId;
use crate::settings::ScopedSettings;

/// An event to be applied to the world at a scheduled time
#[derive(Debug, Clone, PartialEq)]
pub enum WorldEvent {
    /// Inject a new message into `from`'s router
    CreateMessage {
        id: String,
        from: HostId,
        to: HostId,
        size: u32,
    },
    /// Synthetic connect/disconnect between two hosts (trace replay)
    Connectivity { a: HostId, b: HostId, up: bool },
}

/// Periodic source of new messages
///
/// Fires at intervals sampled uniformly from `interval`, creating a message
/// of a size sampled from `size` between two distinct hosts drawn from the
/// `hosts` address range. Message IDs are `<prefix><seq>`.
#[derive(Debug, Clone)]
pub struct MessageEventGenerator {
    interval: (f64, f64),
    size: (u64, u64),
    /// Half-open source/destination address range
    hosts: (usize, usize),
    prefix: String,
    seq: u64,
    next_time: f64,
}

impl MessageEventGenerator {
    pub fn new(
        interval: (f64, f64),
        size: (u64, u64),
        hosts: (usize, usize),
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            interval,
            size,
            hosts,
            prefix: prefix.into(),
            seq: 0,
            // The first firing time is drawn lazily on the first poll so
            // construction order does not consume random draws
            next_time: f64::NAN,
        }
    }

    pub fn from_settings(scoped: &ScopedSettings<'_>) -> SimResult<Self> {
        let interval = scoped.get_range_f64_or("interval", (60.0, 60.0))?;
        let size = scoped.get_range_size("size")?;
        let hosts = {
            let (lo, hi) = scoped.get_coord("hosts")?;
            (lo as usize, hi as usize)
        };
        let prefix = scoped.get_or("prefix", "M");
        Ok(Self::new(interval, size, hosts, prefix))
    }

    fn sample_interval(&self, rng: &mut StdRng) -> f64 {
        if self.interval.0 >= self.interval.1 {
            self.interval.0
        } else {
            rng.random_range(self.interval.0..self.interval.1)
        }
    }

    fn next_time(&mut self, rng: &mut StdRng) -> f64 {
        if self.next_time.is_nan() {
            self.next_time = self.sample_interval(rng);
        }
        self.next_time
    }

    fn pop(&mut self, rng: &mut StdRng) -> (f64, WorldEvent) {
        let at = self.next_time(rng);
        self.seq += 1;
        let id = format!("{}{}", self.prefix, self.seq);

        let span = (self.hosts.1 - self.hosts.0).max(1);
        let from = HostId(self.hosts.0 + rng.random_range(0..span));
        let to = loop {
            let candidate = HostId(self.hosts.0 + rng.random_range(0..span));
            if candidate != from || span == 1 {
                break candidate;
            }
        };
        let size = if self.size.0 >= self.size.1 {
            self.size.0
        } else {
            rng.random_range(self.size.0..self.size.1)
        } as u32;

        self.next_time = at + self.sample_interval(rng);
        (at, WorldEvent::CreateMessage { id, from, to, size })
    }
}

/// Replay of a pre-recorded contact trace
///
/// Input lines are `<startTime> <endTime> CONN <hostA> <hostB> <up|down>`,
/// strictly sorted by start time. An `up` line yields a connect event at
/// its start time and a disconnect at its end time; a `down` line yields a
/// disconnect at its start time. Parse problems are fatal and carry the
/// line number.
#[derive(Debug, Clone)]
pub struct ExternalEvents {
    queue: VecDeque<(f64, WorldEvent)>,
}

impl ExternalEvents {
    pub fn from_file(path: impl AsRef<Path>) -> SimResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, &path.display().to_string())
    }

    pub fn parse(text: &str, path: &str) -> SimResult<Self> {
        let fail = |line: usize, reason: &str| SimError::EventParse {
            path: path.to_string(),
            line,
            reason: reason.to_string(),
        };

        let mut events: Vec<(f64, WorldEvent)> = Vec::new();
        let mut prev_start = f64::NEG_INFINITY;
        for (idx, raw) in text.lines().enumerate() {
            let lineno = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split_whitespace().collect();
            let &[start, end, kind, a, b, action] = fields.as_slice() else {
                return Err(fail(lineno, "expected 6 fields"));
            };
            if kind != "CONN" {
                return Err(fail(lineno, "only CONN events are supported"));
            }
            let start: f64 = start.parse().map_err(|_| fail(lineno, "bad start time"))?;
            let end: f64 = end.parse().map_err(|_| fail(lineno, "bad end time"))?;
            let a = HostId(a.parse().map_err(|_| fail(lineno, "bad host address"))?);
            let b = HostId(b.parse().map_err(|_| fail(lineno, "bad host address"))?);
            if a == b {
                return Err(fail(lineno, "host connected to itself"));
            }
            if start < prev_start {
                return Err(fail(lineno, "events not sorted by time"));
            }
            prev_start = start;

            match action {
                "up" => {
                    if end < start {
                        return Err(fail(lineno, "end time before start time"));
                    }
                    events.push((start, WorldEvent::Connectivity { a, b, up: true }));
                    events.push((end, WorldEvent::Connectivity { a, b, up: false }));
                }
                "down" => {
                    events.push((start, WorldEvent::Connectivity { a, b, up: false }));
                }
                other => {
                    return Err(fail(lineno, &format!("unknown action '{other}'")));
                }
            }
        }
        events.sort_by(|(ta, _), (tb, _)| ta.total_cmp(tb));
        Ok(Self {
            queue: events.into(),
        })
    }

    fn next_time(&self) -> Option<f64> {
        self.queue.front().map(|(t, _)| *t)
    }

    fn pop(&mut self) -> Option<(f64, WorldEvent)> {
        self.queue.pop_front()
    }
}

/// A source of scheduled events
#[derive(Debug, Clone)]
pub enum EventSource {
    Generator(MessageEventGenerator),
    External(ExternalEvents),
}

impl EventSource {
    pub fn from_settings(scoped: &ScopedSettings<'_>) -> SimResult<Self> {
        match scoped.get("class")? {
            "MessageEventGenerator" => Ok(EventSource::Generator(
                MessageEventGenerator::from_settings(scoped)?,
            )),
            "ExternalEventsQueue" => {
                let path = scoped.get("filePath")?;
                Ok(EventSource::External(ExternalEvents::from_file(path)?))
            }
            other => Err(SimError::config(
                "class",
                format!("unknown event source class '{other}'"),
            )),
        }
    }

    /// Time of the next pending event, if any
    pub fn next_time(&mut self, rng: &mut StdRng) -> Option<f64> {
        match self {
            EventSource::Generator(g) => Some(g.next_time(rng)),
            EventSource::External(x) => x.next_time(),
        }
    }

    /// Take the next pending event
    pub fn pop(&mut self, rng: &mut StdRng) -> Option<(f64, WorldEvent)> {
        match self {
            EventSource::Generator(g) => Some(g.pop(rng)),
            EventSource::External(x) => x.pop(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn test_generator_ids_and_spacing() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut generator =
            MessageEventGenerator::new((10.0, 10.0), (500, 500), (0, 4), "M");
        assert_eq!(generator.next_time(&mut rng), 10.0);
        let (t1, e1) = generator.pop(&mut rng);
        let (t2, e2) = generator.pop(&mut rng);
        assert_eq!(t1, 10.0);
        assert_eq!(t2, 20.0);
        match (e1, e2) {
            (
                WorldEvent::CreateMessage { id: id1, from, to, size },
                WorldEvent::CreateMessage { id: id2, .. },
            ) => {
                assert_eq!(id1, "M1");
                assert_eq!(id2, "M2");
                assert_ne!(from, to);
                assert_eq!(size, 500);
            }
            other => panic!("expected message events, got {other:?}"),
        }
    }

    #[test]
    fn test_generator_reproducible() {
        let run = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut generator =
                MessageEventGenerator::new((5.0, 15.0), (100, 900), (0, 10), "X");
            (0..20).map(|_| generator.pop(&mut rng)).collect::<Vec<_>>()
        };
        assert_eq!(run(11), run(11));
    }

    #[test]
    fn test_external_trace_parse() {
        let trace = "\
            # comment\n\
            10.0 50.0 CONN 0 1 up\n\
            30.0 30.0 CONN 0 2 down\n";
        let mut events = ExternalEvents::parse(trace, "test").unwrap();
        assert_eq!(events.next_time(), Some(10.0));
        let (_, first) = events.pop().unwrap();
        assert_eq!(
            first,
            WorldEvent::Connectivity {
                a: HostId(0),
                b: HostId(1),
                up: true
            }
        );
        // down for 0-2 at 30 comes before the scheduled 0-1 disconnect at 50
        let (t, _) = events.pop().unwrap();
        assert_eq!(t, 30.0);
        let (t, last) = events.pop().unwrap();
        assert_eq!(t, 50.0);
        assert_eq!(
            last,
            WorldEvent::Connectivity {
                a: HostId(0),
                b: HostId(1),
                up: false
            }
        );
    }

    #[test]
    fn test_external_trace_error_carries_line() {
        let trace = "10.0 50.0 CONN 0 1 up\n5.0 60.0 CONN 1 2 up\n";
        let err = ExternalEvents::parse(trace, "sorted.txt").unwrap_err();
        assert!(err.to_string().contains("sorted.txt:2"));

        let err = ExternalEvents::parse("1 2 CONN 0 1 sideways\n", "t").unwrap_err();
        assert!(err.to_string().contains("sideways"));
    }
}
