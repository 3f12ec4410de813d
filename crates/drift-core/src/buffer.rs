//! Bounded per-host message buffer

use crate::error::{SimError, SimResult};
use crate::message::Message;

/// A byte-bounded collection of message copies
///
/// Messages are kept in receive order. Space for in-flight incoming
/// transfers is reserved up front so that total occupancy (committed plus
/// reserved) never exceeds the capacity, even while transfers overlap.
#[derive(Debug, Clone)]
pub struct MessageBuffer {
    capacity: u64,
    used: u64,
    reserved: u64,
    messages: Vec<Message>,
}

impl MessageBuffer {
    pub fn new(capacity: u64) -> Self {
        Self {
            capacity,
            used: 0,
            reserved: 0,
            messages: Vec::new(),
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Bytes committed to buffered messages
    pub fn occupancy(&self) -> u64 {
        self.used
    }

    /// Bytes available for new messages, net of reservations
    pub fn free(&self) -> u64 {
        self.capacity
            .saturating_sub(self.used)
            .saturating_sub(self.reserved)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn has(&self, id: &str) -> bool {
        self.messages.iter().any(|m| m.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    /// Messages in receive order
    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// Message IDs ordered oldest receive time first
    pub fn ids_fifo(&self) -> Vec<String> {
        let mut ordered: Vec<&Message> = self.messages.iter().collect();
        ordered.sort_by(|a, b| a.receive_time.total_cmp(&b.receive_time));
        ordered.into_iter().map(|m| m.id.clone()).collect()
    }

    /// Reserve space for an incoming transfer
    pub fn reserve(&mut self, bytes: u64) {
        debug_assert!(bytes <= self.free(), "reservation exceeds free space");
        self.reserved += bytes;
    }

    /// Release a reservation (transfer completed or aborted)
    pub fn release(&mut self, bytes: u64) {
        debug_assert!(bytes <= self.reserved, "releasing more than reserved");
        self.reserved = self.reserved.saturating_sub(bytes);
    }

    /// Commit a message into the buffer
    ///
    /// Space must have been made beforehand; over-occupancy is an invariant
    /// violation, not a recoverable condition.
    pub fn insert(&mut self, msg: Message) -> SimResult<()> {
        let size = msg.size as u64;
        if self.used + size > self.capacity {
            return Err(SimError::Invariant(format!(
                "buffer over-occupancy: {} + {} > {} inserting {}",
                self.used, size, self.capacity, msg.id
            )));
        }
        self.used += size;
        self.messages.push(msg);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Option<Message> {
        let idx = self.messages.iter().position(|m| m.id == id)?;
        let msg = self.messages.remove(idx);
        self.used -= msg.size as u64;
        Some(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostId;

    fn make_message(id: &str, size: u32, received: f64) -> Message {
        let mut m = Message::new(id, HostId(0), HostId(1), size, 0.0);
        m.receive_time = received;
        m
    }

    #[test]
    fn test_occupancy_tracking() {
        let mut buf = MessageBuffer::new(1000);
        buf.insert(make_message("a", 400, 1.0)).unwrap();
        buf.insert(make_message("b", 300, 2.0)).unwrap();
        assert_eq!(buf.occupancy(), 700);
        assert_eq!(buf.free(), 300);
        assert!(buf.remove("a").is_some());
        assert_eq!(buf.occupancy(), 300);
        assert!(!buf.has("a"));
        assert!(buf.has("b"));
    }

    #[test]
    fn test_insert_over_capacity_is_invariant_violation() {
        let mut buf = MessageBuffer::new(100);
        assert!(buf.insert(make_message("big", 200, 0.0)).is_err());
    }

    #[test]
    fn test_reservation_shrinks_free_space() {
        let mut buf = MessageBuffer::new(1000);
        buf.reserve(600);
        assert_eq!(buf.free(), 400);
        buf.release(600);
        assert_eq!(buf.free(), 1000);
    }

    #[test]
    fn test_fifo_order_follows_receive_time() {
        let mut buf = MessageBuffer::new(1000);
        buf.insert(make_message("late", 10, 9.0)).unwrap();
        buf.insert(make_message("early", 10, 1.0)).unwrap();
        buf.insert(make_message("mid", 10, 4.0)).unwrap();
        assert_eq!(buf.ids_fifo(), vec!["early", "mid", "late"]);
    }
}
