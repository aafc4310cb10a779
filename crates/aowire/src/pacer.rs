use std::time::Duration;
use std::time::Instant;

/// Enforces a fixed minimum spacing between packets on one connection.
///
/// The read loop blocks for the returned duration instead of dropping the
/// packet, so a flooding client is slowed down rather than desynced.
#[derive(Debug)]
pub struct PacketPacer {
    interval: Duration,
    earliest: Option<Instant>,
}

impl PacketPacer {
    /// A pacer admitting at most `per_second` packets per second.
    pub fn new(per_second: u32) -> Self {
        Self {
            interval: Duration::from_secs(1) / per_second.max(1),
            earliest: None,
        }
    }

    /// Account for one packet arriving at `now`; returns how long the caller
    /// must wait before handling it (zero if it is already due).
    pub fn admit(&mut self, now: Instant) -> Duration {
        let due = match self.earliest {
            Some(t) if t > now => t,
            _ => now,
        };
        self.earliest = Some(due + self.interval);
        due - now
    }

    /// Wait out the pacing delay for a packet arriving now.
    pub async fn throttle(&mut self) {
        let wait = self.admit(Instant::now());
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_packet_is_free() {
        let mut p = PacketPacer::new(10);
        assert_eq!(p.admit(Instant::now()), Duration::ZERO);
    }

    #[test]
    fn spaces_a_burst_at_the_configured_rate() {
        let mut p = PacketPacer::new(10);
        let t0 = Instant::now();
        // Eleven packets all arriving at t0: the eleventh must wait a full
        // second, keeping any one-second window at ten handled packets.
        let mut last = Duration::ZERO;
        for _ in 0..11 {
            last = p.admit(t0);
        }
        assert_eq!(last, Duration::from_secs(1));
    }

    #[test]
    fn slow_sender_never_waits() {
        let mut p = PacketPacer::new(10);
        let t0 = Instant::now();
        for i in 0..5u32 {
            let now = t0 + Duration::from_millis(200) * i;
            assert_eq!(p.admit(now), Duration::ZERO);
        }
    }
}
