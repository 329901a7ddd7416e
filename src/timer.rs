//! DTLS retransmission timing.
//!
//! The driver arms the timer when a flight is flushed and disarms it when
//! the peer's answering flight has been read. The retransmission interval
//! starts at the configured RTO and doubles with every resend of the same
//! flight, up to a bounded number of resends. Each deadline gets a fresh
//! ±25% spread so endpoints sharing a start RTO do not retransmit in
//! lockstep; seed the spread via [`Config::jitter_seed`] for reproducible
//! schedules in tests.
//!
//! Firing is the embedding event loop's job: poll the next deadline via
//! [`Driver::poll_timeout`] and call [`Driver::handle_timeout`] at or
//! after it.
//!
//! [`Config::jitter_seed`]: crate::Config
//! [`Driver::poll_timeout`]: crate::Driver::poll_timeout
//! [`Driver::handle_timeout`]: crate::Driver::handle_timeout

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Never schedule a retransmission closer than this.
const MIN_RTO: Duration = Duration::from_millis(50);

/// Cap on interval doubling, to keep the shift arithmetic sane even with
/// absurd retry budgets.
const MAX_DOUBLINGS: usize = 16;

/// Retransmission timer for the current outbound flight.
///
/// Tracks how many resends the flight has already cost; the interval for
/// resend `n` is `start_rto << n`, spread by ±25%.
pub(crate) struct HandshakeTimer {
    start_rto: Duration,
    max_retries: usize,
    attempt: usize,
    deadline: Option<Instant>,
    spread: Option<StdRng>,
}

impl HandshakeTimer {
    pub fn new(start_rto: Duration, max_retries: usize, seed: Option<u64>) -> Self {
        HandshakeTimer {
            start_rto,
            max_retries,
            attempt: 0,
            deadline: None,
            spread: seed.map(StdRng::seed_from_u64),
        }
    }

    /// Arm the timer for a freshly flushed flight. A timer that is already
    /// running keeps its deadline (re-sends of the same flight must not
    /// push the deadline out).
    pub fn arm(&mut self, now: Instant) {
        if self.deadline.is_none() {
            let rto = self.flight_rto();
            self.deadline = Some(now + rto);
        }
    }

    /// Disarm once the answering flight has arrived. The next flight
    /// starts over at the base interval.
    pub fn disarm(&mut self) {
        self.deadline = None;
        self.attempt = 0;
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn expired(&self, now: Instant) -> bool {
        self.deadline.map(|d| now >= d).unwrap_or(false)
    }

    /// Whether the flight still has resends left in its budget.
    pub fn can_retry(&self) -> bool {
        self.attempt < self.max_retries
    }

    /// Consume one resend and schedule the next, doubled deadline.
    pub fn next_attempt(&mut self, now: Instant) {
        self.attempt += 1;
        let rto = self.flight_rto();
        self.deadline = Some(now + rto);
    }

    /// Interval until the next retransmission of the current flight: the
    /// base RTO doubled per resend already made, spread by ±25%.
    fn flight_rto(&mut self) -> Duration {
        let shift = self.attempt.min(MAX_DOUBLINGS) as u32;
        let doubled = self.start_rto.saturating_mul(1 << shift);

        // A unit sample stretches the interval into [0.75, 1.25) of the
        // doubled value.
        let unit: f32 = match &mut self.spread {
            Some(rng) => rng.random(),
            None => rand::random(),
        };

        doubled.mul_f32(0.75 + unit * 0.5).max(MIN_RTO)
    }
}
