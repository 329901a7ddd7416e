use std::time::Duration;

use crate::event::InfoCallback;
use crate::types::ProtocolVersion;

/// Handshake driver configuration.
#[derive(Clone)]
pub struct Config {
    min_version: Option<ProtocolVersion>,
    allow_unsafe_legacy_renegotiation: bool,
    flight_start_rto: Duration,
    flight_retries: usize,
    handshake_timeout: Duration,
    jitter_seed: Option<u64>,
    info_callback: Option<InfoCallback>,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            min_version: None,
            allow_unsafe_legacy_renegotiation: false,
            flight_start_rto: Duration::from_secs(1),
            flight_retries: 4,
            handshake_timeout: Duration::from_secs(40),
            jitter_seed: None,
            info_callback: None,
        }
    }

    /// Lowest protocol version the security policy accepts.
    ///
    /// `None` means no floor. The floor only applies to versions in the
    /// same wire family (TLS floors do not constrain DTLS connections).
    #[inline(always)]
    pub fn min_version(&self) -> Option<ProtocolVersion> {
        self.min_version
    }

    /// Whether a server may renegotiate with a peer that does not support
    /// secure renegotiation.
    #[inline(always)]
    pub fn allow_unsafe_legacy_renegotiation(&self) -> bool {
        self.allow_unsafe_legacy_renegotiation
    }

    /// Time of first retransmission of a DTLS flight.
    ///
    /// Doubled for every retry with a ±25% jitter.
    #[inline(always)]
    pub fn flight_start_rto(&self) -> Duration {
        self.flight_start_rto
    }

    /// Max number of retransmissions per DTLS flight.
    #[inline(always)]
    pub fn flight_retries(&self) -> usize {
        self.flight_retries
    }

    /// Timeout for the entire handshake, regardless of flights.
    #[inline(always)]
    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    /// Optional seed making the retransmission-timer spread
    /// deterministic.
    #[inline(always)]
    pub fn jitter_seed(&self) -> Option<u64> {
        self.jitter_seed
    }

    /// Default info callback for connections using this config.
    #[inline(always)]
    pub fn info_callback(&self) -> Option<&InfoCallback> {
        self.info_callback.as_ref()
    }

    /// Whether `version` satisfies the configured floor.
    pub(crate) fn version_allowed(&self, version: ProtocolVersion) -> bool {
        let Some(min) = self.min_version else {
            return true;
        };
        if !version.same_family(&min) {
            return true;
        }
        version.rank() >= min.rank()
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("min_version", &self.min_version)
            .field(
                "allow_unsafe_legacy_renegotiation",
                &self.allow_unsafe_legacy_renegotiation,
            )
            .field("flight_start_rto", &self.flight_start_rto)
            .field("flight_retries", &self.flight_retries)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("jitter_seed", &self.jitter_seed)
            .field("info_callback", &self.info_callback.is_some())
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::builder().build()
    }
}

/// Builder for the driver configuration.
pub struct ConfigBuilder {
    min_version: Option<ProtocolVersion>,
    allow_unsafe_legacy_renegotiation: bool,
    flight_start_rto: Duration,
    flight_retries: usize,
    handshake_timeout: Duration,
    jitter_seed: Option<u64>,
    info_callback: Option<InfoCallback>,
}

impl ConfigBuilder {
    /// Set the lowest acceptable protocol version.
    ///
    /// Defaults to no floor.
    pub fn min_version(mut self, version: ProtocolVersion) -> Self {
        self.min_version = Some(version);
        self
    }

    /// Allow server-side renegotiation with peers lacking secure
    /// renegotiation support.
    ///
    /// Defaults to false.
    pub fn allow_unsafe_legacy_renegotiation(mut self, allow: bool) -> Self {
        self.allow_unsafe_legacy_renegotiation = allow;
        self
    }

    /// Set the time of first retransmission of a DTLS flight.
    ///
    /// Doubled for every retry with a ±25% jitter.
    /// Defaults to 1 second.
    pub fn flight_start_rto(mut self, rto: Duration) -> Self {
        self.flight_start_rto = rto;
        self
    }

    /// Set the max number of retransmissions per DTLS flight.
    ///
    /// Defaults to 4.
    pub fn flight_retries(mut self, retries: usize) -> Self {
        self.flight_retries = retries;
        self
    }

    /// Set the timeout for the entire handshake, regardless of flights.
    ///
    /// Defaults to 40 seconds.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Seed the retransmission-timer spread for reproducible schedules.
    ///
    /// Defaults to unseeded (OS entropy).
    pub fn jitter_seed(mut self, seed: u64) -> Self {
        self.jitter_seed = Some(seed);
        self
    }

    /// Set the default info callback for connections using this config.
    ///
    /// A connection-level callback overrides this one.
    pub fn info_callback(mut self, cb: InfoCallback) -> Self {
        self.info_callback = Some(cb);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Config {
        Config {
            min_version: self.min_version,
            allow_unsafe_legacy_renegotiation: self.allow_unsafe_legacy_renegotiation,
            flight_start_rto: self.flight_start_rto,
            flight_retries: self.flight_retries,
            handshake_timeout: self.handshake_timeout,
            jitter_seed: self.jitter_seed,
            info_callback: self.info_callback,
        }
    }
}
