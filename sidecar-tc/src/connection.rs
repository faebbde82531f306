//! Desired network characteristics between a service and one peer IP.

/// Artificial delay injected by a `netem` qdisc.
///
/// Corresponds to the `delay <base>ms [<jitter>ms [<correlation>%]]` clause.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketDelay {
    base_ms: u64,
    jitter_ms: u64,
    correlation: f32,
}

impl PacketDelay {
    /// A constant delay with no jitter.
    pub const fn uniform(base_ms: u64) -> Self {
        Self { base_ms, jitter_ms: 0, correlation: 0.0 }
    }

    /// A normally-distributed delay: `base_ms` mean, `jitter_ms` variation,
    /// `correlation` percentage with the previous packet's delay.
    pub const fn normal(base_ms: u64, jitter_ms: u64, correlation: f32) -> Self {
        Self { base_ms, jitter_ms, correlation }
    }

    pub const fn base_ms(self) -> u64 {
        self.base_ms
    }

    pub const fn jitter_ms(self) -> u64 {
        self.jitter_ms
    }

    pub const fn correlation(self) -> f32 {
        self.correlation
    }
}

/// The connection a peer IP should experience: a packet-loss percentage and
/// an optional packet delay.
///
/// `None` delay means no `delay` clause is emitted at all, which is distinct
/// from a zero-millisecond delay.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PartitionConnection {
    packet_loss_percentage: f32,
    packet_delay: Option<PacketDelay>,
}

/// Packet loss of a fully open connection.
pub const UNBLOCKED_PACKET_LOSS_PERCENTAGE: f32 = 0.0;
/// Packet loss of a fully blocked connection.
pub const BLOCKED_PACKET_LOSS_PERCENTAGE: f32 = 100.0;

impl PartitionConnection {
    /// A connection dropping `packet_loss_percentage` of packets, with no
    /// delay configured.
    pub const fn new(packet_loss_percentage: f32) -> Self {
        Self { packet_loss_percentage, packet_delay: None }
    }

    /// A fully open connection (0% loss). Note that 0% is still a valid
    /// netem configuration, not an absence of one: it is how "no loss but
    /// possibly still delay" is expressed.
    pub const fn unblocked() -> Self {
        Self::new(UNBLOCKED_PACKET_LOSS_PERCENTAGE)
    }

    /// A fully blocked connection (100% loss).
    pub const fn blocked() -> Self {
        Self::new(BLOCKED_PACKET_LOSS_PERCENTAGE)
    }

    /// Set the packet delay for this connection.
    pub const fn with_packet_delay(mut self, delay: PacketDelay) -> Self {
        self.packet_delay = Some(delay);
        self
    }

    pub const fn packet_loss_percentage(self) -> f32 {
        self.packet_loss_percentage
    }

    pub const fn packet_delay(self) -> Option<PacketDelay> {
        self.packet_delay
    }
}
