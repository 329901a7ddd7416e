//! Shared protocol vocabulary: versions, record content types, handshake
//! message types and the protocol-level handshake state tags.

use core::fmt;

/// Which side of the handshake this connection plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Initiating side (sends the first ClientHello).
    Client,
    /// Accepting side.
    Server,
}

/// TLS/DTLS protocol version.
///
/// `Any` is the pre-negotiation sentinel: the connection has not committed
/// to a concrete version yet and version policy checks are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    /// SSL 3.0
    Ssl3_0,
    /// TLS 1.0
    Tls1_0,
    /// TLS 1.1
    Tls1_1,
    /// TLS 1.2
    Tls1_2,
    /// DTLS 1.0
    Dtls1_0,
    /// The pre-standard DTLS version used by old deployments.
    ///
    /// Its wire major byte is not in the DTLS family, so it gets a
    /// client-side exception in the version-family check.
    Dtls1Bad,
    /// DTLS 1.2
    Dtls1_2,
    /// Not negotiated yet.
    Any,
}

impl ProtocolVersion {
    /// Wire encoding (major, minor). DTLS versions use 1-complement minors.
    pub fn wire(&self) -> Option<(u8, u8)> {
        use ProtocolVersion::*;
        match self {
            Ssl3_0 => Some((3, 0)),
            Tls1_0 => Some((3, 1)),
            Tls1_1 => Some((3, 2)),
            Tls1_2 => Some((3, 3)),
            Dtls1_0 => Some((0xfe, 0xff)),
            Dtls1Bad => Some((1, 0)),
            Dtls1_2 => Some((0xfe, 0xfd)),
            Any => None,
        }
    }

    /// True for versions in the DTLS wire family (major byte 0xfe).
    ///
    /// Note `Dtls1Bad` is deliberately not in the family.
    pub fn is_dtls(&self) -> bool {
        matches!(self, ProtocolVersion::Dtls1_0 | ProtocolVersion::Dtls1_2)
    }

    /// True for versions in the SSL/TLS wire family (major byte 3).
    pub fn is_tls(&self) -> bool {
        matches!(
            self,
            ProtocolVersion::Ssl3_0
                | ProtocolVersion::Tls1_0
                | ProtocolVersion::Tls1_1
                | ProtocolVersion::Tls1_2
        )
    }

    /// Ordering rank within the version's own family. Higher is newer.
    pub(crate) fn rank(&self) -> u8 {
        use ProtocolVersion::*;
        match self {
            Ssl3_0 => 0,
            Tls1_0 => 1,
            Tls1_1 => 2,
            Tls1_2 => 3,
            Dtls1Bad => 0,
            Dtls1_0 => 1,
            Dtls1_2 => 2,
            Any => u8::MAX,
        }
    }

    /// Whether `self` and `other` belong to the same wire family.
    pub(crate) fn same_family(&self, other: &ProtocolVersion) -> bool {
        let dtlsish =
            |v: &ProtocolVersion| v.is_dtls() || matches!(v, ProtocolVersion::Dtls1Bad);
        (self.is_tls() && other.is_tls()) || (dtlsish(self) && dtlsish(other))
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ProtocolVersion::*;
        write!(
            f,
            "{}",
            match self {
                Ssl3_0 => "SSL 3.0",
                Tls1_0 => "TLS 1.0",
                Tls1_1 => "TLS 1.1",
                Tls1_2 => "TLS 1.2",
                Dtls1_0 => "DTLS 1.0",
                Dtls1Bad => "DTLS 1.0 (pre-standard)",
                Dtls1_2 => "DTLS 1.2",
                Any => "any",
            }
        )
    }
}

/// TLS record content types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    /// Change cipher spec record (a single byte, not a handshake message).
    ChangeCipherSpec,
    /// Alert record.
    Alert,
    /// Handshake record.
    Handshake,
    /// Application data record.
    ApplicationData,
}

impl From<ContentType> for u8 {
    fn from(value: ContentType) -> Self {
        use ContentType::*;
        match value {
            ChangeCipherSpec => 20,
            Alert => 21,
            Handshake => 22,
            ApplicationData => 23,
        }
    }
}

/// Handshake message types as they appear in the message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// HelloRequest (empty body)
    HelloRequest,
    /// ClientHello
    ClientHello,
    /// ServerHello
    ServerHello,
    /// HelloVerifyRequest (DTLS cookie exchange)
    HelloVerifyRequest,
    /// NewSessionTicket
    NewSessionTicket,
    /// Certificate
    Certificate,
    /// ServerKeyExchange
    ServerKeyExchange,
    /// CertificateRequest
    CertificateRequest,
    /// ServerHelloDone (empty body)
    ServerHelloDone,
    /// CertificateVerify
    CertificateVerify,
    /// ClientKeyExchange
    ClientKeyExchange,
    /// Finished
    Finished,
    /// CertificateStatus (OCSP stapling)
    CertificateStatus,
    /// Anything we do not know about.
    Unknown(u8),
}

impl MessageType {
    /// Map a wire byte to a message type.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => MessageType::HelloRequest,
            1 => MessageType::ClientHello,
            2 => MessageType::ServerHello,
            3 => MessageType::HelloVerifyRequest,
            4 => MessageType::NewSessionTicket,
            11 => MessageType::Certificate,
            12 => MessageType::ServerKeyExchange,
            13 => MessageType::CertificateRequest,
            14 => MessageType::ServerHelloDone,
            15 => MessageType::CertificateVerify,
            16 => MessageType::ClientKeyExchange,
            20 => MessageType::Finished,
            22 => MessageType::CertificateStatus,
            _ => MessageType::Unknown(value),
        }
    }

    /// The wire byte for this message type.
    pub fn as_u8(&self) -> u8 {
        match self {
            MessageType::HelloRequest => 0,
            MessageType::ClientHello => 1,
            MessageType::ServerHello => 2,
            MessageType::HelloVerifyRequest => 3,
            MessageType::NewSessionTicket => 4,
            MessageType::Certificate => 11,
            MessageType::ServerKeyExchange => 12,
            MessageType::CertificateRequest => 13,
            MessageType::ServerHelloDone => 14,
            MessageType::CertificateVerify => 15,
            MessageType::ClientKeyExchange => 16,
            MessageType::Finished => 20,
            MessageType::CertificateStatus => 22,
            MessageType::Unknown(value) => *value,
        }
    }
}

/// Protocol-level handshake state.
///
/// The driver treats these as opaque except for three groups: the seed
/// state (`Before`), the change-cipher-spec write positions (which select
/// the record content type on flush) and the application-data gate states.
/// All other transitions are the business of the [`HandshakeGrammar`]
/// implementations.
///
/// [`HandshakeGrammar`]: crate::HandshakeGrammar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// No handshake has run on this connection yet.
    Before,
    /// A handshake completed; the connection is established.
    Established,

    // Client writes.
    /// Client is sending ClientHello.
    SendClientHello,
    /// Client is sending its Certificate.
    SendClientCertificate,
    /// Client is sending ClientKeyExchange.
    SendClientKeyExchange,
    /// Client is sending CertificateVerify.
    SendCertificateVerify,
    /// Client is sending ChangeCipherSpec.
    SendClientChangeCipher,
    /// Client is sending Finished.
    SendClientFinished,

    // Client reads.
    /// Client awaits HelloVerifyRequest (DTLS).
    AwaitHelloVerifyRequest,
    /// Client awaits ServerHello.
    AwaitServerHello,
    /// Client awaits the server Certificate.
    AwaitServerCertificate,
    /// Client awaits CertificateStatus.
    AwaitCertificateStatus,
    /// Client awaits ServerKeyExchange.
    AwaitServerKeyExchange,
    /// Client awaits CertificateRequest.
    AwaitCertificateRequest,
    /// Client awaits ServerHelloDone.
    AwaitServerHelloDone,
    /// Client awaits NewSessionTicket.
    AwaitSessionTicket,
    /// Client awaits the server ChangeCipherSpec.
    AwaitServerChangeCipher,
    /// Client awaits the server Finished.
    AwaitServerFinished,

    // Server writes.
    /// Server is sending HelloRequest (renegotiation).
    SendHelloRequest,
    /// Server is sending HelloVerifyRequest (DTLS).
    SendHelloVerifyRequest,
    /// Server is sending ServerHello.
    SendServerHello,
    /// Server is sending its Certificate.
    SendServerCertificate,
    /// Server is sending CertificateStatus.
    SendCertificateStatus,
    /// Server is sending ServerKeyExchange.
    SendServerKeyExchange,
    /// Server is sending CertificateRequest.
    SendCertificateRequest,
    /// Server is sending ServerHelloDone.
    SendServerHelloDone,
    /// Server is sending NewSessionTicket.
    SendSessionTicket,
    /// Server is sending ChangeCipherSpec.
    SendServerChangeCipher,
    /// Server is sending Finished.
    SendServerFinished,

    // Server reads.
    /// Server awaits ClientHello.
    AwaitClientHello,
    /// Server awaits the client Certificate.
    AwaitClientCertificate,
    /// Server awaits ClientKeyExchange.
    AwaitClientKeyExchange,
    /// Server awaits CertificateVerify.
    AwaitCertificateVerify,
    /// Server awaits the client ChangeCipherSpec.
    AwaitClientChangeCipher,
    /// Server awaits the client Finished.
    AwaitClientFinished,
}

impl HandshakeState {
    /// True when a flush from this state must go out as a
    /// ChangeCipherSpec record rather than a handshake record.
    pub fn is_change_cipher_write(&self) -> bool {
        matches!(
            self,
            HandshakeState::SendClientChangeCipher | HandshakeState::SendServerChangeCipher
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn version_families() {
        assert!(ProtocolVersion::Dtls1_2.is_dtls());
        assert!(ProtocolVersion::Dtls1_0.is_dtls());
        assert!(!ProtocolVersion::Dtls1Bad.is_dtls());
        assert!(ProtocolVersion::Tls1_2.is_tls());
        assert!(!ProtocolVersion::Any.is_tls());
        assert!(!ProtocolVersion::Any.is_dtls());
    }

    #[test]
    fn version_wire_majors() {
        assert_eq!(ProtocolVersion::Tls1_0.wire(), Some((3, 1)));
        assert_eq!(ProtocolVersion::Dtls1_2.wire(), Some((0xfe, 0xfd)));
        assert_eq!(ProtocolVersion::Dtls1Bad.wire(), Some((1, 0)));
        assert_eq!(ProtocolVersion::Any.wire(), None);
    }

    #[test]
    fn version_rank_orders_within_family() {
        assert!(ProtocolVersion::Tls1_2.rank() > ProtocolVersion::Tls1_0.rank());
        assert!(ProtocolVersion::Dtls1_2.rank() > ProtocolVersion::Dtls1_0.rank());
    }

    #[test]
    fn version_family_grouping() {
        assert!(ProtocolVersion::Tls1_0.same_family(&ProtocolVersion::Tls1_2));
        assert!(ProtocolVersion::Dtls1_0.same_family(&ProtocolVersion::Dtls1_2));
        assert!(ProtocolVersion::Dtls1Bad.same_family(&ProtocolVersion::Dtls1_2));
        assert!(!ProtocolVersion::Tls1_2.same_family(&ProtocolVersion::Dtls1_2));
    }

    #[test]
    fn message_type_round_trip() {
        for v in [0u8, 1, 2, 3, 4, 11, 12, 13, 14, 15, 16, 20, 22, 99] {
            assert_eq!(MessageType::from_u8(v).as_u8(), v);
        }
    }

    #[test]
    fn content_type_wire_values() {
        assert_eq!(u8::from(ContentType::ChangeCipherSpec), 20);
        assert_eq!(u8::from(ContentType::Alert), 21);
        assert_eq!(u8::from(ContentType::Handshake), 22);
        assert_eq!(u8::from(ContentType::ApplicationData), 23);
    }

    #[test]
    fn change_cipher_write_positions() {
        assert!(HandshakeState::SendClientChangeCipher.is_change_cipher_write());
        assert!(HandshakeState::SendServerChangeCipher.is_change_cipher_write());
        assert!(!HandshakeState::SendClientFinished.is_change_cipher_write());
        assert!(!HandshakeState::Before.is_change_cipher_write());
    }
}
