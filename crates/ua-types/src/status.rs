//! Status codes and their symbolic names.

use serde::{Deserialize, Serialize};

/// A 32-bit protocol status code.
///
/// The top two bits carry the severity (`00` good, `01` uncertain, `10`
/// bad); the next fourteen bits are the sub-code and the low sixteen bits
/// carry informational flags that do not change the code's identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub u32);

const SEVERITY_MASK: u32 = 0xC000_0000;
const SEVERITY_UNCERTAIN: u32 = 0x4000_0000;
const SEVERITY_BAD: u32 = 0x8000_0000;
const CODE_MASK: u32 = 0xFFFF_0000;

impl StatusCode {
    pub const GOOD: Self = Self(0x0000_0000);
    pub const UNCERTAIN: Self = Self(0x4000_0000);
    pub const BAD: Self = Self(0x8000_0000);
    pub const BAD_UNEXPECTED_ERROR: Self = Self(0x8001_0000);
    pub const BAD_INTERNAL_ERROR: Self = Self(0x8002_0000);
    pub const BAD_OUT_OF_MEMORY: Self = Self(0x8003_0000);
    pub const BAD_RESOURCE_UNAVAILABLE: Self = Self(0x8004_0000);
    pub const BAD_COMMUNICATION_ERROR: Self = Self(0x8005_0000);
    pub const BAD_ENCODING_ERROR: Self = Self(0x8006_0000);
    pub const BAD_DECODING_ERROR: Self = Self(0x8007_0000);
    pub const BAD_ENCODING_LIMITS_EXCEEDED: Self = Self(0x8008_0000);
    pub const BAD_UNKNOWN_RESPONSE: Self = Self(0x8009_0000);
    pub const BAD_TIMEOUT: Self = Self(0x800A_0000);
    pub const BAD_SERVICE_UNSUPPORTED: Self = Self(0x800B_0000);
    pub const BAD_SHUTDOWN: Self = Self(0x800C_0000);
    pub const BAD_SERVER_NOT_CONNECTED: Self = Self(0x800D_0000);
    pub const BAD_SERVER_HALTED: Self = Self(0x800E_0000);
    pub const BAD_NOTHING_TO_DO: Self = Self(0x800F_0000);
    pub const BAD_TOO_MANY_OPERATIONS: Self = Self(0x8010_0000);
    pub const BAD_DATA_TYPE_ID_UNKNOWN: Self = Self(0x8011_0000);
    pub const BAD_CERTIFICATE_INVALID: Self = Self(0x8012_0000);
    pub const BAD_SECURITY_CHECKS_FAILED: Self = Self(0x8013_0000);
    pub const BAD_USER_ACCESS_DENIED: Self = Self(0x801F_0000);
    pub const BAD_IDENTITY_TOKEN_INVALID: Self = Self(0x8020_0000);
    pub const BAD_IDENTITY_TOKEN_REJECTED: Self = Self(0x8021_0000);
    pub const BAD_SECURE_CHANNEL_ID_INVALID: Self = Self(0x8022_0000);
    pub const BAD_INVALID_TIMESTAMP: Self = Self(0x8023_0000);
    pub const BAD_NONCE_INVALID: Self = Self(0x8024_0000);
    pub const BAD_SESSION_ID_INVALID: Self = Self(0x8025_0000);
    pub const BAD_SESSION_CLOSED: Self = Self(0x8026_0000);
    pub const BAD_SESSION_NOT_ACTIVATED: Self = Self(0x8027_0000);
    pub const BAD_SUBSCRIPTION_ID_INVALID: Self = Self(0x8028_0000);
    pub const BAD_REQUEST_HEADER_INVALID: Self = Self(0x802A_0000);
    pub const BAD_TIMESTAMPS_TO_RETURN_INVALID: Self = Self(0x802B_0000);
    pub const BAD_REQUEST_CANCELLED_BY_CLIENT: Self = Self(0x802C_0000);
    pub const BAD_NODE_ID_INVALID: Self = Self(0x8033_0000);
    pub const BAD_NODE_ID_UNKNOWN: Self = Self(0x8034_0000);
    pub const BAD_ATTRIBUTE_ID_INVALID: Self = Self(0x8035_0000);

    /// Returns the raw numeric value.
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` when the severity bits are `00`.
    pub fn is_good(self) -> bool {
        self.0 & SEVERITY_MASK == 0
    }

    /// Returns `true` when the severity bits are `01`.
    pub fn is_uncertain(self) -> bool {
        self.0 & SEVERITY_MASK == SEVERITY_UNCERTAIN
    }

    /// Returns `true` when the severity bit for "bad" is set.
    pub fn is_bad(self) -> bool {
        self.0 & SEVERITY_BAD != 0
    }

    /// Returns the code with its informational bits cleared.
    pub fn code_bits(self) -> u32 {
        self.0 & CODE_MASK
    }

    /// Looks up the symbolic name for this code.
    ///
    /// Informational bits are ignored. Returns `None` for codes that are
    /// not in the built-in table.
    pub fn browse_name(self) -> Option<&'static str> {
        let code = self.code_bits();
        KNOWN_CODES
            .iter()
            .find(|(value, _)| *value == code)
            .map(|(_, name)| *name)
    }
}

impl From<u32> for StatusCode {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<StatusCode> for u32 {
    fn from(value: StatusCode) -> Self {
        value.0
    }
}

impl std::fmt::Display for StatusCode {
    /// Writes the symbolic name, or the hex value for unknown codes.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.browse_name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:08X}", self.0),
        }
    }
}

const KNOWN_CODES: &[(u32, &str)] = &[
    (0x0000_0000, "Good"),
    (0x4000_0000, "Uncertain"),
    (0x8000_0000, "Bad"),
    (0x8001_0000, "BadUnexpectedError"),
    (0x8002_0000, "BadInternalError"),
    (0x8003_0000, "BadOutOfMemory"),
    (0x8004_0000, "BadResourceUnavailable"),
    (0x8005_0000, "BadCommunicationError"),
    (0x8006_0000, "BadEncodingError"),
    (0x8007_0000, "BadDecodingError"),
    (0x8008_0000, "BadEncodingLimitsExceeded"),
    (0x8009_0000, "BadUnknownResponse"),
    (0x800A_0000, "BadTimeout"),
    (0x800B_0000, "BadServiceUnsupported"),
    (0x800C_0000, "BadShutdown"),
    (0x800D_0000, "BadServerNotConnected"),
    (0x800E_0000, "BadServerHalted"),
    (0x800F_0000, "BadNothingToDo"),
    (0x8010_0000, "BadTooManyOperations"),
    (0x8011_0000, "BadDataTypeIdUnknown"),
    (0x8012_0000, "BadCertificateInvalid"),
    (0x8013_0000, "BadSecurityChecksFailed"),
    (0x801F_0000, "BadUserAccessDenied"),
    (0x8020_0000, "BadIdentityTokenInvalid"),
    (0x8021_0000, "BadIdentityTokenRejected"),
    (0x8022_0000, "BadSecureChannelIdInvalid"),
    (0x8023_0000, "BadInvalidTimestamp"),
    (0x8024_0000, "BadNonceInvalid"),
    (0x8025_0000, "BadSessionIdInvalid"),
    (0x8026_0000, "BadSessionClosed"),
    (0x8027_0000, "BadSessionNotActivated"),
    (0x8028_0000, "BadSubscriptionIdInvalid"),
    (0x802A_0000, "BadRequestHeaderInvalid"),
    (0x802B_0000, "BadTimestampsToReturnInvalid"),
    (0x802C_0000, "BadRequestCancelledByClient"),
    (0x8033_0000, "BadNodeIdInvalid"),
    (0x8034_0000, "BadNodeIdUnknown"),
    (0x8035_0000, "BadAttributeIdInvalid"),
];
