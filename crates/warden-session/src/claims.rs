//! Session claims and their fixed-width binary payload.

use uuid::Uuid;
use warden_core::{IdentityId, Rank, Timestamp};

use crate::error::{SessionError, SessionResult};

/// Payload format version.
pub(crate) const PAYLOAD_VERSION: u8 = 0x01;

/// version (1) + subject (16) + rank (4) + issued_at (8) + expires_at (8).
pub(crate) const PAYLOAD_LEN: usize = 37;

/// The verified contents of a session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionClaims {
    /// The authenticated identity.
    pub subject: IdentityId,
    /// The identity's role rank when the token was issued.
    pub rank: Rank,
    /// When the token was issued (whole seconds).
    pub issued_at: Timestamp,
    /// When the token stops being accepted (whole seconds).
    pub expires_at: Timestamp,
}

impl SessionClaims {
    /// Encode the claims as the authenticated payload.
    pub(crate) fn to_payload(&self) -> [u8; PAYLOAD_LEN] {
        let mut out = [0u8; PAYLOAD_LEN];
        out[0] = PAYLOAD_VERSION;
        out[1..17].copy_from_slice(self.subject.as_uuid().as_bytes());
        out[17..21].copy_from_slice(&self.rank.get().to_le_bytes());
        out[21..29].copy_from_slice(&self.issued_at.unix_secs().to_le_bytes());
        out[29..37].copy_from_slice(&self.expires_at.unix_secs().to_le_bytes());
        out
    }

    /// Check the payload shape without interpreting the fields.
    pub(crate) fn check_shape(payload: &[u8]) -> SessionResult<()> {
        if payload.len() != PAYLOAD_LEN {
            return Err(SessionError::Malformed(format!(
                "payload is {} bytes, expected {PAYLOAD_LEN}",
                payload.len()
            )));
        }
        if payload[0] != PAYLOAD_VERSION {
            return Err(SessionError::Malformed(format!(
                "unsupported payload version {}",
                payload[0]
            )));
        }
        Ok(())
    }

    /// Decode an authenticated payload.
    pub(crate) fn from_payload(payload: &[u8]) -> SessionResult<Self> {
        Self::check_shape(payload)?;

        let field = |range: std::ops::Range<usize>| {
            payload
                .get(range)
                .ok_or_else(|| SessionError::Malformed("truncated payload".into()))
        };
        let subject: [u8; 16] = field(1..17)?
            .try_into()
            .map_err(|_| SessionError::Malformed("bad subject".into()))?;
        let rank: [u8; 4] = field(17..21)?
            .try_into()
            .map_err(|_| SessionError::Malformed("bad rank".into()))?;
        let issued_at: [u8; 8] = field(21..29)?
            .try_into()
            .map_err(|_| SessionError::Malformed("bad issued_at".into()))?;
        let expires_at: [u8; 8] = field(29..37)?
            .try_into()
            .map_err(|_| SessionError::Malformed("bad expires_at".into()))?;

        let to_ts = |secs: i64| {
            Timestamp::from_unix_secs(secs).map_err(|e| SessionError::Malformed(e.to_string()))
        };
        let claims = Self {
            subject: IdentityId::from_uuid(Uuid::from_bytes(subject)),
            rank: Rank::new(u32::from_le_bytes(rank)),
            issued_at: to_ts(i64::from_le_bytes(issued_at))?,
            expires_at: to_ts(i64::from_le_bytes(expires_at))?,
        };
        if claims.expires_at < claims.issued_at {
            return Err(SessionError::Malformed(
                "expiry precedes issuance".into(),
            ));
        }
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> SessionClaims {
        SessionClaims {
            subject: IdentityId::new(),
            rank: Rank::new(7),
            issued_at: Timestamp::from_unix_secs(1_000).unwrap(),
            expires_at: Timestamp::from_unix_secs(4_600).unwrap(),
        }
    }

    #[test]
    fn test_payload_layout() {
        let c = claims();
        let payload = c.to_payload();
        assert_eq!(payload[0], PAYLOAD_VERSION);
        assert_eq!(&payload[1..17], c.subject.as_uuid().as_bytes());
        assert_eq!(&payload[17..21], &7u32.to_le_bytes());
        assert_eq!(SessionClaims::from_payload(&payload).unwrap(), c);
    }

    #[test]
    fn test_rejects_wrong_length_and_version() {
        let payload = claims().to_payload();
        assert!(matches!(
            SessionClaims::from_payload(&payload[..36]),
            Err(SessionError::Malformed(_))
        ));

        let mut wrong_version = payload;
        wrong_version[0] = 0x02;
        assert!(matches!(
            SessionClaims::from_payload(&wrong_version),
            Err(SessionError::Malformed(_))
        ));
    }

    #[test]
    fn test_rejects_expiry_before_issuance() {
        let mut c = claims();
        c.expires_at = Timestamp::from_unix_secs(999).unwrap();
        assert!(matches!(
            SessionClaims::from_payload(&c.to_payload()),
            Err(SessionError::Malformed(_))
        ));
    }
}
