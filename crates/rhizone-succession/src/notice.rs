//! Announcements and alerts.

use rhizone_ledger::{GrantId, MemberId};

/// Something worth telling the community or the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// A custodian was drawn
    NewCustodian { grant: GrantId, custodian: MemberId },
    /// The token itself, for the custodian's eyes only
    CustodyToken {
        grant: GrantId,
        custodian: MemberId,
        token: String,
    },
    /// Someone joined with the token
    Welcome {
        grant: GrantId,
        custodian: MemberId,
        grantee: MemberId,
    },
    /// The custodian passed on their turn
    Abstained { grant: GrantId, custodian: MemberId },
    /// The token went public after the timeout
    Released { grant: GrantId, token: String },
    /// Automatic succession halted
    Suspended { reason: String },
    /// Automatic succession resumed by the operator
    Resumed,
    /// Operator alert
    Alert(String),
}

impl Notice {
    /// Whether the community sees this notice.
    pub fn is_public(&self) -> bool {
        matches!(
            self,
            Self::NewCustodian { .. }
                | Self::Welcome { .. }
                | Self::Abstained { .. }
                | Self::Released { .. }
        )
    }

    /// The one member this notice is addressed to, if any.
    pub fn recipient(&self) -> Option<MemberId> {
        match self {
            Self::CustodyToken { custodian, .. } => Some(*custodian),
            _ => None,
        }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NewCustodian { grant, custodian } => write!(
                f,
                "Member {} now holds invite #{}, the one and only invite in the community.",
                custodian, grant
            ),
            Self::CustodyToken { grant, token, .. } => write!(
                f,
                "Behold! This is invite #{}. Use it wisely.\n\n||`{}`||",
                grant, token
            ),
            Self::Welcome {
                grant,
                custodian,
                grantee,
            } => write!(
                f,
                "Welcome, member {}! Invited by member {} with invite #{}.",
                grantee, custodian, grant
            ),
            Self::Abstained { grant, custodian } => write!(
                f,
                "Member {} passed on invite #{}. Drawing again.",
                custodian, grant
            ),
            Self::Released { grant, token } => write!(
                f,
                "Invite #{} went unused and is now open to everyone: `{}`",
                grant, token
            ),
            Self::Suspended { reason } => write!(f, "Succession suspended: {}", reason),
            Self::Resumed => write!(f, "Succession resumed"),
            Self::Alert(text) => write!(f, "{}", text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing() {
        assert!(Notice::Released {
            grant: GrantId(1),
            token: "x".into()
        }
        .is_public());
        assert!(!Notice::Alert("boom".into()).is_public());
        assert!(!Notice::Resumed.is_public());

        let token = Notice::CustodyToken {
            grant: GrantId(7),
            custodian: MemberId(3),
            token: "AbCd1234".into(),
        };
        assert!(!token.is_public());
        assert_eq!(token.recipient(), Some(MemberId(3)));
        assert_eq!(Notice::Resumed.recipient(), None);
    }

    #[test]
    fn token_only_in_direct_notice() {
        let announcement = Notice::NewCustodian {
            grant: GrantId(7),
            custodian: MemberId(3),
        }
        .to_string();
        assert!(announcement.contains("#7"));
        assert!(!announcement.contains("AbCd1234"));

        let direct = Notice::CustodyToken {
            grant: GrantId(7),
            custodian: MemberId(3),
            token: "AbCd1234".into(),
        }
        .to_string();
        assert!(direct.contains("||`AbCd1234`||"));
    }
}
