//! Connection authorization
//!
//! A pass/fail gate applied during the handshake. Clients may connect with no
//! authorization at all, or present an MIT-MAGIC-COOKIE-1 matching the
//! configured cookie.

pub const MIT_MAGIC_COOKIE: &str = "MIT-MAGIC-COOKIE-1";

/// Authorization policy
#[derive(Debug, Clone, Default)]
pub struct AuthPolicy {
    /// Accept any protocol name and data
    pub allow_any: bool,
    /// Cookie accepted for MIT-MAGIC-COOKIE-1
    pub cookie: Option<Vec<u8>>,
}

impl AuthPolicy {
    /// Accept every client (for testing)
    pub fn permissive() -> Self {
        AuthPolicy {
            allow_any: true,
            cookie: None,
        }
    }

    pub fn with_cookie(cookie: Vec<u8>) -> Self {
        AuthPolicy {
            allow_any: false,
            cookie: Some(cookie),
        }
    }

    /// Check the handshake's authorization fields. The error is the reason
    /// string sent back in the failed setup reply.
    pub fn check(&self, name: &str, data: &[u8]) -> Result<(), String> {
        if self.allow_any {
            return Ok(());
        }
        if name.is_empty() {
            return match self.cookie {
                None => Ok(()),
                Some(_) => Err("Authorization required".to_string()),
            };
        }
        if name == MIT_MAGIC_COOKIE {
            return match &self.cookie {
                Some(cookie) if cookie.as_slice() == data => Ok(()),
                Some(_) => Err("Invalid MIT-MAGIC-COOKIE-1 key".to_string()),
                None => Err(format!("Unknown auth {}", name)),
            };
        }
        Err(format!("Unknown auth {}", name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_accepts_empty_auth_only() {
        let policy = AuthPolicy::default();
        assert!(policy.check("", &[]).is_ok());
        assert_eq!(
            policy.check("XDM-AUTHORIZATION-1", &[1, 2]).unwrap_err(),
            "Unknown auth XDM-AUTHORIZATION-1"
        );
    }

    #[test]
    fn test_cookie_policy() {
        let policy = AuthPolicy::with_cookie(vec![1, 2, 3]);
        assert!(policy.check(MIT_MAGIC_COOKIE, &[1, 2, 3]).is_ok());
        assert!(policy.check(MIT_MAGIC_COOKIE, &[1, 2, 4]).is_err());
        assert!(policy.check("", &[]).is_err());
    }

    #[test]
    fn test_permissive() {
        assert!(AuthPolicy::permissive().check("anything", b"x").is_ok());
    }
}
