//! Session cookie attributes and header helpers.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const SECONDS_PER_DAY: u64 = 86_400;

/// `SameSite` cookie attribute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
	Strict,
	#[default]
	Lax,
	None,
}

impl fmt::Display for SameSite {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SameSite::Strict => write!(f, "Strict"),
			SameSite::Lax => write!(f, "Lax"),
			SameSite::None => write!(f, "None"),
		}
	}
}

/// Attributes written alongside a cookie value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieAttributes {
	/// Parent domain (e.g. `.app.example.com`); `None` means host-only.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub domain: Option<String>,
	pub path: String,
	pub secure: bool,
	pub same_site: SameSite,
	/// Lifetime expressed as a (possibly fractional) day count.
	pub expires_days: f64,
}

impl CookieAttributes {
	/// Session-cookie attributes: `Path=/`, `Secure`, `SameSite=Lax`.
	pub fn session(domain: Option<String>, max_age_secs: u64) -> Self {
		Self {
			domain,
			path: "/".to_string(),
			secure: true,
			same_site: SameSite::Lax,
			expires_days: max_age_secs as f64 / SECONDS_PER_DAY as f64,
		}
	}

	/// Attributes that expire the cookie immediately at the same domain/path.
	pub fn removal(domain: Option<String>) -> Self {
		Self {
			domain,
			path: "/".to_string(),
			secure: true,
			same_site: SameSite::Lax,
			expires_days: 0.0,
		}
	}

	pub fn max_age_secs(&self) -> i64 {
		(self.expires_days * SECONDS_PER_DAY as f64).round() as i64
	}
}

/// A named cookie with its attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCookie {
	pub name: String,
	pub value: String,
	pub attributes: CookieAttributes,
}

impl SessionCookie {
	/// Renders the cookie as a `Set-Cookie` header value.
	pub fn to_set_cookie(&self) -> String {
		let attrs = &self.attributes;
		let mut header = format!("{}={}; Path={}", self.name, self.value, attrs.path);
		if let Some(domain) = &attrs.domain {
			header.push_str(&format!("; Domain={domain}"));
		}
		header.push_str(&format!("; Max-Age={}", attrs.max_age_secs().max(0)));
		if attrs.secure {
			header.push_str("; Secure");
		}
		header.push_str(&format!("; SameSite={}", attrs.same_site));
		header
	}
}

/// Splits a `Cookie` request header into name/value pairs.
pub fn parse_cookie_header(header: &str) -> Vec<(String, String)> {
	header
		.split(';')
		.filter_map(|pair| {
			let (name, value) = pair.split_once('=')?;
			let name = name.trim();
			if name.is_empty() {
				return None;
			}
			Some((name.to_string(), value.trim().to_string()))
		})
		.collect()
}

/// RFC 6265 domain-match: `host` equals `domain` or is a subdomain of it.
///
/// A leading dot on `domain` is ignored.
pub fn domain_matches(host: &str, domain: &str) -> bool {
	let domain = domain.trim_start_matches('.').to_ascii_lowercase();
	let host = host.to_ascii_lowercase();
	if domain.is_empty() {
		return false;
	}
	host == domain || host.ends_with(&format!(".{domain}"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn session_attributes_convert_max_age_to_days() {
		let attrs = CookieAttributes::session(Some(".app.example.com".into()), 14 * SECONDS_PER_DAY);
		assert_eq!(attrs.expires_days, 14.0);
		assert_eq!(attrs.max_age_secs(), 14 * SECONDS_PER_DAY as i64);
		assert!(attrs.secure);
		assert_eq!(attrs.same_site, SameSite::Lax);
		assert_eq!(attrs.path, "/");
	}

	#[test]
	fn set_cookie_header_carries_all_attributes() {
		let cookie = SessionCookie {
			name: "suite_session".into(),
			value: "abc".into(),
			attributes: CookieAttributes::session(Some(".app.example.com".into()), SECONDS_PER_DAY),
		};
		assert_eq!(
			cookie.to_set_cookie(),
			"suite_session=abc; Path=/; Domain=.app.example.com; Max-Age=86400; Secure; SameSite=Lax"
		);
	}

	#[test]
	fn cookie_header_parsing_skips_garbage() {
		let pairs = parse_cookie_header("a=1; suite_session=abc=def ;broken; =x");
		assert_eq!(
			pairs,
			vec![("a".to_string(), "1".to_string()), ("suite_session".to_string(), "abc=def".to_string())]
		);
	}

	#[test]
	fn domain_match_rules() {
		assert!(domain_matches("app.example.com", ".app.example.com"));
		assert!(domain_matches("notes.app.example.com", "app.example.com"));
		assert!(!domain_matches("evilapp.example.com", "app.example.com"));
		assert!(!domain_matches("example.com", "app.example.com"));
		assert!(!domain_matches("example.com", ""));
	}
}
