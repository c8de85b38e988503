//! Named-placeholder templates for search bases and filters
//!
//! Placeholders are written `%(name)s`; `%%` produces a literal percent sign.
//! Templates are parsed once, when a query is registered, so malformed or
//! incomplete templates are rejected before the first request.

use crate::error::{DirectoryError, DirectoryResult};
use std::borrow::Cow;
use std::fmt;

/// Substitution values, looked up by placeholder name
pub type Params<'a> = [(&'a str, &'a str)];

/// How substituted values are encoded before insertion
pub type Escape = fn(&str) -> Cow<'_, str>;

/// RFC 4515 escaping for values placed inside a search filter
pub fn escape_filter_value(value: &str) -> Cow<'_, str> {
    ldap3::ldap_escape(value)
}

/// RFC 4514 escaping for values placed inside a distinguished name
pub fn escape_dn_value(value: &str) -> Cow<'_, str> {
    ldap3::dn_escape(value)
}

/// Insert the value unchanged
pub fn verbatim(value: &str) -> Cow<'_, str> {
    Cow::Borrowed(value)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Placeholder(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(source: &str) -> DirectoryResult<Self> {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;

        while let Some(pos) = rest.find('%') {
            literal.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            if let Some(tail) = after.strip_prefix('%') {
                literal.push('%');
                rest = tail;
                continue;
            }

            let Some(body) = after.strip_prefix('(') else {
                return Err(invalid(
                    source,
                    "'%' must start a %(name)s placeholder or be written %%",
                ));
            };
            let Some(close) = body.find(')') else {
                return Err(invalid(source, "unterminated placeholder"));
            };

            let name = &body[..close];
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(invalid(source, &format!("invalid placeholder name '{}'", name)));
            }

            let Some(tail) = body[close + 1..].strip_prefix('s') else {
                return Err(invalid(
                    source,
                    &format!("placeholder '{}' must be written %({})s", name, name),
                ));
            };

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Placeholder(name.to_string()));
            rest = tail;
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.placeholders().any(|p| p == name)
    }

    /// Fail unless the template uses `name`
    pub fn require(&self, name: &str) -> DirectoryResult<()> {
        if self.contains(name) {
            Ok(())
        } else {
            Err(invalid(
                &self.source,
                &format!("missing required placeholder %({})s", name),
            ))
        }
    }

    /// Fail if the template uses any placeholder outside `allowed`
    pub fn allow_only(&self, allowed: &[&str]) -> DirectoryResult<()> {
        match self.placeholders().find(|p| !allowed.contains(p)) {
            Some(unknown) => Err(invalid(
                &self.source,
                &format!("unknown placeholder %({})s", unknown),
            )),
            None => Ok(()),
        }
    }

    pub fn render(&self, params: &Params<'_>, escape: Escape) -> DirectoryResult<String> {
        let mut out = String::with_capacity(self.source.len());

        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = params
                        .iter()
                        .find(|(key, _)| key == name)
                        .map(|(_, value)| *value)
                        .ok_or_else(|| {
                            invalid(&self.source, &format!("no value for %({})s", name))
                        })?;
                    out.push_str(&escape(value));
                }
            }
        }

        Ok(out)
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn invalid(source: &str, reason: &str) -> DirectoryError {
    DirectoryError::InvalidTemplate(format!("{} in {:?}", reason, source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_login_filter() {
        let template = Template::parse("(sAMAccountName=%(login)s)").unwrap();

        let rendered = template
            .render(&[("login", "alice")], escape_filter_value)
            .unwrap();

        assert_eq!(rendered, "(sAMAccountName=alice)");
    }

    #[test]
    fn test_literal_template_unchanged() {
        let template = Template::parse("CN=Users,DC=example,DC=com").unwrap();

        assert_eq!(template.placeholders().count(), 0);
        assert_eq!(
            template.render(&[], verbatim).unwrap(),
            "CN=Users,DC=example,DC=com"
        );
    }

    #[test]
    fn test_dn_values_are_escaped() {
        let template = Template::parse("uid=%(login)s,ou=people,dc=example,dc=com").unwrap();

        let rendered = template
            .render(&[("login", "x,ou=admins")], escape_dn_value)
            .unwrap();

        assert_eq!(rendered, "uid=x\\2cou\\3dadmins,ou=people,dc=example,dc=com");
    }

    #[test]
    fn test_filter_values_are_escaped() {
        let template = Template::parse("(uid=%(login)s)").unwrap();

        let rendered = template
            .render(&[("login", "*)(uid=*")], escape_filter_value)
            .unwrap();

        assert_eq!(rendered, "(uid=\\2a\\29\\28uid=\\2a)");
    }

    #[test]
    fn test_dn_value_in_filter_keeps_commas() {
        let template = Template::parse("(member=%(userdn)s)").unwrap();

        let rendered = template
            .render(&[("userdn", "CN=Alice,DC=example,DC=com")], escape_filter_value)
            .unwrap();

        assert_eq!(rendered, "(member=CN=Alice,DC=example,DC=com)");
    }

    #[test]
    fn test_percent_escape() {
        let template = Template::parse("(description=100%%)").unwrap();
        assert_eq!(template.render(&[], verbatim).unwrap(), "(description=100%)");
    }

    #[test]
    fn test_malformed_templates_rejected() {
        assert!(Template::parse("(uid=%s)").is_err());
        assert!(Template::parse("(uid=%(login)").is_err());
        assert!(Template::parse("(uid=%(login").is_err());
        assert!(Template::parse("(uid=%()s)").is_err());
        assert!(Template::parse("(uid=%(login)d)").is_err());
        assert!(Template::parse("(uid=%(lo gin)s)").is_err());
    }

    #[test]
    fn test_required_and_allowed_placeholders() {
        let template = Template::parse("(&(uid=%(login)s)(o=%(org)s))").unwrap();

        assert!(template.require("login").is_ok());
        assert!(template.require("userdn").is_err());
        assert!(template.allow_only(&["login", "org"]).is_ok());
        assert!(template.allow_only(&["login"]).is_err());
    }

    #[test]
    fn test_missing_value_is_an_error() {
        let template = Template::parse("(uid=%(login)s)").unwrap();
        assert!(template.render(&[("userdn", "x")], verbatim).is_err());
    }
}
