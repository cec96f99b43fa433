//! API routes and rate-limit bucket identity.

use std::fmt;

/// HTTP verb of an API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    /// Upper-case verb as sent on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One API endpoint: a verb, a route template and the concrete path.
///
/// Only the verb and the template identify the rate-limit bucket, so
/// `GET /channels/{channel_id}` shares a bucket across all channels.
///
/// ```
/// use hookline_transport::{Method, Route};
///
/// let route = Route::new(Method::Get, "/channels/{channel_id}/messages/{message_id}")
///     .param("channel_id", 10)
///     .param("message_id", 20);
///
/// assert_eq!(route.path(), "/channels/10/messages/20");
/// assert_eq!(route.bucket_key(), "GET /channels/{channel_id}/messages/{message_id}");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    method: Method,
    template: String,
    path: String,
    webhook: bool,
}

impl Route {
    /// Creates a route from a template with `{name}` placeholders.
    pub fn new(method: Method, template: impl Into<String>) -> Self {
        let template = template.into();
        Self {
            method,
            path: template.clone(),
            template,
            webhook: false,
        }
    }

    /// Creates a route from an already formatted path.
    ///
    /// Every all-digit path segment is taken to be an id and replaced by
    /// `{id}` in the template.
    pub fn raw(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();
        let template = path
            .split('/')
            .map(|segment| {
                if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                    "{id}"
                } else {
                    segment
                }
            })
            .collect::<Vec<_>>()
            .join("/");
        Self {
            method,
            template,
            path,
            webhook: false,
        }
    }

    /// Fills the `{name}` placeholder of the path with `value`.
    pub fn param(mut self, name: &str, value: impl fmt::Display) -> Self {
        self.path = self.path.replace(&format!("{{{name}}}"), &value.to_string());
        self
    }

    /// Sends the call to the unversioned base URL.
    ///
    /// Interaction webhooks authenticate with the follow-up token and live
    /// outside the versioned API prefix.
    pub fn webhook(mut self) -> Self {
        self.webhook = true;
        self
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_webhook(&self) -> bool {
        self.webhook
    }

    /// Rate-limit bucket key: `"{METHOD} {template}"`.
    pub fn bucket_key(&self) -> String {
        format!("{} {}", self.method, self.template)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_do_not_change_bucket() {
        let a = Route::new(Method::Post, "/channels/{channel_id}/messages").param("channel_id", 1);
        let b = Route::new(Method::Post, "/channels/{channel_id}/messages").param("channel_id", 2);
        assert_ne!(a.path(), b.path());
        assert_eq!(a.bucket_key(), b.bucket_key());
    }

    #[test]
    fn test_method_is_part_of_bucket() {
        let get = Route::new(Method::Get, "/users/@me");
        let patch = Route::new(Method::Patch, "/users/@me");
        assert_ne!(get.bucket_key(), patch.bucket_key());
    }

    #[test]
    fn test_raw_route_templates_ids() {
        let route = Route::raw(Method::Get, "/guilds/1234/members/5678");
        assert_eq!(route.path(), "/guilds/1234/members/5678");
        assert_eq!(route.template(), "/guilds/{id}/members/{id}");
        assert_eq!(route.bucket_key(), "GET /guilds/{id}/members/{id}");
    }
}
