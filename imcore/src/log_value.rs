use std::cell::OnceCell;
use std::fmt;

use crate::context::RequestContext;
use crate::token_codec;

/// A single structured attribute, built lazily — the name/value pair is
/// never allocated until something actually formats the binder.
#[derive(Clone, Debug)]
pub struct LogAttr {
    pub key: &'static str,
    pub value: String,
}

/// Defer-evaluated structured log fields derived from a `RequestContext`.
/// Borrows the context rather than owning it, so it never outlives the
/// request; `attrs()` computes the field list once and caches it, mirroring
/// a `slog.LogValuer`-style lazy/cached value rather than eager
/// string-building on every log call.
pub struct LogValueBinder<'a> {
    ctx: &'a RequestContext,
    cached: OnceCell<Vec<LogAttr>>,
}

impl<'a> LogValueBinder<'a> {
    pub fn new(ctx: &'a RequestContext) -> Self {
        LogValueBinder {
            ctx,
            cached: OnceCell::new(),
        }
    }

    pub fn attrs(&self) -> &[LogAttr] {
        self.cached.get_or_init(|| self.build())
    }

    fn build(&self) -> Vec<LogAttr> {
        let mut attrs = Vec::new();
        if self.ctx.dc > 0 {
            attrs.push(LogAttr {
                key: "dc",
                value: self.ctx.dc.to_string(),
            });
        }
        if let Some(device) = &self.ctx.device {
            if let Some(ip) = device.remote_addr {
                attrs.push(LogAttr {
                    key: "client.ip",
                    value: ip.to_string(),
                });
            }
            if !device.id.is_empty() {
                attrs.push(LogAttr {
                    key: "client.sub",
                    value: device.id.clone(),
                });
            }
            if !device.user_agent.name.is_empty() {
                let name = if device.user_agent.version.is_empty() {
                    device.user_agent.name.clone()
                } else {
                    format!("{}/{}", device.user_agent.name, device.user_agent.version)
                };
                attrs.push(LogAttr {
                    key: "client.name",
                    value: name,
                });
            }
        }
        if let Some(app) = &self.ctx.app {
            attrs.push(LogAttr {
                key: "client.id",
                value: app.client_id.clone(),
            });
        }
        if let Some(session) = &self.ctx.session {
            if session.is_persisted() {
                attrs.push(LogAttr {
                    key: "session.id",
                    value: session.id.to_string(),
                });
            }
        }
        if let Some(contact) = &self.ctx.contact {
            attrs.push(LogAttr {
                key: "contact.id",
                value: contact.id.to_string(),
            });
            attrs.push(LogAttr {
                key: "contact.iss",
                value: contact.iss.clone(),
            });
            attrs.push(LogAttr {
                key: "contact.sub",
                value: contact.sub.clone(),
            });
            if contact.r#type != contact.iss {
                attrs.push(LogAttr {
                    key: "contact.type",
                    value: contact.r#type.clone(),
                });
            }
            let name = contact.name.resolved_common_name();
            if !name.is_empty() {
                attrs.push(LogAttr {
                    key: "contact.name",
                    value: name,
                });
            }
        }
        attrs
    }

    /// Redacts a raw header/token value for inclusion in a log line.
    pub fn redact(raw: &str) -> String {
        token_codec::redact(raw, token_codec::RedactOptions::default())
    }
}

impl fmt::Display for LogValueBinder<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let attrs = self.attrs();
        write!(f, "{{")?;
        for (i, attr) in attrs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", attr.key, attr.value)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::HeaderBag;
    use imcore_types::{Device, UserAgentInfo};

    #[test]
    fn attrs_are_computed_once_and_cached() {
        let mut ctx = RequestContext::new(0, 1, HeaderBag::new(), None);
        ctx.dc = 7;
        ctx.device = Some(Device {
            id: "D1".into(),
            user_agent: UserAgentInfo {
                name: "Webitel".into(),
                ..Default::default()
            },
            ..Default::default()
        });
        let binder = LogValueBinder::new(&ctx);
        let first = binder.attrs().to_vec();
        let second = binder.attrs().to_vec();
        assert_eq!(first.len(), second.len());
        assert!(first.iter().any(|a| a.key == "dc" && a.value == "7"));
        assert!(first.iter().any(|a| a.key == "client.sub" && a.value == "D1"));
    }
}
